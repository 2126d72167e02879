//! # freelist-alloc - A First-Fit Free-List Memory Allocator
//!
//! This crate provides a general-purpose allocator that grows a single heap
//! region with the `sbrk` system call (or any other [`HeapSource`]) and
//! reuses released memory through a free list.
//!
//! ## Overview
//!
//! Every block starts with a 16-byte metadata slot. While the block is handed
//! out the slot is a header; once released the very same bytes are
//! reinterpreted as a free node and linked into the free list:
//!
//! ```text
//!   Allocated block:                      Free block:
//!   ┌──────────────┬──────────────────┐   ┌──────────────┬──────────────────┐
//!   │ size         │                  │   │ size         │                  │
//!   │ magic        │   size bytes     │   │ next ────────┼──► next free     │
//!   └──────────────┴──────────────────┘   └──────────────┴──────────────────┘
//!      16 bytes    ▲                         16 bytes
//!                  └── pointer returned to the caller
//! ```
//!
//! The end of any block, free or not, is `start + 16 + size`, which is how
//! physical neighbours are found.
//!
//! ```text
//!   Heap after a few allocations and releases:
//!
//!   ┌─────┬─────┬───────────┬─────┬───────────┬──────────────────┐
//!   │ A1  │ F1  │    A2     │ F2  │    A3     │   (not yet sbrk) │
//!   └─────┴─────┴───────────┴─────┴───────────┴──────────────────┘
//!            ▲                 ▲               ▲
//!            │                 │               └── program break
//!   head ────┼──── F2 ─────────┘
//!            └──── F1 ◄── F2.next
//! ```
//!
//! - **allocate**: take the first free block large enough (first fit), split
//!   it when the leftover can hold a node, else extend the heap.
//! - **release**: push the block at the head of the list and merge it with any
//!   free physical neighbour right away.
//! - **resize**: allocate, copy, release.
//!
//! ## Crate Structure
//!
//! ```text
//!   freelist_alloc
//!   ├── align      - Alignment granule and the align! macro
//!   ├── block      - Header / free node metadata (internal)
//!   ├── heap       - HeapSource, Sbrk, Arena and heap extension
//!   ├── free_list  - Free list search, split and coalesce (internal)
//!   ├── allocator  - FreeListAllocator
//!   ├── error      - AllocError
//!   └── ffi        - C ABI exports (feature "ffi")
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use freelist_alloc::FreeListAllocator;
//!
//! fn main() {
//!     let mut allocator = FreeListAllocator::new();
//!
//!     let ptr = allocator.allocate(8).unwrap().as_ptr() as *mut u64;
//!
//!     unsafe {
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!
//!         allocator.release(ptr as *mut u8);
//!     }
//! }
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Grow only**: The heap is never returned to the OS
//! - **Linear scans**: Allocation and coalescing walk the free list
//! - **Best-effort checks**: The header sentinel catches overwritten headers
//!   and double releases, not every misuse
//!
//! ## Safety
//!
//! Releasing and resizing take raw pointers and are `unsafe`: the pointer
//! must come from the same allocator and must not have been released already.

pub mod align;
mod allocator;
mod block;
mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
mod free_list;
mod heap;

pub use allocator::{FreeListAllocator, HeapStats};
pub use block::{MAGIC, META_SIZE};
pub use error::AllocError;
pub use free_list::FreeBlock;
pub use heap::{Arena, HeapSource, Sbrk};

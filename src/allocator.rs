use std::ptr::{self, NonNull};

use log::{debug, warn};

use crate::{
  align::checked_align,
  block::{FreeNode, Header},
  error::AllocError,
  free_list::{FreeBlock, FreeList},
  heap::{HeapSource, Sbrk, extend_heap},
};

/// Running totals of what the allocator took from its [`HeapSource`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  /// Number of successful heap extensions.
  pub extensions: usize,
  /// Bytes obtained from the source, alignment padding included.
  pub heap_bytes: usize,
}

/// First-fit allocator over a single, growing heap region.
///
/// Released blocks go to the head of a free list and are merged with their
/// physical neighbours right away. Allocation scans the list for the first
/// block that is large enough, splits it when the leftover can host a node
/// and otherwise hands out the whole block. When nothing fits, the heap is
/// extended.
///
/// Not thread-safe: every operation takes `&mut self`.
pub struct FreeListAllocator<S: HeapSource = Sbrk> {
  free_list: FreeList,
  source: S,
  stats: HeapStats,
}

impl FreeListAllocator<Sbrk> {
  /// An allocator growing the process heap with `sbrk`.
  pub const fn new() -> Self {
    Self::with_source(Sbrk)
  }
}

impl Default for FreeListAllocator<Sbrk> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: HeapSource> FreeListAllocator<S> {
  pub const fn with_source(source: S) -> Self {
    Self {
      free_list: FreeList::new(),
      source,
      stats: HeapStats {
        extensions: 0,
        heap_bytes: 0,
      },
    }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn stats(&self) -> HeapStats {
    self.stats
  }

  /// The free list, head first.
  pub fn free_blocks(&self) -> impl Iterator<Item = FreeBlock> + '_ {
    self.free_list.iter()
  }

  /// Returns a 16-aligned pointer to at least `size` writable bytes.
  ///
  /// The request is rounded up to the alignment granule; a zero-byte request
  /// still gets one granule so every live pointer is distinct.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let request = checked_align(size.max(1)).ok_or(AllocError::OutOfMemory { requested: size })?;

    let header = if self.free_list.is_empty() {
      self.grow(request)?
    } else {
      match self.free_list.first_fit(request) {
        Some(node) => unsafe { self.take(node, request) },
        None => self.grow(request)?,
      }
    };

    let payload = unsafe { Header::payload(header) };
    NonNull::new(payload).ok_or(AllocError::OutOfMemory { requested: size })
  }

  /// Turns a free node that fits `request` into an allocated block.
  unsafe fn take(
    &mut self,
    node: *mut FreeNode,
    request: usize,
  ) -> *mut Header {
    unsafe {
      // Too small to split: the node is handed out whole.
      let block = FreeList::split(node, request).unwrap_or(node);

      self.free_list.remove(block);

      debug!(
        "reusing free block {:?} for {} bytes (capacity {})",
        block,
        request,
        (*block).size
      );

      FreeNode::into_header(block)
    }
  }

  fn grow(
    &mut self,
    request: usize,
  ) -> Result<*mut Header, AllocError> {
    let (header, obtained) = extend_heap(&mut self.source, request)?;

    self.stats.extensions += 1;
    self.stats.heap_bytes += obtained;

    Ok(header)
  }

  /// Allocates `count * size` bytes, all zero.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let bytes = count
      .checked_mul(size)
      .ok_or(AllocError::SizeOverflow { count, size })?;

    let payload = self.allocate(bytes)?;

    unsafe {
      let capacity = (*Header::from_payload(payload.as_ptr())).size;
      payload.as_ptr().write_bytes(0, capacity);
    }

    Ok(payload)
  }

  /// Returns the block behind `address` to the free list.
  ///
  /// Null is ignored. So is a pointer whose header does not carry the
  /// allocator's sentinel: nothing is freed and the free list is untouched.
  ///
  /// # Safety
  ///
  /// `address` must be null or a pointer obtained from this allocator that
  /// has not been released since.
  pub unsafe fn release(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    unsafe {
      let header = Header::from_payload(address);

      if !Header::is_valid(header) {
        warn!("release: invalid block header at {:?}, ignoring", header);
        return;
      }

      let node = Header::into_free(header);
      self.free_list.insert(node);
    }
  }

  /// Moves the allocation behind `address` into a fresh block of `new_size`
  /// bytes, keeping the first `min(old, new_size)` bytes.
  ///
  /// Always copies. A null `address` behaves like [`allocate`]. On failure the
  /// old block is left untouched.
  ///
  /// [`allocate`]: FreeListAllocator::allocate
  ///
  /// # Safety
  ///
  /// Same contract as [`release`](FreeListAllocator::release).
  pub unsafe fn resize(
    &mut self,
    address: *mut u8,
    new_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if address.is_null() {
      return self.allocate(new_size);
    }

    let old_size = unsafe { self.usable_size(address)? };
    let new_address = self.allocate(new_size)?;

    unsafe {
      ptr::copy_nonoverlapping(address, new_address.as_ptr(), old_size.min(new_size));
      self.release(address);
    }

    Ok(new_address)
  }

  /// Capacity of the block behind `address`, which is at least what was
  /// asked for. Zero for null.
  ///
  /// # Safety
  ///
  /// Same contract as [`release`](FreeListAllocator::release).
  pub unsafe fn usable_size(
    &self,
    address: *mut u8,
  ) -> Result<usize, AllocError> {
    if address.is_null() {
      return Ok(0);
    }

    unsafe {
      let header = Header::from_payload(address);

      if !Header::is_valid(header) {
        warn!("invalid block header at {:?}", header);
        return Err(AllocError::Corrupted {
          address: address as usize,
        });
      }

      Ok((*header).size)
    }
  }
}

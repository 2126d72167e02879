//! C ABI over one process-wide allocator growing the program break.
//!
//! Nothing here is synchronized. Callers must not enter these functions from
//! more than one thread at a time.

use std::{cell::UnsafeCell, ptr};

use libc::{c_void, size_t};
use log::warn;

use crate::{allocator::FreeListAllocator, heap::Sbrk};

struct GlobalHeap(UnsafeCell<FreeListAllocator<Sbrk>>);

// Single-threaded use only, see the module docs.
unsafe impl Sync for GlobalHeap {}

static HEAP: GlobalHeap = GlobalHeap(UnsafeCell::new(FreeListAllocator::new()));

unsafe fn heap() -> &'static mut FreeListAllocator<Sbrk> {
  unsafe { &mut *HEAP.0.get() }
}

/// `malloc`: null when the heap cannot grow.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fl_malloc(size: size_t) -> *mut c_void {
  match unsafe { heap() }.allocate(size) {
    Ok(address) => address.as_ptr() as *mut c_void,
    Err(_) => ptr::null_mut(),
  }
}

/// `calloc`: null on overflow of `count * size` or when the heap cannot grow.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fl_calloc(
  count: size_t,
  size: size_t,
) -> *mut c_void {
  match unsafe { heap() }.allocate_zeroed(count, size) {
    Ok(address) => address.as_ptr() as *mut c_void,
    Err(_) => ptr::null_mut(),
  }
}

/// `realloc`: null on failure, in which case `address` stays valid. A
/// corrupted header also yields null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fl_realloc(
  address: *mut c_void,
  size: size_t,
) -> *mut c_void {
  match unsafe { heap().resize(address as *mut u8, size) } {
    Ok(address) => address.as_ptr() as *mut c_void,
    Err(err) => {
      warn!("fl_realloc: {}", err);
      ptr::null_mut()
    }
  }
}

/// `free`: null and foreign pointers are ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fl_free(address: *mut c_void) {
  unsafe { heap().release(address as *mut u8) }
}

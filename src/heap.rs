use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};
use log::trace;

use crate::{
  align::{ALIGNMENT, padding_for},
  block::{Header, META_SIZE},
  error::AllocError,
};

/// Where the allocator gets fresh memory from. Modelled on the program break:
/// a top-of-heap cursor that only ever moves up.
///
/// # Safety
///
/// Implementors must hand out every byte at most once, and the bytes returned
/// by [`extend`](HeapSource::extend) must stay readable and writable for as
/// long as the source lives.
pub unsafe trait HeapSource {
  /// Current top of the managed region, without moving it.
  fn current_top(&mut self) -> *mut u8;

  /// Moves the top up by `increment` bytes and returns the previous top, or
  /// `None` if the region cannot grow.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>>;
}

/// The process data segment, grown with `sbrk(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

unsafe impl HeapSource for Sbrk {
  fn current_top(&mut self) -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }

  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(increment).ok()?;
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(address as *mut u8)
  }
}

/// A fixed-capacity region that behaves like a private program break.
///
/// Gives every allocator its own heap, which keeps tests isolated from each
/// other and from the process break.
pub struct Arena {
  base: NonNull<u8>,
  capacity: usize,
  used: usize,
}

impl Arena {
  /// Reserves `capacity` bytes, 16-aligned at the base.
  pub fn new(capacity: usize) -> Result<Self, AllocError> {
    let layout = Self::layout(capacity)?;
    let base = unsafe { alloc::alloc(layout) };

    match NonNull::new(base) {
      Some(base) => Ok(Self {
        base,
        capacity,
        used: 0,
      }),
      None => Err(AllocError::OutOfMemory { requested: capacity }),
    }
  }

  fn layout(capacity: usize) -> Result<Layout, AllocError> {
    Layout::from_size_align(capacity.max(1), ALIGNMENT)
      .map_err(|_| AllocError::OutOfMemory { requested: capacity })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }
}

unsafe impl HeapSource for Arena {
  fn current_top(&mut self) -> *mut u8 {
    unsafe { self.base.as_ptr().add(self.used) }
  }

  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    if increment > self.capacity - self.used {
      return None;
    }

    let previous = self.current_top();
    self.used += increment;

    NonNull::new(previous)
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    if let Ok(layout) = Self::layout(self.capacity) {
      unsafe { alloc::dealloc(self.base.as_ptr(), layout) };
    }
  }
}

/// Grows `source` by enough to host a header plus `size` payload bytes,
/// with the payload starting on an [`ALIGNMENT`] boundary.
///
/// Returns the new block's header and the total number of bytes taken from
/// the source (padding included).
pub(crate) fn extend_heap<S: HeapSource>(
  source: &mut S,
  size: usize,
) -> Result<(*mut Header, usize), AllocError> {
  let top = source.current_top();
  let padding = padding_for(top as usize);

  let total = padding
    .checked_add(META_SIZE)
    .and_then(|n| n.checked_add(size))
    .ok_or(AllocError::OutOfMemory { requested: size })?;

  let memory = source
    .extend(total)
    .ok_or(AllocError::OutOfMemory { requested: size })?;

  debug_assert_eq!(memory.as_ptr(), top);

  let header = unsafe { Header::write(memory.as_ptr().add(padding), size) };

  trace!(
    "extended heap by {} bytes (padding {}), block at {:?}",
    total, padding, header
  );

  Ok((header, total))
}

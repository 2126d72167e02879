use std::{mem, ptr};

use crate::align::ALIGNMENT;

/// Sentinel stamped into every header handed out by the allocator.
pub const MAGIC: usize = 0x0123_4567;

/// Metadata of an allocated block. Lives right before the payload.
#[repr(C, align(16))]
pub struct Header {
  pub size: usize,
  pub magic: usize,
}

/// Metadata of a free block. Occupies the same bytes a [`Header`] did.
#[repr(C, align(16))]
pub struct FreeNode {
  pub size: usize,
  pub next: *mut FreeNode,
}

/// Size of the metadata slot at the front of every block.
pub const META_SIZE: usize = mem::size_of::<Header>();

const _: () = assert!(mem::size_of::<Header>() == mem::size_of::<FreeNode>());
const _: () = assert!(META_SIZE % ALIGNMENT == 0);

impl Header {
  /// Header sitting right before `payload`.
  ///
  /// # Safety
  ///
  /// `payload` must be at least `META_SIZE` bytes past the start of a mapped
  /// region. Nothing is read.
  pub unsafe fn from_payload(payload: *mut u8) -> *mut Header {
    unsafe { payload.sub(META_SIZE) as *mut Header }
  }

  /// # Safety
  ///
  /// `hdr` must point into the heap.
  pub unsafe fn payload(hdr: *mut Header) -> *mut u8 {
    unsafe { (hdr as *mut u8).add(META_SIZE) }
  }

  /// # Safety
  ///
  /// `hdr` must be readable.
  pub unsafe fn is_valid(hdr: *const Header) -> bool {
    unsafe { (*hdr).magic == MAGIC }
  }

  /// Writes a fresh header of `size` at `at`.
  ///
  /// # Safety
  ///
  /// `at` must be aligned and valid for `META_SIZE` bytes of writes.
  pub unsafe fn write(
    at: *mut u8,
    size: usize,
  ) -> *mut Header {
    let hdr = at as *mut Header;
    unsafe { hdr.write(Header { size, magic: MAGIC }) };
    hdr
  }

  /// Allocated -> free. The capacity is carried over, the sentinel is
  /// scrubbed so a second release of the same pointer is caught.
  ///
  /// # Safety
  ///
  /// `hdr` must be a valid header that the caller is giving up.
  pub unsafe fn into_free(hdr: *mut Header) -> *mut FreeNode {
    unsafe {
      let size = (*hdr).size;
      let node = hdr as *mut FreeNode;
      node.write(FreeNode {
        size,
        next: ptr::null_mut(),
      });
      node
    }
  }
}

impl FreeNode {
  /// # Safety
  ///
  /// `node` must point into the heap.
  pub unsafe fn payload(node: *mut FreeNode) -> *mut u8 {
    unsafe { (node as *mut u8).add(META_SIZE) }
  }

  /// Address one past the last byte of this block.
  ///
  /// # Safety
  ///
  /// `node` must be a live free node.
  pub unsafe fn end(node: *mut FreeNode) -> *mut u8 {
    unsafe { (node as *mut u8).add(META_SIZE + (*node).size) }
  }

  /// Free -> allocated. Must only be called once the node is unlinked.
  ///
  /// # Safety
  ///
  /// `node` must be a live free node no longer reachable from any list.
  pub unsafe fn into_header(node: *mut FreeNode) -> *mut Header {
    unsafe {
      let size = (*node).size;
      Header::write(node as *mut u8, size)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[repr(C, align(16))]
  struct Buf([u8; 128]);

  #[test]
  fn metadata_slots_are_same_size() {
    assert_eq!(META_SIZE, 16);
    assert_eq!(mem::size_of::<FreeNode>(), META_SIZE);
    assert_eq!(mem::align_of::<Header>(), ALIGNMENT);
  }

  #[test]
  fn header_free_node_round_trip() {
    let mut buf = Buf([0xAA; 128]);
    let base = buf.0.as_mut_ptr();

    unsafe {
      let hdr = Header::write(base, 48);
      let payload = Header::payload(hdr);
      assert_eq!(payload, base.add(META_SIZE));
      assert_eq!(Header::from_payload(payload), hdr);
      assert!(Header::is_valid(hdr));

      let node = Header::into_free(hdr);
      assert_eq!(node as *mut u8, base);
      assert_eq!((*node).size, 48);
      assert!((*node).next.is_null());
      assert!(!Header::is_valid(node as *const Header));
      assert_eq!(FreeNode::end(node), base.add(META_SIZE + 48));
      assert_eq!(FreeNode::payload(node), payload);

      let hdr = FreeNode::into_header(node);
      assert!(Header::is_valid(hdr));
      assert_eq!((*hdr).size, 48);
    }
  }
}

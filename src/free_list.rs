use std::{marker::PhantomData, ptr};

use log::trace;

use crate::block::{FreeNode, META_SIZE};

/// A free block as seen from the outside: where it starts and how many
/// payload bytes it can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  pub address: usize,
  pub size: usize,
}

/// Singly linked list of free blocks, in insertion order.
///
/// The nodes live inside the free blocks themselves, so the list owns no
/// memory of its own. Neighbour lookups are linear scans.
pub(crate) struct FreeList {
  head: *mut FreeNode,
}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      head: ptr::null_mut(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_null()
  }

  pub fn iter(&self) -> Iter<'_> {
    Iter {
      current: self.head,
      _list: PhantomData,
    }
  }

  /// # Safety
  ///
  /// `node` must be a free node not already in the list.
  pub unsafe fn push_front(
    &mut self,
    node: *mut FreeNode,
  ) {
    unsafe { (*node).next = self.head };
    self.head = node;
  }

  /// Node whose end is exactly where `block` starts.
  ///
  /// # Safety
  ///
  /// `block` must be a live free node.
  pub unsafe fn find_prev(
    &self,
    block: *mut FreeNode,
  ) -> Option<*mut FreeNode> {
    unsafe {
      let mut current = self.head;

      while !current.is_null() {
        if FreeNode::end(current) == block as *mut u8 {
          return Some(current);
        }
        current = (*current).next;
      }

      None
    }
  }

  /// Node starting exactly where `block` ends.
  ///
  /// # Safety
  ///
  /// `block` must be a live free node.
  pub unsafe fn find_next(
    &self,
    block: *mut FreeNode,
  ) -> Option<*mut FreeNode> {
    unsafe {
      let block_end = FreeNode::end(block);
      let mut current = self.head;

      while !current.is_null() {
        if current as *mut u8 == block_end {
          return Some(current);
        }
        current = (*current).next;
      }

      None
    }
  }

  /// Unlinks `block`. Does nothing if it is not in the list.
  ///
  /// # Safety
  ///
  /// Every node reachable from the list must be live.
  pub unsafe fn remove(
    &mut self,
    block: *mut FreeNode,
  ) {
    unsafe {
      if self.head.is_null() {
        return;
      }

      if self.head == block {
        self.head = (*block).next;
        return;
      }

      let mut current = self.head;
      while !current.is_null() {
        if (*current).next == block {
          (*current).next = (*block).next;
          return;
        }
        current = (*current).next;
      }
    }
  }

  /// Carves `first_part_size` payload bytes off the front of `block`.
  ///
  /// The remainder becomes a free node right after the carved piece and takes
  /// over `block`'s old link, while `block` now links to the remainder. Once
  /// `block` is unlinked the remainder sits where `block` used to be.
  ///
  /// `None` if the remainder could not hold a node's metadata.
  ///
  /// # Safety
  ///
  /// `block` must be a live free node.
  pub unsafe fn split(
    block: *mut FreeNode,
    first_part_size: usize,
  ) -> Option<*mut FreeNode> {
    unsafe {
      let needed = first_part_size.checked_add(META_SIZE)?;
      if (*block).size < needed {
        return None;
      }

      let remainder = FreeNode::payload(block).add(first_part_size) as *mut FreeNode;
      remainder.write(FreeNode {
        size: (*block).size - needed,
        next: (*block).next,
      });

      (*block).size = first_part_size;
      (*block).next = remainder;

      trace!(
        "split {:?}: {} bytes kept, {} bytes left at {:?}",
        block,
        first_part_size,
        (*remainder).size,
        remainder
      );

      Some(block)
    }
  }

  /// Merges `block` with whichever physical neighbours are in the list and
  /// returns the surviving node. The lower address always survives.
  ///
  /// # Safety
  ///
  /// `block` must be a live free node in the list.
  pub unsafe fn coalesce(
    &mut self,
    block: *mut FreeNode,
  ) -> *mut FreeNode {
    unsafe {
      let mut block = block;

      if let Some(prev) = self.find_prev(block) {
        self.remove(block);
        (*prev).size += META_SIZE + (*block).size;
        trace!("coalesced {:?} into previous {:?}", block, prev);
        block = prev;
      }

      if let Some(next) = self.find_next(block) {
        self.remove(next);
        (*block).size += META_SIZE + (*next).size;
        trace!("coalesced next {:?} into {:?}", next, block);
      }

      block
    }
  }

  /// Links `node`, merges it with its neighbours and leaves the merged block
  /// at the head of the list.
  ///
  /// # Safety
  ///
  /// `node` must be a free node not already in the list.
  pub unsafe fn insert(
    &mut self,
    node: *mut FreeNode,
  ) -> *mut FreeNode {
    unsafe {
      self.push_front(node);
      let merged = self.coalesce(node);

      if merged != self.head {
        self.remove(merged);
        self.push_front(merged);
      }

      merged
    }
  }

  /// First node, in list order, holding at least `size` payload bytes.
  pub fn first_fit(
    &self,
    size: usize,
  ) -> Option<*mut FreeNode> {
    unsafe {
      let mut current = self.head;

      while !current.is_null() {
        if (*current).size >= size {
          return Some(current);
        }
        current = (*current).next;
      }

      None
    }
  }
}

pub struct Iter<'a> {
  current: *mut FreeNode,
  _list: PhantomData<&'a FreeList>,
}

impl Iterator for Iter<'_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    if self.current.is_null() {
      return None;
    }

    let node = self.current;
    unsafe {
      self.current = (*node).next;
      Some(FreeBlock {
        address: node as usize,
        size: (*node).size,
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[repr(C, align(16))]
  struct Buf([u8; 512]);

  impl Buf {
    fn new() -> Box<Self> {
      Box::new(Buf([0; 512]))
    }

    fn node(
      &mut self,
      offset: usize,
      size: usize,
    ) -> *mut FreeNode {
      assert!(offset + META_SIZE + size <= self.0.len());
      let node = unsafe { self.0.as_mut_ptr().add(offset) } as *mut FreeNode;
      unsafe {
        node.write(FreeNode {
          size,
          next: ptr::null_mut(),
        })
      };
      node
    }
  }

  fn blocks(list: &FreeList) -> Vec<(*mut FreeNode, usize)> {
    list
      .iter()
      .map(|b| (b.address as *mut FreeNode, b.size))
      .collect()
  }

  #[test]
  fn split_leaves_linked_remainder() {
    let mut buf = Buf::new();
    let tail = buf.node(400, 16);
    let block = buf.node(0, 96);

    let mut list = FreeList::new();
    unsafe {
      list.push_front(tail);
      list.push_front(block);

      assert_eq!(FreeList::split(block, 32), Some(block));
      let remainder = buf.0.as_mut_ptr().add(META_SIZE + 32) as *mut FreeNode;

      assert_eq!((*block).size, 32);
      assert_eq!((*block).next, remainder);
      assert_eq!((*remainder).size, 96 - 32 - META_SIZE);
      assert_eq!((*remainder).next, tail);

      list.remove(block);
      assert_eq!(blocks(&list), vec![(remainder, 48), (tail, 16)]);
    }
  }

  #[test]
  fn split_refuses_unusable_remainder() {
    let mut buf = Buf::new();
    let block = buf.node(0, 48);

    unsafe {
      assert_eq!(FreeList::split(block, 48), None);
      assert_eq!((*block).size, 48);
      assert_eq!(FreeList::split(block, usize::MAX), None);

      // An empty payload is still a valid node.
      assert_eq!(FreeList::split(block, 32), Some(block));
      let remainder = (*block).next;
      assert_eq!(remainder as usize, block as usize + META_SIZE + 32);
      assert_eq!((*remainder).size, 0);
    }
  }

  #[test]
  fn finds_physical_neighbours() {
    let mut buf = Buf::new();
    let a = buf.node(0, 16);
    let b = buf.node(32, 32);
    let c = buf.node(80, 16);
    let far = buf.node(256, 16);

    let mut list = FreeList::new();
    unsafe {
      list.push_front(a);
      list.push_front(c);
      list.push_front(far);

      assert_eq!(list.find_prev(b), Some(a));
      assert_eq!(list.find_next(b), Some(c));
      assert_eq!(list.find_prev(a), None);
      assert_eq!(list.find_next(far), None);
    }
  }

  #[test]
  fn remove_handles_head_middle_and_absent() {
    let mut buf = Buf::new();
    let a = buf.node(0, 16);
    let b = buf.node(64, 16);
    let c = buf.node(128, 16);
    let stray = buf.node(256, 16);

    let mut list = FreeList::new();
    unsafe {
      list.remove(a);
      assert!(list.is_empty());

      list.push_front(a);
      list.push_front(b);
      list.push_front(c);

      list.remove(stray);
      assert_eq!(blocks(&list).len(), 3);

      list.remove(b);
      assert_eq!(blocks(&list), vec![(c, 16), (a, 16)]);

      list.remove(c);
      assert_eq!(blocks(&list), vec![(a, 16)]);

      list.remove(a);
      assert!(list.is_empty());
    }
  }

  #[test]
  fn coalesce_absorbs_both_neighbours() {
    let mut buf = Buf::new();
    let a = buf.node(0, 16);
    let b = buf.node(32, 32);
    let c = buf.node(80, 16);
    let other = buf.node(256, 16);

    let mut list = FreeList::new();
    unsafe {
      // `a` sits at the tail, its link does not lead to `b`.
      list.push_front(a);
      list.push_front(other);
      list.push_front(c);
      list.push_front(b);

      let merged = list.coalesce(b);

      assert_eq!(merged, a);
      assert_eq!((*a).size, 16 + META_SIZE + 32 + META_SIZE + 16);
      assert_eq!(blocks(&list), vec![(other, 16), (a, 96)]);
    }
  }

  #[test]
  fn coalesce_without_neighbours_is_identity() {
    let mut buf = Buf::new();
    let a = buf.node(0, 16);
    let b = buf.node(128, 16);

    let mut list = FreeList::new();
    unsafe {
      list.push_front(a);
      list.push_front(b);

      assert_eq!(list.coalesce(b), b);
      assert_eq!(blocks(&list), vec![(b, 16), (a, 16)]);
    }
  }

  #[test]
  fn insert_merges_in_any_order() {
    for order in [[0usize, 1], [1, 0]] {
      let mut buf = Buf::new();
      let nodes = [buf.node(0, 16), buf.node(32, 16)];
      let unrelated = buf.node(256, 16);

      let mut list = FreeList::new();
      unsafe {
        list.push_front(unrelated);
        for i in order {
          list.insert(nodes[i]);
        }
      }

      assert_eq!(
        blocks(&list),
        vec![(nodes[0], 16 + META_SIZE + 16), (unrelated, 16)]
      );
    }
  }

  #[test]
  fn first_fit_takes_first_large_enough() {
    let mut buf = Buf::new();
    let small = buf.node(0, 16);
    let big = buf.node(64, 64);
    let bigger = buf.node(192, 128);

    let mut list = FreeList::new();
    unsafe {
      list.push_front(bigger);
      list.push_front(big);
      list.push_front(small);
    }

    assert_eq!(list.first_fit(16), Some(small));
    assert_eq!(list.first_fit(17), Some(big));
    assert_eq!(list.first_fit(100), Some(bigger));
    assert_eq!(list.first_fit(129), None);
  }
}

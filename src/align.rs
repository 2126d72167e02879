/// Granule every payload is aligned to and every payload size is rounded to.
pub const ALIGNMENT: usize = 16;

/// Rounds `value` up to the next multiple of [`ALIGNMENT`].
///
/// Overflows for values within `ALIGNMENT` of `usize::MAX`; use
/// [`checked_align`] when the input comes from a caller.
///
/// # Examples
///
/// ```rust
/// use freelist_alloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(32), 32);
/// assert_eq!(align!(33), 48);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Like [`align!`], but `None` on overflow.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(v) => Some(v & !(ALIGNMENT - 1)),
    None => None,
  }
}

/// Bytes needed to move `address` forward to the next [`ALIGNMENT`] boundary.
pub const fn padding_for(address: usize) -> usize {
  let misalignment = address & (ALIGNMENT - 1);
  if misalignment == 0 { 0 } else { ALIGNMENT - misalignment }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected_alignment = ALIGNMENT * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
        assert_eq!(Some(expected), checked_align(size));
      }
    }
  }

  #[test]
  fn checked_align_rejects_overflow() {
    assert_eq!(checked_align(0), Some(0));
    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_align(usize::MAX - ALIGNMENT + 2), None);
  }

  #[test]
  fn padding_reaches_next_boundary() {
    assert_eq!(padding_for(0), 0);
    assert_eq!(padding_for(0x1000), 0);
    assert_eq!(padding_for(0x1001), 15);
    assert_eq!(padding_for(0x100f), 1);
    for addr in 0x2000..0x2040usize {
      assert_eq!((addr + padding_for(addr)) % ALIGNMENT, 0);
    }
  }
}

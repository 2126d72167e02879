use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  #[error("out of memory: could not grow the heap for {requested} bytes")]
  OutOfMemory { requested: usize },
  #[error("allocation of {count} elements of {size} bytes overflows usize")]
  SizeOverflow { count: usize, size: usize },
  #[error("heap corruption detected: invalid block header at {address:#x}")]
  Corrupted { address: usize },
}

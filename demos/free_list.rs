use libc::sbrk;
use freelist_alloc::{FreeListAllocator, HeapSource};

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_free_list<S: HeapSource>(allocator: &FreeListAllocator<S>) {
  let blocks: Vec<_> = allocator.free_blocks().collect();
  if blocks.is_empty() {
    println!("    free list: (empty)");
  }
  for block in blocks {
    println!("    free list: {:#x} ({} bytes)", block.address, block.size);
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  env_logger::init();

  let mut allocator = FreeListAllocator::new();

  print_program_break("start");

  // --------------------------------------------------------------------
  // 1) Two small allocations come straight from the break.
  // --------------------------------------------------------------------
  let first = allocator.allocate(8)?;
  let second = allocator.allocate(8)?;
  println!("\n[1] first = {:?}, second = {:?}", first, second);
  print_program_break("1");

  // --------------------------------------------------------------------
  // 2) Releasing both leaves a single merged free block.
  // --------------------------------------------------------------------
  unsafe {
    allocator.release(first.as_ptr());
    allocator.release(second.as_ptr());
  }
  println!("\n[2] released both");
  print_free_list(&allocator);

  // --------------------------------------------------------------------
  // 3) A new request is carved out of the free block, no new sbrk.
  // --------------------------------------------------------------------
  let reused = allocator.allocate(16)?;
  println!("\n[3] reused = {:?} (same as first: {})", reused, reused == first);
  print_free_list(&allocator);
  print_program_break("3");

  // --------------------------------------------------------------------
  // 4) Resize always moves the data to a fresh block.
  // --------------------------------------------------------------------
  unsafe {
    let data = reused.as_ptr() as *mut u32;
    data.write(0xDEADBEEF);

    let moved = allocator.resize(reused.as_ptr(), 64)?;
    println!(
      "\n[4] resized to {:?}, value = 0x{:X}",
      moved,
      (moved.as_ptr() as *mut u32).read()
    );
    print_free_list(&allocator);

    allocator.release(moved.as_ptr());
  }

  // --------------------------------------------------------------------
  // 5) Zeroed allocation.
  // --------------------------------------------------------------------
  let zeroed = allocator.allocate_zeroed(4, 8)?;
  let bytes = unsafe { std::slice::from_raw_parts(zeroed.as_ptr(), 32) };
  println!("\n[5] zeroed = {:?}, all zero: {}", zeroed, bytes.iter().all(|&b| b == 0));

  println!("\n{:?}", allocator.stats());
  print_program_break("end");

  Ok(())
}

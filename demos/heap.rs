use std::{io::Read, ptr};

use rheap::{Heap, page_size};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect the mapping with tools like `pmap` or
/// `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn dump(
  heap: &Heap,
  label: &str,
) {
  println!("\n[{}] PID = {}", label, std::process::id());
  if let Err(err) = heap.print_dump() {
    eprintln!("cannot print heap: {}", err);
  }
}

fn main() -> rheap::Result<()> {
  simple_logger::SimpleLogger::new()
    .with_level(log::LevelFilter::Debug)
    .init()
    .unwrap();

  // --------------------------------------------------------------------
  // 0) Reserve the region. 4000 bytes round up to one page.
  // --------------------------------------------------------------------
  let mut heap = rheap::init(4000)?;
  println!("page size = {}, region = {} bytes", page_size(), heap.size());
  dump(&heap, "start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate 20 bytes: a 24 byte block is split off the front.
  // --------------------------------------------------------------------
  let first = heap.allocate(20)?;
  unsafe { ptr::write_bytes(first.as_ptr(), 0xAB, 20) };
  dump(&heap, "1: allocate 20");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Two more blocks, then free the middle one to leave a hole.
  // --------------------------------------------------------------------
  let second = heap.allocate(100)?;
  let third = heap.allocate(7)?;
  unsafe { heap.free(second.as_ptr())? };
  dump(&heap, "2: hole of 104 bytes");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A request that fits the hole best reuses it.
  // --------------------------------------------------------------------
  let fourth = heap.allocate(96)?;
  println!(
    "[3] fourth == second? {}",
    if fourth == second {
      "Yes, best fit reused the hole"
    } else {
      "No, it went somewhere else"
    }
  );
  dump(&heap, "3: allocate 96");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Invalid frees are refused and leave the heap alone.
  // --------------------------------------------------------------------
  unsafe {
    for bad in [ptr::null_mut(), first.as_ptr().add(1), usize::MAX as *mut u8] {
      if let Err(err) = heap.free(bad) {
        println!("[4] free({:?}) refused: {}", bad, err);
      }
    }
  }

  // --------------------------------------------------------------------
  // 5) Free everything; the blocks coalesce back into one.
  // --------------------------------------------------------------------
  unsafe {
    heap.free(third.as_ptr())?;
    heap.free(first.as_ptr())?;
    heap.free(fourth.as_ptr())?;
  }
  dump(&heap, "5: everything freed");

  heap.verify()?;
  println!("\n[6] End of example. The region is unmapped when the heap is dropped.");
  Ok(())
}

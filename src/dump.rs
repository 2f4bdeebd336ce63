use std::io::{self, Write};

use crate::{
  block::{MIN_BLOCK, WORD},
  error::{Error, Result},
  heap::Heap,
};

const STARS: &str = "*********************************************************************************";
const DASHES: &str = "---------------------------------------------------------------------------------";

/// Totals gathered by one walk over the heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub blocks: usize,
  pub free_blocks: usize,
  pub busy_bytes: usize,
  pub free_bytes: usize,
  pub total_bytes: usize,
  pub largest_free: usize,
}

impl Heap {
  pub fn stats(&self) -> HeapStats {
    self.blocks().fold(HeapStats::default(), |mut stats, block| {
      stats.blocks += 1;
      stats.total_bytes += block.size;
      if block.allocated {
        stats.busy_bytes += block.size;
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
        stats.largest_free = stats.largest_free.max(block.size);
      }
      stats
    })
  }

  /// Writes the block table followed by the busy/free totals.
  ///
  /// ```text
  /// No.   Status  Prev    t_Begin         t_End           t_Size
  /// 1     Busy    Busy    0x7f3a1c000000  0x7f3a1c000017  24
  /// 2     Free    Busy    0x7f3a1c000018  0x7f3a1c000fff  4072
  /// ```
  pub fn dump<W: Write>(
    &self,
    out: &mut W,
  ) -> io::Result<HeapStats> {
    writeln!(out, "************************************Block list***********************************")?;
    writeln!(out, "No.\tStatus\tPrev\tt_Begin\t\tt_End\t\tt_Size")?;
    writeln!(out, "{DASHES}")?;

    for block in self.blocks() {
      writeln!(
        out,
        "{}\t{}\t{}\t0x{:08x}\t0x{:08x}\t{}",
        block.index,
        status(block.allocated),
        status(block.prev_allocated),
        block.begin,
        block.end,
        block.size
      )?;
    }

    let stats = self.stats();

    writeln!(out, "{DASHES}")?;
    writeln!(out, "{STARS}")?;
    writeln!(out, "Total busy size = {}", stats.busy_bytes)?;
    writeln!(out, "Total free size = {}", stats.free_bytes)?;
    writeln!(out, "Total size = {}", stats.busy_bytes + stats.free_bytes)?;
    writeln!(out, "{STARS}")?;
    out.flush()?;

    Ok(stats)
  }

  pub fn print_dump(&self) -> io::Result<HeapStats> {
    self.dump(&mut io::stdout().lock())
  }

  /// Checks the block metadata of the whole region.
  ///
  /// Blocks must tile the region exactly, free blocks must carry a matching
  /// footer and never touch another free block, and every header must record
  /// the status of the block before it.
  pub fn verify(&self) -> Result<()> {
    let region = self.region();
    let mut offset = 0;
    let mut prev_allocated = true;

    while offset < region.size() {
      let tag = region.read(offset);
      let size = tag.size();

      if size < MIN_BLOCK {
        return Err(corrupted(offset, "block smaller than the minimum block"));
      }
      if offset + size > region.size() {
        return Err(corrupted(offset, "block overruns the region"));
      }
      if tag.is_prev_allocated() != prev_allocated {
        return Err(corrupted(offset, "stale previous-block status"));
      }

      if !tag.is_allocated() {
        if !prev_allocated {
          return Err(corrupted(offset, "adjacent free blocks"));
        }
        let footer = region.read(offset + size - WORD);
        if footer.bits() as usize != size {
          return Err(corrupted(offset, "footer does not match header"));
        }
      }

      prev_allocated = tag.is_allocated();
      offset += size;
    }

    Ok(())
  }
}

fn status(allocated: bool) -> &'static str {
  if allocated { "Busy" } else { "Free" }
}

fn corrupted(
  offset: usize,
  reason: &'static str,
) -> Error {
  Error::Corrupted { offset, reason }
}

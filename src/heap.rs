use std::{
  ptr::NonNull,
  sync::atomic::{AtomicBool, Ordering},
};

use log::{debug, error, warn};

use crate::{
  align,
  block::{BlockInfo, MIN_BLOCK, Tag, WORD},
  error::{Error, Result},
  region::Region,
};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Reserves the process heap region and returns its handle.
///
/// Succeeds at most once per process. A failed reservation does not count,
/// so the call may be retried with a different size. This is the only way
/// to obtain a [`Heap`]:
///
/// ```compile_fail
/// let heap = rheap::Heap::new(rheap::Region::reserve(4096).unwrap());
/// ```
///
/// ```compile_fail
/// let region = rheap::Region::reserve(4096).unwrap();
/// region.read(4096);
/// ```
pub fn init(size: usize) -> Result<Heap> {
  if INITIALIZED.swap(true, Ordering::AcqRel) {
    error!("init({}) called after the heap region was already initialized", size);
    return Err(Error::AlreadyInitialized);
  }

  match Region::reserve(size) {
    Ok(region) => Ok(Heap::new(region)),
    Err(err) => {
      INITIALIZED.store(false, Ordering::Release);
      Err(err)
    },
  }
}

/// Best-fit allocator over a single fixed region.
///
/// Blocks tile the region back to back. Each starts with a [`Tag`] header;
/// free blocks also end with a footer holding their size so that a block
/// being freed can find the start of a free predecessor.
///
/// ```text
///   ┌────┬──────────────┬────┬───────────┬────┬────┬────────────┬────┐
///   │ H  │   payload    │ H  │  (free)   │ F  │ H  │  payload   │ .. │
///   └────┴──────────────┴────┴───────────┴────┴────┴────────────┴────┘
///     busy block            free block            busy block, PA = 0
/// ```
pub struct Heap {
  region: Region,
}

impl Heap {
  /// Lays out `region` as a single free block.
  pub(crate) fn new(mut region: Region) -> Self {
    let size = region.size();

    region.write(0, Tag::header(size, false, true));
    region.write(size - WORD, Tag::footer(size));

    debug!("heap of {} bytes initialized at {:?}", size, region.base());

    Self { region }
  }

  pub fn size(&self) -> usize {
    self.region.size()
  }

  pub fn base_addr(&self) -> usize {
    self.region.base_addr()
  }

  pub(crate) fn region(&self) -> &Region {
    &self.region
  }

  #[cfg(test)]
  pub(crate) fn region_mut(&mut self) -> &mut Region {
    &mut self.region
  }

  /// Returns `true` if `ptr` points inside the managed region.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    let addr = ptr as usize;
    addr >= self.region.base_addr() && addr < self.region.end_addr()
  }

  /// Walks the blocks in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      region: &self.region,
      offset: 0,
      index: 0,
    }
  }

  /// Returns the start offset and header of the free block that leaves the
  /// least unused space for a block of `need` bytes. Ties go to the lowest
  /// address.
  fn find_best_fit(
    &self,
    need: usize,
  ) -> Option<(usize, Tag)> {
    let mut best: Option<(usize, usize)> = None;

    for block in self.blocks() {
      if block.allocated || block.size < need {
        continue;
      }

      let waste = block.size - need;
      if best.is_none_or(|(_, least)| waste < least) {
        best = Some((block.offset, waste));
      }
    }

    best.map(|(offset, _)| (offset, self.region.read(offset)))
  }

  /// Allocates `size` bytes and returns the payload address.
  ///
  /// The payload is 4-byte aligned. On error the heap is left untouched.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let region_size = self.region.size();

    if size == 0 || size >= region_size {
      warn!("rejected allocation of {} bytes", size);
      return Err(Error::InvalidSize {
        size,
        region: region_size,
      });
    }

    let need = align!(size) + WORD;

    let Some((offset, tag)) = self.find_best_fit(need) else {
      warn!("no free block of {} bytes for a {} byte request", need, size);
      return Err(Error::OutOfMemory { size });
    };

    let waste = tag.size() - need;

    let block_size = if waste >= MIN_BLOCK {
      let rest = offset + need;
      self.region.write(rest, Tag::header(waste, false, true));
      self.region.write(rest + waste - WORD, Tag::footer(waste));

      debug!("split block at {:#x}: {} busy + {} free", offset, need, waste);
      need
    } else {
      let next = offset + tag.size();
      if next < region_size {
        let next_tag = self.region.read(next);
        self.region.write(next, next_tag.with_prev_allocated(true));
      }

      if waste > 0 {
        debug!("absorbed {} spare bytes into block at {:#x}", waste, offset);
      }
      tag.size()
    };

    self
      .region
      .write(offset, Tag::header(block_size, true, tag.is_prev_allocated()));

    debug!(
      "allocated {} bytes at offset {:#x} (block size {})",
      size,
      offset + WORD,
      block_size
    );
    let _ = self.debug_check();

    Ok(unsafe { self.region.base().add(offset + WORD) })
  }

  /// Frees the block whose payload starts at `ptr`, merging it with free
  /// neighbours.
  ///
  /// Null, out-of-range and misaligned addresses are rejected without
  /// touching the heap, as is an address whose header is not that of a busy
  /// block.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`Heap::allocate`] on this heap and
  /// not freed since. Other addresses that pass validation may corrupt the
  /// block metadata.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<()> {
    let addr = ptr as usize;

    if ptr.is_null() {
      warn!("free of a null pointer");
      return Err(Error::NullPointer);
    }
    if !self.contains(ptr) || addr - self.region.base_addr() < WORD {
      warn!("free of {:#x} outside the heap", addr);
      return Err(Error::OutOfRange { addr });
    }
    if addr % WORD != 0 {
      warn!("free of misaligned address {:#x}", addr);
      return Err(Error::Misaligned { addr });
    }

    let region_size = self.region.size();
    let header_offset = addr - self.region.base_addr() - WORD;
    let header = self.region.read(header_offset);

    if !header.is_allocated()
      || header.size() < MIN_BLOCK
      || header_offset + header.size() > region_size
    {
      warn!("free of {:#x} which is not an allocated payload", addr);
      return Err(Error::NotAllocated { addr });
    }

    let mut start = header_offset;
    let mut total = header.size();

    // Forward neighbour: merge if free, otherwise tell it its predecessor is
    // now free.
    let next = header_offset + header.size();
    let mut next_busy = None;
    if next < region_size {
      let next_tag = self.region.read(next);
      if next_tag.is_allocated() {
        next_busy = Some(next_tag);
      } else {
        if next + next_tag.size() > region_size || next_tag.size() < MIN_BLOCK {
          return Err(Error::Corrupted {
            offset: next,
            reason: "free block overruns the region",
          });
        }
        total += next_tag.size();
      }
    }

    // Backward neighbour, found through its footer.
    if !header.is_prev_allocated() {
      if header_offset < MIN_BLOCK {
        return Err(Error::Corrupted {
          offset: header_offset,
          reason: "first block claims a free predecessor",
        });
      }

      let prev_size = self.region.read(header_offset - WORD).size();
      if prev_size < MIN_BLOCK || prev_size > header_offset {
        return Err(Error::Corrupted {
          offset: header_offset - WORD,
          reason: "footer of previous block is out of range",
        });
      }

      start -= prev_size;
      total += prev_size;
    }

    let prev_allocated = if start == header_offset {
      header.is_prev_allocated()
    } else {
      self.region.read(start).is_prev_allocated()
    };

    if let Some(next_tag) = next_busy {
      self.region.write(next, next_tag.with_prev_allocated(false));
    }
    self.region.write(start, Tag::header(total, false, prev_allocated));
    self.region.write(start + total - WORD, Tag::footer(total));

    debug!(
      "freed block at {:#x} ({} bytes), free block now {:#x}..{:#x}",
      header_offset,
      header.size(),
      start,
      start + total
    );
    let _ = self.debug_check();

    Ok(())
  }

  fn debug_check(&self) -> Result<()> {
    if !cfg!(feature = "heapdbg") {
      return Ok(());
    }

    self
      .verify()
      .inspect_err(|err| error!("heap consistency check failed: {}", err))
  }
}

/// Iterator over the blocks of a [`Heap`], in address order.
///
/// Stops early on a header whose size would not advance the walk or would
/// leave the region; [`Heap::verify`] reports such damage.
pub struct Blocks<'a> {
  region: &'a Region,
  offset: usize,
  index: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.offset + WORD > self.region.size() {
      return None;
    }

    let tag = self.region.read(self.offset);
    let size = tag.size();
    if size == 0 || self.offset + size > self.region.size() {
      return None;
    }

    self.index += 1;
    let begin = self.region.base_addr() + self.offset;
    let info = BlockInfo {
      index: self.index,
      offset: self.offset,
      begin,
      end: begin + size - 1,
      size,
      allocated: tag.is_allocated(),
      prev_allocated: tag.is_prev_allocated(),
    };

    self.offset += size;
    Some(info)
  }
}

use std::fmt;

/// Width of a metadata word (header or footer) in bytes.
pub const WORD: usize = 4;

/// Smallest block that can exist on its own: a free block needs room for a
/// header and a footer.
pub const MIN_BLOCK: usize = 2 * WORD;

const ALLOCATED: u32 = 0b01;
const PREV_ALLOCATED: u32 = 0b10;
const SIZE_MASK: u32 = !(ALLOCATED | PREV_ALLOCATED);

/// Packed block metadata word.
///
/// ```text
///   31                                   2    1    0
///   ┌────────────────────────────────────┬────┬────┐
///   │           size (multiple of 4)     │ PA │ A  │
///   └────────────────────────────────────┴────┴────┘
///                                          │    └── block is allocated
///                                          └─────── previous block is allocated
/// ```
///
/// The same word is used as the footer of a free block, in which case both
/// status bits are zero.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tag(u32);

impl Tag {
  pub fn header(
    size: usize,
    allocated: bool,
    prev_allocated: bool,
  ) -> Self {
    debug_assert!(size % WORD == 0, "block size {size} is not word aligned");
    debug_assert!(size <= u32::MAX as usize);

    let mut bits = size as u32 & SIZE_MASK;
    if allocated {
      bits |= ALLOCATED;
    }
    if prev_allocated {
      bits |= PREV_ALLOCATED;
    }
    Self(bits)
  }

  pub fn footer(size: usize) -> Self {
    Self::header(size, false, false)
  }

  pub fn from_bits(bits: u32) -> Self {
    Self(bits)
  }

  pub fn bits(self) -> u32 {
    self.0
  }

  pub fn size(self) -> usize {
    (self.0 & SIZE_MASK) as usize
  }

  pub fn is_allocated(self) -> bool {
    self.0 & ALLOCATED != 0
  }

  pub fn is_prev_allocated(self) -> bool {
    self.0 & PREV_ALLOCATED != 0
  }

  pub fn with_prev_allocated(
    self,
    prev_allocated: bool,
  ) -> Self {
    if prev_allocated {
      Self(self.0 | PREV_ALLOCATED)
    } else {
      Self(self.0 & !PREV_ALLOCATED)
    }
  }
}

impl fmt::Debug for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Tag")
      .field("size", &self.size())
      .field("allocated", &self.is_allocated())
      .field("prev_allocated", &self.is_prev_allocated())
      .finish()
  }
}

/// Snapshot of one block, as seen by a walk over the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// 1-based position of the block in address order.
  pub index: usize,
  /// Byte offset of the header from the region base.
  pub offset: usize,
  /// Address of the first byte of the block (its header).
  pub begin: usize,
  /// Address of the last byte of the block.
  pub end: usize,
  pub size: usize,
  pub allocated: bool,
  pub prev_allocated: bool,
}

impl BlockInfo {
  /// Address handed out by `allocate` for this block.
  pub fn payload(&self) -> usize {
    self.begin + WORD
  }
}

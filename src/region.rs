use std::{io, ptr::NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, _SC_PAGESIZE, c_void};
use log::{debug, error, warn};

use crate::{
  align_to,
  block::{Tag, WORD},
  error::{Error, Result},
};

/// Largest region whose size still fits the size bits of a [`Tag`].
pub(crate) const MAX_REGION: usize = u32::MAX as usize & !(WORD - 1);

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the page size of the running system.
pub fn page_size() -> usize {
  let size = unsafe { libc::sysconf(_SC_PAGESIZE) };

  if size <= 0 {
    warn!(
      "sysconf(_SC_PAGESIZE) failed ({}), assuming {} byte pages",
      io::Error::last_os_error(),
      FALLBACK_PAGE_SIZE
    );
    FALLBACK_PAGE_SIZE
  } else {
    size as usize
  }
}

/// A fixed, page-rounded extent of anonymous memory obtained from `mmap(2)`.
///
/// ```text
///   base                                                 base + size
///   ▼                                                          ▼
///   ┌──────────────────────────────────────────────────────────┐
///   │              size bytes, multiple of page_size()         │
///   └──────────────────────────────────────────────────────────┘
/// ```
///
/// The extent is unmapped when the region is dropped.
pub(crate) struct Region {
  base: NonNull<u8>,
  size: usize,
}

impl Region {
  /// Maps at least `requested` bytes, rounded up to a whole number of pages.
  pub(crate) fn reserve(requested: usize) -> Result<Self> {
    if requested == 0 {
      return Err(Error::InvalidRegionSize);
    }
    if requested > MAX_REGION {
      return Err(Error::RegionTooLarge { size: requested });
    }

    let size: usize = align_to!(requested, page_size());
    if size > MAX_REGION {
      return Err(Error::RegionTooLarge { size });
    }

    let address = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      let err = io::Error::last_os_error();
      error!("mmap of {} bytes failed: {}", size, err);
      return Err(Error::Reserve(err));
    }

    let base = NonNull::new(address as *mut u8).ok_or_else(|| {
      Error::Reserve(io::Error::other("mmap returned a null mapping"))
    })?;

    debug!("reserved {} bytes at {:?} (requested {})", size, base, requested);

    Ok(Self { base, size })
  }

  pub(crate) fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub(crate) fn base_addr(&self) -> usize {
    self.base.as_ptr() as usize
  }

  pub(crate) fn size(&self) -> usize {
    self.size
  }

  pub(crate) fn end_addr(&self) -> usize {
    self.base_addr() + self.size
  }

  /// Reads the metadata word stored at `offset`.
  ///
  /// # Panics
  ///
  /// Panics if the word is misaligned or does not lie inside the region.
  pub(crate) fn read(
    &self,
    offset: usize,
  ) -> Tag {
    self.check_word(offset);

    let bits = unsafe { self.base.as_ptr().add(offset).cast::<u32>().read() };
    Tag::from_bits(bits)
  }

  /// Writes a metadata word at `offset`.
  ///
  /// # Panics
  ///
  /// Panics if the word is misaligned or does not lie inside the region.
  pub(crate) fn write(
    &mut self,
    offset: usize,
    tag: Tag,
  ) {
    self.check_word(offset);

    unsafe { self.base.as_ptr().add(offset).cast::<u32>().write(tag.bits()) }
  }

  fn check_word(
    &self,
    offset: usize,
  ) {
    assert!(
      offset % WORD == 0 && offset + WORD <= self.size,
      "metadata word at offset {offset:#x} outside region of {} bytes",
      self.size
    );
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    let rc = unsafe { libc::munmap(self.base.as_ptr() as *mut c_void, self.size) };

    if rc != 0 {
      error!("munmap of {:?} failed: {}", self.base, io::Error::last_os_error());
    } else {
      debug!("released {} bytes at {:?}", self.size, self.base);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const MIN_PAGE: usize = 4096;

  #[test]
  fn test_page_size_is_power_of_two() {
    let page = page_size();

    assert!(page.is_power_of_two());
    assert!(page >= MIN_PAGE);
  }

  #[test]
  fn test_reserve_rounds_to_page() {
    let page = page_size();

    let region = Region::reserve(1).unwrap();
    assert_eq!(region.size(), page);
    assert_eq!(region.base_addr() % page, 0);

    let region = Region::reserve(page + 1).unwrap();
    assert_eq!(region.size(), 2 * page);
    assert_eq!(region.end_addr(), region.base_addr() + 2 * page);
  }

  #[test]
  fn test_reserve_rejects_bad_sizes() {
    assert!(matches!(Region::reserve(0), Err(Error::InvalidRegionSize)));
    assert!(matches!(
      Region::reserve(usize::MAX),
      Err(Error::RegionTooLarge { .. })
    ));
  }

  #[test]
  fn test_words() {
    let mut region = Region::reserve(4096).unwrap();
    let last = region.size() - WORD;

    // Fresh anonymous mappings are zero filled.
    assert_eq!(region.read(0).bits(), 0);

    region.write(0, Tag::header(region.size(), false, true));
    region.write(last, Tag::footer(region.size()));

    assert_eq!(region.read(0).size(), region.size());
    assert!(region.read(0).is_prev_allocated());
    assert_eq!(region.read(last).bits() as usize, region.size());
  }

  #[test]
  #[should_panic]
  fn test_read_past_end() {
    let region = Region::reserve(4096).unwrap();
    region.read(region.size());
  }
}

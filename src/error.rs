use std::io;

use thiserror::Error;

/// Errors reported by the heap.
#[derive(Debug, Error)]
pub enum Error {
  #[error("a heap region has already been initialized in this process")]
  AlreadyInitialized,

  #[error("requested region size must be positive")]
  InvalidRegionSize,

  #[error("region of {size} bytes does not fit a 32-bit block header")]
  RegionTooLarge { size: usize },

  #[error("cannot reserve region: {0}")]
  Reserve(#[source] io::Error),

  #[error("invalid allocation size {size} for a region of {region} bytes")]
  InvalidSize { size: usize, region: usize },

  #[error("out of memory (requested: {size} bytes)")]
  OutOfMemory { size: usize },

  #[error("cannot free a null pointer")]
  NullPointer,

  #[error("address {addr:#x} is outside the heap region")]
  OutOfRange { addr: usize },

  #[error("address {addr:#x} is not 4-byte aligned")]
  Misaligned { addr: usize },

  #[error("address {addr:#x} is not the payload of an allocated block")]
  NotAllocated { addr: usize },

  #[error("heap corrupted at offset {offset:#x}: {reason}")]
  Corrupted { offset: usize, reason: &'static str },
}

pub type Result<T> = core::result::Result<T, Error>;

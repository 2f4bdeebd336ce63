//! # rheap - A Best-Fit Single-Region Heap
//!
//! This crate provides a **best-fit allocator** over one fixed region of
//! memory obtained from the operating system with `mmap(2)`. After the region
//! is reserved the heap never asks the OS for more memory: requests that do
//! not fit fail.
//!
//! ## Overview
//!
//! The region is cut into blocks that sit back to back. There is no separate
//! free list; the allocator finds free blocks by walking every block from the
//! lowest address to the highest.
//!
//! ```text
//!   Region Layout:
//!
//!   base                                                          base + size
//!   ▼                                                                       ▼
//!   ┌──────────────┬──────────────────────┬─────────────┬───────────────────┐
//!   │  Busy (24)   │      Free (40)       │  Busy (12)  │    Free (rest)    │
//!   └──────────────┴──────────────────────┴─────────────┴───────────────────┘
//!
//!   Sum of block sizes == region size. No two free blocks are ever adjacent.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rheap
//!   ├── align      - Rounding macros (align!, align_to!)
//!   ├── block      - Packed header/footer word and block snapshots
//!   ├── region     - Page-rounded mmap region
//!   ├── heap       - init, Heap::allocate, Heap::free, block walk
//!   ├── dump       - Block table, statistics and consistency checks
//!   └── error      - Error type
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! fn main() -> rheap::Result<()> {
//!     let mut heap = rheap::init(4096)?;
//!
//!     let ptr = heap.allocate(20)?;
//!     unsafe {
//!         ptr.as_ptr().write_bytes(0x2A, 20);
//!         heap.free(ptr.as_ptr())?;
//!     }
//!
//!     let stats = heap.print_dump().expect("write to stdout");
//!     assert_eq!(stats.total_bytes, heap.size());
//!     Ok(())
//! }
//! ```
//!
//! ## Block Metadata
//!
//! Every block starts with a 32-bit header. Sizes are multiples of 4, so the
//! two low bits carry status:
//!
//! ```text
//!   Busy block (20 byte request):
//!   ┌──────────────────────┬────────────────────────────────┐
//!   │ Header               │          Payload               │
//!   │ size = 24            │                                │
//!   │ A = 1, PA = 1        │       20 bytes usable          │
//!   │      4 bytes         │                                │
//!   └──────────────────────┴────────────────────────────────┘
//!                          ▲
//!                          └── Pointer returned to user
//!
//!   Free block:
//!   ┌──────────────────────┬──────────────────┬─────────────┐
//!   │ Header               │     unused       │ Footer      │
//!   │ size = 40, A = 0     │                  │ size = 40   │
//!   └──────────────────────┴──────────────────┴─────────────┘
//! ```
//!
//! `A` marks the block busy and `PA` records whether the block before it is
//! busy. The footer lets a block being freed reach back to a free predecessor
//! without a backward pointer.
//!
//! ## Allocation
//!
//! A request of `n` bytes needs a block of `align!(n) + 4` bytes. Among all
//! free blocks that large, the one leaving the least waste wins (the first
//! one on a tie). A waste of 8 bytes or more is split off as a new free
//! block; anything smaller stays inside the busy block.
//!
//! ## Freeing
//!
//! The freed block is merged with a free successor (found through its size)
//! and a free predecessor (found through the predecessor's footer), so at
//! most three blocks collapse into one.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` is neither `Send` nor `Sync`
//! - **Fixed size**: the region never grows
//! - **4-byte alignment**: payloads are only word aligned
//! - **Unix-only**: Requires `libc` and `mmap` (POSIX systems)
//!
//! ## Features
//!
//! - `heapdbg`: verify the whole heap after every allocate and free and log
//!   any damage at error level.

pub mod align;
pub mod block;
mod dump;
mod error;
mod heap;
mod region;

pub use block::{BlockInfo, Tag};
pub use dump::HeapStats;
pub use error::{Error, Result};
pub use heap::{Blocks, Heap, init};
pub use region::page_size;

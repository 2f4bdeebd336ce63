/// Rounds `$value` up to the next multiple of `$align`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use rheap::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(4097, 4096), 8192);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Rounds `$value` up to the metadata word size (4 bytes).
///
/// # Examples
///
/// ```rust
/// use rheap::{align, align_to};
///
/// assert_eq!(align!(1), 4);
/// assert_eq!(align!(20), 20);
/// assert_eq!(align!(21), 24);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::block::WORD)
  };
}

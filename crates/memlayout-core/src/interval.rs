//! Half-open address intervals.

use core::fmt;

use crate::error::LayoutError;

/// A half-open address range `[start, end)` with `start < end`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    start: u64,
    end: u64,
}

impl Interval {
    /// Creates an interval from its bounds.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidSize`] if `start >= end`.
    pub const fn new(start: u64, end: u64) -> Result<Self, LayoutError> {
        if start >= end {
            return Err(LayoutError::InvalidSize);
        }
        Ok(Self { start, end })
    }

    /// Creates an interval from a start address and a size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidSize`] if `size` is zero or the end
    /// would overflow a `u64`.
    pub const fn from_start_size(start: u64, size: u64) -> Result<Self, LayoutError> {
        if size == 0 {
            return Err(LayoutError::InvalidSize);
        }
        match start.checked_add(size) {
            Some(end) => Ok(Self { start, end }),
            None => Err(LayoutError::InvalidSize),
        }
    }

    /// The inclusive start address.
    #[inline]
    pub const fn start(self) -> u64 {
        self.start
    }

    /// The exclusive end address.
    #[inline]
    pub const fn end(self) -> u64 {
        self.end
    }

    /// The size in bytes (`end - start`, always nonzero).
    #[inline]
    pub const fn size(self) -> u64 {
        self.end - self.start
    }

    /// Returns `true` if `addr` lies inside this interval.
    #[inline]
    pub const fn contains_addr(self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }

    /// Returns `true` if `other` lies entirely inside this interval.
    #[inline]
    pub const fn contains(self, other: Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns `true` if the two intervals share at least one address.
    #[inline]
    pub const fn overlaps(self, other: Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns `true` if `other` starts exactly where this interval ends,
    /// or vice versa.
    #[inline]
    pub const fn is_adjacent(self, other: Interval) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// Returns `true` if the start address is a multiple of `align`.
    ///
    /// `align` must be a power of two.
    #[inline]
    pub const fn is_aligned(self, align: u64) -> bool {
        debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
        self.start & (align - 1) == 0
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.start, self.end)
    }
}

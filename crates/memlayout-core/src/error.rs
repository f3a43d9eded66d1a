//! Error kinds shared by every layout operation.

use core::fmt;

/// Error returned by layout operations.
///
/// Every operation in the engine either fully succeeds or fails with one
/// of these kinds and no state mutation. All failures are deterministic
/// given the current layout, so there is nothing to retry internally;
/// recovery (pick a smaller size, free something first) is the caller's
/// decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// No free region can satisfy the requested size and alignment.
    OutOfSpace,
    /// The requested range intersects a range that is not free.
    Overlap,
    /// An address or alignment violates the required granule.
    AlignmentError,
    /// The virtual range already backs an existing page in this table.
    DuplicateMapping,
    /// A page table with this name is already registered.
    DuplicateName,
    /// The named entity or range does not exist.
    NotFound,
    /// A size is zero, not a configured granule, or outside its bound.
    InvalidSize,
    /// A cross-space consistency check failed (e.g. mapping to a physical
    /// range that is not currently reserved).
    InconsistentState,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::OutOfSpace => "no free region satisfies the request",
            Self::Overlap => "range overlaps a non-free range",
            Self::AlignmentError => "address or alignment violates the granule",
            Self::DuplicateMapping => "virtual range is already mapped",
            Self::DuplicateName => "page table name is already registered",
            Self::NotFound => "no such entity or range",
            Self::InvalidSize => "size is zero, not a granule, or out of bounds",
            Self::InconsistentState => "cross-space consistency check failed",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for LayoutError {}

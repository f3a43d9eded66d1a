//! Configurable page granule sets.
//!
//! A granule is a legal page size. The engine never hard-codes the set:
//! a [`GranuleSet`] is supplied when the manager is constructed, and
//! every page size must be a member. A page is naturally aligned when
//! its start address is a multiple of its own size.

use crate::error::LayoutError;

/// 4 KiB page granule.
pub const SIZE_4K: u64 = 4 * 1024;
/// 2 MiB page granule.
pub const SIZE_2M: u64 = 2 * 1024 * 1024;
/// 1 GiB page granule.
pub const SIZE_1G: u64 = 1024 * 1024 * 1024;

/// An ordered set of legal page sizes, each a power of two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranuleSet {
    /// Sorted ascending, deduplicated.
    sizes: Vec<u64>,
}

impl GranuleSet {
    /// Creates a granule set from the given sizes.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidSize`] if the set is empty or any
    /// size is not a nonzero power of two.
    pub fn new(sizes: &[u64]) -> Result<Self, LayoutError> {
        if sizes.is_empty() {
            return Err(LayoutError::InvalidSize);
        }
        let mut sizes = sizes.to_vec();
        for &size in &sizes {
            if size == 0 || !size.is_power_of_two() {
                return Err(LayoutError::InvalidSize);
            }
        }
        sizes.sort_unstable();
        sizes.dedup();
        Ok(Self { sizes })
    }

    /// Returns `true` if `size` is a member of the set.
    #[inline]
    pub fn contains(&self, size: u64) -> bool {
        self.sizes.binary_search(&size).is_ok()
    }

    /// The natural alignment for a page of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidSize`] if `size` is not a member.
    pub fn natural_alignment(&self, size: u64) -> Result<u64, LayoutError> {
        if !self.contains(size) {
            return Err(LayoutError::InvalidSize);
        }
        Ok(size)
    }

    /// The smallest granule in the set.
    #[inline]
    pub fn smallest(&self) -> u64 {
        self.sizes[0]
    }

    /// The legal sizes, ascending.
    #[inline]
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }
}

impl Default for GranuleSet {
    /// The conventional 4 KiB / 2 MiB / 1 GiB translation granules.
    fn default() -> Self {
        Self {
            sizes: vec![SIZE_4K, SIZE_2M, SIZE_1G],
        }
    }
}

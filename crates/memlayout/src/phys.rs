//! The global physical address space.
//!
//! One [`PhysSpace`] exists per [`PageTableManager`](crate::manager::PageTableManager)
//! and is shared by every page table it owns. Exclusive claims are
//! ordinary allocation units; shared claims (cross-core pages) carry a
//! reference count and return to the free set only when the last owner
//! releases them.

use log::trace;
use memlayout_core::{Interval, LayoutError};

use std::collections::BTreeMap;

use crate::interval_set::IntervalSet;

/// The physical address space tracker.
#[derive(Debug, Clone)]
pub struct PhysSpace {
    set: IntervalSet,
    /// Shared-claim reference counts, keyed by claim start address.
    shared: BTreeMap<u64, usize>,
}

impl PhysSpace {
    /// Creates a physical space covering `bound`, entirely free.
    pub fn new(bound: Interval) -> Self {
        Self {
            set: IntervalSet::new(bound),
            shared: BTreeMap::new(),
        }
    }

    /// The fixed physical range.
    #[inline]
    pub fn bound(&self) -> Interval {
        self.set.bound()
    }

    /// Allocates an exclusive physical range (first-fit).
    pub fn allocate(&mut self, size: u64, align: u64) -> Result<Interval, LayoutError> {
        self.set.allocate(size, align)
    }

    /// Allocates `count` contiguous exclusive ranges of `size` bytes,
    /// each an independent unit. See [`IntervalSet::allocate_run`].
    pub fn allocate_run(
        &mut self,
        size: u64,
        align: u64,
        count: usize,
    ) -> Result<Vec<Interval>, LayoutError> {
        self.set.allocate_run(size, align, count)
    }

    /// Reserves an exact, caller-chosen physical range exclusively.
    pub fn reserve(&mut self, interval: Interval) -> Result<(), LayoutError> {
        self.set.reserve(interval)
    }

    /// Allocates a physical range with a shared claim of `owners`
    /// references. Each [`release`](Self::release) of the range drops one
    /// reference; the range frees when the count reaches zero.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidSize`] if `owners` is zero, otherwise as
    /// [`IntervalSet::allocate`].
    pub fn allocate_shared(
        &mut self,
        size: u64,
        align: u64,
        owners: usize,
    ) -> Result<Interval, LayoutError> {
        if owners == 0 {
            return Err(LayoutError::InvalidSize);
        }
        let interval = self.set.allocate(size, align)?;
        self.shared.insert(interval.start(), owners);
        trace!("shared PA claim {interval} with {owners} owners");
        Ok(interval)
    }

    /// Adds one owner to an existing shared claim.
    ///
    /// Used when a cross-core page is mapped into an additional table
    /// after its initial allocation.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if `interval` is not a shared claim.
    pub fn retain_shared(&mut self, interval: Interval) -> Result<(), LayoutError> {
        if !self.set.is_unit(interval) {
            return Err(LayoutError::NotFound);
        }
        match self.shared.get_mut(&interval.start()) {
            Some(count) => {
                *count += 1;
                Ok(())
            }
            None => Err(LayoutError::NotFound),
        }
    }

    /// Releases one claim on `interval`.
    ///
    /// An exclusive unit frees immediately; a shared claim decrements and
    /// frees only at a count of zero.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if `interval` is not a live unit.
    pub fn release(&mut self, interval: Interval) -> Result<(), LayoutError> {
        if !self.set.is_unit(interval) {
            return Err(LayoutError::NotFound);
        }
        if let Some(count) = self.shared.get_mut(&interval.start()) {
            *count -= 1;
            if *count > 0 {
                trace!("shared PA claim {interval} now {count} owners");
                return Ok(());
            }
            self.shared.remove(&interval.start());
        }
        self.set.free(interval)
    }

    /// Drops a shared claim entirely and frees the range, regardless of
    /// the remaining count. Used to roll back a failed multi-table
    /// allocation.
    pub(crate) fn discard_shared(&mut self, interval: Interval) -> Result<(), LayoutError> {
        if self.shared.remove(&interval.start()).is_none() {
            return Err(LayoutError::NotFound);
        }
        self.set.free(interval)
    }

    /// Returns `true` if `interval` is a live claim (exclusive or shared).
    pub fn is_claimed(&self, interval: Interval) -> bool {
        self.set.is_unit(interval)
    }

    /// Returns the shared reference count of a claim, if it is shared.
    pub fn shared_owners(&self, interval: Interval) -> Option<usize> {
        self.shared.get(&interval.start()).copied()
    }

    /// Returns `true` if `interval` is entirely free.
    pub fn is_free(&self, interval: Interval) -> bool {
        self.set.is_free(interval)
    }

    /// Total free physical bytes.
    pub fn total_free(&self) -> u64 {
        self.set.total_free()
    }

    /// The free physical regions, ascending.
    pub fn free_intervals(&self) -> &[Interval] {
        self.set.free_intervals()
    }
}

//! Free/used interval tracking within one bounded address space.
//!
//! [`IntervalSet`] is the allocator every address-space owner is built
//! on: one per page table for virtual addresses, one global instance
//! for physical addresses. It maintains a sorted, maximally coalesced
//! free list plus the set of live allocation *units*, so that frees can
//! be validated against what was actually handed out.
//!
//! # Algorithm
//!
//! - **Allocate**: first-fit over free regions in ascending address
//!   order; when alignment forces a gap at the front of a region, the
//!   gap stays free.
//! - **Reserve**: exact carve of a caller-chosen range.
//! - **Free**: exact unit only (no partial frees), with immediate
//!   coalescing against both neighbors.

use log::trace;
use memlayout_core::{Interval, LayoutError};

use std::collections::BTreeMap;

/// A free/used interval tracker over one bounded address range.
///
/// Invariants, maintained across every operation:
/// - free intervals are pairwise disjoint, sorted, and never adjacent
///   (maximal coalescing);
/// - the union of the free intervals and the live units is exactly the
///   bound, with no double-counting;
/// - every operation either fully succeeds or leaves the set untouched.
#[derive(Debug, Clone)]
pub struct IntervalSet {
    bound: Interval,
    /// Free regions, sorted by start. Adjacent regions are always merged.
    free: Vec<Interval>,
    /// Live allocation units: start -> end.
    units: BTreeMap<u64, u64>,
}

impl IntervalSet {
    /// Creates a tracker covering `bound`, initially entirely free.
    pub fn new(bound: Interval) -> Self {
        Self {
            bound,
            free: vec![bound],
            units: BTreeMap::new(),
        }
    }

    /// The fixed total range this set manages.
    #[inline]
    pub fn bound(&self) -> Interval {
        self.bound
    }

    /// Allocates `size` bytes at a start aligned to `align` (first-fit,
    /// lowest address wins).
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidSize`] if `size` is zero.
    /// - [`LayoutError::AlignmentError`] if `align` is not a power of two.
    /// - [`LayoutError::OutOfSpace`] if no free region fits.
    pub fn allocate(&mut self, size: u64, align: u64) -> Result<Interval, LayoutError> {
        let start = self.find_and_carve(size, align)?;
        let interval = Interval::from_start_size(start, size)?;
        self.units.insert(interval.start(), interval.end());
        trace!("allocated {interval} (align {align:#x})");
        Ok(interval)
    }

    /// Allocates `count` contiguous units of `size` bytes each, the run
    /// start aligned to `align`. Each unit can later be freed on its own.
    ///
    /// # Errors
    ///
    /// Same as [`allocate`](Self::allocate); additionally
    /// [`LayoutError::InvalidSize`] if `count` is zero or the total
    /// overflows.
    pub fn allocate_run(
        &mut self,
        size: u64,
        align: u64,
        count: usize,
    ) -> Result<Vec<Interval>, LayoutError> {
        let total = size
            .checked_mul(count as u64)
            .filter(|&t| t > 0)
            .ok_or(LayoutError::InvalidSize)?;
        let start = self.find_and_carve(total, align)?;
        let mut run = Vec::with_capacity(count);
        for i in 0..count as u64 {
            let unit = Interval::from_start_size(start + i * size, size)?;
            self.units.insert(unit.start(), unit.end());
            run.push(unit);
        }
        trace!("allocated run of {count} x {size:#x} at {start:#x}");
        Ok(run)
    }

    /// Marks the exact `interval` as used.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidSize`] if `interval` lies outside the bound.
    /// - [`LayoutError::Overlap`] if any part of it is not currently free.
    pub fn reserve(&mut self, interval: Interval) -> Result<(), LayoutError> {
        if !self.bound.contains(interval) {
            return Err(LayoutError::InvalidSize);
        }
        let idx = self
            .free
            .iter()
            .position(|r| r.contains(interval))
            .ok_or(LayoutError::Overlap)?;
        self.carve(idx, interval);
        self.units.insert(interval.start(), interval.end());
        trace!("reserved {interval}");
        Ok(())
    }

    /// Returns a previously allocated or reserved unit to the free set,
    /// merging with adjacent free neighbors.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NotFound`] unless `interval` names a live
    /// unit exactly (no partial frees of a sub-range).
    pub fn free(&mut self, interval: Interval) -> Result<(), LayoutError> {
        match self.units.get(&interval.start()) {
            Some(&end) if end == interval.end() => {}
            _ => return Err(LayoutError::NotFound),
        }
        self.units.remove(&interval.start());
        self.insert_free(interval);
        trace!("freed {interval}");
        Ok(())
    }

    /// Returns `true` if `interval` is entirely free.
    pub fn is_free(&self, interval: Interval) -> bool {
        // Free regions are coalesced, so containment within a single
        // region is the only possibility.
        self.free.iter().any(|r| r.contains(interval))
    }

    /// Returns `true` if `interval` is a live allocation unit.
    pub fn is_unit(&self, interval: Interval) -> bool {
        self.units.get(&interval.start()) == Some(&interval.end())
    }

    /// Total free bytes.
    pub fn total_free(&self) -> u64 {
        self.free.iter().map(|r| r.size()).sum()
    }

    /// The free regions, ascending, maximally coalesced.
    pub fn free_intervals(&self) -> &[Interval] {
        &self.free
    }

    /// The live allocation units, ascending.
    pub fn used_intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.units.iter().map(|(&start, &end)| {
            Interval::new(start, end).expect("unit invariant: start < end")
        })
    }

    /// First-fit search plus carve. Returns the chosen start address.
    fn find_and_carve(&mut self, size: u64, align: u64) -> Result<u64, LayoutError> {
        if size == 0 {
            return Err(LayoutError::InvalidSize);
        }
        if !align.is_power_of_two() {
            return Err(LayoutError::AlignmentError);
        }
        for idx in 0..self.free.len() {
            let region = self.free[idx];
            let Some(aligned) = region
                .start()
                .checked_add(align - 1)
                .map(|a| a & !(align - 1))
            else {
                continue;
            };
            let Some(end) = aligned.checked_add(size) else {
                continue;
            };
            if end <= region.end() {
                let chosen = Interval::new(aligned, end)?;
                self.carve(idx, chosen);
                return Ok(aligned);
            }
        }
        Err(LayoutError::OutOfSpace)
    }

    /// Removes `chosen` from the free region at `idx`, keeping any head
    /// gap (alignment slack) and tail remainder free.
    fn carve(&mut self, idx: usize, chosen: Interval) {
        let region = self.free.remove(idx);
        debug_assert!(region.contains(chosen));
        let mut insert_at = idx;
        if region.start() < chosen.start() {
            let head = Interval::new(region.start(), chosen.start())
                .expect("head gap is nonempty");
            self.free.insert(insert_at, head);
            insert_at += 1;
        }
        if chosen.end() < region.end() {
            let tail =
                Interval::new(chosen.end(), region.end()).expect("tail gap is nonempty");
            self.free.insert(insert_at, tail);
        }
    }

    /// Inserts a range into the free list, coalescing with neighbors.
    fn insert_free(&mut self, interval: Interval) {
        let idx = self
            .free
            .partition_point(|r| r.start() < interval.start());

        let merge_prev = idx > 0 && self.free[idx - 1].end() == interval.start();
        let merge_next = idx < self.free.len() && self.free[idx].start() == interval.end();

        match (merge_prev, merge_next) {
            (true, true) => {
                let next = self.free.remove(idx);
                self.free[idx - 1] = Interval::new(self.free[idx - 1].start(), next.end())
                    .expect("merged interval is nonempty");
            }
            (true, false) => {
                self.free[idx - 1] =
                    Interval::new(self.free[idx - 1].start(), interval.end())
                        .expect("merged interval is nonempty");
            }
            (false, true) => {
                self.free[idx] = Interval::new(interval.start(), self.free[idx].end())
                    .expect("merged interval is nonempty");
            }
            (false, false) => {
                self.free.insert(idx, interval);
            }
        }
    }
}

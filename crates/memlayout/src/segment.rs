//! Named logical groupings of pages.
//!
//! A [`Segment`] collects the virtual ranges of related pages under a
//! name (".text", "shared-heap") for lookup and reporting. The
//! [`SegmentManager`] is owned by exactly one page table and resolves
//! address -> segment queries over all member pages.

use std::collections::BTreeMap;

use memlayout_core::{Interval, LayoutError, VirtAddr};

/// A named, ordered group of page virtual ranges.
#[derive(Debug, Clone)]
pub struct Segment {
    name: String,
    /// Member pages' VA ranges, in insertion order.
    members: Vec<Interval>,
}

impl Segment {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            members: Vec::new(),
        }
    }

    /// The segment name, unique within its manager.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member pages' virtual ranges, in insertion order.
    #[inline]
    pub fn members(&self) -> &[Interval] {
        &self.members
    }

    /// Returns `true` if any member page covers `addr`.
    pub fn contains(&self, addr: VirtAddr) -> bool {
        self.members.iter().any(|m| m.contains_addr(addr.as_u64()))
    }

    /// Total bytes covered by member pages.
    pub fn total_size(&self) -> u64 {
        self.members.iter().map(|m| m.size()).sum()
    }
}

/// The segment registry of one page table.
#[derive(Debug, Clone, Default)]
pub struct SegmentManager {
    /// Keyed by name; BTreeMap keeps lookups deterministic.
    segments: BTreeMap<String, Segment>,
}

impl SegmentManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a page's virtual range under `name`, creating the
    /// segment on first use.
    pub fn add_to_segment(&mut self, name: &str, va: Interval) {
        self.segments
            .entry(name.to_owned())
            .or_insert_with(|| Segment::new(name))
            .members
            .push(va);
    }

    /// Looks up a segment by name.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if no segment has this name.
    pub fn get(&self, name: &str) -> Result<&Segment, LayoutError> {
        self.segments.get(name).ok_or(LayoutError::NotFound)
    }

    /// Finds the segment whose member pages cover `addr`.
    ///
    /// Segments are scanned in ascending name order, so the result is
    /// deterministic even if ranges were registered to several segments.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if no segment covers the address.
    pub fn find_segment_containing(&self, addr: VirtAddr) -> Result<&Segment, LayoutError> {
        self.segments
            .values()
            .find(|s| s.contains(addr))
            .ok_or(LayoutError::NotFound)
    }

    /// Removes a page's virtual range from whichever segment holds it.
    ///
    /// A segment left empty is dropped. Silently does nothing if the
    /// range was never registered (not every page belongs to a segment).
    pub fn remove_page(&mut self, va: Interval) {
        let mut emptied = None;
        for (name, segment) in &mut self.segments {
            if let Some(idx) = segment.members.iter().position(|&m| m == va) {
                segment.members.remove(idx);
                if segment.members.is_empty() {
                    emptied = Some(name.clone());
                }
                break;
            }
        }
        if let Some(name) = emptied {
            self.segments.remove(&name);
        }
    }

    /// Iterates over all segments in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if no segments are registered.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

//! A single page table: one execution context's virtual address space.
//!
//! A [`PageTable`] owns its private VA [`IntervalSet`], the ordered set
//! of live [`Page`] mappings, and a [`SegmentManager`]. Operations that
//! also touch the shared physical space take the manager's
//! [`PhysSpace`] explicitly; obtain both halves through
//! [`PageTableManager::table_and_pa_space`](crate::manager::PageTableManager::table_and_pa_space).
//!
//! Every multi-step operation rolls back its partial side effects before
//! surfacing an error, so a failed call leaves both address spaces
//! untouched.

use log::debug;
use memlayout_core::{GranuleSet, Interval, LayoutError, PhysAddr, VirtAddr};

use crate::interval_set::IntervalSet;
use crate::page::{ExceptionLevel, MappingAttrs, Page, PageType};
use crate::phys::PhysSpace;
use crate::segment::SegmentManager;

/// A request for freshly carved page mappings.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Page size in bytes; must be a configured granule.
    pub size: u64,
    /// Start alignment; defaults to the natural alignment (the size
    /// itself) and may not be weaker than it.
    pub align: Option<u64>,
    /// Number of sequential pages to create (contiguous VA and PA).
    pub count: usize,
    /// Attributes applied to every created page.
    pub attrs: MappingAttrs,
}

impl PageRequest {
    /// A single-page request with default attributes.
    pub fn new(size: u64) -> Self {
        Self {
            size,
            align: None,
            count: 1,
            attrs: MappingAttrs::default(),
        }
    }

    /// A single-page request with the given attributes.
    pub fn with_attrs(size: u64, attrs: MappingAttrs) -> Self {
        Self {
            size,
            align: None,
            count: 1,
            attrs,
        }
    }
}

/// Point-in-time usage counters for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Live page mappings.
    pub pages: usize,
    /// Registered segments.
    pub segments: usize,
    /// Free virtual bytes.
    pub free_va: u64,
}

/// One MMU context: a named virtual address space with its mappings.
#[derive(Debug, Clone)]
pub struct PageTable {
    name: String,
    core_id: String,
    el: ExceptionLevel,
    va_space: IntervalSet,
    /// Live mappings in creation order.
    pages: Vec<Page>,
    segments: SegmentManager,
    granules: GranuleSet,
}

impl PageTable {
    pub(crate) fn new(
        name: &str,
        core_id: &str,
        el: ExceptionLevel,
        va_bound: Interval,
        granules: GranuleSet,
    ) -> Self {
        debug!("creating page table '{name}' for {core_id} at {el:?}, va {va_bound}");
        Self {
            name: name.to_owned(),
            core_id: core_id.to_owned(),
            el,
            va_space: IntervalSet::new(va_bound),
            pages: Vec::new(),
            segments: SegmentManager::new(),
            granules,
        }
    }

    /// The table name, unique within its manager.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The core this table belongs to.
    #[inline]
    pub fn core_id(&self) -> &str {
        &self.core_id
    }

    /// The execution context this table is bound to.
    #[inline]
    pub fn exception_level(&self) -> ExceptionLevel {
        self.el
    }

    /// The fixed virtual range this table manages.
    #[inline]
    pub fn va_bound(&self) -> Interval {
        self.va_space.bound()
    }

    /// Read-only view of the VA tracker.
    #[inline]
    pub fn va_space(&self) -> &IntervalSet {
        &self.va_space
    }

    /// Live mappings in creation order.
    #[inline]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// The segment registry.
    #[inline]
    pub fn segments(&self) -> &SegmentManager {
        &self.segments
    }

    /// Free virtual bytes.
    pub fn total_free_va(&self) -> u64 {
        self.va_space.total_free()
    }

    /// Usage counters.
    pub fn stats(&self) -> TableStats {
        TableStats {
            pages: self.pages.len(),
            segments: self.segments.len(),
            free_va: self.va_space.total_free(),
        }
    }

    /// Mappings of one type, in creation order.
    pub fn pages_of_type(&self, page_type: PageType) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(move |p| p.page_type() == page_type)
    }

    /// The mapping whose VA range starts at `va`, if any.
    pub fn find_page(&self, va: VirtAddr) -> Option<&Page> {
        self.pages.iter().find(|p| p.va().start() == va.as_u64())
    }

    /// The mapping covering the given virtual address, if any.
    pub fn page_containing(&self, addr: VirtAddr) -> Option<&Page> {
        self.pages.iter().find(|p| p.contains_va(addr))
    }

    /// Translates a virtual address through this table's mappings.
    pub fn translate(&self, addr: VirtAddr) -> Option<PhysAddr> {
        self.page_containing(addr)
            .and_then(|p| p.va_to_pa(addr).ok())
    }

    /// Returns `true` if a mapping covers the given virtual address.
    pub fn is_mapped(&self, addr: VirtAddr) -> bool {
        self.page_containing(addr).is_some()
    }

    /// Allocates a virtual range (first-fit, lowest address).
    ///
    /// The range is held as a live unit until it is either mapped via
    /// [`map_va_to_pa`](Self::map_va_to_pa) or freed with
    /// [`free_va_interval`](Self::free_va_interval).
    pub fn allocate_va_interval(
        &mut self,
        size: u64,
        align: u64,
    ) -> Result<Interval, LayoutError> {
        self.va_space.allocate(size, align)
    }

    /// Returns an unmapped virtual unit obtained from
    /// [`allocate_va_interval`](Self::allocate_va_interval).
    ///
    /// # Errors
    ///
    /// [`LayoutError::InconsistentState`] if a page still backs the
    /// range; [`LayoutError::NotFound`] if it is not a live unit.
    pub fn free_va_interval(&mut self, va: Interval) -> Result<(), LayoutError> {
        if self.pages.iter().any(|p| p.va() == va) {
            return Err(LayoutError::InconsistentState);
        }
        self.va_space.free(va)
    }

    /// Maps a virtual range to an already-reserved physical range.
    ///
    /// `va` may be a unit previously returned by
    /// [`allocate_va_interval`](Self::allocate_va_interval), or a fixed
    /// caller-chosen range that this call reserves first. `pa` must be a
    /// live claim in the manager's physical space.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::DuplicateMapping`] if a page already backs `va`.
    /// - [`LayoutError::InconsistentState`] if `pa` is not claimed.
    /// - [`LayoutError::Overlap`] if a fixed `va` intersects used space.
    /// - [`LayoutError::InvalidSize`] / [`LayoutError::AlignmentError`]
    ///   for granule violations.
    pub fn map_va_to_pa(
        &mut self,
        pa_space: &mut PhysSpace,
        va: Interval,
        pa: Interval,
        attrs: MappingAttrs,
    ) -> Result<&Page, LayoutError> {
        self.map_with_flags(pa_space, va, pa, attrs, false)
    }

    pub(crate) fn map_with_flags(
        &mut self,
        pa_space: &mut PhysSpace,
        va: Interval,
        pa: Interval,
        attrs: MappingAttrs,
        cross_core: bool,
    ) -> Result<&Page, LayoutError> {
        if self.pages.iter().any(|p| p.va() == va) {
            return Err(LayoutError::DuplicateMapping);
        }
        if !pa_space.is_claimed(pa) {
            return Err(LayoutError::InconsistentState);
        }
        // Validate before any mutation.
        let page = Page::new(va, pa, &attrs, self.el, &self.granules, cross_core)?;

        if !self.va_space.is_unit(va) {
            self.va_space.reserve(va)?;
        }
        if let Some(segment) = &attrs.segment {
            self.segments.add_to_segment(segment, va);
        }
        debug!("table '{}': mapped {page}", self.name);
        self.pages.push(page);
        Ok(self.pages.last().expect("page was just pushed"))
    }

    /// Removes the mapping whose VA range starts at `va`.
    ///
    /// Frees the virtual unit and releases (or decrements the shared
    /// claim of) the corresponding physical range.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if no mapping starts at `va`.
    pub fn unmap(
        &mut self,
        pa_space: &mut PhysSpace,
        va: VirtAddr,
    ) -> Result<(), LayoutError> {
        let idx = self
            .pages
            .iter()
            .position(|p| p.va().start() == va.as_u64())
            .ok_or(LayoutError::NotFound)?;
        let (page_va, page_pa) = (self.pages[idx].va(), self.pages[idx].pa());
        if !pa_space.is_claimed(page_pa) {
            return Err(LayoutError::InconsistentState);
        }

        self.va_space.free(page_va)?;
        pa_space
            .release(page_pa)
            .expect("claim was checked above");
        self.segments.remove_page(page_va);
        let page = self.pages.remove(idx);
        debug!("table '{}': unmapped {page}", self.name);
        Ok(())
    }

    /// Undoes a mapping installed earlier in a failed multi-table
    /// operation: drops the page, its segment membership, and its VA
    /// unit, without touching the physical space.
    pub(crate) fn rollback_mapping(&mut self, va: Interval) {
        if let Some(idx) = self.pages.iter().position(|p| p.va() == va) {
            self.pages.remove(idx);
            self.segments.remove_page(va);
            self.va_space
                .free(va)
                .expect("rolled-back mapping held a live VA unit");
        }
    }

    /// Allocates `count` sequential pages backed by freshly carved,
    /// exclusively owned physical memory.
    ///
    /// VA and PA runs are both contiguous; each page is an independent
    /// unit and can be unmapped on its own. All-or-nothing: a physical
    /// allocation failure returns the virtual run before surfacing.
    pub fn allocate_page(
        &mut self,
        pa_space: &mut PhysSpace,
        req: &PageRequest,
    ) -> Result<&[Page], LayoutError> {
        let align = self.effective_align(req)?;
        let va_run = self.va_space.allocate_run(req.size, align, req.count)?;
        let pa_run = match pa_space.allocate_run(req.size, align, req.count) {
            Ok(run) => run,
            Err(e) => {
                for &va in &va_run {
                    self.va_space.free(va).expect("fresh unit");
                }
                return Err(e);
            }
        };

        let first = self.pages.len();
        for (&va, &pa) in va_run.iter().zip(&pa_run) {
            let page = Page::new(va, pa, &req.attrs, self.el, &self.granules, false)
                .expect("run intervals satisfy page invariants");
            if let Some(segment) = &req.attrs.segment {
                self.segments.add_to_segment(segment, va);
            }
            debug!("table '{}': allocated {page}", self.name);
            self.pages.push(page);
        }
        Ok(&self.pages[first..])
    }

    /// Allocates one page whose physical range is carved from the shared
    /// space with a refcounted claim, making it eligible for later
    /// mapping into other tables at the same physical range.
    ///
    /// Each table keeps an independent virtual space; only the physical
    /// range is coordinated.
    pub fn allocate_cross_core_page(
        &mut self,
        pa_space: &mut PhysSpace,
        req: &PageRequest,
    ) -> Result<&Page, LayoutError> {
        let align = self.effective_align(req)?;
        let pa = pa_space.allocate_shared(req.size, align, 1)?;
        let va = match self.va_space.allocate(req.size, align) {
            Ok(va) => va,
            Err(e) => {
                pa_space.discard_shared(pa).expect("fresh shared claim");
                return Err(e);
            }
        };
        if let Err(e) = self
            .map_with_flags(pa_space, va, pa, req.attrs.clone(), true)
            .map(|_| ())
        {
            self.va_space.free(va).expect("fresh unit");
            pa_space.discard_shared(pa).expect("fresh shared claim");
            return Err(e);
        }
        Ok(self.pages.last().expect("page was just mapped"))
    }

    /// Allocates one identity-mapped page (VA == PA): the lowest address
    /// that is simultaneously free in this table's virtual space and the
    /// shared physical space at the requested alignment.
    pub fn allocate_identity_page(
        &mut self,
        pa_space: &mut PhysSpace,
        req: &PageRequest,
    ) -> Result<&Page, LayoutError> {
        let align = self.effective_align(req)?;
        let start = self
            .find_identity_start(pa_space, req.size, align)
            .ok_or(LayoutError::OutOfSpace)?;
        let interval = Interval::from_start_size(start, req.size)?;

        self.va_space.reserve(interval)?;
        if let Err(e) = pa_space.reserve(interval) {
            self.va_space.free(interval).expect("fresh unit");
            return Err(e);
        }
        if let Err(e) = self
            .map_with_flags(pa_space, interval, interval, req.attrs.clone(), false)
            .map(|_| ())
        {
            self.va_space.free(interval).expect("fresh unit");
            pa_space.release(interval).expect("fresh claim");
            return Err(e);
        }
        Ok(self.pages.last().expect("page was just mapped"))
    }

    /// Lowest aligned start free in both spaces, or `None`.
    fn find_identity_start(&self, pa_space: &PhysSpace, size: u64, align: u64) -> Option<u64> {
        let mut best: Option<u64> = None;
        for va_region in self.va_space.free_intervals() {
            for pa_region in pa_space.free_intervals() {
                let lo = va_region.start().max(pa_region.start());
                let hi = va_region.end().min(pa_region.end());
                if lo >= hi {
                    continue;
                }
                let Some(aligned) = lo.checked_add(align - 1).map(|a| a & !(align - 1)) else {
                    continue;
                };
                let Some(end) = aligned.checked_add(size) else {
                    continue;
                };
                if end <= hi {
                    best = Some(best.map_or(aligned, |b| b.min(aligned)));
                }
            }
        }
        best
    }

    /// Resolves and validates a request's alignment against the granule.
    fn effective_align(&self, req: &PageRequest) -> Result<u64, LayoutError> {
        let natural = self.granules.natural_alignment(req.size)?;
        match req.align {
            None => Ok(natural),
            Some(align) if !align.is_power_of_two() => Err(LayoutError::AlignmentError),
            Some(align) if align < natural => Err(LayoutError::AlignmentError),
            Some(align) => Ok(align),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PagePerms;
    use memlayout_core::GranuleSet;
    use memlayout_core::granule::{SIZE_2M, SIZE_4K};

    fn table(va_size: u64) -> PageTable {
        PageTable::new(
            "t0",
            "core0",
            ExceptionLevel::El1,
            Interval::from_start_size(0x0, va_size).unwrap(),
            GranuleSet::default(),
        )
    }

    fn pa_space() -> PhysSpace {
        PhysSpace::new(Interval::from_start_size(0x8000_0000, 0x1000_0000).unwrap())
    }

    fn iv(start: u64, size: u64) -> Interval {
        Interval::from_start_size(start, size).unwrap()
    }

    #[test]
    fn map_preallocated_va() {
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        let va = t.allocate_va_interval(SIZE_4K, SIZE_4K).unwrap();
        let claim = pa.allocate(SIZE_4K, SIZE_4K).unwrap();
        let page = t
            .map_va_to_pa(&mut pa, va, claim, MappingAttrs::default())
            .unwrap();
        assert_eq!(page.va(), va);
        assert_eq!(page.pa(), claim);
        assert_eq!(t.pages().len(), 1);
    }

    #[test]
    fn map_fixed_va_reserves_it() {
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        let claim = pa.allocate(SIZE_4K, SIZE_4K).unwrap();
        let va = iv(0x4000, SIZE_4K);
        t.map_va_to_pa(&mut pa, va, claim, MappingAttrs::default())
            .unwrap();
        assert!(!t.va_space().is_free(va));
        assert!(t.is_mapped(VirtAddr::new(0x4000)));
    }

    #[test]
    fn duplicate_mapping_rejected() {
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        let claim = pa.allocate(SIZE_4K, SIZE_4K).unwrap();
        let va = iv(0x4000, SIZE_4K);
        t.map_va_to_pa(&mut pa, va, claim, MappingAttrs::default())
            .unwrap();
        let err = t.map_va_to_pa(&mut pa, va, claim, MappingAttrs::default());
        assert_eq!(err.err(), Some(LayoutError::DuplicateMapping));
        assert_eq!(t.pages().len(), 1);
    }

    #[test]
    fn map_unreserved_pa_is_inconsistent() {
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        let va = t.allocate_va_interval(SIZE_4K, SIZE_4K).unwrap();
        let err = t.map_va_to_pa(
            &mut pa,
            va,
            iv(0x8000_0000, SIZE_4K),
            MappingAttrs::default(),
        );
        assert_eq!(err.err(), Some(LayoutError::InconsistentState));
        // The preallocated VA unit is untouched.
        assert!(t.va_space().is_unit(va));
    }

    #[test]
    fn map_size_mismatch_rejected_without_mutation() {
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        let claim = pa.allocate(SIZE_4K, SIZE_4K).unwrap();
        let free_before = t.total_free_va();
        let err = t.map_va_to_pa(
            &mut pa,
            iv(0x0, 2 * SIZE_4K),
            claim,
            MappingAttrs::default(),
        );
        assert_eq!(err.err(), Some(LayoutError::InvalidSize));
        assert_eq!(t.total_free_va(), free_before);
    }

    #[test]
    fn unmap_roundtrip_reuses_va() {
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        let pages = t.allocate_page(&mut pa, &PageRequest::new(SIZE_4K)).unwrap();
        let (va, claim) = (pages[0].va(), pages[0].pa());
        let pa_free = pa.total_free();
        let va_free = t.total_free_va();

        t.unmap(&mut pa, VirtAddr::new(va.start())).unwrap();
        assert_eq!(t.pages().len(), 0);
        assert_eq!(pa.total_free(), pa_free + SIZE_4K);
        assert_eq!(t.total_free_va(), va_free + SIZE_4K);

        // The same request may land on the same spot again.
        let again = t.allocate_page(&mut pa, &PageRequest::new(SIZE_4K)).unwrap();
        assert_eq!(again[0].va(), va);
        assert_eq!(again[0].pa(), claim);
    }

    #[test]
    fn unmap_unknown_va() {
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        assert_eq!(
            t.unmap(&mut pa, VirtAddr::new(0x5000)),
            Err(LayoutError::NotFound)
        );
    }

    #[test]
    fn allocate_page_natural_alignment() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        let req = PageRequest::new(SIZE_2M);
        let pages = t.allocate_page(&mut pa, &req).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].va().is_aligned(SIZE_2M));
        assert!(pages[0].pa().is_aligned(SIZE_2M));
    }

    #[test]
    fn allocate_page_rejects_weak_alignment() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        let mut req = PageRequest::new(SIZE_2M);
        req.align = Some(SIZE_4K);
        assert_eq!(
            t.allocate_page(&mut pa, &req).err(),
            Some(LayoutError::AlignmentError)
        );
    }

    #[test]
    fn allocate_page_rejects_non_granule_size() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        assert_eq!(
            t.allocate_page(&mut pa, &PageRequest::new(0x800)).err(),
            Some(LayoutError::InvalidSize)
        );
    }

    #[test]
    fn allocate_sequential_pages() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        let mut req = PageRequest::new(SIZE_4K);
        req.count = 4;
        let pages: Vec<(Interval, Interval)> = t
            .allocate_page(&mut pa, &req)
            .unwrap()
            .iter()
            .map(|p| (p.va(), p.pa()))
            .collect();
        assert_eq!(pages.len(), 4);
        for pair in pages.windows(2) {
            assert_eq!(pair[0].0.end(), pair[1].0.start());
            assert_eq!(pair[0].1.end(), pair[1].1.start());
        }
        // Middle pages unmap independently.
        t.unmap(&mut pa, VirtAddr::new(pages[2].0.start())).unwrap();
        assert_eq!(t.pages().len(), 3);
    }

    #[test]
    fn allocate_page_rolls_back_va_when_pa_exhausted() {
        let mut t = table(0x1000_0000);
        // Tiny PA space: a 2 MiB request cannot fit.
        let mut pa = PhysSpace::new(iv(0x8000_0000, SIZE_4K));
        let va_free = t.total_free_va();
        let err = t.allocate_page(&mut pa, &PageRequest::new(SIZE_2M));
        assert_eq!(err.err(), Some(LayoutError::OutOfSpace));
        assert_eq!(t.total_free_va(), va_free);
        assert_eq!(pa.total_free(), SIZE_4K);
    }

    #[test]
    fn cross_core_page_is_shared_claim() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        let req = PageRequest::with_attrs(
            SIZE_2M,
            MappingAttrs::new(PageType::Shared, PagePerms::READ | PagePerms::WRITE),
        );
        let claim = {
            let page = t.allocate_cross_core_page(&mut pa, &req).unwrap();
            assert!(page.is_cross_core());
            page.pa()
        };
        assert_eq!(pa.shared_owners(claim), Some(1));
    }

    #[test]
    fn cross_core_rolls_back_pa_when_va_exhausted() {
        // VA space smaller than the request.
        let mut t = table(SIZE_4K);
        let mut pa = pa_space();
        let pa_free = pa.total_free();
        let err = t.allocate_cross_core_page(&mut pa, &PageRequest::new(SIZE_2M));
        assert_eq!(err.err(), Some(LayoutError::OutOfSpace));
        assert_eq!(pa.total_free(), pa_free);
    }

    #[test]
    fn identity_page_va_equals_pa() {
        // VA bound overlaps the PA bound so an identity address exists.
        let mut t = PageTable::new(
            "t0",
            "core0",
            ExceptionLevel::El1,
            iv(0x8000_0000, 0x1000_0000),
            GranuleSet::default(),
        );
        let mut pa = pa_space();
        let page = t
            .allocate_identity_page(&mut pa, &PageRequest::new(SIZE_4K))
            .unwrap();
        assert_eq!(page.va().start(), page.pa().start());
        assert!(page.va().is_aligned(SIZE_4K));
        let addr = VirtAddr::new(page.va().start());
        assert_eq!(t.translate(addr).unwrap().as_u64(), addr.as_u64());
    }

    #[test]
    fn identity_page_needs_overlap() {
        // Disjoint VA and PA bounds: no identity address can exist.
        let mut t = table(0x10_0000);
        let mut pa = pa_space();
        assert_eq!(
            t.allocate_identity_page(&mut pa, &PageRequest::new(SIZE_4K))
                .err(),
            Some(LayoutError::OutOfSpace)
        );
    }

    #[test]
    fn segment_registration_and_lookup() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        let mut req = PageRequest::new(SIZE_4K);
        req.attrs.segment = Some(".text".to_owned());
        req.attrs.page_type = PageType::Code;
        let va = t.allocate_page(&mut pa, &req).unwrap()[0].va();

        let seg = t
            .segments()
            .find_segment_containing(VirtAddr::new(va.start()))
            .unwrap();
        assert_eq!(seg.name(), ".text");

        // Unmap drops the segment membership.
        t.unmap(&mut pa, VirtAddr::new(va.start())).unwrap();
        assert!(
            t.segments()
                .find_segment_containing(VirtAddr::new(va.start()))
                .is_err()
        );
    }

    #[test]
    fn pages_of_type_filters() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        let code = PageRequest::with_attrs(
            SIZE_4K,
            MappingAttrs::new(PageType::Code, PagePerms::READ | PagePerms::EXECUTE),
        );
        let data = PageRequest::with_attrs(
            SIZE_4K,
            MappingAttrs::new(PageType::Data, PagePerms::READ | PagePerms::WRITE),
        );
        t.allocate_page(&mut pa, &code).unwrap();
        t.allocate_page(&mut pa, &data).unwrap();
        t.allocate_page(&mut pa, &data).unwrap();
        assert_eq!(t.pages_of_type(PageType::Code).count(), 1);
        assert_eq!(t.pages_of_type(PageType::Data).count(), 2);
        assert_eq!(t.pages_of_type(PageType::Device).count(), 0);
    }

    #[test]
    fn free_va_interval_rejects_mapped_range() {
        let mut t = table(0x1000_0000);
        let mut pa = pa_space();
        let va = t.allocate_page(&mut pa, &PageRequest::new(SIZE_4K)).unwrap()[0].va();
        assert_eq!(
            t.free_va_interval(va),
            Err(LayoutError::InconsistentState)
        );
        // An unmapped unit frees normally.
        let spare = t.allocate_va_interval(SIZE_4K, SIZE_4K).unwrap();
        t.free_va_interval(spare).unwrap();
    }
}

//! The top-level owner of a whole memory layout.
//!
//! A [`PageTableManager`] owns the single shared [`PhysSpace`] and every
//! [`PageTable`] in the system, keyed by unique name. It is a plain
//! value with no global state; a host that needs concurrent access
//! wraps the whole manager in its own lock.

use log::{debug, info};
use memlayout_core::{GranuleSet, Interval, LayoutError};

use std::collections::BTreeMap;

use crate::page::{ExceptionLevel, MappingAttrs};
use crate::phys::PhysSpace;
use crate::table::{PageRequest, PageTable};

/// The result of a shared-page allocation across several tables.
#[derive(Debug, Clone)]
pub struct SharedAllocation {
    /// The single physical range backing every mapping.
    pub pa: Interval,
    /// The per-table virtual ranges, in target order.
    pub mappings: Vec<(String, Interval)>,
}

/// Owns the physical space and all page tables of one modeled system.
#[derive(Debug, Clone)]
pub struct PageTableManager {
    pa_space: PhysSpace,
    granules: GranuleSet,
    /// Keyed by table name; BTreeMap keeps iteration deterministic.
    tables: BTreeMap<String, PageTable>,
}

impl PageTableManager {
    /// Creates a manager over the given physical range with the default
    /// granule set (4 KiB, 2 MiB, 1 GiB).
    pub fn new(pa_bound: Interval) -> Self {
        Self::with_granules(pa_bound, GranuleSet::default())
    }

    /// Creates a manager with a custom granule set.
    pub fn with_granules(pa_bound: Interval, granules: GranuleSet) -> Self {
        info!("layout manager over pa {pa_bound}");
        Self {
            pa_space: PhysSpace::new(pa_bound),
            granules,
            tables: BTreeMap::new(),
        }
    }

    /// Read-only view of the shared physical space.
    #[inline]
    pub fn pa_space(&self) -> &PhysSpace {
        &self.pa_space
    }

    /// The fixed physical range.
    #[inline]
    pub fn pa_bound(&self) -> Interval {
        self.pa_space.bound()
    }

    /// Total free physical bytes across the whole system.
    pub fn total_free_pa(&self) -> u64 {
        self.pa_space.total_free()
    }

    /// The configured granule set.
    #[inline]
    pub fn granules(&self) -> &GranuleSet {
        &self.granules
    }

    /// Creates a new, empty page table.
    ///
    /// # Errors
    ///
    /// [`LayoutError::DuplicateName`] if a table named `name` exists.
    pub fn create_page_table(
        &mut self,
        name: &str,
        core_id: &str,
        el: ExceptionLevel,
        va_bound: Interval,
    ) -> Result<&mut PageTable, LayoutError> {
        if self.tables.contains_key(name) {
            return Err(LayoutError::DuplicateName);
        }
        let table = PageTable::new(name, core_id, el, va_bound, self.granules.clone());
        Ok(self.tables.entry(name.to_owned()).or_insert(table))
    }

    /// Looks up a table by name.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if no table has this name.
    pub fn get(&self, name: &str) -> Result<&PageTable, LayoutError> {
        self.tables.get(name).ok_or(LayoutError::NotFound)
    }

    /// Looks up a table by name for VA-only mutation. Operations that
    /// also touch physical memory go through
    /// [`table_and_pa_space`](Self::table_and_pa_space) instead.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if no table has this name.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut PageTable, LayoutError> {
        self.tables.get_mut(name).ok_or(LayoutError::NotFound)
    }

    /// Splits the manager into one table and the shared physical space,
    /// the pair every physical-backed table operation takes.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if no table has this name.
    pub fn table_and_pa_space(
        &mut self,
        name: &str,
    ) -> Result<(&mut PageTable, &mut PhysSpace), LayoutError> {
        match self.tables.get_mut(name) {
            Some(table) => Ok((table, &mut self.pa_space)),
            None => Err(LayoutError::NotFound),
        }
    }

    /// Removes a table and releases every physical claim its pages hold.
    ///
    /// Shared claims are decremented; ranges still referenced by other
    /// tables stay reserved.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if no table has this name.
    pub fn remove_page_table(&mut self, name: &str) -> Result<(), LayoutError> {
        let table = self.tables.remove(name).ok_or(LayoutError::NotFound)?;
        for page in table.pages() {
            self.pa_space
                .release(page.pa())
                .expect("mapped page held a live PA claim");
        }
        debug!("removed page table '{name}' ({} pages)", table.pages().len());
        Ok(())
    }

    /// Allocates one physical range and maps it into every named table.
    ///
    /// The physical carve happens once with a claim per target; each
    /// table then receives its own virtual range at its own address.
    /// All-or-nothing: if any step fails, mappings installed so far are
    /// rolled back and the physical range returns to the free set.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidSize`] if `targets` is empty.
    /// - [`LayoutError::DuplicateName`] if a target is listed twice.
    /// - [`LayoutError::NotFound`] if a target table does not exist.
    /// - Allocation errors from either address space.
    pub fn allocate_shared_page(
        &mut self,
        targets: &[&str],
        req: &PageRequest,
    ) -> Result<SharedAllocation, LayoutError> {
        if targets.is_empty() {
            return Err(LayoutError::InvalidSize);
        }
        for (i, name) in targets.iter().enumerate() {
            if !self.tables.contains_key(*name) {
                return Err(LayoutError::NotFound);
            }
            if targets[..i].contains(name) {
                return Err(LayoutError::DuplicateName);
            }
        }

        let align = effective_align(&self.granules, req)?;
        let pa = self
            .pa_space
            .allocate_shared(req.size, align, targets.len())?;

        let mut done: Vec<(String, Interval)> = Vec::with_capacity(targets.len());
        for name in targets {
            let table = self
                .tables
                .get_mut(*name)
                .expect("target existence was checked above");
            let result = table
                .allocate_va_interval(req.size, align)
                .and_then(|va| {
                    if let Err(e) = table
                        .map_with_flags(&mut self.pa_space, va, pa, req.attrs.clone(), true)
                        .map(|_| ())
                    {
                        table.free_va_interval(va).expect("fresh unit");
                        return Err(e);
                    }
                    Ok(va)
                });
            match result {
                Ok(va) => done.push(((*name).to_owned(), va)),
                Err(e) => {
                    for (rolled, va) in &done {
                        self.tables
                            .get_mut(rolled)
                            .expect("mapped table still exists")
                            .rollback_mapping(*va);
                    }
                    self.pa_space
                        .discard_shared(pa)
                        .expect("fresh shared claim");
                    return Err(e);
                }
            }
        }
        debug!("shared page {pa} mapped into {} tables", done.len());
        Ok(SharedAllocation { pa, mappings: done })
    }

    /// Maps an existing shared physical range into one more table,
    /// adding an owner to its claim.
    ///
    /// Returns the virtual range chosen in the target table.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if the table does not exist or `pa` is
    /// not a shared claim; allocation errors from the virtual space.
    pub fn map_shared_into(
        &mut self,
        name: &str,
        pa: Interval,
        attrs: MappingAttrs,
    ) -> Result<Interval, LayoutError> {
        if !self.tables.contains_key(name) {
            return Err(LayoutError::NotFound);
        }
        let align = self.granules.natural_alignment(pa.size())?;
        self.pa_space.retain_shared(pa)?;

        let table = self
            .tables
            .get_mut(name)
            .expect("existence was checked above");
        let result = table.allocate_va_interval(pa.size(), align).and_then(|va| {
            if let Err(e) = table
                .map_with_flags(&mut self.pa_space, va, pa, attrs, true)
                .map(|_| ())
            {
                table.free_va_interval(va).expect("fresh unit");
                return Err(e);
            }
            Ok(va)
        });
        match result {
            Ok(va) => Ok(va),
            Err(e) => {
                self.pa_space
                    .release(pa)
                    .expect("owner was just retained");
                Err(e)
            }
        }
    }

    /// Iterates over all tables in ascending name order.
    pub fn tables(&self) -> impl Iterator<Item = &PageTable> {
        self.tables.values()
    }

    /// Iterates over the tables belonging to one core.
    pub fn tables_for_core<'a>(
        &'a self,
        core_id: &'a str,
    ) -> impl Iterator<Item = &'a PageTable> {
        self.tables.values().filter(move |t| t.core_id() == core_id)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if no tables exist.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Resolves a request's alignment against the granule set.
fn effective_align(granules: &GranuleSet, req: &PageRequest) -> Result<u64, LayoutError> {
    let natural = granules.natural_alignment(req.size)?;
    match req.align {
        None => Ok(natural),
        Some(align) if !align.is_power_of_two() => Err(LayoutError::AlignmentError),
        Some(align) if align < natural => Err(LayoutError::AlignmentError),
        Some(align) => Ok(align),
    }
}

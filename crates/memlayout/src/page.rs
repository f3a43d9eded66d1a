//! A single validated VA -> PA mapping and its attribute types.
//!
//! Pages are created only through the mapping operations on
//! [`PageTable`](crate::table::PageTable) and destroyed only by unmap;
//! the constructor here validates the granule, size, and alignment
//! invariants so that a `Page` value is correct by construction.

use core::fmt;
use std::collections::BTreeMap;

use memlayout_core::{GranuleSet, Interval, LayoutError, PhysAddr, VirtAddr};

bitflags::bitflags! {
    /// Page access permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PagePerms: u8 {
        /// Page is readable.
        const READ    = 1 << 0;
        /// Page is writable.
        const WRITE   = 1 << 1;
        /// Page is executable.
        const EXECUTE = 1 << 2;
    }
}

/// The kind of memory a page describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PageType {
    /// Ordinary memory with no further classification.
    Normal,
    /// Instruction memory.
    Code,
    /// Data memory.
    Data,
    /// Device / MMIO memory.
    Device,
    /// Memory whose physical range is intentionally visible to more than
    /// one page table.
    Shared,
}

/// Cacheability of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Accesses bypass the cache.
    NonCacheable,
    /// Writes propagate to memory immediately.
    WriteThrough,
    /// Writes are held in the cache until eviction.
    WriteBack,
}

/// Shareability domain of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shareability {
    /// Not shared between observers.
    NonShareable,
    /// Shared within the inner domain.
    InnerShareable,
    /// Shared within the outer domain.
    OuterShareable,
}

/// The execution privilege context a page table instance is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExceptionLevel {
    /// User space.
    El0,
    /// OS kernel.
    El1,
    /// Hypervisor.
    El2,
    /// Secure monitor.
    El3,
}

/// A typed custom-attribute value.
///
/// Open-ended per-page metadata is a mapping from string keys to this
/// closed variant rather than an unconstrained dynamic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// A string value.
    Str(String),
    /// An integer value.
    Int(i64),
    /// A boolean value.
    Bool(bool),
}

/// The attribute bundle supplied when mapping a page.
#[derive(Debug, Clone)]
pub struct MappingAttrs {
    /// The kind of memory being mapped.
    pub page_type: PageType,
    /// Access permissions.
    pub perms: PagePerms,
    /// Cacheability.
    pub cache: CachePolicy,
    /// Shareability domain.
    pub share: Shareability,
    /// Free-form typed metadata.
    pub custom: BTreeMap<String, AttrValue>,
    /// Segment to register the page under, if any.
    pub segment: Option<String>,
}

impl Default for MappingAttrs {
    fn default() -> Self {
        Self {
            page_type: PageType::Normal,
            perms: PagePerms::READ | PagePerms::WRITE,
            cache: CachePolicy::WriteBack,
            share: Shareability::NonShareable,
            custom: BTreeMap::new(),
            segment: None,
        }
    }
}

impl MappingAttrs {
    /// Convenience constructor for the common type + permissions case.
    pub fn new(page_type: PageType, perms: PagePerms) -> Self {
        Self {
            page_type,
            perms,
            ..Self::default()
        }
    }
}

/// A single VA -> PA mapping with size, type, permissions, and metadata.
#[derive(Debug, Clone)]
pub struct Page {
    va: Interval,
    pa: Interval,
    page_type: PageType,
    perms: PagePerms,
    cache: CachePolicy,
    share: Shareability,
    el: ExceptionLevel,
    custom: BTreeMap<String, AttrValue>,
    cross_core: bool,
}

impl Page {
    /// Validates and constructs a page.
    ///
    /// Invariants enforced here: `va` and `pa` have equal sizes, the size
    /// is a configured granule, and both starts are naturally aligned to
    /// the size.
    pub(crate) fn new(
        va: Interval,
        pa: Interval,
        attrs: &MappingAttrs,
        el: ExceptionLevel,
        granules: &GranuleSet,
        cross_core: bool,
    ) -> Result<Self, LayoutError> {
        if va.size() != pa.size() {
            return Err(LayoutError::InvalidSize);
        }
        let align = granules.natural_alignment(va.size())?;
        if !va.is_aligned(align) || !pa.is_aligned(align) {
            return Err(LayoutError::AlignmentError);
        }
        Ok(Self {
            va,
            pa,
            page_type: attrs.page_type,
            perms: attrs.perms,
            cache: attrs.cache,
            share: attrs.share,
            el,
            custom: attrs.custom.clone(),
            cross_core,
        })
    }

    /// The virtual range.
    #[inline]
    pub fn va(&self) -> Interval {
        self.va
    }

    /// The physical range.
    #[inline]
    pub fn pa(&self) -> Interval {
        self.pa
    }

    /// The page size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.va.size()
    }

    /// The kind of memory.
    #[inline]
    pub fn page_type(&self) -> PageType {
        self.page_type
    }

    /// Access permissions.
    #[inline]
    pub fn perms(&self) -> PagePerms {
        self.perms
    }

    /// Cacheability.
    #[inline]
    pub fn cache(&self) -> CachePolicy {
        self.cache
    }

    /// Shareability domain.
    #[inline]
    pub fn shareability(&self) -> Shareability {
        self.share
    }

    /// The execution context of the owning table.
    #[inline]
    pub fn exception_level(&self) -> ExceptionLevel {
        self.el
    }

    /// Free-form typed metadata.
    #[inline]
    pub fn custom_attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.custom
    }

    /// Whether the physical range is claimed by more than one table.
    #[inline]
    pub fn is_cross_core(&self) -> bool {
        self.cross_core
    }

    /// Returns `true` if the page is readable.
    pub fn is_readable(&self) -> bool {
        self.perms.contains(PagePerms::READ)
    }

    /// Returns `true` if the page is writable.
    pub fn is_writable(&self) -> bool {
        self.perms.contains(PagePerms::WRITE)
    }

    /// Returns `true` if the page is executable.
    pub fn is_executable(&self) -> bool {
        self.perms.contains(PagePerms::EXECUTE)
    }

    /// Returns `true` if the page covers the given virtual address.
    pub fn contains_va(&self, addr: VirtAddr) -> bool {
        self.va.contains_addr(addr.as_u64())
    }

    /// Returns `true` if the page covers the given physical address.
    pub fn contains_pa(&self, addr: PhysAddr) -> bool {
        self.pa.contains_addr(addr.as_u64())
    }

    /// Translates a virtual address inside this page to its physical
    /// counterpart.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if `addr` is outside the page.
    pub fn va_to_pa(&self, addr: VirtAddr) -> Result<PhysAddr, LayoutError> {
        if !self.contains_va(addr) {
            return Err(LayoutError::NotFound);
        }
        let offset = addr.as_u64() - self.va.start();
        Ok(PhysAddr::new(self.pa.start() + offset))
    }

    /// Translates a physical address inside this page to its virtual
    /// counterpart.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotFound`] if `addr` is outside the page.
    pub fn pa_to_va(&self, addr: PhysAddr) -> Result<VirtAddr, LayoutError> {
        if !self.contains_pa(addr) {
            return Err(LayoutError::NotFound);
        }
        let offset = addr.as_u64() - self.pa.start();
        Ok(VirtAddr::new(self.va.start() + offset))
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.is_readable() { "r" } else { "-" };
        let w = if self.is_writable() { "w" } else { "-" };
        let x = if self.is_executable() { "x" } else { "-" };
        write!(
            f,
            "Page(va {}, pa {}, {:?}, {r}{w}{x}, {:?})",
            self.va, self.pa, self.page_type, self.el
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memlayout_core::granule::SIZE_4K;

    fn page(va_start: u64, pa_start: u64, size: u64) -> Result<Page, LayoutError> {
        Page::new(
            Interval::from_start_size(va_start, size).unwrap(),
            Interval::from_start_size(pa_start, size).unwrap(),
            &MappingAttrs::default(),
            ExceptionLevel::El1,
            &GranuleSet::default(),
            false,
        )
    }

    #[test]
    fn valid_page() {
        let p = page(0x10_0000, 0x8000_0000, SIZE_4K).unwrap();
        assert_eq!(p.size(), SIZE_4K);
        assert!(p.is_readable());
        assert!(p.is_writable());
        assert!(!p.is_executable());
        assert!(!p.is_cross_core());
    }

    #[test]
    fn size_mismatch_rejected() {
        let err = Page::new(
            Interval::from_start_size(0x1000, SIZE_4K).unwrap(),
            Interval::from_start_size(0x2000, 2 * SIZE_4K).unwrap(),
            &MappingAttrs::default(),
            ExceptionLevel::El1,
            &GranuleSet::default(),
            false,
        );
        assert_eq!(err.err(), Some(LayoutError::InvalidSize));
    }

    #[test]
    fn non_granule_size_rejected() {
        assert_eq!(
            page(0x1000, 0x2000, 0x800).err(),
            Some(LayoutError::InvalidSize)
        );
    }

    #[test]
    fn misaligned_start_rejected() {
        assert_eq!(
            page(0x1800, 0x2000, SIZE_4K).err(),
            Some(LayoutError::AlignmentError)
        );
        assert_eq!(
            page(0x1000, 0x2800, SIZE_4K).err(),
            Some(LayoutError::AlignmentError)
        );
    }

    #[test]
    fn address_translation_roundtrip() {
        let p = page(0x10_0000, 0x8000_0000, SIZE_4K).unwrap();
        let va = VirtAddr::new(0x10_0123);
        let pa = p.va_to_pa(va).unwrap();
        assert_eq!(pa.as_u64(), 0x8000_0123);
        assert_eq!(p.pa_to_va(pa).unwrap(), va);
    }

    #[test]
    fn translation_outside_page_fails() {
        let p = page(0x10_0000, 0x8000_0000, SIZE_4K).unwrap();
        assert_eq!(
            p.va_to_pa(VirtAddr::new(0x10_1000)),
            Err(LayoutError::NotFound)
        );
        assert_eq!(
            p.pa_to_va(PhysAddr::new(0x7FFF_FFFF)),
            Err(LayoutError::NotFound)
        );
    }
}

//! Memory layout modeling for MMU-based systems.
//!
//! This crate computes address-space layouts ahead of time: it tracks
//! free and used ranges of virtual and physical memory, validates page
//! mappings against a configurable granule set, and keeps multiple page
//! tables consistent against one shared physical space. It models
//! layout only; it never touches hardware page tables.
//!
//! The entry point is [`PageTableManager`], a plain owned value:
//!
//! ```
//! use memlayout::{ExceptionLevel, Interval, PageRequest, PageTableManager};
//!
//! # fn main() -> Result<(), memlayout::LayoutError> {
//! let mut mgr = PageTableManager::new(Interval::from_start_size(0x8000_0000, 0x1000_0000)?);
//! mgr.create_page_table("kernel", "core0", ExceptionLevel::El1,
//!     Interval::from_start_size(0xFFFF_0000_0000, 0x1000_0000)?)?;
//!
//! let (table, pa_space) = mgr.table_and_pa_space("kernel")?;
//! let pages = table.allocate_page(pa_space, &PageRequest::new(0x1000))?;
//! assert_eq!(pages[0].size(), 0x1000);
//! # Ok(())
//! # }
//! ```
//!
//! Allocation is deterministic first-fit at the lowest address, so the
//! same sequence of calls always produces the same layout.
//!
//! Every operation takes `&mut self` and there is no interior
//! mutability; wrap the manager in a `Mutex` if threads share it.

pub mod interval_set;
pub mod manager;
pub mod page;
pub mod phys;
pub mod segment;
pub mod table;

pub use interval_set::IntervalSet;
pub use manager::{PageTableManager, SharedAllocation};
pub use page::{
    AttrValue, CachePolicy, ExceptionLevel, MappingAttrs, Page, PagePerms, PageType, Shareability,
};
pub use phys::PhysSpace;
pub use segment::{Segment, SegmentManager};
pub use table::{PageRequest, PageTable, TableStats};

pub use memlayout_core::granule;
pub use memlayout_core::{GranuleSet, Interval, LayoutError, PhysAddr, VirtAddr};

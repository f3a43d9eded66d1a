//! Leaf types for address-space layout modeling.
//!
//! This crate contains the dependency-free building blocks shared by the
//! `memlayout` engine: typed address wrappers, the half-open [`Interval`]
//! type, the configurable [`GranuleSet`], and the [`LayoutError`] kind
//! enum. Everything here is plain value arithmetic, testable on any host.

pub mod addr;
pub mod error;
pub mod granule;
pub mod interval;

pub use addr::{PhysAddr, VirtAddr};
pub use error::LayoutError;
pub use granule::GranuleSet;
pub use interval::Interval;

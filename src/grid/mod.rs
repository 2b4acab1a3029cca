//! Circular grid: geometry, storage and submap iteration.
//!
//! # Contents
//!
//! - [`geometry`]: world/index math behind the rolling start index
//! - [`circular`]: SoA cell storage with O(1) translation
//! - [`submap`]: iteration over logical rectangles

pub mod circular;
pub mod geometry;
pub mod submap;

pub use circular::{CellMut, CircularGrid};
pub use geometry::GridGeometry;
pub use submap::SubmapIterator;

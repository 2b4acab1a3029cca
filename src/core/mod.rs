//! Fundamental types shared across the crate.
//!
//! # Contents
//!
//! - [`point`]: grid index and size types
//! - [`cloud`]: SoA 3D point cloud with packed colors
//! - [`color`]: packed RGB helpers

pub mod cloud;
pub mod color;
pub mod point;

pub use cloud::PointCloud;
pub use color::{pack_rgb, unpack_rgb};
pub use point::{GridIndex, GridSize};

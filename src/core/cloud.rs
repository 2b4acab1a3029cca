//! 3D point cloud with per-point colors.
//!
//! Uses Structure-of-Arrays layout: coordinates and colors are stored in
//! separate contiguous arrays, which keeps the integration loop friendly to
//! auto-vectorization and avoids padding per point.

use serde::{Deserialize, Serialize};

/// A colored 3D point cloud in the map frame.
///
/// The caller is responsible for transforming points into the map frame
/// before handing them to the map; the core does not reproject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloud {
    /// X coordinates in meters.
    pub xs: Vec<f32>,
    /// Y coordinates in meters.
    pub ys: Vec<f32>,
    /// Z coordinates (heights) in meters.
    pub zs: Vec<f32>,
    /// Packed RGB colors, one per point.
    pub colors: Vec<u32>,
    /// Acquisition time in nanoseconds. Expected to be monotonic across
    /// consecutive clouds.
    pub timestamp_ns: u64,
}

impl PointCloud {
    /// Create a new empty cloud.
    pub fn new(timestamp_ns: u64) -> Self {
        Self {
            timestamp_ns,
            ..Default::default()
        }
    }

    /// Create an empty cloud with preallocated capacity.
    pub fn with_capacity(timestamp_ns: u64, capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            zs: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            timestamp_ns,
        }
    }

    /// Add a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32, color: u32) {
        self.xs.push(x);
        self.ys.push(y);
        self.zs.push(z);
        self.colors.push(color);
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// True if the cloud holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

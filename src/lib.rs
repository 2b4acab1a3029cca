//! # Bhumi-Map: Probabilistic 2.5D Elevation Mapping
//!
//! A robot-centric elevation mapping library: it ingests 3D point clouds
//! with per-point height uncertainty, fuses them into a grid of per-cell
//! Kalman estimates, propagates uncertainty over time, and produces on
//! demand a spatially-fused map that accounts for the horizontal position
//! uncertainty of neighboring cells.
//!
//! ## Features
//!
//! - **Two coupled grids**: a raw per-cell estimator and a fused view
//!   kept consistent through timestamps
//! - **Circular buffers**: the map follows the robot with O(1)
//!   translations that only invalidate the swept-in strip
//! - **SoA data layout**: each layer is one contiguous buffer, friendly
//!   to bulk clamping and auto-vectorization
//! - **Thread-safe engine**: sensor integration keeps running while
//!   fusion computes on a snapshot
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bhumi_map::{ElevationMap, MapParameters, PointCloud};
//! use nalgebra::Vector2;
//!
//! // 10 m x 10 m footprint at 5 cm resolution around the origin.
//! let map = ElevationMap::new(MapParameters::default()).unwrap();
//! map.set_geometry(Vector2::new(10.0, 10.0), 0.05, Vector2::zeros())
//!     .unwrap();
//!
//! // Integrate a measurement with 1 cm^2 height variance.
//! let mut cloud = PointCloud::new(1_000_000);
//! cloud.push(0.5, 0.25, 0.12, 0xFFFFFF);
//! map.integrate(&cloud, &[0.0001]).unwrap();
//!
//! // Fuse and read back.
//! map.fuse_all();
//! let fused = map.fused_snapshot();
//! println!("fused at t = {} ns", fused.timestamp_ns());
//! ```
//!
//! ## Coordinate Frame
//!
//! World coordinates follow the ROS REP-103 convention (x-forward,
//! y-left, z-up). The grid footprint is centered on a world position;
//! logical cell (0, 0) sits at the (+x, +y) corner. All cell positions
//! refer to cell centers.
//!
//! ## Architecture
//!
//! The library is organized into modules:
//!
//! - [`core`]: fundamental types (indices, point clouds, colors)
//! - [`grid`]: circular grid geometry, storage and submap iteration
//! - [`map`]: the raw and fused elevation maps
//! - [`integration`]: point-cloud integration (Kalman update + outlier gate)
//! - [`propagation`]: additive uncertainty propagation
//! - [`fusion`]: Gaussian-weighted spatial fusion
//! - [`engine`]: thread-safe orchestration of both maps
//! - [`msg`]: outbound map snapshots for publishing
//! - [`config`]: map parameters
//! - [`error`]: error types
//!
//! ## Data Flow
//!
//! ```text
//!   ┌──────────────┐    ┌──────────────┐
//!   │ Point Cloud  │    │ Motion Model │
//!   │ + variances  │    │ (ext. deltas)│
//!   └──────┬───────┘    └──────┬───────┘
//!          │ integrate          │ propagate
//!          ▼                    ▼
//!   ┌──────────────────────────────────┐
//!   │             RawMap               │
//!   │  elevation · variance · h_var_x  │
//!   │  h_var_y · color   (circular)    │
//!   └──────┬───────────────────────────┘
//!          │ snapshot (transient raw lock)
//!          ▼
//!   ┌──────────────┐   Gaussian-weighted
//!   │    Fuser     │   neighborhood mixture
//!   └──────┬───────┘
//!          ▼
//!   ┌──────────────────────────────────┐
//!   │            FusedMap              │
//!   │  elevation · variance · color    │
//!   └──────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod grid;
pub mod integration;
pub mod map;
pub mod msg;
pub mod propagation;

// Re-export main types at crate root
pub use config::MapParameters;
pub use core::{GridIndex, GridSize, PointCloud};
pub use engine::ElevationMap;
pub use error::{MapError, Result};
pub use fusion::{fuse_region, FusionSummary};
pub use grid::{CircularGrid, GridGeometry, SubmapIterator};
pub use integration::{IntegrationSummary, Integrator};
pub use map::{FusedMap, RawMap};
pub use msg::GridMapMessage;
pub use propagation::{Propagator, VarianceUpdate};

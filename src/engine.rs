//! Elevation map engine: orchestration, locking and snapshots.
//!
//! The engine owns both maps behind independent mutexes and enforces the
//! access discipline the two-grid invariants need:
//!
//! - `integrate`, `propagate`, `clean`, `reset` and `move_to` hold the
//!   raw lock for their whole duration (`reset` additionally takes the
//!   fused lock, always after the raw one).
//! - Fusion holds the fused lock for the whole pass but takes the raw
//!   lock only long enough to deep-copy the raw map. Integration and
//!   propagation keep making progress against the live raw map while the
//!   fuser computes on the snapshot; the fused result reflects the
//!   snapshot timestamp.
//! - `move_to` only *tries* the fused lock. If a fusion pass is running
//!   the fused map is left untranslated; the next fusion realigns it to
//!   the raw snapshot and rebuilds it from scratch.

use nalgebra::{Isometry3, Point3, Vector2};
use parking_lot::Mutex;

use crate::config::MapParameters;
use crate::core::{GridIndex, PointCloud};
use crate::error::Result;
use crate::fusion::{fuse_region, FusionSummary};
use crate::integration::{IntegrationSummary, Integrator};
use crate::map::{FusedMap, RawMap};
use crate::msg::GridMapMessage;
use crate::propagation::{Propagator, VarianceUpdate};

/// Thread-safe probabilistic elevation map.
///
/// All methods take `&self`; share the engine across threads with an
/// `Arc`. See the module docs for the locking discipline.
pub struct ElevationMap {
    raw: Mutex<RawMap>,
    fused: Mutex<FusedMap>,
    params: Mutex<MapParameters>,
    pose: Mutex<Isometry3<f64>>,
}

enum FuseArea {
    All,
    Window {
        center: Vector2<f64>,
        length: Vector2<f64>,
    },
}

impl ElevationMap {
    /// Create an engine with validated parameters and no cells. Call
    /// [`ElevationMap::set_geometry`] before feeding data.
    pub fn new(params: MapParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            raw: Mutex::new(RawMap::empty()),
            fused: Mutex::new(FusedMap::empty()),
            params: Mutex::new(params),
            pose: Mutex::new(Isometry3::identity()),
        })
    }

    /// Allocate both maps over a new footprint. All cells start invalid.
    pub fn set_geometry(
        &self,
        length: Vector2<f64>,
        resolution: f64,
        center: Vector2<f64>,
    ) -> Result<()> {
        let mut raw = self.raw.lock();
        let mut fused = self.fused.lock();
        raw.set_geometry(length, resolution, center)?;
        fused.set_geometry(length, resolution, center)?;
        let size = raw.size();
        log::info!(
            "elevation map grid resized to {} rows and {} columns",
            size.rows,
            size.cols
        );
        Ok(())
    }

    /// Replace the map parameters.
    pub fn set_parameters(&self, params: MapParameters) -> Result<()> {
        params.validate()?;
        *self.params.lock() = params;
        Ok(())
    }

    /// Current map parameters.
    pub fn parameters(&self) -> MapParameters {
        self.params.lock().clone()
    }

    /// Frame id carried in outbound messages.
    pub fn frame_id(&self) -> String {
        self.params.lock().frame_id.clone()
    }

    /// Integrate a point cloud with per-point variances into the raw map.
    pub fn integrate(&self, cloud: &PointCloud, variances: &[f32]) -> Result<IntegrationSummary> {
        let integrator = Integrator::new(self.params.lock().clone());
        let mut raw = self.raw.lock();
        integrator.integrate(&mut raw, cloud, variances)
    }

    /// Add externally-computed variance deltas to the raw map.
    pub fn propagate(&self, update: &VarianceUpdate, timestamp_ns: u64) -> Result<()> {
        let propagator = Propagator::new(self.params.lock().clone());
        let mut raw = self.raw.lock();
        propagator.apply(&mut raw, update, timestamp_ns)
    }

    /// Re-apply the variance clamp to all raw variance layers.
    pub fn clean(&self) {
        let params = self.params.lock().clone();
        self.raw.lock().clamp_variances(&params);
    }

    /// Fuse the whole map.
    pub fn fuse_all(&self) -> FusionSummary {
        self.fuse(FuseArea::All)
    }

    /// Fuse a world-space window given by center and side lengths. Cells
    /// outside the window keep their previous fused content, which may
    /// belong to an older raw state.
    pub fn fuse_area(&self, center: Vector2<f64>, length: Vector2<f64>) -> FusionSummary {
        log::debug!(
            "fusing area centered at ({}, {}) with side lengths ({}, {})",
            center.x,
            center.y,
            length.x,
            length.y
        );
        self.fuse(FuseArea::Window { center, length })
    }

    fn fuse(&self, area: FuseArea) -> FusionSummary {
        let mut fused = self.fused.lock();

        // Deep snapshot under a transient raw lock; writers continue
        // against the live raw map while we compute.
        let snapshot = self.raw.lock().clone();

        let (top_left, size) = match area {
            FuseArea::All => (GridIndex::ZERO, snapshot.size()),
            FuseArea::Window { center, length } => snapshot.geometry().submap(&center, &length),
        };
        if size.is_empty() {
            return FusionSummary::default();
        }

        // A translation the fused map missed (move while fusion held the
        // lock) leaves the two maps offset; realign first. Stale or
        // misaligned fused data is dropped before anything is reused.
        let realign_shift = fused.move_to(&snapshot.geometry().center());
        if realign_shift != (0, 0) || fused.timestamp_ns() != snapshot.timestamp_ns() {
            fused.reset_data();
        }

        let summary = fuse_region(&mut fused, &snapshot, top_left, size);
        fused.set_timestamp_ns(snapshot.timestamp_ns());
        log::debug!(
            "fused {} cells ({} holes, {} already current)",
            summary.written(),
            summary.holes,
            summary.already_fused
        );
        summary
    }

    /// Translate both maps to a new center.
    ///
    /// The raw map always moves. The fused map is only translated when
    /// its lock is free; a skipped translation is healed at the start of
    /// the next fusion.
    pub fn move_to(&self, new_center: Vector2<f64>) {
        {
            let mut raw = self.raw.lock();
            raw.move_to(&new_center);
        }
        match self.fused.try_lock() {
            Some(mut fused) => {
                fused.move_to(&new_center);
            }
            None => {
                log::debug!("fused map busy during move, translation deferred to next fusion");
            }
        }
    }

    /// Clear both maps. Geometry and parameters are kept.
    pub fn reset(&self) {
        let mut raw = self.raw.lock();
        let mut fused = self.fused.lock();
        raw.clear_all();
        raw.set_timestamp_ns(0);
        fused.reset_data();
    }

    /// Deep copy of the raw map.
    pub fn raw_snapshot(&self) -> RawMap {
        self.raw.lock().clone()
    }

    /// Deep copy of the fused map.
    pub fn fused_snapshot(&self) -> FusedMap {
        self.fused.lock().clone()
    }

    /// Timestamp of the last raw-map update in nanoseconds.
    pub fn time_of_last_update(&self) -> u64 {
        self.raw.lock().timestamp_ns()
    }

    /// Raw timestamp the current fused content reflects, in nanoseconds.
    /// The fused map is stale iff this differs from
    /// [`ElevationMap::time_of_last_update`].
    pub fn time_of_last_fusion(&self) -> u64 {
        self.fused.lock().timestamp_ns()
    }

    /// Set the pose of the grid frame in its parent frame.
    pub fn set_pose(&self, pose: Isometry3<f64>) {
        *self.pose.lock() = pose;
    }

    /// Pose of the grid frame in its parent frame.
    pub fn pose(&self) -> Isometry3<f64> {
        *self.pose.lock()
    }

    /// 3D point of a cell (its center and elevation) transformed into the
    /// parent frame, or `None` for holes and out-of-range indices.
    pub fn position_3d_in_parent_frame(&self, index: GridIndex) -> Option<Point3<f64>> {
        let raw = self.raw.lock();
        if !raw.geometry().is_inside(index) || !raw.is_valid(index) {
            return None;
        }
        let position = raw.geometry().position_of(index);
        let point = Point3::new(position.x, position.y, raw.elevation_at(index) as f64);
        drop(raw);
        Some(self.pose.lock().transform_point(&point))
    }

    /// Publishable snapshot of the raw map.
    pub fn raw_message(&self) -> GridMapMessage {
        let frame_id = self.frame_id();
        GridMapMessage::from_raw(&self.raw.lock(), &frame_id)
    }

    /// Publishable snapshot of the fused map.
    pub fn fused_message(&self) -> GridMapMessage {
        let frame_id = self.frame_id();
        GridMapMessage::from_fused(&self.fused.lock(), &frame_id)
    }
}

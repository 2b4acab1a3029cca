//! Raw elevation map.
//!
//! Per-cell Kalman state straight from measurement integration: height
//! estimate, height variance, and the horizontal position uncertainty of
//! the cell content along both axes. The horizontal variance layers are
//! deliberately outside the clear set: they describe how far the cell's
//! true footprint may have drifted and keep their values across holes,
//! clears and map translations. Swept-in cells inherit whatever the prior
//! occupant left there; every consumer gates on [`RawMap::is_valid`]
//! before trusting a cell.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::config::MapParameters;
use crate::core::{GridIndex, GridSize};
use crate::error::Result;
use crate::grid::{CircularGrid, GridGeometry};

/// Raw per-cell estimation grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMap {
    grid: CircularGrid,
    horizontal_variance_x: Vec<f32>,
    horizontal_variance_y: Vec<f32>,
}

/// Mutable view of one raw cell across all layers.
pub struct RawCellMut<'a> {
    /// Height estimate in meters.
    pub elevation: &'a mut f32,
    /// Height variance.
    pub variance: &'a mut f32,
    /// Horizontal position variance along x.
    pub horizontal_variance_x: &'a mut f32,
    /// Horizontal position variance along y.
    pub horizontal_variance_y: &'a mut f32,
    /// Packed RGB color.
    pub color: &'a mut u32,
}

impl RawMap {
    /// Map with no cells; unusable until [`RawMap::set_geometry`].
    pub fn empty() -> Self {
        Self {
            grid: CircularGrid::new(GridGeometry::empty(), false),
            horizontal_variance_x: Vec::new(),
            horizontal_variance_y: Vec::new(),
        }
    }

    /// Allocate the map over a new footprint. All cells start invalid;
    /// horizontal variances start saturated.
    pub fn set_geometry(
        &mut self,
        length: Vector2<f64>,
        resolution: f64,
        center: Vector2<f64>,
    ) -> Result<()> {
        let geometry = GridGeometry::new(length, resolution, center)?;
        let cells = geometry.cell_count();
        self.grid = CircularGrid::new(geometry, false);
        self.horizontal_variance_x = vec![f32::INFINITY; cells];
        self.horizontal_variance_y = vec![f32::INFINITY; cells];
        Ok(())
    }

    /// Grid geometry.
    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        self.grid.geometry()
    }

    /// Grid size in cells.
    #[inline]
    pub fn size(&self) -> GridSize {
        self.grid.size()
    }

    /// Timestamp of the last data update in nanoseconds.
    #[inline]
    pub fn timestamp_ns(&self) -> u64 {
        self.grid.timestamp_ns()
    }

    /// Stamp the map with a new data time.
    #[inline]
    pub fn set_timestamp_ns(&mut self, timestamp_ns: u64) {
        self.grid.set_timestamp_ns(timestamp_ns);
    }

    /// Cell validity: finite elevation and finite variance.
    #[inline]
    pub fn is_valid(&self, index: GridIndex) -> bool {
        self.grid.is_valid(index)
    }

    /// Elevation of a cell.
    #[inline]
    pub fn elevation_at(&self, index: GridIndex) -> f32 {
        self.grid.elevation_at(index)
    }

    /// Variance of a cell.
    #[inline]
    pub fn variance_at(&self, index: GridIndex) -> f32 {
        self.grid.variance_at(index)
    }

    /// Color of a cell.
    #[inline]
    pub fn color_at(&self, index: GridIndex) -> u32 {
        self.grid.color_at(index)
    }

    /// Horizontal variance of a cell along x.
    #[inline]
    pub fn horizontal_variance_x_at(&self, index: GridIndex) -> f32 {
        self.horizontal_variance_x[self.geometry().buffer_index(index)]
    }

    /// Horizontal variance of a cell along y.
    #[inline]
    pub fn horizontal_variance_y_at(&self, index: GridIndex) -> f32 {
        self.horizontal_variance_y[self.geometry().buffer_index(index)]
    }

    /// Mutable access to one cell across all raw layers.
    pub fn cell_mut(&mut self, index: GridIndex) -> RawCellMut<'_> {
        let i = self.grid.geometry().buffer_index(index);
        let cell = self.grid.cell_mut(index);
        RawCellMut {
            elevation: cell.elevation,
            variance: cell.variance,
            horizontal_variance_x: &mut self.horizontal_variance_x[i],
            horizontal_variance_y: &mut self.horizontal_variance_y[i],
            color: cell.color,
        }
    }

    /// Reset elevation and variance to NaN. Horizontal variances and
    /// colors keep their values.
    pub fn clear_all(&mut self) {
        self.grid.clear_all();
    }

    /// Translate the footprint; see
    /// [`CircularGrid::move_to`](crate::grid::CircularGrid::move_to).
    /// Horizontal variance layers are not part of the clear set and stay
    /// untouched.
    pub fn move_to(&mut self, new_center: &Vector2<f64>) -> (i64, i64) {
        self.grid.move_to(new_center)
    }

    /// Apply the clamp rule to the vertical and both horizontal variance
    /// layers.
    pub fn clamp_variances(&mut self, params: &MapParameters) {
        super::clamp_variances(
            self.grid.variance_values_mut(),
            params.min_variance,
            params.max_variance,
        );
        super::clamp_variances(
            &mut self.horizontal_variance_x,
            params.min_horizontal_variance,
            params.max_horizontal_variance,
        );
        super::clamp_variances(
            &mut self.horizontal_variance_y,
            params.min_horizontal_variance,
            params.max_horizontal_variance,
        );
    }
}

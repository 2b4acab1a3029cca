//! Spatially-fused elevation map.
//!
//! Written exclusively by the fuser from a raw-map snapshot. The timestamp
//! tracks which raw state the fused content reflects: whenever it differs
//! from the raw timestamp the fused data is stale and gets rebuilt from
//! scratch on the next fusion pass.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::core::{GridIndex, GridSize};
use crate::error::Result;
use crate::grid::{CellMut, CircularGrid, GridGeometry};

/// Fused view of the elevation map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedMap {
    grid: CircularGrid,
}

impl FusedMap {
    /// Map with no cells; unusable until [`FusedMap::set_geometry`].
    pub fn empty() -> Self {
        Self {
            grid: CircularGrid::new(GridGeometry::empty(), true),
        }
    }

    /// Allocate the map over a new footprint with every cell invalid.
    pub fn set_geometry(
        &mut self,
        length: Vector2<f64>,
        resolution: f64,
        center: Vector2<f64>,
    ) -> Result<()> {
        let geometry = GridGeometry::new(length, resolution, center)?;
        self.grid = CircularGrid::new(geometry, true);
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

    /// Raw-map timestamp this fused content reflects, in nanoseconds.
    #[inline]
    pub fn timestamp_ns(&self) -> u64 {
        self.grid.timestamp_ns()
    }

    /// Stamp the fused content.
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

    /// Mutable access to one fused cell.
    #[inline]
    pub fn cell_mut(&mut self, index: GridIndex) -> CellMut<'_> {
        self.grid.cell_mut(index)
    }

    /// Wipe all fused content (elevation, variance and color).
    pub fn clear_all(&mut self) {
        self.grid.clear_all();
    }

    /// Drop stale fused content: clear everything and rewind the
    /// timestamp to zero so the next fusion starts from a clean image.
    pub fn reset_data(&mut self) {
        self.grid.clear_all();
        self.grid.set_timestamp_ns(0);
    }

    /// Translate the footprint; swept-in cells are invalidated on
    /// elevation, variance and color.
    pub fn move_to(&mut self, new_center: &Vector2<f64>) -> (i64, i64) {
        self.grid.move_to(new_center)
    }
}

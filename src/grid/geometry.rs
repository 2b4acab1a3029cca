//! Grid geometry and circular-buffer index math.
//!
//! The grid covers a rectangular world-space footprint centered on
//! `center`. Cell data lives in fixed-size buffers that are never
//! reallocated when the map moves; instead a rolling `start_index` marks
//! the buffer position of logical cell (0, 0). A rigid translation of the
//! footprint therefore only advances `start_index` and invalidates the
//! strip of cells that scrolled in.
//!
//! # Coordinate convention
//!
//! Logical (0, 0) is the corner cell in the (+x, +y) direction. Increasing
//! row walks towards -x, increasing column towards -y:
//!
//! ```text
//!        +x
//!         ^
//!  row 2 1 0
//!   +y < . . .  col 0
//!        . . .  col 1
//!        . . .  col 2
//! ```
//!
//! All world-space positions refer to cell centers.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::core::{GridIndex, GridSize};
use crate::error::{MapError, Result};

/// Geometry of a circular elevation grid.
///
/// Pure addressing: no cell data, only the mapping between world
/// positions, logical indices and physical buffer slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    size: GridSize,
    resolution: f64,
    length: Vector2<f64>,
    center: Vector2<f64>,
    start_index: GridIndex,
}

impl GridGeometry {
    /// Create a geometry covering `length` meters at `resolution` meters
    /// per cell, centered on `center`.
    ///
    /// The cell count per axis is `ceil(length / resolution)`; the stored
    /// side lengths are rounded up accordingly so that the footprint is an
    /// exact multiple of the resolution.
    pub fn new(length: Vector2<f64>, resolution: f64, center: Vector2<f64>) -> Result<Self> {
        if !(length.x > 0.0) || !(length.y > 0.0) || !length.x.is_finite() || !length.y.is_finite()
        {
            return Err(MapError::InvalidGeometry(format!(
                "side lengths must be positive and finite, got ({}, {})",
                length.x, length.y
            )));
        }
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(MapError::InvalidGeometry(format!(
                "resolution must be positive and finite, got {resolution}"
            )));
        }
        if !center.x.is_finite() || !center.y.is_finite() {
            return Err(MapError::InvalidGeometry(format!(
                "center must be finite, got ({}, {})",
                center.x, center.y
            )));
        }

        let rows = (length.x / resolution).ceil() as usize;
        let cols = (length.y / resolution).ceil() as usize;
        let size = GridSize::new(rows.max(1), cols.max(1));
        Ok(Self {
            size,
            resolution,
            length: Vector2::new(size.rows as f64 * resolution, size.cols as f64 * resolution),
            center,
            start_index: GridIndex::ZERO,
        })
    }

    /// Placeholder geometry with no cells, used before `set_geometry`.
    pub fn empty() -> Self {
        Self {
            size: GridSize::new(0, 0),
            resolution: 1.0,
            length: Vector2::zeros(),
            center: Vector2::zeros(),
            start_index: GridIndex::ZERO,
        }
    }

    /// Grid size in cells.
    #[inline]
    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Resolution in meters per cell.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Side lengths of the footprint in meters.
    #[inline]
    pub fn length(&self) -> Vector2<f64> {
        self.length
    }

    /// World position the footprint is centered on.
    #[inline]
    pub fn center(&self) -> Vector2<f64> {
        self.center
    }

    /// Buffer offset of logical cell (0, 0).
    #[inline]
    pub fn start_index(&self) -> GridIndex {
        self.start_index
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.size.cell_count()
    }

    /// True if a logical index lies within the grid.
    #[inline]
    pub fn is_inside(&self, index: GridIndex) -> bool {
        index.row < self.size.rows && index.col < self.size.cols
    }

    /// Flat buffer slot of a logical index (row-major storage).
    #[inline]
    pub fn buffer_index(&self, index: GridIndex) -> usize {
        let row = wrap(index.row as i64 + self.start_index.row as i64, self.size.rows);
        let col = wrap(index.col as i64 + self.start_index.col as i64, self.size.cols);
        row * self.size.cols + col
    }

    /// Logical index of a physical buffer position.
    #[inline]
    pub fn logical_from_buffer(&self, buffer_row: usize, buffer_col: usize) -> GridIndex {
        GridIndex::new(
            wrap(buffer_row as i64 - self.start_index.row as i64, self.size.rows),
            wrap(buffer_col as i64 - self.start_index.col as i64, self.size.cols),
        )
    }

    /// Logical index of the cell containing a world position, or `None` if
    /// the position falls outside the footprint.
    pub fn index_at(&self, position: &Vector2<f64>) -> Option<GridIndex> {
        if !position.x.is_finite() || !position.y.is_finite() {
            return None;
        }
        let row = ((self.center.x + 0.5 * self.length.x - position.x) / self.resolution).floor()
            as i64;
        let col = ((self.center.y + 0.5 * self.length.y - position.y) / self.resolution).floor()
            as i64;
        if row >= 0
            && col >= 0
            && (row as usize) < self.size.rows
            && (col as usize) < self.size.cols
        {
            Some(GridIndex::new(row as usize, col as usize))
        } else {
            None
        }
    }

    /// World position of a cell center.
    ///
    /// The index is expected to lie within the grid; out-of-range indices
    /// yield positions beyond the footprint.
    #[inline]
    pub fn position_of(&self, index: GridIndex) -> Vector2<f64> {
        Vector2::new(
            self.center.x + 0.5 * self.length.x
                - (index.row as f64 + 0.5) * self.resolution,
            self.center.y + 0.5 * self.length.y
                - (index.col as f64 + 0.5) * self.resolution,
        )
    }

    /// Buffer-order index shift equivalent to moving the center to
    /// `new_center`, rounded to whole cells (half-cells round away from
    /// zero).
    ///
    /// A positive world shift corresponds to a negative index shift: the
    /// footprint moves towards +x, so previously high-row content slides
    /// towards row 0.
    pub fn shift_for(&self, new_center: &Vector2<f64>) -> (i64, i64) {
        let shift = new_center - self.center;
        (
            -((shift.x / self.resolution).round() as i64),
            -((shift.y / self.resolution).round() as i64),
        )
    }

    /// Advance the start index by a buffer-order shift and absorb the
    /// aligned world displacement into the center position.
    ///
    /// The sub-cell residual of the requested move is *not* applied; the
    /// grid center stays on the cell raster and may lag the requested
    /// point by up to half a cell per axis.
    pub fn apply_shift(&mut self, row_shift: i64, col_shift: i64) {
        self.start_index = GridIndex::new(
            wrap(self.start_index.row as i64 + row_shift, self.size.rows),
            wrap(self.start_index.col as i64 + col_shift, self.size.cols),
        );
        self.center.x -= row_shift as f64 * self.resolution;
        self.center.y -= col_shift as f64 * self.resolution;
    }

    /// Resolve a world-space window (center, side lengths) to a logical
    /// submap rectangle, clamped to the footprint.
    ///
    /// Returns an empty size for non-positive side lengths. A window
    /// reaching beyond the footprint is truncated at the border.
    pub fn submap(&self, center: &Vector2<f64>, length: &Vector2<f64>) -> (GridIndex, GridSize) {
        if self.size.is_empty() || !(length.x > 0.0) || !(length.y > 0.0) {
            return (GridIndex::ZERO, GridSize::new(0, 0));
        }
        // The (+x, +y) window corner carries the smallest logical index.
        let r0 = self.clamped_row(center.x + 0.5 * length.x);
        let c0 = self.clamped_col(center.y + 0.5 * length.y);
        let r1 = self.clamped_row(center.x - 0.5 * length.x);
        let c1 = self.clamped_col(center.y - 0.5 * length.y);
        (
            GridIndex::new(r0, c0),
            GridSize::new(r1 - r0 + 1, c1 - c0 + 1),
        )
    }

    /// Row of the cell containing world x, clamped into the grid.
    fn clamped_row(&self, x: f64) -> usize {
        let raw = ((self.center.x + 0.5 * self.length.x - x) / self.resolution).floor() as i64;
        raw.clamp(0, self.size.rows as i64 - 1) as usize
    }

    /// Column of the cell containing world y, clamped into the grid.
    fn clamped_col(&self, y: f64) -> usize {
        let raw = ((self.center.y + 0.5 * self.length.y - y) / self.resolution).floor() as i64;
        raw.clamp(0, self.size.cols as i64 - 1) as usize
    }
}

/// Map a possibly-negative index into `[0, n)`.
#[inline]
fn wrap(index: i64, n: usize) -> usize {
    debug_assert!(n > 0);
    let n = n as i64;
    (((index % n) + n) % n) as usize
}

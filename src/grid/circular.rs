//! Circular grid storage.
//!
//! Uses Structure-of-Arrays layout: each layer is one contiguous buffer,
//! addressed through the rolling [`GridGeometry`]. Buffers are allocated
//! once and never resized; a map translation shifts the buffer start index
//! and invalidates the strip of cells that scrolled into the footprint.
//!
//! ## Layers and the clear set
//!
//! Every grid carries `elevation` and `variance` (f32, NaN marks a hole)
//! plus packed RGB `color`. `elevation` and `variance` always belong to
//! the clear set wiped by [`CircularGrid::clear_all`] and by swept-in
//! cells on [`CircularGrid::move_to`]; `color` joins the clear set only
//! when the grid is constructed with `clear_color` (the fused layout).
//! Cells outside the clear set keep whatever the prior occupant left
//! behind, so consumers must gate reads on [`CircularGrid::is_valid`].

use std::ops::Range;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::core::{GridIndex, GridSize};
use crate::grid::GridGeometry;

/// Dense 2D cell storage behind a rolling start index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularGrid {
    geometry: GridGeometry,
    elevation: Vec<f32>,
    variance: Vec<f32>,
    color: Vec<u32>,
    clear_color: bool,
    timestamp_ns: u64,
}

/// Mutable view of one cell's common layers.
pub struct CellMut<'a> {
    /// Height estimate in meters.
    pub elevation: &'a mut f32,
    /// Height variance.
    pub variance: &'a mut f32,
    /// Packed RGB color.
    pub color: &'a mut u32,
}

impl CircularGrid {
    /// Create a grid over the given geometry with every cell invalid.
    ///
    /// `clear_color` selects whether the color layer belongs to the clear
    /// set (true for the fused layout, false for the raw layout).
    pub fn new(geometry: GridGeometry, clear_color: bool) -> Self {
        let cells = geometry.cell_count();
        Self {
            geometry,
            elevation: vec![f32::NAN; cells],
            variance: vec![f32::NAN; cells],
            color: vec![0; cells],
            clear_color,
            timestamp_ns: 0,
        }
    }

    /// Grid geometry.
    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Grid size in cells.
    #[inline]
    pub fn size(&self) -> GridSize {
        self.geometry.size()
    }

    /// Timestamp of the data in nanoseconds.
    #[inline]
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    /// Stamp the data with a new time.
    #[inline]
    pub fn set_timestamp_ns(&mut self, timestamp_ns: u64) {
        self.timestamp_ns = timestamp_ns;
    }

    /// A cell is valid iff its elevation and variance are both finite.
    /// NaN marks a hole, infinite variance marks a clamped-out estimate.
    #[inline]
    pub fn is_valid(&self, index: GridIndex) -> bool {
        let i = self.geometry.buffer_index(index);
        self.elevation[i].is_finite() && self.variance[i].is_finite()
    }

    /// Elevation of a cell.
    #[inline]
    pub fn elevation_at(&self, index: GridIndex) -> f32 {
        self.elevation[self.geometry.buffer_index(index)]
    }

    /// Variance of a cell.
    #[inline]
    pub fn variance_at(&self, index: GridIndex) -> f32 {
        self.variance[self.geometry.buffer_index(index)]
    }

    /// Color of a cell.
    #[inline]
    pub fn color_at(&self, index: GridIndex) -> u32 {
        self.color[self.geometry.buffer_index(index)]
    }

    /// Mutable access to one cell across the common layers.
    #[inline]
    pub fn cell_mut(&mut self, index: GridIndex) -> CellMut<'_> {
        let i = self.geometry.buffer_index(index);
        CellMut {
            elevation: &mut self.elevation[i],
            variance: &mut self.variance[i],
            color: &mut self.color[i],
        }
    }

    /// Variance buffer in physical order, for bulk clamping.
    #[inline]
    pub(crate) fn variance_values_mut(&mut self) -> &mut [f32] {
        &mut self.variance
    }

    /// Wipe the clear-layer set: elevation and variance become NaN, color
    /// becomes 0 when it belongs to the clear set.
    pub fn clear_all(&mut self) {
        self.elevation.fill(f32::NAN);
        self.variance.fill(f32::NAN);
        if self.clear_color {
            self.color.fill(0);
        }
    }

    /// Translate the footprint to be centered on `new_center`.
    ///
    /// The translation is rounded to whole cells; the sub-cell residual is
    /// absorbed by letting the grid center lag the requested point by up
    /// to half a cell. Cells whose world position stays inside the new
    /// footprint keep their stored values bit-identically; the swept-in
    /// strip is invalidated on the clear-layer set.
    ///
    /// Returns the applied buffer-order index shift.
    pub fn move_to(&mut self, new_center: &Vector2<f64>) -> (i64, i64) {
        let size = self.geometry.size();
        if size.is_empty() {
            return (0, 0);
        }
        let (row_shift, col_shift) = self.geometry.shift_for(new_center);
        if row_shift == 0 && col_shift == 0 {
            return (0, 0);
        }

        if row_shift.unsigned_abs() as usize >= size.rows
            || col_shift.unsigned_abs() as usize >= size.cols
        {
            // The whole footprint scrolled out.
            self.clear_all();
        } else {
            if row_shift != 0 {
                for range in swept_ranges(self.geometry.start_index().row, row_shift, size.rows)
                {
                    self.clear_buffer_rows(range);
                }
            }
            if col_shift != 0 {
                for range in swept_ranges(self.geometry.start_index().col, col_shift, size.cols)
                {
                    self.clear_buffer_cols(range);
                }
            }
        }

        self.geometry.apply_shift(row_shift, col_shift);
        (row_shift, col_shift)
    }

    /// Invalidate a contiguous range of physical buffer rows.
    fn clear_buffer_rows(&mut self, rows: Range<usize>) {
        let cols = self.geometry.size().cols;
        for row in rows {
            let span = row * cols..(row + 1) * cols;
            self.elevation[span.clone()].fill(f32::NAN);
            self.variance[span.clone()].fill(f32::NAN);
            if self.clear_color {
                self.color[span].fill(0);
            }
        }
    }

    /// Invalidate a range of physical buffer columns across all rows.
    fn clear_buffer_cols(&mut self, columns: Range<usize>) {
        let size = self.geometry.size();
        for row in 0..size.rows {
            let base = row * size.cols;
            for col in columns.clone() {
                self.elevation[base + col] = f32::NAN;
                self.variance[base + col] = f32::NAN;
                if self.clear_color {
                    self.color[base + col] = 0;
                }
            }
        }
    }
}

/// Physical index ranges swept by an index shift along one axis.
///
/// The swept strip sits next to the (old) start index: those buffer slots
/// become the leading or trailing edge of the new footprint and must not
/// leak their previous contents. At most two ranges are produced when the
/// strip straddles the buffer wrap.
fn swept_ranges(start: usize, shift: i64, n: usize) -> Vec<Range<usize>> {
    debug_assert!(shift != 0 && (shift.unsigned_abs() as usize) < n);
    let sign: i64 = if shift > 0 { 1 } else { -1 };
    let start_idx = start as i64 - if sign < 0 { 1 } else { 0 };
    let end_idx = start_idx - sign + shift;
    let first = if sign > 0 { start_idx } else { end_idx };
    let first = (((first % n as i64) + n as i64) % n as i64) as usize;
    let cells = shift.unsigned_abs() as usize;
    if first + cells <= n {
        vec![first..first + cells]
    } else {
        vec![first..n, 0..cells - (n - first)]
    }
}

//! Uncertainty propagation over time.
//!
//! The map itself has no motion model; whoever tracks the robot pose
//! computes how much additional variance each cell accrued (e.g. from
//! pose-covariance growth between updates) and hands the deltas over as
//! dense matrices. The propagator adds them element-wise, clamps and
//! re-stamps the map.

use nalgebra::DMatrix;

use crate::config::MapParameters;
use crate::core::GridIndex;
use crate::error::{MapError, Result};
use crate::map::RawMap;

/// Per-cell variance deltas for one propagation step.
///
/// All three matrices are in logical order: entry `(0, 0)` belongs to the
/// cell at the (+x, +y) corner of the footprint regardless of where the
/// rolling buffer start currently sits.
#[derive(Debug, Clone)]
pub struct VarianceUpdate {
    /// Additive deltas for the vertical variance layer.
    pub variance: DMatrix<f32>,
    /// Additive deltas for the horizontal x variance layer.
    pub horizontal_x: DMatrix<f32>,
    /// Additive deltas for the horizontal y variance layer.
    pub horizontal_y: DMatrix<f32>,
}

impl VarianceUpdate {
    /// A uniform update adding the same deltas to every cell.
    pub fn uniform(
        rows: usize,
        cols: usize,
        variance: f32,
        horizontal_x: f32,
        horizontal_y: f32,
    ) -> Self {
        Self {
            variance: DMatrix::from_element(rows, cols, variance),
            horizontal_x: DMatrix::from_element(rows, cols, horizontal_x),
            horizontal_y: DMatrix::from_element(rows, cols, horizontal_y),
        }
    }
}

/// Applies externally-computed variance deltas to the raw map.
#[derive(Debug, Clone)]
pub struct Propagator {
    params: MapParameters,
}

impl Propagator {
    /// Create a propagator with the given parameters.
    pub fn new(params: MapParameters) -> Self {
        Self { params }
    }

    /// Add the deltas to the three variance layers, clamp, and stamp the
    /// map with the update time.
    ///
    /// Fails without touching the map if any matrix shape differs from
    /// the grid.
    pub fn apply(
        &self,
        map: &mut RawMap,
        update: &VarianceUpdate,
        timestamp_ns: u64,
    ) -> Result<()> {
        let size = map.size();
        let expected = (size.rows, size.cols);
        for matrix in [&update.variance, &update.horizontal_x, &update.horizontal_y] {
            let actual = (matrix.nrows(), matrix.ncols());
            if actual != expected {
                log::error!(
                    "variance update of size {actual:?} does not match the {expected:?} grid"
                );
                return Err(MapError::SizeMismatch { expected, actual });
            }
        }

        for row in 0..size.rows {
            for col in 0..size.cols {
                let cell = map.cell_mut(GridIndex::new(row, col));
                *cell.variance += update.variance[(row, col)];
                *cell.horizontal_variance_x += update.horizontal_x[(row, col)];
                *cell.horizontal_variance_y += update.horizontal_y[(row, col)];
            }
        }

        map.clamp_variances(&self.params);
        map.set_timestamp_ns(timestamp_ns);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    use super::*;

    fn test_params() -> MapParameters {
        MapParameters {
            min_variance: 0.001,
            max_variance: 10.0,
            min_horizontal_variance: 1.0e-4,
            max_horizontal_variance: 0.5,
            ..Default::default()
        }
    }

    fn populated_map() -> RawMap {
        let mut map = RawMap::empty();
        map.set_geometry(Vector2::new(0.5, 0.5), 0.1, Vector2::zeros())
            .unwrap();
        let cell = map.cell_mut(GridIndex::new(2, 2));
        *cell.elevation = 1.0;
        *cell.variance = 0.01;
        *cell.horizontal_variance_x = 1.0e-3;
        *cell.horizontal_variance_y = 1.0e-3;
        map
    }

    #[test]
    fn test_adds_deltas_and_stamps() {
        let propagator = Propagator::new(test_params());
        let mut map = populated_map();
        let update = VarianceUpdate::uniform(5, 5, 0.02, 5.0e-4, 1.0e-3);
        propagator.apply(&mut map, &update, 777).unwrap();

        let index = GridIndex::new(2, 2);
        assert_relative_eq!(map.variance_at(index), 0.03, epsilon = 1.0e-7);
        assert_relative_eq!(map.horizontal_variance_x_at(index), 1.5e-3, epsilon = 1.0e-9);
        assert_relative_eq!(map.horizontal_variance_y_at(index), 2.0e-3, epsilon = 1.0e-9);
        assert_eq!(map.timestamp_ns(), 777);
        // Holes stay holes: NaN plus a delta is still NaN.
        assert!(map.variance_at(GridIndex::new(0, 0)).is_nan());
    }

    #[test]
    fn test_deltas_are_logical_after_move() {
        let propagator = Propagator::new(test_params());
        let mut map = populated_map();
        map.move_to(&Vector2::new(0.2, 0.0));
        // The populated cell (world origin) is now logical (4, 2).
        let mut update = VarianceUpdate::uniform(5, 5, 0.0, 0.0, 0.0);
        update.variance[(4, 2)] = 0.05;
        propagator.apply(&mut map, &update, 10).unwrap();
        assert_relative_eq!(
            map.variance_at(GridIndex::new(4, 2)),
            0.06,
            epsilon = 1.0e-7
        );
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let propagator = Propagator::new(test_params());
        let mut map = populated_map();
        let update = VarianceUpdate::uniform(4, 5, 0.1, 0.0, 0.0);
        let result = propagator.apply(&mut map, &update, 10);
        assert_eq!(
            result.unwrap_err(),
            MapError::SizeMismatch {
                expected: (5, 5),
                actual: (4, 5)
            }
        );
        // No-op on failure.
        assert_eq!(map.variance_at(GridIndex::new(2, 2)), 0.01);
        assert_eq!(map.timestamp_ns(), 0);
    }

    #[test]
    fn test_clamps_after_adding() {
        let params = MapParameters {
            max_variance: 0.02,
            ..test_params()
        };
        let propagator = Propagator::new(params);
        let mut map = populated_map();
        let update = VarianceUpdate::uniform(5, 5, 0.05, 0.0, 0.0);
        propagator.apply(&mut map, &update, 10).unwrap();
        assert_eq!(map.variance_at(GridIndex::new(2, 2)), f32::INFINITY);
    }
}

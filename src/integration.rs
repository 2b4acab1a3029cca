//! Measurement integration into the raw map.
//!
//! Folds a point cloud with per-point variances into the raw grid, one
//! point at a time and in input order: the per-cell fold is not
//! commutative once the outlier gate fires, so the order of points within
//! a cloud is part of the contract.

use nalgebra::Vector2;

use crate::config::MapParameters;
use crate::core::PointCloud;
use crate::error::{MapError, Result};
use crate::map::RawMap;

/// Counters describing one integration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrationSummary {
    /// Points that initialized a previously invalid cell.
    pub initialized: usize,
    /// Points merged into an existing estimate by the Kalman update.
    pub fused: usize,
    /// Points rejected by the Mahalanobis gate (cell penalized).
    pub outliers: usize,
    /// Points outside the map footprint (skipped).
    pub outside: usize,
}

/// Folds point clouds into the raw map.
#[derive(Debug, Clone)]
pub struct Integrator {
    params: MapParameters,
}

impl Integrator {
    /// Create an integrator with the given parameters.
    pub fn new(params: MapParameters) -> Self {
        Self { params }
    }

    /// Integrate one cloud into the map.
    ///
    /// `variances` carries one vertical measurement variance per point and
    /// must line up with the cloud; each entry is expected to be positive
    /// and finite. Points outside the footprint are skipped silently.
    /// Afterwards all variance layers are clamped and the map is stamped
    /// with the cloud time.
    pub fn integrate(
        &self,
        map: &mut RawMap,
        cloud: &PointCloud,
        variances: &[f32],
    ) -> Result<IntegrationSummary> {
        if variances.len() != cloud.len() {
            return Err(MapError::VarianceCountMismatch {
                points: cloud.len(),
                variances: variances.len(),
            });
        }

        let mut summary = IntegrationSummary::default();
        for i in 0..cloud.len() {
            let position = Vector2::new(cloud.xs[i] as f64, cloud.ys[i] as f64);
            let Some(index) = map.geometry().index_at(&position) else {
                summary.outside += 1;
                continue;
            };
            let z = cloud.zs[i];
            let point_variance = variances[i];

            if !map.is_valid(index) {
                // No prior estimate, take the measurement as-is.
                let cell = map.cell_mut(index);
                *cell.elevation = z;
                *cell.variance = point_variance;
                *cell.horizontal_variance_x = self.params.min_horizontal_variance;
                *cell.horizontal_variance_y = self.params.min_horizontal_variance;
                *cell.color = cloud.colors[i];
                summary.initialized += 1;
                continue;
            }

            let cell = map.cell_mut(index);
            let mahalanobis = ((z - *cell.elevation).powi(2) / *cell.variance).sqrt();
            if mahalanobis < self.params.mahalanobis_threshold {
                *cell.elevation = (*cell.variance * z + point_variance * *cell.elevation)
                    / (*cell.variance + point_variance);
                *cell.variance =
                    (point_variance * *cell.variance) / (point_variance + *cell.variance);
                // TODO: blend colors instead of overwriting.
                *cell.color = cloud.colors[i];
                summary.fused += 1;
            } else {
                // Conflicting height (outlier, occlusion or a moving
                // object): inflate the cell so repeated conflicts clamp it
                // out, and restart the horizontal uncertainty.
                *cell.variance += self.params.multi_height_noise;
                *cell.horizontal_variance_x = self.params.min_horizontal_variance;
                *cell.horizontal_variance_y = self.params.min_horizontal_variance;
                summary.outliers += 1;
            }
        }

        map.clamp_variances(&self.params);
        map.set_timestamp_ns(cloud.timestamp_ns);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::core::GridIndex;

    fn test_params() -> MapParameters {
        MapParameters {
            min_variance: 0.001,
            max_variance: 10.0,
            min_horizontal_variance: 1.0e-4,
            max_horizontal_variance: 0.5,
            mahalanobis_threshold: 2.0,
            multi_height_noise: 0.0015,
            frame_id: "map".to_string(),
        }
    }

    fn small_map() -> RawMap {
        let mut map = RawMap::empty();
        map.set_geometry(Vector2::new(0.3, 0.3), 0.1, Vector2::zeros())
            .unwrap();
        map
    }

    fn one_point(z: f32, color: u32, timestamp_ns: u64) -> PointCloud {
        let mut cloud = PointCloud::new(timestamp_ns);
        cloud.push(0.0, 0.0, z, color);
        cloud
    }

    #[test]
    fn test_cold_insert_initializes_cell() {
        let integrator = Integrator::new(test_params());
        let mut map = small_map();
        let summary = integrator
            .integrate(&mut map, &one_point(0.5, 0xFFFFFF, 100), &[0.01])
            .unwrap();
        assert_eq!(summary.initialized, 1);

        let center = GridIndex::new(1, 1);
        assert_eq!(map.elevation_at(center), 0.5);
        assert_eq!(map.variance_at(center), 0.01);
        assert_eq!(map.horizontal_variance_x_at(center), 1.0e-4);
        assert_eq!(map.horizontal_variance_y_at(center), 1.0e-4);
        assert_eq!(map.color_at(center), 0xFFFFFF);
        assert_eq!(map.timestamp_ns(), 100);

        // All eight neighbors stay holes.
        for row in 0..3 {
            for col in 0..3 {
                let index = GridIndex::new(row, col);
                if index != center {
                    assert!(map.elevation_at(index).is_nan());
                }
            }
        }
    }

    #[test]
    fn test_kalman_merge() {
        let integrator = Integrator::new(test_params());
        let mut map = small_map();
        integrator
            .integrate(&mut map, &one_point(0.5, 0xFFFFFF, 100), &[0.01])
            .unwrap();
        let summary = integrator
            .integrate(&mut map, &one_point(0.6, 0x0, 200), &[0.01])
            .unwrap();
        assert_eq!(summary.fused, 1);

        let center = GridIndex::new(1, 1);
        assert_relative_eq!(map.elevation_at(center), 0.55, epsilon = 1.0e-6);
        assert_relative_eq!(map.variance_at(center), 0.005, epsilon = 1.0e-6);
        assert_eq!(map.color_at(center), 0x0);
        assert_eq!(map.timestamp_ns(), 200);
    }

    #[test]
    fn test_outlier_penalizes_cell() {
        let integrator = Integrator::new(test_params());
        let mut map = small_map();
        integrator
            .integrate(&mut map, &one_point(0.5, 0xFFFFFF, 100), &[0.01])
            .unwrap();
        integrator
            .integrate(&mut map, &one_point(0.6, 0x0, 200), &[0.01])
            .unwrap();

        // sqrt((5.0 - 0.55)^2 / 0.005) is far above the gate.
        let summary = integrator
            .integrate(&mut map, &one_point(5.0, 0xAAAAAA, 300), &[0.01])
            .unwrap();
        assert_eq!(summary.outliers, 1);

        let center = GridIndex::new(1, 1);
        assert_relative_eq!(map.elevation_at(center), 0.55, epsilon = 1.0e-6);
        assert_relative_eq!(map.variance_at(center), 0.0065, epsilon = 1.0e-6);
        assert_eq!(map.horizontal_variance_x_at(center), 1.0e-4);
        assert_eq!(map.horizontal_variance_y_at(center), 1.0e-4);
        // Elevation and color are untouched by the rejected measurement.
        assert_eq!(map.color_at(center), 0x0);
    }

    #[test]
    fn test_variance_above_band_saturates() {
        let params = MapParameters {
            max_variance: 0.001,
            ..test_params()
        };
        let integrator = Integrator::new(params);
        let mut map = small_map();
        integrator
            .integrate(&mut map, &one_point(0.5, 0, 100), &[0.01])
            .unwrap();

        let center = GridIndex::new(1, 1);
        assert_eq!(map.variance_at(center), f32::INFINITY);
        assert!(!map.is_valid(center));
    }

    #[test]
    fn test_points_outside_are_skipped() {
        let integrator = Integrator::new(test_params());
        let mut map = small_map();
        let mut cloud = PointCloud::new(100);
        cloud.push(5.0, 0.0, 1.0, 0);
        cloud.push(0.0, -7.0, 1.0, 0);
        let summary = integrator.integrate(&mut map, &cloud, &[0.01, 0.01]).unwrap();
        assert_eq!(summary.outside, 2);
        assert_eq!(summary.initialized, 0);
        assert_eq!(map.timestamp_ns(), 100);
    }

    #[test]
    fn test_variance_count_mismatch() {
        let integrator = Integrator::new(test_params());
        let mut map = small_map();
        let cloud = one_point(0.5, 0, 100);
        let result = integrator.integrate(&mut map, &cloud, &[0.01, 0.02]);
        assert_eq!(
            result.unwrap_err(),
            MapError::VarianceCountMismatch {
                points: 1,
                variances: 2
            }
        );
    }
}

//! Gaussian-weighted spatial fusion.
//!
//! Every raw cell knows how uncertain the horizontal position of its
//! content is. Fusion turns that into a smoothed map: for each requested
//! cell it collects the raw neighbors whose true footprint plausibly
//! overlaps the cell, weights them by that overlap probability, and
//! mixes their height distributions.
//!
//! The neighborhood window spans ±2σ of the center cell's horizontal
//! variance per axis. The overlap probability of a neighbor is computed
//! from the *neighbor's* horizontal variance: it answers "how likely does
//! this neighbor's content actually sit over the center cell", so a
//! confident neighbor two cells away contributes almost nothing while a
//! smeared-out one still does.

use nalgebra::Vector2;

use crate::core::{GridIndex, GridSize};
use crate::grid::SubmapIterator;
use crate::map::{FusedMap, RawMap};

/// Counters describing one fusion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionSummary {
    /// Cells written from a weighted neighborhood mixture.
    pub fused: usize,
    /// Cells copied verbatim because no neighbor contributed.
    pub copied: usize,
    /// Raw holes skipped.
    pub holes: usize,
    /// Cells already fused for the current raw timestamp.
    pub already_fused: usize,
    /// Cells whose mixture came out non-finite (logged, left invalid).
    pub degenerate: usize,
}

impl FusionSummary {
    /// Cells carrying valid fused data after the pass.
    pub fn written(&self) -> usize {
        self.fused + self.copied
    }
}

/// Fuse the requested logical rectangle from a raw snapshot into the
/// fused map.
///
/// Both maps must share their geometry. Cells already valid in the fused
/// map are assumed up-to-date for the snapshot timestamp and skipped;
/// callers are responsible for clearing stale fused content beforehand
/// (the engine does this by comparing timestamps).
pub fn fuse_region(
    fused: &mut FusedMap,
    raw: &RawMap,
    top_left: GridIndex,
    size: GridSize,
) -> FusionSummary {
    let mut summary = FusionSummary::default();
    let geometry = raw.geometry();
    let resolution = geometry.resolution();

    for index in SubmapIterator::new(top_left, size) {
        if !geometry.is_inside(index) {
            continue;
        }
        if fused.is_valid(index) {
            summary.already_fused += 1;
            continue;
        }
        if !raw.is_valid(index) {
            // Hole in the raw map.
            summary.holes += 1;
            continue;
        }

        // Neighborhood window: ±2 sigma of this cell's horizontal
        // uncertainty per axis, truncated at the footprint border.
        let window_length = Vector2::new(
            4.0 * (raw.horizontal_variance_x_at(index) as f64).sqrt(),
            4.0 * (raw.horizontal_variance_y_at(index) as f64).sqrt(),
        );
        let center = geometry.position_of(index);
        let (window_top_left, window_size) = geometry.submap(&center, &window_length);

        let mut weight_sum = 0.0f64;
        let mut weighted_mean_sum = 0.0f64;
        let mut weighted_moment_sum = 0.0f64;
        let mut contributors = 0usize;

        for neighbor in SubmapIterator::new(window_top_left, window_size) {
            if !raw.is_valid(neighbor) {
                continue;
            }
            let mean = raw.elevation_at(neighbor) as f64;
            let variance = raw.variance_at(neighbor) as f64;
            let position = geometry.position_of(neighbor);
            let distance_x = (position.x - center.x).abs();
            let distance_y = (position.y - center.y).abs();

            let sigma_x = (raw.horizontal_variance_x_at(neighbor) as f64).sqrt();
            let sigma_y = (raw.horizontal_variance_y_at(neighbor) as f64).sqrt();
            let probability_x = gaussian_cdf(distance_x + 0.5 * resolution, 0.0, sigma_x)
                - gaussian_cdf(distance_x - 0.5 * resolution, 0.0, sigma_x);
            let probability_y = gaussian_cdf(distance_y + 0.5 * resolution, 0.0, sigma_y)
                - gaussian_cdf(distance_y - 0.5 * resolution, 0.0, sigma_y);

            let weight = probability_x * probability_y;
            weight_sum += weight;
            weighted_mean_sum += weight * mean;
            weighted_moment_sum += weight * (variance + mean * mean);
            contributors += 1;
        }

        if contributors == 0 {
            // Nothing to mix with, carry the raw cell over unchanged.
            let elevation = raw.elevation_at(index);
            let variance = raw.variance_at(index);
            let color = raw.color_at(index);
            let cell = fused.cell_mut(index);
            *cell.elevation = elevation;
            *cell.variance = variance;
            *cell.color = color;
            summary.copied += 1;
            continue;
        }

        let mean = weighted_mean_sum / weight_sum;
        // Mixture variance via the law of total variance.
        let variance = weighted_moment_sum / weight_sum - mean * mean;

        if !mean.is_finite() || !variance.is_finite() {
            log::error!(
                "fusion of cell ({}, {}) is degenerate: mean = {mean}, variance = {variance}",
                index.row,
                index.col
            );
            summary.degenerate += 1;
            continue;
        }

        let color = raw.color_at(index);
        let cell = fused.cell_mut(index);
        *cell.elevation = mean as f32;
        *cell.variance = variance as f32;
        *cell.color = color;
        summary.fused += 1;
    }

    summary
}

/// Cumulative distribution function of a normal distribution.
#[inline]
fn gaussian_cdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    0.5 * libm::erfc(-(x - mean) / (std_dev * std::f64::consts::SQRT_2))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn maps() -> (RawMap, FusedMap) {
        let mut raw = RawMap::empty();
        raw.set_geometry(Vector2::new(0.3, 0.3), 0.1, Vector2::zeros())
            .unwrap();
        let mut fused = FusedMap::empty();
        fused
            .set_geometry(Vector2::new(0.3, 0.3), 0.1, Vector2::zeros())
            .unwrap();
        (raw, fused)
    }

    fn set_cell(raw: &mut RawMap, index: GridIndex, elevation: f32, variance: f32, hvar: f32) {
        let cell = raw.cell_mut(index);
        *cell.elevation = elevation;
        *cell.variance = variance;
        *cell.horizontal_variance_x = hvar;
        *cell.horizontal_variance_y = hvar;
    }

    #[test]
    fn test_gaussian_cdf() {
        assert_relative_eq!(gaussian_cdf(0.0, 0.0, 1.0), 0.5, epsilon = 1.0e-12);
        assert_relative_eq!(gaussian_cdf(1.0, 0.0, 1.0), 0.8413447460685429, epsilon = 1.0e-9);
        assert_relative_eq!(
            gaussian_cdf(1.0, 0.0, 1.0) + gaussian_cdf(-1.0, 0.0, 1.0),
            1.0,
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn test_isolated_cell_fuses_to_itself() {
        let (mut raw, mut fused) = maps();
        let index = GridIndex::new(1, 1);
        set_cell(&mut raw, index, 0.5, 0.01, 1.0e-4);
        *raw.cell_mut(index).color = 0xBEEF;

        // A 2-sigma window of 4 * sqrt(1e-4) = 0.04 m stays inside the
        // center cell, so the mixture degenerates to the identity.
        let summary = fuse_region(&mut fused, &raw, GridIndex::ZERO, GridSize::new(3, 3));
        assert_eq!(summary.fused, 1);
        assert_eq!(summary.holes, 8);
        assert_relative_eq!(fused.elevation_at(index), 0.5, epsilon = 1.0e-6);
        assert_relative_eq!(fused.variance_at(index), 0.01, epsilon = 1.0e-6);
        assert_eq!(fused.color_at(index), 0xBEEF);

        // Neighbors of a hole stay invalid.
        assert!(!fused.is_valid(GridIndex::new(0, 0)));
    }

    #[test]
    fn test_two_cell_mixture_matches_analytic_result() {
        let (mut raw, mut fused) = maps();
        let center = GridIndex::new(1, 1);
        let neighbor = GridIndex::new(1, 0); // one cell towards +y
        set_cell(&mut raw, center, 1.0, 0.04, 0.01);
        set_cell(&mut raw, neighbor, 2.0, 0.09, 0.01);

        let summary = fuse_region(&mut fused, &raw, center, GridSize::new(1, 1));
        assert_eq!(summary.fused, 1);

        // Hand-computed weighted mixture of both cells: the center weighs
        // w = (phi(0.5) - phi(-0.5))^2, the neighbor picks up the offset
        // term along y.
        assert_relative_eq!(fused.elevation_at(center), 1.3869820, epsilon = 1.0e-5);
        assert_relative_eq!(fused.variance_at(center), 0.29657603, epsilon = 1.0e-4);
    }

    #[test]
    fn test_already_fused_cells_are_skipped() {
        let (mut raw, mut fused) = maps();
        let index = GridIndex::new(1, 1);
        set_cell(&mut raw, index, 0.5, 0.01, 1.0e-4);
        {
            let cell = fused.cell_mut(index);
            *cell.elevation = 9.0;
            *cell.variance = 9.0;
        }

        let summary = fuse_region(&mut fused, &raw, GridIndex::ZERO, GridSize::new(3, 3));
        assert_eq!(summary.already_fused, 1);
        assert_eq!(fused.elevation_at(index), 9.0);
    }

    #[test]
    fn test_saturated_horizontal_variance_is_degenerate() {
        let (mut raw, mut fused) = maps();
        let index = GridIndex::new(1, 1);
        // Valid height estimate whose horizontal uncertainty was clamped
        // out: every overlap probability collapses to zero.
        set_cell(&mut raw, index, 0.5, 0.01, f32::INFINITY);

        let summary = fuse_region(&mut fused, &raw, index, GridSize::new(1, 1));
        assert_eq!(summary.degenerate, 1);
        assert!(!fused.is_valid(index));
    }

    #[test]
    fn test_empty_window_copies_cell_verbatim() {
        let (mut raw, mut fused) = maps();
        let index = GridIndex::new(1, 1);
        set_cell(&mut raw, index, 0.5, 0.01, f32::NAN);
        *raw.cell_mut(index).color = 0xC0FFEE;

        let summary = fuse_region(&mut fused, &raw, index, GridSize::new(1, 1));
        assert_eq!(summary.copied, 1);
        assert_eq!(fused.elevation_at(index), 0.5);
        assert_eq!(fused.variance_at(index), 0.01);
        assert_eq!(fused.color_at(index), 0xC0FFEE);
    }
}

//! Map parameter configuration.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// Tuning parameters for the elevation map.
///
/// Set once at startup. The variance bands double as the clamp rule applied
/// after every mutation: values below the minimum are floored, values above
/// the maximum are marked infinite (saturated, no longer trustworthy but
/// still addressable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapParameters {
    /// Lower clamp bound for the vertical variance layer.
    ///
    /// Must be positive: it is the floor that keeps the Kalman update away
    /// from zero-variance degeneracy.
    pub min_variance: f32,

    /// Upper clamp bound for the vertical variance layer. Values above this
    /// are stored as `+inf` and the cell no longer contributes to fusion.
    pub max_variance: f32,

    /// Lower clamp bound for the horizontal variance layers. Also the value
    /// a cell's horizontal variances are (re)initialized to.
    pub min_horizontal_variance: f32,

    /// Upper clamp bound for the horizontal variance layers.
    pub max_horizontal_variance: f32,

    /// Accept/reject boundary for the Mahalanobis gate in integration.
    ///
    /// Measurements farther than this (in standard deviations) from the
    /// cell estimate are treated as outliers.
    pub mahalanobis_threshold: f32,

    /// Additive variance penalty applied to a cell that rejected a
    /// measurement. Repeated conflicts (moving objects, occlusions) inflate
    /// the cell until it is clamped out and re-initialized by fresh data.
    pub multi_height_noise: f32,

    /// Frame id carried into outbound map messages.
    pub frame_id: String,
}

impl Default for MapParameters {
    fn default() -> Self {
        Self {
            min_variance: 9.0e-6,
            max_variance: 9.0e-4,
            min_horizontal_variance: 2.5e-3,
            max_horizontal_variance: 0.5,
            mahalanobis_threshold: 2.5,
            multi_height_noise: 9.0e-6,
            frame_id: "map".to_string(),
        }
    }
}

impl MapParameters {
    /// Check the parameter set for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_variance > 0.0) || !self.min_variance.is_finite() {
            return Err(MapError::InvalidParameters(format!(
                "min_variance must be positive and finite, got {}",
                self.min_variance
            )));
        }
        if !(self.max_variance >= self.min_variance) {
            return Err(MapError::InvalidParameters(format!(
                "max_variance {} is below min_variance {}",
                self.max_variance, self.min_variance
            )));
        }
        if !(self.min_horizontal_variance > 0.0) || !self.min_horizontal_variance.is_finite() {
            return Err(MapError::InvalidParameters(format!(
                "min_horizontal_variance must be positive and finite, got {}",
                self.min_horizontal_variance
            )));
        }
        if !(self.max_horizontal_variance >= self.min_horizontal_variance) {
            return Err(MapError::InvalidParameters(format!(
                "max_horizontal_variance {} is below min_horizontal_variance {}",
                self.max_horizontal_variance, self.min_horizontal_variance
            )));
        }
        if !(self.mahalanobis_threshold > 0.0) {
            return Err(MapError::InvalidParameters(format!(
                "mahalanobis_threshold must be positive, got {}",
                self.mahalanobis_threshold
            )));
        }
        if !(self.multi_height_noise >= 0.0) || !self.multi_height_noise.is_finite() {
            return Err(MapError::InvalidParameters(format!(
                "multi_height_noise must be non-negative and finite, got {}",
                self.multi_height_noise
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_are_valid() {
        assert!(MapParameters::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_min_variance() {
        let params = MapParameters {
            min_variance: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(MapError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_band() {
        let params = MapParameters {
            min_variance: 1.0,
            max_variance: 0.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_multi_height_noise() {
        let params = MapParameters {
            multi_height_noise: -1.0e-6,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}

//! Error types for bhumi-map.

use thiserror::Error;

/// Errors surfaced by the elevation map core.
///
/// Out-of-map points and degenerate fusion cells are not errors: points
/// outside the footprint are skipped silently, degenerate cells are logged
/// and left invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// A propagation matrix does not match the grid dimensions.
    #[error("update matrix is {actual:?} but the grid is {expected:?}")]
    SizeMismatch {
        /// Grid size as (rows, cols).
        expected: (usize, usize),
        /// Offending matrix size as (rows, cols).
        actual: (usize, usize),
    },

    /// The per-point variance vector does not line up with the point cloud.
    #[error("point cloud carries {points} points but {variances} variances")]
    VarianceCountMismatch {
        /// Number of points in the cloud.
        points: usize,
        /// Number of supplied variances.
        variances: usize,
    },

    /// Side lengths or resolution passed to `set_geometry` are unusable.
    #[error("invalid map geometry: {0}")]
    InvalidGeometry(String),

    /// Map parameters failed validation.
    #[error("invalid map parameters: {0}")]
    InvalidParameters(String),
}

/// Result alias for elevation map operations.
pub type Result<T> = std::result::Result<T, MapError>;

//! Outbound map messages.
//!
//! A [`GridMapMessage`] is a self-contained value snapshot of one map,
//! ready to hand to whatever transport the application uses. Layer data is
//! unwrapped into logical order: entry `(0, 0)` is the (+x, +y) corner
//! cell, so consumers never deal with the rolling buffer offset. The
//! `start_index` the data was captured at is still carried along for
//! diagnostic purposes.

use nalgebra::{DMatrix, Vector2};
use serde::{Deserialize, Serialize};

use crate::core::GridIndex;
use crate::map::{FusedMap, RawMap};

/// Layer names used in outbound messages.
pub mod layers {
    /// Height estimate layer.
    pub const ELEVATION: &str = "elevation";
    /// Height variance layer.
    pub const VARIANCE: &str = "variance";
    /// Horizontal x variance layer (raw map only).
    pub const HORIZONTAL_VARIANCE_X: &str = "horizontal_variance_x";
    /// Horizontal y variance layer (raw map only).
    pub const HORIZONTAL_VARIANCE_Y: &str = "horizontal_variance_y";
}

/// One named float layer in logical order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapLayer {
    /// Layer name, see [`layers`].
    pub name: String,
    /// Dense cell values, `(row, col)` in logical order.
    pub data: DMatrix<f32>,
}

/// Value snapshot of a map for publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMapMessage {
    /// Frame the map is expressed in.
    pub frame_id: String,
    /// Data timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Resolution in meters per cell.
    pub resolution: f64,
    /// Footprint side lengths in meters.
    pub length: Vector2<f64>,
    /// World position of the footprint center.
    pub position: Vector2<f64>,
    /// Buffer start index at capture time, `(row, col)`.
    pub start_index: (usize, usize),
    /// Float layers in logical order.
    pub layers: Vec<MapLayer>,
    /// Packed RGB colors in logical order.
    pub color: DMatrix<u32>,
}

impl GridMapMessage {
    /// Capture a raw map (five layers).
    pub fn from_raw(map: &RawMap, frame_id: &str) -> Self {
        let geometry = map.geometry();
        let size = geometry.size();
        let layer = |f: &dyn Fn(GridIndex) -> f32| {
            DMatrix::from_fn(size.rows, size.cols, |row, col| f(GridIndex::new(row, col)))
        };
        Self {
            frame_id: frame_id.to_string(),
            timestamp_ns: map.timestamp_ns(),
            resolution: geometry.resolution(),
            length: geometry.length(),
            position: geometry.center(),
            start_index: (geometry.start_index().row, geometry.start_index().col),
            layers: vec![
                MapLayer {
                    name: layers::ELEVATION.to_string(),
                    data: layer(&|i| map.elevation_at(i)),
                },
                MapLayer {
                    name: layers::VARIANCE.to_string(),
                    data: layer(&|i| map.variance_at(i)),
                },
                MapLayer {
                    name: layers::HORIZONTAL_VARIANCE_X.to_string(),
                    data: layer(&|i| map.horizontal_variance_x_at(i)),
                },
                MapLayer {
                    name: layers::HORIZONTAL_VARIANCE_Y.to_string(),
                    data: layer(&|i| map.horizontal_variance_y_at(i)),
                },
            ],
            color: DMatrix::from_fn(size.rows, size.cols, |row, col| {
                map.color_at(GridIndex::new(row, col))
            }),
        }
    }

    /// Capture a fused map (elevation, variance and color).
    pub fn from_fused(map: &FusedMap, frame_id: &str) -> Self {
        let geometry = map.geometry();
        let size = geometry.size();
        let layer = |f: &dyn Fn(GridIndex) -> f32| {
            DMatrix::from_fn(size.rows, size.cols, |row, col| f(GridIndex::new(row, col)))
        };
        Self {
            frame_id: frame_id.to_string(),
            timestamp_ns: map.timestamp_ns(),
            resolution: geometry.resolution(),
            length: geometry.length(),
            position: geometry.center(),
            start_index: (geometry.start_index().row, geometry.start_index().col),
            layers: vec![
                MapLayer {
                    name: layers::ELEVATION.to_string(),
                    data: layer(&|i| map.elevation_at(i)),
                },
                MapLayer {
                    name: layers::VARIANCE.to_string(),
                    data: layer(&|i| map.variance_at(i)),
                },
            ],
            color: DMatrix::from_fn(size.rows, size.cols, |row, col| {
                map.color_at(GridIndex::new(row, col))
            }),
        }
    }

    /// Look up a float layer by name.
    pub fn layer(&self, name: &str) -> Option<&DMatrix<f32>> {
        self.layers
            .iter()
            .find(|layer| layer.name == name)
            .map(|layer| &layer.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_message_is_in_logical_order() {
        let mut map = RawMap::empty();
        map.set_geometry(Vector2::new(0.5, 0.5), 0.1, Vector2::zeros())
            .unwrap();
        let index = map.geometry().index_at(&Vector2::zeros()).unwrap();
        {
            let cell = map.cell_mut(index);
            *cell.elevation = 1.5;
            *cell.variance = 0.01;
            *cell.color = 0xAA;
        }
        map.set_timestamp_ns(123);
        // Roll the buffer so physical and logical order diverge.
        map.move_to(&Vector2::new(0.2, 0.0));

        let message = GridMapMessage::from_raw(&map, "odom");
        assert_eq!(message.frame_id, "odom");
        assert_eq!(message.timestamp_ns, 123);
        assert_eq!(message.start_index, (3, 0));

        // The populated cell sits at its logical index, not its buffer slot.
        let moved = map.geometry().index_at(&Vector2::zeros()).unwrap();
        let elevation = message.layer(layers::ELEVATION).unwrap();
        assert_eq!(elevation[(moved.row, moved.col)], 1.5);
        assert_eq!(message.color[(moved.row, moved.col)], 0xAA);
        assert!(elevation[(0, 0)].is_nan());
        assert!(message.layer(layers::HORIZONTAL_VARIANCE_X).is_some());
    }

    #[test]
    fn test_fused_message_has_two_float_layers() {
        let mut map = FusedMap::empty();
        map.set_geometry(Vector2::new(0.3, 0.3), 0.1, Vector2::zeros())
            .unwrap();
        let message = GridMapMessage::from_fused(&map, "map");
        assert_eq!(message.layers.len(), 2);
        assert!(message.layer(layers::HORIZONTAL_VARIANCE_X).is_none());
    }
}

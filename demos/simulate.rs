//! Drive a simulated robot over a wavy terrain and watch the map build up.
//!
//! Run with: `cargo run --example simulate` (set `RUST_LOG=debug` for the
//! engine's own logging).

use bhumi_map::{ElevationMap, MapParameters, PointCloud, VarianceUpdate};
use nalgebra::Vector2;

fn terrain_height(x: f32, y: f32) -> f32 {
    0.2 * (2.0 * x).sin() + 0.1 * (3.0 * y).cos()
}

fn main() {
    env_logger::init();

    let map = ElevationMap::new(MapParameters::default()).unwrap();
    map.set_geometry(Vector2::new(4.0, 4.0), 0.05, Vector2::zeros())
        .unwrap();
    let size = map.raw_snapshot().size();

    let mut timestamp_ns = 0u64;
    for step in 0..40 {
        // The robot creeps forward; the map follows.
        let robot_x = step as f64 * 0.05;
        map.move_to(Vector2::new(robot_x, 0.0));

        // One simulated depth frame: a regular patch ahead of the robot,
        // noisier with range.
        timestamp_ns += 50_000_000;
        let mut cloud = PointCloud::with_capacity(timestamp_ns, 400);
        let mut variances = Vec::with_capacity(400);
        for i in 0..20 {
            for j in 0..20 {
                let x = robot_x as f32 + 0.1 + i as f32 * 0.05;
                let y = -0.5 + j as f32 * 0.05;
                let range = (x * x + y * y).sqrt();
                cloud.push(x, y, terrain_height(x, y), 0x888888);
                variances.push(1.0e-4 * (1.0 + range));
            }
        }
        let summary = map.integrate(&cloud, &variances).unwrap();
        log::info!(
            "step {step}: {} points integrated, {} new cells, {} outliers",
            cloud.len(),
            summary.initialized,
            summary.outliers
        );

        // Motion uncertainty accumulated since the last frame.
        let update = VarianceUpdate::uniform(size.rows, size.cols, 1.0e-6, 5.0e-6, 5.0e-6);
        map.propagate(&update, timestamp_ns).unwrap();
    }

    let summary = map.fuse_all();
    let message = map.fused_message();
    println!(
        "fused {} cells of a {}x{} map at t = {} ns",
        summary.written(),
        message.color.nrows(),
        message.color.ncols(),
        message.timestamp_ns
    );
}

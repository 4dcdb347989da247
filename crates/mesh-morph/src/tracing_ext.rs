//! Structured logging helpers for morphology operations.
//!
//! The engines emit events through the `tracing` crate; nothing is printed
//! unless the application installs a subscriber:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//! // RUST_LOG=mesh_morph=debug for per-iteration progress
//! ```
//!
//! # Log Levels
//!
//! - **INFO**: operation summaries and timing
//! - **DEBUG**: per-level / per-iteration progress, mesh state
//! - **TRACE**: per-edge and per-vertex detail
//! - **WARN**: rejected parameters, failed validity checks

use std::time::Instant;
use tracing::span::EnteredSpan;
use tracing::{debug, info, trace};

use crate::Mesh;
use crate::quality::QualityMetrics;

/// Times an operation and logs its duration on drop.
///
/// The timer also enters an `info` span named `morph_operation`, so events
/// emitted while it is alive carry the operation name.
///
/// ```rust,ignore
/// fn expensive_operation(mesh: &Mesh) {
///     let _timer = OperationTimer::with_context("expensive", mesh.face_count(), mesh.vertex_count());
///     // ... work ...
/// } // logs "Operation completed" with elapsed_ms
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    _span: EnteredSpan,
}

impl OperationTimer {
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("morph_operation", operation = name).entered();
        debug!(target: "mesh_morph::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            _span: span,
        }
    }

    /// Create a timer whose span also records mesh size.
    pub fn with_context(name: &'static str, face_count: usize, vertex_count: usize) -> Self {
        let span = tracing::info_span!(
            "morph_operation",
            operation = name,
            faces = face_count,
            vertices = vertex_count
        )
        .entered();
        debug!(
            target: "mesh_morph::timing",
            operation = name,
            faces = face_count,
            vertices = vertex_count,
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
            _span: span,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "mesh_morph::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Operation completed"
        );
    }
}

/// Log mesh size and extent at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let (min_bounds, max_bounds) = mesh.bounds().unwrap_or_default();
    let dims = max_bounds - min_bounds;

    debug!(
        target: "mesh_morph::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        triangles = mesh.triangle_count(),
        dimensions = format!("{:.4} x {:.4} x {:.4}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log a quality summary at debug level.
pub fn log_quality(metrics: &QualityMetrics, context: &str) {
    let stats = metrics.edge_stats();
    debug!(
        target: "mesh_morph::quality",
        context = context,
        edges = metrics.edge_lengths.len(),
        mean_edge = format!("{:.6}", stats.mean),
        std_dev = format!("{:.6}", stats.std_dev),
        max_aspect_ratio = format!("{:.3}", metrics.max_aspect_ratio()),
        min_angle_deg = format!("{:.3}", metrics.min_angle().to_degrees()),
        "Mesh quality"
    );
}

/// Log an individual topology change at trace level.
pub fn log_edge_op(op: &'static str, a: u32, b: u32) {
    trace!(target: "mesh_morph::edges", op, a, b, "Edge operation");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_logging_helpers_on_empty_mesh() {
        let mesh = Mesh::new();
        log_mesh_stats(&mesh, "test");
        log_quality(&QualityMetrics::default(), "test");
        log_edge_op("split", 0, 1);
    }
}

//! Sightline - 2D stealth detection and spatial collision core
//!
//! Core modules:
//! - `sim`: Deterministic spatial simulation (broad-phase grid, collision world, raycasts, A*)
//! - `detection`: Vision cones, smoothed detection state machines and the global alert aggregator
//! - `settings`: Data-driven tuning loaded from TOML/JSON
//! - `tick`: One full frame in pipeline order (collision -> detection -> aggregation)
//!
//! Nothing in here renders, generates levels or decides win/lose; it only
//! supplies collision, sightline and detection primitives to those systems.

pub mod detection;
pub mod settings;
pub mod sim;
pub mod tick;

pub use detection::{
    AggregatorSummary, AlertState, DetectionAggregator, DetectionSource, DetectionTarget,
    SourceId, SourceRegistry,
};
pub use settings::{ConfigError, Settings};
pub use sim::{CollisionWorld, GeometryProvider, PathPlanner, Raycaster, Shape, SpatialIndex};
pub use tick::{StealthState, TickReport, tick};

use glam::Vec2;

/// Tuning constants shared across modules
pub mod consts {
    /// Fixed simulation timestep used by the demo driver (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Broad-phase grid cell size (world units); also the A* grid step
    pub const DEFAULT_CELL_SIZE: f32 = 64.0;

    /// Per-source detection history length (ring buffer)
    pub const DETECTION_HISTORY_LEN: usize = 10;
    /// Aggregator rolling mean-history length
    pub const AGGREGATE_HISTORY_LEN: usize = 30;
    /// Number of newest aggregate samples used for the alert hysteresis test
    pub const ALERT_RECENT_WINDOW: usize = 5;

    /// Upper bound of the global alert level
    pub const MAX_ALERT_LEVEL: f32 = 100.0;
    /// Upper bound of a source's suspicion meter
    pub const MAX_SUSPICION: f32 = 100.0;

    /// Smoothed detection values below this snap to zero
    pub const DETECTION_EPSILON: f32 = 1e-3;
    /// Fixed +X push applied when two dynamic bodies share a centre
    pub const COINCIDENT_PUSH: f32 = 0.01;
}

/// Unit vector pointing along `angle` (radians, 0 = +X)
#[inline]
pub fn direction_from_angle(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Angle between two vectors, safe against zero length and dot products
/// drifting outside [-1, 1].
#[inline]
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    a.dot(b).clamp(-1.0, 1.0).acos()
}

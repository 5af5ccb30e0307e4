//! Perception and alert escalation
//!
//! - `source`: one observer's vision cone, filtered detection and state machine
//! - `registry`: explicit owner of all sources, used for broadcasts
//! - `aggregator`: global alert level and visibility modifiers
//! - `target`: capability interface of whatever is being looked for

pub mod aggregator;
pub mod registry;
pub mod source;
pub mod target;

pub use aggregator::{
    AggregatorSummary, DetectionAggregator, EnvironmentZone, Escalation, ZoneFactor,
    mean_active_detection,
};
pub use registry::SourceRegistry;
pub use source::{AlertState, DetectionSource, Oscillation, SourceId, StateChange};
pub use target::{DetectionTarget, TrackedTarget};

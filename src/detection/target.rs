//! The thing being looked for
//!
//! Detection only talks to its target through `DetectionTarget`; it never
//! knows the concrete player type. Notification hooks default to no-ops so a
//! target only implements the reactions it cares about.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::source::SourceId;

/// Capability interface consumed by detection sources and the aggregator
pub trait DetectionTarget {
    /// World position used for cone and line-of-sight tests
    fn position(&self) -> Vec2;

    /// Multiplier applied to every raw detection sample (1.0 = normal)
    fn visibility_multiplier(&self) -> f32 {
        1.0
    }

    /// Visibility before environment and alert modifiers
    fn base_visibility(&self) -> f32 {
        1.0
    }

    /// Radius within which the target gives itself away; an observer whose
    /// range is shorter uses this instead
    fn detection_radius(&self) -> f32 {
        0.0
    }

    /// Receives the post-collision position of the body the target is tied to
    fn set_position(&mut self, _position: Vec2) {}

    /// Whether the target still considers itself detected by `source`
    fn is_detected_by(&self, _source: SourceId) -> bool {
        false
    }

    fn become_detected(&mut self, _source: SourceId) {}

    fn become_suspicious(&mut self, _source: SourceId) {}

    fn escape_detection(&mut self, _source: SourceId) {}
}

/// Straightforward target that records what detection told it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedTarget {
    pub position: Vec2,
    pub base_visibility: f32,
    /// Usually fed back from `DetectionAggregator::player_visibility`
    pub visibility: f32,
    pub detection_radius: f32,
    /// Source currently chasing the target, if any
    pub detected_by: Option<SourceId>,
    pub detections: u32,
    pub suspicions: u32,
    pub escapes: u32,
}

impl TrackedTarget {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            base_visibility: 1.0,
            visibility: 1.0,
            detection_radius: 0.0,
            detected_by: None,
            detections: 0,
            suspicions: 0,
            escapes: 0,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.detected_by.is_some()
    }
}

impl DetectionTarget for TrackedTarget {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn visibility_multiplier(&self) -> f32 {
        self.visibility
    }

    fn base_visibility(&self) -> f32 {
        self.base_visibility
    }

    fn detection_radius(&self) -> f32 {
        self.detection_radius
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn is_detected_by(&self, source: SourceId) -> bool {
        self.detected_by == Some(source)
    }

    fn become_detected(&mut self, source: SourceId) {
        self.detected_by = Some(source);
        self.detections += 1;
    }

    fn become_suspicious(&mut self, _source: SourceId) {
        self.suspicions += 1;
    }

    fn escape_detection(&mut self, source: SourceId) {
        if self.detected_by == Some(source) {
            self.detected_by = None;
        }
        self.escapes += 1;
    }
}

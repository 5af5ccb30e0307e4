//! A single observer: vision cone, smoothed detection and alert state machine
//!
//! Per update:
//! 1. Sweep the facing direction (optional oscillation)
//! 2. Sample: cone test, line of sight, distance falloff
//! 3. Filter: window mean of the last samples, then an exponential move
//!    toward that mean
//! 4. Drive the PATROL / INVESTIGATE / CHASE machine and notify the target on
//!    transition edges

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::target::DetectionTarget;
use crate::consts::{DETECTION_EPSILON, DETECTION_HISTORY_LEN, MAX_SUSPICION};
use crate::settings::DetectionSettings;
use crate::sim::{GeometryProvider, Raycaster};
use crate::{angle_between, direction_from_angle};

/// Stable handle of a detection source within a `SourceRegistry`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u32);

/// Observer alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertState {
    #[default]
    Patrol,
    Investigate,
    Chase,
}

/// A state change reported by `DetectionSource::update`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub source: SourceId,
    pub from: AlertState,
    pub to: AlertState,
}

/// Facing sweep: `base + sin(elapsed * speed + phase) * range / 2`, or just
/// `base` when `speed` or `range` is zero
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Oscillation {
    /// Angular frequency (radians of sine argument per second)
    pub speed: f32,
    /// Full sweep width in radians
    pub range: f32,
    pub phase: f32,
}

impl Oscillation {
    pub fn new(speed: f32, range: f32) -> Self {
        Self {
            speed,
            range,
            phase: 0.0,
        }
    }

    /// Same sweep with a random starting phase
    pub fn with_random_phase<R: Rng>(mut self, rng: &mut R) -> Self {
        self.phase = rng.random_range(0.0..std::f32::consts::TAU);
        self
    }

    /// A sweep with no speed or no width stays on the base direction,
    /// whatever its phase.
    #[inline]
    fn offset(&self, elapsed: f32) -> f32 {
        if self.speed == 0.0 || self.range == 0.0 {
            return 0.0;
        }
        (elapsed * self.speed + self.phase).sin() * (self.range / 2.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSource {
    pub id: SourceId,
    pub position: Vec2,
    /// Facing in radians, 0 = +X
    pub base_direction: f32,
    pub vision_range: f32,
    /// Half the cone's opening angle, in radians
    pub half_angle: f32,
    pub oscillation: Option<Oscillation>,
    tuning: DetectionSettings,
    elapsed: f32,
    history: VecDeque<f32>,
    instantaneous: f32,
    smoothed: f32,
    suspicion: f32,
    state: AlertState,
}

impl DetectionSource {
    /// New source; the id is assigned when it is inserted into a registry.
    pub fn new(position: Vec2, base_direction: f32, vision_range: f32, half_angle: f32) -> Self {
        Self {
            id: SourceId(0),
            position,
            base_direction,
            vision_range: vision_range.max(0.0),
            half_angle: half_angle.abs(),
            oscillation: None,
            tuning: DetectionSettings::default(),
            elapsed: 0.0,
            history: VecDeque::with_capacity(DETECTION_HISTORY_LEN),
            instantaneous: 0.0,
            smoothed: 0.0,
            suspicion: 0.0,
            state: AlertState::Patrol,
        }
    }

    pub fn with_oscillation(mut self, oscillation: Oscillation) -> Self {
        self.oscillation = Some(oscillation);
        self
    }

    pub fn with_tuning(mut self, tuning: DetectionSettings) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Filtered detection confidence in [0, 1]
    pub fn smoothed_detection(&self) -> f32 {
        self.smoothed
    }

    /// Last raw sample before filtering
    pub fn instantaneous_detection(&self) -> f32 {
        self.instantaneous
    }

    /// Display-only suspicion meter in [0, 100]
    pub fn suspicion(&self) -> f32 {
        self.suspicion
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Facing after oscillation, in radians
    pub fn current_direction(&self) -> f32 {
        match &self.oscillation {
            Some(osc) => self.base_direction + osc.offset(self.elapsed),
            None => self.base_direction,
        }
    }

    /// Effective reach: the target's own detection radius can extend it
    #[inline]
    pub fn effective_range(&self, target_radius: f32) -> f32 {
        self.vision_range.max(target_radius)
    }

    /// Range and angle test against the current facing
    pub fn is_in_cone(&self, point: Vec2, target_radius: f32) -> bool {
        let to_target = point - self.position;
        let distance = to_target.length();
        if distance > self.effective_range(target_radius) {
            return false;
        }
        if distance <= f32::EPSILON {
            // Standing on the observer
            return true;
        }
        let forward = direction_from_angle(self.current_direction());
        angle_between(forward, to_target) <= self.half_angle
    }

    /// Raw detection sample for the current facing, without filtering
    pub fn sample<T: DetectionTarget + ?Sized>(
        &self,
        target: &T,
        geometry: Option<&dyn GeometryProvider>,
    ) -> f32 {
        let target_pos = target.position();
        let radius = target.detection_radius();
        if !self.is_in_cone(target_pos, radius) {
            return 0.0;
        }

        let distance = self.position.distance(target_pos);
        if let Some(geometry) = geometry {
            let obstacles = geometry.obstacles_near(self.position, distance);
            if !Raycaster::has_line_of_sight(self.position, target_pos, &obstacles) {
                return 0.0;
            }
        }

        let range = self.effective_range(radius);
        let falloff = if range > 0.0 {
            0.5 + 0.5 * (1.0 - distance / range)
        } else {
            1.0
        };
        (target.visibility_multiplier() * falloff).clamp(0.0, 1.0)
    }

    /// Push one raw sample through the two-stage filter and return the new
    /// smoothed value.
    pub fn record_sample(&mut self, sample: f32, dt: f32) -> f32 {
        let sample = if sample.is_finite() { sample.clamp(0.0, 1.0) } else { 0.0 };
        self.instantaneous = sample;
        if self.history.len() == DETECTION_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        let mean = self.history.iter().sum::<f32>() / self.history.len() as f32;
        let alpha = 1.0 - (-self.tuning.smoothing_rate * dt.max(0.0)).exp();
        self.smoothed += (mean - self.smoothed) * alpha;
        if mean == 0.0 && self.smoothed < DETECTION_EPSILON {
            self.smoothed = 0.0;
        }
        self.smoothed = self.smoothed.clamp(0.0, 1.0);

        if self.smoothed > 0.0 {
            self.suspicion += self.smoothed * self.tuning.suspicion_gain * dt;
        } else {
            self.suspicion -= self.tuning.suspicion_decay * dt;
        }
        self.suspicion = self.suspicion.clamp(0.0, MAX_SUSPICION);

        self.smoothed
    }

    /// Advance one tick. Without a target nothing happens.
    pub fn update<T: DetectionTarget + ?Sized>(
        &mut self,
        dt: f32,
        target: Option<&mut T>,
        geometry: Option<&dyn GeometryProvider>,
    ) -> Option<StateChange> {
        let target = target?;
        self.elapsed += dt;

        let sample = self.sample(&*target, geometry);
        self.record_sample(sample, dt);
        self.step_state(target)
    }

    fn step_state<T: DetectionTarget + ?Sized>(&mut self, target: &mut T) -> Option<StateChange> {
        let from = self.state;
        let chase = self.tuning.chase_threshold;
        let investigate = self.tuning.investigate_threshold;

        if self.smoothed > chase {
            if from != AlertState::Chase {
                self.state = AlertState::Chase;
                target.become_detected(self.id);
            }
        } else if self.smoothed > investigate {
            if from == AlertState::Patrol {
                self.state = AlertState::Investigate;
                target.become_suspicious(self.id);
            }
        } else if from != AlertState::Patrol {
            if from == AlertState::Chase && target.is_detected_by(self.id) {
                target.escape_detection(self.id);
            }
            self.state = AlertState::Patrol;
        }

        (self.state != from).then(|| {
            log::debug!("Source {:?}: {:?} -> {:?} ({:.2})", self.id, from, self.state, self.smoothed);
            StateChange {
                source: self.id,
                from,
                to: self.state,
            }
        })
    }

    /// External alert: suspicion maxes out and the source is at least
    /// investigating. Returns the change, if any.
    pub fn force_alert(&mut self) -> Option<StateChange> {
        self.suspicion = MAX_SUSPICION;
        if self.state != AlertState::Patrol {
            return None;
        }
        self.state = AlertState::Investigate;
        Some(StateChange {
            source: self.id,
            from: AlertState::Patrol,
            to: AlertState::Investigate,
        })
    }

    #[cfg(test)]
    pub(crate) fn set_smoothed(&mut self, value: f32) {
        self.smoothed = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::target::TrackedTarget;
    use crate::sim::Shape;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use std::f32::consts::PI;

    const DT: f32 = 1.0 / 60.0;

    fn guard() -> DetectionSource {
        DetectionSource::new(Vec2::ZERO, 0.0, 200.0, PI / 4.0)
    }

    #[test]
    fn test_cone_scenarios() {
        let source = guard();
        assert!(source.is_in_cone(Vec2::new(100.0, 0.0), 0.0));
        // 180.3 away is in range, but 56.3 degrees off-axis
        let off_axis = Vec2::new(100.0, 150.0);
        assert!(off_axis.length() < 200.0);
        assert!(!source.is_in_cone(off_axis, 0.0));
        assert!(!source.is_in_cone(Vec2::new(250.0, 0.0), 0.0));
    }

    #[test]
    fn test_target_radius_extends_range() {
        let source = guard();
        assert!(!source.is_in_cone(Vec2::new(250.0, 0.0), 0.0));
        assert!(source.is_in_cone(Vec2::new(250.0, 0.0), 300.0));
    }

    #[test]
    fn test_falloff() {
        let source = guard();
        let near = TrackedTarget::new(Vec2::new(0.5, 0.0));
        let mid = TrackedTarget::new(Vec2::new(100.0, 0.0));
        let edge = TrackedTarget::new(Vec2::new(200.0, 0.0));
        assert!((source.sample(&near, None) - 1.0).abs() < 0.01);
        assert!((source.sample(&mid, None) - 0.75).abs() < 0.001);
        assert!((source.sample(&edge, None) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_wall_blocks_sample() {
        let source = guard();
        let target = TrackedTarget::new(Vec2::new(100.0, 0.0));
        let walls: Vec<Shape> = vec![Shape::aabb(40.0, -20.0, 10.0, 40.0)];
        assert_eq!(source.sample(&target, Some(&walls)), 0.0);
        // No geometry provider: line of sight defaults to clear
        assert!(source.sample(&target, None) > 0.0);
    }

    #[test]
    fn test_oscillation_disabled_keeps_base_direction() {
        let mut source = DetectionSource::new(Vec2::ZERO, 1.25, 200.0, 0.5);
        let mut target = TrackedTarget::new(Vec2::new(-500.0, 0.0));
        for _ in 0..100 {
            source.update(0.37, Some(&mut target), None);
            assert_eq!(source.current_direction(), 1.25);
        }

        // Zero speed or zero width, even with a random phase
        let mut rng = rand_pcg::Pcg32::seed_from_u64(1);
        let sweeps = [
            Oscillation::new(0.0, PI / 2.0).with_random_phase(&mut rng),
            Oscillation::new(2.0, 0.0).with_random_phase(&mut rng),
        ];
        for sweep in sweeps {
            assert!(sweep.phase != 0.0);
            let mut source = DetectionSource::new(Vec2::ZERO, 0.0, 200.0, 0.5).with_oscillation(sweep);
            for _ in 0..50 {
                source.update(0.1, Some(&mut target), None);
                assert_eq!(source.current_direction(), 0.0);
            }
        }
    }

    #[test]
    fn test_oscillation_sweeps_within_range() {
        let osc = Oscillation::new(2.0, PI / 2.0);
        let mut source = guard().with_oscillation(osc);
        let mut target = TrackedTarget::new(Vec2::new(-500.0, 0.0));
        let mut moved = false;
        for _ in 0..120 {
            source.update(DT, Some(&mut target), None);
            let dir = source.current_direction();
            assert!(dir.abs() <= PI / 4.0 + 1e-4);
            moved |= dir.abs() > 0.1;
        }
        assert!(moved);
    }

    #[test]
    fn test_random_phase_is_seeded() {
        let mut a = rand_pcg::Pcg32::seed_from_u64(7);
        let mut b = rand_pcg::Pcg32::seed_from_u64(7);
        let pa = Oscillation::new(1.0, 1.0).with_random_phase(&mut a).phase;
        let pb = Oscillation::new(1.0, 1.0).with_random_phase(&mut b).phase;
        assert_eq!(pa, pb);
        assert!((0.0..std::f32::consts::TAU).contains(&pa));
    }

    #[test]
    fn test_no_target_is_noop() {
        let mut source = guard();
        let change = source.update::<TrackedTarget>(DT, None, None);
        assert!(change.is_none());
        assert_eq!(source.history_len(), 0);
        assert_eq!(source.smoothed_detection(), 0.0);
    }

    #[test]
    fn test_history_capped() {
        let mut source = guard();
        for _ in 0..25 {
            source.record_sample(0.5, DT);
        }
        assert_eq!(source.history_len(), DETECTION_HISTORY_LEN);
    }

    #[test]
    fn test_chase_edge_fires_once() {
        let mut source = guard();
        source.id = SourceId(3);
        let mut target = TrackedTarget::new(Vec2::new(10.0, 0.0));
        let mut changes = Vec::new();
        for _ in 0..120 {
            if let Some(change) = source.update(DT, Some(&mut target), None) {
                changes.push(change);
            }
        }
        assert_eq!(source.state(), AlertState::Chase);
        assert_eq!(target.detections, 1);
        assert_eq!(target.detected_by, Some(SourceId(3)));
        // Passing through INVESTIGATE on the way up notifies suspicion once
        assert_eq!(target.suspicions, 1);
        assert_eq!(changes.last().map(|c| c.to), Some(AlertState::Chase));
    }

    #[test]
    fn test_losing_target_downgrades_it() {
        let mut source = guard();
        let mut target = TrackedTarget::new(Vec2::new(10.0, 0.0));
        for _ in 0..120 {
            source.update(DT, Some(&mut target), None);
        }
        assert!(target.is_detected());

        // Step out of the cone and wait for the filter to drain
        target.position = Vec2::new(-100.0, 0.0);
        for _ in 0..300 {
            source.update(DT, Some(&mut target), None);
        }
        assert_eq!(source.state(), AlertState::Patrol);
        assert_eq!(source.smoothed_detection(), 0.0);
        assert!(!target.is_detected());
        assert_eq!(target.escapes, 1);
    }

    #[test]
    fn test_middle_band_holds_chase() {
        let mut source = guard();
        let mut target = TrackedTarget::new(Vec2::ZERO);
        source.set_smoothed(0.9);
        source.step_state(&mut target);
        assert_eq!(source.state(), AlertState::Chase);

        source.set_smoothed(0.5);
        assert!(source.step_state(&mut target).is_none());
        assert_eq!(source.state(), AlertState::Chase);
    }

    #[test]
    fn test_suspicion_rises_and_decays() {
        let mut source = guard();
        for _ in 0..60 {
            source.record_sample(1.0, DT);
        }
        let peak = source.suspicion();
        assert!(peak > 0.0);
        for _ in 0..600 {
            source.record_sample(0.0, DT);
        }
        assert_eq!(source.suspicion(), 0.0);
    }

    #[test]
    fn test_suspicion_rates() {
        // Smoothing disabled so the smoothed value stays where it is put
        let tuning = DetectionSettings {
            smoothing_rate: 0.0,
            ..DetectionSettings::default()
        };
        let mut source = guard().with_tuning(tuning);
        source.set_smoothed(0.5);
        for _ in 0..60 {
            source.record_sample(0.5, DT);
        }
        // 1 s at 0.5 smoothed: 0.5 * 30
        assert!((source.suspicion() - 15.0).abs() < 0.01);

        source.set_smoothed(0.0);
        for _ in 0..30 {
            source.record_sample(0.0, DT);
        }
        // 0.5 s at the flat 20/s decay
        assert!((source.suspicion() - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_force_alert() {
        let mut source = guard();
        let change = source.force_alert().unwrap();
        assert_eq!(change.to, AlertState::Investigate);
        assert_eq!(source.suspicion(), MAX_SUSPICION);

        source.state = AlertState::Chase;
        assert!(source.force_alert().is_none());
        assert_eq!(source.state(), AlertState::Chase);
    }

    proptest! {
        #[test]
        fn prop_constant_sample_converges_without_overshoot(
            v in 0.0f32..=1.0,
            dt in 0.001f32..0.2,
        ) {
            let mut source = guard();
            let mut previous = source.smoothed_detection();
            for _ in 0..DETECTION_HISTORY_LEN {
                let smoothed = source.record_sample(v, dt);
                prop_assert!(smoothed >= previous - 1e-6);
                prop_assert!(smoothed <= v + 1e-6);
                previous = smoothed;
            }
        }

        #[test]
        fn prop_smoothed_stays_in_unit_range(samples in prop::collection::vec(-1.0f32..4.0, 1..60)) {
            let mut source = guard();
            for s in samples {
                let smoothed = source.record_sample(s, DT);
                prop_assert!((0.0..=1.0).contains(&smoothed));
                prop_assert!((0.0..=MAX_SUSPICION).contains(&source.suspicion()));
            }
        }
    }
}

//! Global alert level from many observers
//!
//! Runs on its own cadence (default every 0.1 s of simulated time), at most
//! once per call:
//! 1. Mean smoothed detection over sources that currently see something
//! 2. Rolling window of those means
//! 3. Alert level rises above the upper band, falls below the lower band,
//!    holds in between
//! 4. Escalation when the alert level is high and the cooldown has passed
//!
//! It also owns the environmental modifiers (lighting, noise, cover) that
//! scale the target's visibility.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::registry::SourceRegistry;
use super::source::{AlertState, SourceId, StateChange};
use super::target::DetectionTarget;
use crate::consts::{AGGREGATE_HISTORY_LEN, ALERT_RECENT_WINDOW, MAX_ALERT_LEVEL};
use crate::settings::AggregatorSettings;
use crate::sim::Shape;

/// Which visibility multiplier a zone contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneFactor {
    Lighting,
    Noise,
    Cover,
}

/// Region of the level that scales visibility while the target is inside
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentZone {
    pub shape: Shape,
    pub factor: ZoneFactor,
    pub multiplier: f32,
}

impl EnvironmentZone {
    pub fn new(shape: Shape, factor: ZoneFactor, multiplier: f32) -> Self {
        Self {
            shape,
            factor,
            multiplier: multiplier.max(0.0),
        }
    }
}

/// Fired when the alert level forces every source on alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub alert_level: f32,
    /// Aggregator clock (seconds) at which it fired
    pub time: f64,
    /// Sources that moved from PATROL to INVESTIGATE because of it
    pub changes: Vec<StateChange>,
}

/// HUD snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorSummary {
    pub total_sources: usize,
    /// Sources whose smoothed detection is above zero
    pub active_detectors: usize,
    pub alert_level: f32,
    pub mean_detection: f32,
    pub chasing: usize,
    pub investigating: usize,
    pub lighting: f32,
    pub noise: f32,
    pub cover: f32,
    pub visibility: f32,
}

/// Average over non-zero values only; zeros count toward neither sum nor
/// count. Empty or all-zero input gives 0.
pub fn mean_active_detection(values: impl IntoIterator<Item = f32>) -> f32 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| *v > 0.0)
        .fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}

#[derive(Debug, Clone)]
pub struct DetectionAggregator {
    sources: Vec<SourceId>,
    zones: Vec<EnvironmentZone>,
    history: VecDeque<f32>,
    alert_level: f32,
    mean_detection: f32,
    lighting: f32,
    noise: f32,
    cover: f32,
    base_visibility: f32,
    clock: f64,
    last_run: f64,
    last_escalation: Option<f64>,
    tuning: AggregatorSettings,
}

impl Default for DetectionAggregator {
    fn default() -> Self {
        Self::new(AggregatorSettings::default())
    }
}

impl DetectionAggregator {
    pub fn new(tuning: AggregatorSettings) -> Self {
        Self {
            sources: Vec::new(),
            zones: Vec::new(),
            history: VecDeque::with_capacity(AGGREGATE_HISTORY_LEN),
            alert_level: 0.0,
            mean_detection: 0.0,
            lighting: 1.0,
            noise: 1.0,
            cover: 1.0,
            base_visibility: 1.0,
            clock: 0.0,
            last_run: 0.0,
            last_escalation: None,
            tuning,
        }
    }

    pub fn add_source(&mut self, id: SourceId) {
        if let Err(pos) = self.sources.binary_search(&id) {
            self.sources.insert(pos, id);
        }
    }

    pub fn remove_source(&mut self, id: SourceId) -> bool {
        match self.sources.binary_search(&id) {
            Ok(pos) => {
                self.sources.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn add_zone(&mut self, zone: EnvironmentZone) {
        self.zones.push(zone);
    }

    pub fn clear_zones(&mut self) {
        self.zones.clear();
    }

    pub fn alert_level(&self) -> f32 {
        self.alert_level
    }

    /// Mean computed by the most recent evaluation
    pub fn mean_detection(&self) -> f32 {
        self.mean_detection
    }

    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }

    /// Seconds of simulated time seen by this aggregator
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Advance the clock by `dt` and evaluate if the cadence allows it.
    ///
    /// Without a target only the clock moves. Sources that were removed from
    /// the registry are skipped. Returns the escalation if one fired during
    /// this call.
    pub fn update<T: DetectionTarget + ?Sized>(
        &mut self,
        dt: f32,
        registry: &mut SourceRegistry,
        target: Option<&T>,
    ) -> Option<Escalation> {
        self.clock += f64::from(dt.max(0.0));
        let elapsed = self.clock - self.last_run;
        // Small slack so accumulated float error does not skip a due run
        if elapsed + 1e-6 < f64::from(self.tuning.update_interval) {
            return None;
        }
        self.last_run = self.clock;

        // Nobody to observe: sources are frozen, so their stale values must
        // not feed the alert level. The slot is still consumed.
        let target = target?;
        self.refresh_environment(target);

        let mean = mean_active_detection(
            self.sources
                .iter()
                .filter_map(|id| registry.get(*id))
                .map(|s| s.smoothed_detection()),
        );
        self.mean_detection = mean;
        self.push_history(mean);
        self.step_alert(elapsed as f32);

        self.try_escalate(registry)
    }

    fn push_history(&mut self, mean: f32) {
        if self.history.len() == AGGREGATE_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(mean);
    }

    fn step_alert(&mut self, elapsed: f32) {
        let window = self.history.len().min(ALERT_RECENT_WINDOW);
        let recent = if window == 0 {
            0.0
        } else {
            self.history.iter().rev().take(window).sum::<f32>() / window as f32
        };

        if recent > self.tuning.rise_threshold {
            self.alert_level += self.tuning.rise_rate * elapsed;
        } else if recent < self.tuning.fall_threshold {
            self.alert_level -= self.tuning.fall_rate * elapsed;
        }
        self.alert_level = self.alert_level.clamp(0.0, MAX_ALERT_LEVEL);
    }

    fn try_escalate(&mut self, registry: &mut SourceRegistry) -> Option<Escalation> {
        if self.alert_level <= self.tuning.escalation_threshold {
            return None;
        }
        let cooldown = f64::from(self.tuning.escalation_cooldown);
        if self
            .last_escalation
            .is_some_and(|at| self.clock - at < cooldown)
        {
            return None;
        }

        let mut changes: Vec<StateChange> = Vec::new();
        for id in &self.sources {
            if let Some(change) = registry.get_mut(*id).and_then(|s| s.force_alert()) {
                changes.push(change);
            }
        }
        self.last_escalation = Some(self.clock);
        log::info!(
            "Global escalation at alert level {:.1} ({} sources raised)",
            self.alert_level,
            changes.len()
        );
        Some(Escalation {
            alert_level: self.alert_level,
            time: self.clock,
            changes,
        })
    }

    fn refresh_environment<T: DetectionTarget + ?Sized>(&mut self, target: &T) {
        self.lighting = 1.0;
        self.noise = 1.0;
        self.cover = 1.0;
        self.base_visibility = target.base_visibility();

        let pos = target.position();
        for zone in self.zones.iter().filter(|z| z.shape.contains_point(pos)) {
            match zone.factor {
                ZoneFactor::Lighting => self.lighting *= zone.multiplier,
                ZoneFactor::Noise => self.noise *= zone.multiplier,
                ZoneFactor::Cover => self.cover *= zone.multiplier,
            }
        }
    }

    /// Target visibility after environment and alert surcharge
    pub fn player_visibility(&self) -> f32 {
        let surcharge =
            1.0 + self.tuning.alert_visibility_surcharge * (self.alert_level / MAX_ALERT_LEVEL);
        let raw = self.base_visibility * self.lighting * self.noise * self.cover * surcharge;
        raw.clamp(self.tuning.min_visibility, self.tuning.max_visibility)
    }

    pub fn summary(&self, registry: &SourceRegistry) -> AggregatorSummary {
        let tracked: Vec<_> = self
            .sources
            .iter()
            .filter_map(|id| registry.get(*id))
            .collect();
        let count_state = |state: AlertState| tracked.iter().filter(|s| s.state() == state).count();

        AggregatorSummary {
            total_sources: tracked.len(),
            active_detectors: tracked.iter().filter(|s| s.smoothed_detection() > 0.0).count(),
            alert_level: self.alert_level,
            mean_detection: self.mean_detection,
            chasing: count_state(AlertState::Chase),
            investigating: count_state(AlertState::Investigate),
            lighting: self.lighting,
            noise: self.noise,
            cover: self.cover,
            visibility: self.player_visibility(),
        }
    }
}

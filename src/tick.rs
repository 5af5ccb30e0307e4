//! One simulation frame
//!
//! Order is fixed: the collision world integrates and resolves first, then
//! every detection source samples the post-collision positions, then the
//! aggregator gets its chance to run. Nothing yields mid-tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::detection::{
    DetectionAggregator, DetectionSource, DetectionTarget, Escalation, SourceId, SourceRegistry,
    StateChange,
};
use crate::settings::Settings;
use crate::sim::{CollisionWorld, EntityId, GeometryProvider, PathPlanner, Shape, WorldEvent};

/// Everything a frame touches
#[derive(Debug)]
pub struct StealthState {
    pub world: CollisionWorld,
    pub sources: SourceRegistry,
    pub aggregator: DetectionAggregator,
    pub planner: PathPlanner,
    /// World body whose position is copied onto the target each tick
    pub target_body: Option<EntityId>,
    settings: Settings,
}

/// What happened during one `tick`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub events: Vec<WorldEvent>,
    pub transitions: Vec<StateChange>,
    pub escalation: Option<Escalation>,
    /// Target visibility after this frame's aggregator state
    pub visibility: f32,
}

impl Default for StealthState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl StealthState {
    pub fn new(settings: Settings) -> Self {
        log::info!(
            "Stealth state: cell {} / {} expansions / aggregator every {}s",
            settings.collision.cell_size,
            settings.path.max_expansions,
            settings.aggregator.update_interval
        );
        Self {
            world: CollisionWorld::new(&settings.collision),
            sources: SourceRegistry::new(),
            aggregator: DetectionAggregator::new(settings.aggregator.clone()),
            planner: PathPlanner::from_settings(&settings),
            target_body: None,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register a source with the registry and the aggregator, using the
    /// configured detection tuning.
    pub fn add_source(&mut self, source: DetectionSource) -> SourceId {
        let id = self
            .sources
            .insert(source.with_tuning(self.settings.detection.clone()));
        self.aggregator.add_source(id);
        id
    }

    pub fn remove_source(&mut self, id: SourceId) -> Option<DetectionSource> {
        self.aggregator.remove_source(id);
        self.sources.remove(id)
    }

    /// Path through the current static geometry
    pub fn find_path(&self, start: Vec2, end: Vec2, avoid: &[Shape]) -> Vec<Vec2> {
        self.planner.find_path(start, end, Some(&self.world), avoid)
    }
}

/// Advance everything by `dt` seconds.
pub fn tick<T: DetectionTarget + ?Sized>(
    state: &mut StealthState,
    mut target: Option<&mut T>,
    dt: f32,
) -> TickReport {
    state.world.update(dt);
    let events = state.world.drain_events();

    if let (Some(body), Some(target)) = (state.target_body, target.as_deref_mut()) {
        match state.world.entity(body) {
            Some(entity) => target.set_position(entity.center()),
            None => log::warn!("Target body {:?} is no longer in the world", body),
        }
    }

    let geometry: &dyn GeometryProvider = &state.world;
    let transitions = state
        .sources
        .update_all(dt, target.as_deref_mut(), Some(geometry));

    let escalation = state
        .aggregator
        .update(dt, &mut state.sources, target.as_deref());

    log::trace!(
        "tick: {} events, {} transitions, alert {:.1}",
        events.len(),
        transitions.len(),
        state.aggregator.alert_level()
    );

    TickReport {
        events,
        transitions,
        escalation,
        visibility: state.aggregator.player_visibility(),
    }
}

//! End-to-end frames: collision, detection and aggregation together

use std::f32::consts::PI;

use glam::Vec2;
use sightline::consts::SIM_DT;
use sightline::detection::{AlertState, DetectionSource, TrackedTarget};
use sightline::sim::{EntityId, Shape};
use sightline::{Settings, StealthState, tick};

fn run(state: &mut StealthState, target: &mut TrackedTarget, seconds: f32) {
    let frames = (seconds / SIM_DT).round() as usize;
    for _ in 0..frames {
        let report = tick(state, Some(&mut *target), SIM_DT);
        target.visibility = report.visibility.min(1.0);
    }
}

fn guarded_corridor() -> (StealthState, EntityId) {
    let mut state = StealthState::default();
    state.add_source(DetectionSource::new(Vec2::ZERO, 0.0, 300.0, PI / 4.0));
    state.world.add_static_collider(Shape::aabb(100.0, -50.0, 20.0, 100.0));
    let body = state.world.add_entity(
        state
            .world
            .make_entity(Vec2::new(200.0, 0.0), Some(Shape::circle(0.0, 0.0, 5.0))),
    );
    state.target_body = Some(body);
    (state, body)
}

fn teleport(state: &mut StealthState, body: EntityId, pos: Vec2) {
    if let Some(entity) = state.world.entity_mut(body) {
        entity.pos = pos;
        entity.vel = Vec2::ZERO;
    }
}

#[test]
fn test_hide_spotted_escape() {
    let (mut state, body) = guarded_corridor();
    let mut target = TrackedTarget::new(Vec2::ZERO);

    // Behind the wall
    run(&mut state, &mut target, 1.0);
    let guard = state.sources.iter().next().unwrap();
    assert_eq!(guard.state(), AlertState::Patrol);
    assert_eq!(guard.smoothed_detection(), 0.0);
    assert_eq!(target.position, Vec2::new(200.0, 0.0));

    // In the open, close and inside the cone
    teleport(&mut state, body, Vec2::new(70.0, 60.0));
    run(&mut state, &mut target, 2.0);
    let guard = state.sources.iter().next().unwrap();
    assert_eq!(guard.state(), AlertState::Chase);
    assert!(target.is_detected());
    assert_eq!(target.detections, 1);
    assert!(state.aggregator.alert_level() > 0.0);

    // Back behind cover
    teleport(&mut state, body, Vec2::new(200.0, 0.0));
    run(&mut state, &mut target, 5.0);
    let guard = state.sources.iter().next().unwrap();
    assert_eq!(guard.state(), AlertState::Patrol);
    assert!(!target.is_detected());
    assert_eq!(target.escapes, 1);

    let summary = state.aggregator.summary(&state.sources);
    assert_eq!(summary.total_sources, 1);
    assert_eq!(summary.active_detectors, 0);
    assert_eq!(summary.chasing, 0);
}

#[test]
fn test_body_cannot_walk_through_wall() {
    let (mut state, body) = guarded_corridor();
    teleport(&mut state, body, Vec2::new(60.0, 0.0));
    let mut target = TrackedTarget::new(Vec2::ZERO);

    for _ in 0..180 {
        if let Some(entity) = state.world.entity_mut(body) {
            entity.vel = Vec2::new(120.0, 0.0);
        }
        tick(&mut state, Some(&mut target), SIM_DT);

        let entity = state.world.entity(body).unwrap();
        // Circle of radius 5 stays left of the wall face at x = 100
        assert!(entity.pos.x <= 95.0 + 1e-3, "body at {:?}", entity.pos);
    }
}

#[test]
fn test_settings_drive_pipeline() {
    let settings = Settings::from_toml_str(
        r#"
        [aggregator]
        update_interval = 0.5

        [detection]
        chase_threshold = 0.95
        "#,
    )
    .unwrap();
    let mut state = StealthState::new(settings);
    state.add_source(DetectionSource::new(Vec2::ZERO, 0.0, 300.0, PI / 4.0));
    let mut target = TrackedTarget::new(Vec2::new(70.0, 0.0));

    run(&mut state, &mut target, 2.0);
    // Four evaluations in two seconds at the slower cadence
    assert_eq!(state.aggregator.history().count(), 4);
    // 0.88 is no longer enough to chase with the raised threshold
    let guard = state.sources.iter().next().unwrap();
    assert_eq!(guard.state(), AlertState::Investigate);

    let json = serde_json::to_string(&state.aggregator.summary(&state.sources)).unwrap();
    assert!(json.contains("\"alert_level\""));
    assert!(json.contains("\"investigating\":1"));
}

//! Sightline demo driver
//!
//! Headless scenario: an intruder walks an A* route through a guarded room
//! while the detection pipeline runs at a fixed 60 Hz.
//!
//! Usage: `sightline [settings.toml|settings.json] [seed]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    demo::run(std::env::args().skip(1).collect());
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host game loop on the web
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::f32::consts::PI;

    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use sightline::consts::SIM_DT;
    use sightline::detection::{
        AlertState, DetectionSource, EnvironmentZone, Oscillation, TrackedTarget, ZoneFactor,
    };
    use sightline::sim::{Shape, Trigger, WorldEvent};
    use sightline::{Settings, StealthState, tick};

    /// Seconds of simulated time
    const RUN_SECONDS: f32 = 20.0;
    /// Intruder walking speed (units/s)
    const WALK_SPEED: f32 = 90.0;
    /// Radius of the "call for help" broadcast when a guard starts chasing
    const SHOUT_RADIUS: f32 = 250.0;
    const DEFAULT_SEED: u64 = 42;

    pub fn run(args: Vec<String>) {
        let settings = match args.first() {
            Some(path) => match Settings::load(path) {
                Ok(settings) => settings,
                Err(e) => {
                    log::error!("Failed to load settings from {}: {}, using defaults", path, e);
                    Settings::default()
                }
            },
            None => Settings::default(),
        };
        let seed = args
            .get(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEED);
        log::info!("Sightline demo starting (seed {})", seed);

        let mut state = StealthState::new(settings);
        let mut rng = Pcg32::seed_from_u64(seed);
        build_level(&mut state, &mut rng);

        let start = Vec2::new(40.0, 40.0);
        let exit = Vec2::new(560.0, 360.0);
        let body = state.world.add_entity(
            state
                .world
                .make_entity(start, Some(Shape::circle(0.0, 0.0, 8.0)))
                .with_friction(0.0),
        );
        state.target_body = Some(body);
        let mut intruder = TrackedTarget::new(start);
        intruder.detection_radius = 24.0;

        let route = state.find_path(start, exit, &[]);
        if route.is_empty() {
            log::warn!("No route from {:?} to {:?}; the intruder will stand still", start, exit);
        } else {
            log::info!("Intruder route has {} waypoints", route.len());
        }
        let mut next_waypoint = 0;

        let ticks = (RUN_SECONDS / SIM_DT) as usize;
        for frame in 0..ticks {
            // Steer toward the current waypoint
            if let Some(entity) = state.world.entity_mut(body) {
                while next_waypoint < route.len()
                    && entity.pos.distance(route[next_waypoint]) < WALK_SPEED * SIM_DT
                {
                    next_waypoint += 1;
                }
                entity.vel = match route.get(next_waypoint) {
                    Some(waypoint) => (*waypoint - entity.pos).normalize_or_zero() * WALK_SPEED,
                    None => Vec2::ZERO,
                };
            }

            let report = tick(&mut state, Some(&mut intruder), SIM_DT);
            intruder.visibility = report.visibility;

            for event in &report.events {
                if let WorldEvent::TriggerEntered { .. } = event {
                    log::info!("Intruder reached the exit at t={:.2}s", frame as f32 * SIM_DT);
                }
            }
            for change in &report.transitions {
                log::info!(
                    "t={:.2}s guard {:?}: {:?} -> {:?}",
                    frame as f32 * SIM_DT,
                    change.source,
                    change.from,
                    change.to
                );
                if change.to == AlertState::Chase {
                    if let Some(pos) = state.sources.get(change.source).map(|s| s.position) {
                        let reached = state.sources.alert_nearby(pos, SHOUT_RADIUS);
                        log::info!("Guard {:?} shouts; {} guards alerted", change.source, reached);
                    }
                }
            }
            if let Some(escalation) = &report.escalation {
                log::warn!(
                    "Global escalation at alert {:.1} ({} guards raised)",
                    escalation.alert_level,
                    escalation.changes.len()
                );
            }
        }

        let summary = state.aggregator.summary(&state.sources);
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => log::info!("Final summary:\n{}", json),
            Err(e) => log::error!("Failed to serialize summary: {}", e),
        }
        log::info!(
            "Intruder {} (detected {} times, escaped {} times)",
            if intruder.is_detected() { "caught" } else { "unseen" },
            intruder.detections,
            intruder.escapes
        );
    }

    fn build_level(state: &mut StealthState, rng: &mut Pcg32) {
        // 600 x 400 room with 10-unit walls and two pillars
        let walls = [
            Shape::aabb(-10.0, -10.0, 620.0, 10.0),
            Shape::aabb(-10.0, 400.0, 620.0, 10.0),
            Shape::aabb(-10.0, 0.0, 10.0, 400.0),
            Shape::aabb(600.0, 0.0, 10.0, 400.0),
            Shape::aabb(200.0, 0.0, 40.0, 260.0),
            Shape::aabb(380.0, 140.0, 40.0, 260.0),
        ];
        for wall in walls {
            state.world.add_static_collider(wall);
        }

        state.world.add_trigger(
            Trigger::new(Shape::aabb(540.0, 340.0, 60.0, 60.0))
                .on_enter(|entity| log::debug!("Exit trigger tripped by {:?}", entity)),
        );

        state.aggregator.add_zone(EnvironmentZone::new(
            Shape::aabb(240.0, 0.0, 140.0, 200.0),
            ZoneFactor::Lighting,
            0.4,
        ));
        state.aggregator.add_zone(EnvironmentZone::new(
            Shape::circle(300.0, 320.0, 50.0),
            ZoneFactor::Cover,
            0.5,
        ));

        let guards = [
            (Vec2::new(120.0, 380.0), -PI / 2.0),
            (Vec2::new(310.0, 20.0), PI / 2.0),
            (Vec2::new(580.0, 120.0), PI),
        ];
        for (pos, facing) in guards {
            let sweep = Oscillation::new(1.2, PI / 2.0).with_random_phase(rng);
            state.add_source(DetectionSource::new(pos, facing, 220.0, PI / 6.0).with_oscillation(sweep));
        }
    }
}

//! Collision world: entities, static level geometry and trigger volumes
//!
//! `update(dt)` runs a fixed pipeline:
//! 1. rebuild the broad-phase grid
//! 2. integrate positions and apply friction decay
//! 3. sync colliders to entity positions
//! 4. push entities out of static colliders
//! 5. separate overlapping dynamic pairs and exchange momentum
//! 6. evaluate triggers (edge-latched enter/exit)
//!
//! All containers are kept sorted by id so iteration order is stable.

use std::collections::HashSet;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{dynamic_contact, equal_mass_impulse, immovable_impulse, static_push_out};
use super::raycast::{RayHit, Raycaster};
use super::shape::Shape;
use super::spatial::SpatialIndex;
use crate::settings::CollisionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StaticId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

/// A moving body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Anchor position; the collider is moved here every tick
    pub pos: Vec2,
    pub vel: Vec2,
    /// Collider shape (anchor kept equal to `pos`)
    pub collider: Option<Shape>,
    /// Exponential velocity decay rate (1/s)
    pub friction: f32,
    /// Kinematic bodies move but are never pushed by collisions
    pub kinematic: bool,
}

impl Entity {
    pub fn new(pos: Vec2, collider: Option<Shape>) -> Self {
        let mut entity = Self {
            id: EntityId(0),
            pos,
            vel: Vec2::ZERO,
            collider,
            friction: 0.0,
            kinematic: false,
        };
        entity.sync_collider();
        entity
    }

    pub fn with_velocity(mut self, vel: Vec2) -> Self {
        self.vel = vel;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    pub fn kinematic(mut self) -> Self {
        self.kinematic = true;
        self
    }

    /// Move the collider anchor onto the entity position
    #[inline]
    pub fn sync_collider(&mut self) {
        if let Some(collider) = self.collider.as_mut() {
            collider.set_position(self.pos);
        }
    }

    /// Integrate one step.
    ///
    /// Friction is a continuous-time exponential decay:
    /// `v(t + dt) = v(t) * exp(-friction * dt)`, applied after the position step.
    pub fn integrate(&mut self, dt: f32) {
        self.pos += self.vel * dt;
        if self.friction > 0.0 {
            self.vel *= (-self.friction * dt).exp();
        }
    }

    /// Collider centre, or the raw position when there is no collider
    pub fn center(&self) -> Vec2 {
        self.collider.map_or(self.pos, |c| c.center())
    }
}

/// Immutable level geometry
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StaticCollider {
    pub id: StaticId,
    shape: Shape,
}

impl StaticCollider {
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// Trigger callback, invoked with the entity that crossed the boundary
pub type TriggerCallback = Box<dyn FnMut(EntityId)>;

/// Enter/exit volume
///
/// Each entity latches independently, so a callback fires once per
/// containment transition and never again while the entity stays inside.
pub struct Trigger {
    pub id: TriggerId,
    pub shape: Shape,
    on_enter: Option<TriggerCallback>,
    on_exit: Option<TriggerCallback>,
    latched: HashSet<EntityId>,
}

impl Trigger {
    pub fn new(shape: Shape) -> Self {
        Self {
            id: TriggerId(0),
            shape,
            on_enter: None,
            on_exit: None,
            latched: HashSet::new(),
        }
    }

    pub fn on_enter(mut self, f: impl FnMut(EntityId) + 'static) -> Self {
        self.on_enter = Some(Box::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl FnMut(EntityId) + 'static) -> Self {
        self.on_exit = Some(Box::new(f));
        self
    }

    /// Whether any entity is currently inside
    pub fn was_triggered(&self) -> bool {
        !self.latched.is_empty()
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.latched.contains(&id)
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("latched", &self.latched.len())
            .finish()
    }
}

/// Source of static obstacles around a point (level geometry)
pub trait GeometryProvider {
    /// Non-degenerate obstacles touching the disc at `point` with `radius`
    fn obstacles_near(&self, point: Vec2, radius: f32) -> Vec<Shape>;
}

impl GeometryProvider for Vec<Shape> {
    fn obstacles_near(&self, point: Vec2, radius: f32) -> Vec<Shape> {
        self.iter()
            .filter(|s| !s.is_degenerate() && s.intersects_disc(point, radius))
            .copied()
            .collect()
    }
}

/// Edges produced by the world during `update`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    TriggerEntered { trigger: TriggerId, entity: EntityId },
    TriggerExited { trigger: TriggerId, entity: EntityId },
}

/// Owner of all moving bodies, static geometry and triggers
#[derive(Debug)]
pub struct CollisionWorld {
    entities: Vec<Entity>,
    statics: Vec<StaticCollider>,
    triggers: Vec<Trigger>,
    grid: SpatialIndex,
    restitution: f32,
    default_friction: f32,
    events: Vec<WorldEvent>,
    next_id: u32,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new(&CollisionSettings::default())
    }
}

impl CollisionWorld {
    pub fn new(settings: &CollisionSettings) -> Self {
        Self {
            entities: Vec::new(),
            statics: Vec::new(),
            triggers: Vec::new(),
            grid: SpatialIndex::new(settings.cell_size),
            restitution: settings.restitution.clamp(0.0, 1.0),
            default_friction: settings.default_friction.max(0.0),
            events: Vec::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn cell_size(&self) -> f32 {
        self.grid.cell_size()
    }

    /// New entity carrying the world's default friction (not yet added)
    pub fn make_entity(&self, pos: Vec2, collider: Option<Shape>) -> Entity {
        Entity::new(pos, collider).with_friction(self.default_friction)
    }

    pub fn add_entity(&mut self, mut entity: Entity) -> EntityId {
        let id = EntityId(self.next_id());
        entity.id = id;
        entity.sync_collider();
        if entity.collider.is_some_and(|c| c.is_degenerate()) {
            log::warn!("Entity {:?} has a degenerate collider; it will never collide", id);
        }
        self.entities.push(entity);
        id
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let idx = self.entities.iter().position(|e| e.id == id)?;
        for trigger in &mut self.triggers {
            trigger.latched.remove(&id);
        }
        Some(self.entities.remove(idx))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn add_static_collider(&mut self, shape: Shape) -> StaticId {
        let id = StaticId(self.next_id());
        if shape.is_degenerate() {
            log::warn!("Static collider {:?} has zero area; it will never collide", id);
        }
        self.statics.push(StaticCollider { id, shape });
        id
    }

    pub fn remove_static_collider(&mut self, id: StaticId) -> bool {
        let before = self.statics.len();
        self.statics.retain(|s| s.id != id);
        self.statics.len() != before
    }

    pub fn static_colliders(&self) -> &[StaticCollider] {
        &self.statics
    }

    pub fn add_trigger(&mut self, mut trigger: Trigger) -> TriggerId {
        let id = TriggerId(self.next_id());
        trigger.id = id;
        self.triggers.push(trigger);
        id
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> Option<Trigger> {
        let idx = self.triggers.iter().position(|t| t.id == id)?;
        Some(self.triggers.remove(idx))
    }

    pub fn trigger(&self, id: TriggerId) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.id == id)
    }

    /// Take the trigger edges recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Broad-phase neighbours of an entity (as of the last rebuild)
    pub fn query_nearby(&self, id: EntityId) -> Vec<EntityId> {
        self.entity(id)
            .and_then(|e| e.collider)
            .map(|c| self.grid.query(id, &c.bounds()))
            .unwrap_or_default()
    }

    /// Closest hit of segment `a -> b` against static geometry
    pub fn raycast(&self, a: Vec2, b: Vec2) -> RayHit {
        let shapes: Vec<Shape> = self.statics.iter().map(|s| s.shape).collect();
        Raycaster::hit_test(a, b, &shapes)
    }

    pub fn has_line_of_sight(&self, a: Vec2, b: Vec2) -> bool {
        !self.raycast(a, b).hit
    }

    /// Advance the world by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        self.rebuild_grid();

        for entity in &mut self.entities {
            entity.integrate(dt);
            entity.sync_collider();
        }

        self.resolve_static();
        self.resolve_dynamic();
        self.evaluate_triggers();
    }

    fn rebuild_grid(&mut self) {
        self.grid.clear();
        for entity in &self.entities {
            if let Some(collider) = entity.collider {
                self.grid.insert(entity.id, &collider.bounds());
            }
        }
    }

    fn resolve_static(&mut self) {
        for entity in &mut self.entities {
            if entity.kinematic {
                continue;
            }
            for wall in &self.statics {
                let Some(body) = entity.collider else { break };
                let contact = static_push_out(&body, &wall.shape);
                if !contact.hit {
                    continue;
                }
                entity.pos += contact.normal * contact.penetration;
                // Zero only the blocked axis so the body can slide along the wall
                if contact.normal.x != 0.0 {
                    entity.vel.x = 0.0;
                } else {
                    entity.vel.y = 0.0;
                }
                entity.sync_collider();
                log::trace!(
                    "Entity {:?} pushed out of static {:?} by {:.3} along {:?}",
                    entity.id,
                    wall.id,
                    contact.penetration,
                    contact.normal
                );
            }
        }
    }

    fn resolve_dynamic(&mut self) {
        // Pairs in ascending (lower, higher) index order; grid order is not relied on
        let mut pairs = Vec::new();
        for (i, entity) in self.entities.iter().enumerate() {
            let Some(collider) = entity.collider else { continue };
            let mut near = self.grid.query(entity.id, &collider.bounds());
            near.sort_unstable();
            for other in near {
                if other <= entity.id {
                    continue;
                }
                if let Some(j) = self.entities.iter().position(|e| e.id == other) {
                    pairs.push((i, j));
                }
            }
        }

        for (i, j) in pairs {
            let (a, b) = pair_mut(&mut self.entities, i, j);
            let (Some(shape_a), Some(shape_b)) = (a.collider, b.collider) else {
                continue;
            };

            let contact = dynamic_contact(&shape_a, &shape_b);
            if !contact.hit {
                continue;
            }
            let n = contact.normal;
            let depth = contact.penetration;

            match (a.kinematic, b.kinematic) {
                (false, false) => {
                    a.pos -= n * (depth * 0.5);
                    b.pos += n * (depth * 0.5);
                    if let Some((va, vb)) = equal_mass_impulse(a.vel, b.vel, n, self.restitution) {
                        a.vel = va;
                        b.vel = vb;
                    }
                }
                (true, false) => {
                    b.pos += n * depth;
                    if let Some(vb) = immovable_impulse(b.vel - a.vel, -n, self.restitution) {
                        b.vel = vb + a.vel;
                    }
                }
                (false, true) => {
                    a.pos -= n * depth;
                    if let Some(va) = immovable_impulse(a.vel - b.vel, n, self.restitution) {
                        a.vel = va + b.vel;
                    }
                }
                (true, true) => continue,
            }
            a.sync_collider();
            b.sync_collider();
        }
    }

    fn evaluate_triggers(&mut self) {
        for trigger in &mut self.triggers {
            for entity in &self.entities {
                if entity.collider.is_none() {
                    continue;
                }
                let inside = trigger.shape.contains_point(entity.center());
                let was_inside = trigger.latched.contains(&entity.id);

                if inside && !was_inside {
                    trigger.latched.insert(entity.id);
                    if let Some(cb) = trigger.on_enter.as_mut() {
                        cb(entity.id);
                    }
                    self.events.push(WorldEvent::TriggerEntered {
                        trigger: trigger.id,
                        entity: entity.id,
                    });
                    log::debug!("Entity {:?} entered trigger {:?}", entity.id, trigger.id);
                } else if !inside && was_inside {
                    trigger.latched.remove(&entity.id);
                    if let Some(cb) = trigger.on_exit.as_mut() {
                        cb(entity.id);
                    }
                    self.events.push(WorldEvent::TriggerExited {
                        trigger: trigger.id,
                        entity: entity.id,
                    });
                    log::debug!("Entity {:?} exited trigger {:?}", entity.id, trigger.id);
                }
            }
        }
    }
}

impl GeometryProvider for CollisionWorld {
    fn obstacles_near(&self, point: Vec2, radius: f32) -> Vec<Shape> {
        self.statics
            .iter()
            .map(|s| s.shape)
            .filter(|s| !s.is_degenerate() && s.intersects_disc(point, radius))
            .collect()
    }
}

/// Two distinct mutable elements, `i < j`
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    let (head, tail) = items.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

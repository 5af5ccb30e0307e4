//! Deterministic spatial simulation
//!
//! Everything physical lives here:
//! - Uniform-grid broad-phase, rebuilt every tick
//! - Collision world (integrate -> resolve -> triggers)
//! - Segment raycasts shared by resolution and line-of-sight
//! - Grid A* over static geometry
//!
//! Iteration order is by ascending id so identical inputs give identical ticks.

pub mod collision;
pub mod path;
pub mod raycast;
pub mod shape;
pub mod spatial;
pub mod world;

pub use collision::{CollisionResult, dynamic_contact, equal_mass_impulse, static_push_out};
pub use path::PathPlanner;
pub use raycast::{RayHit, Raycaster};
pub use shape::{Aabb, Circle, Shape};
pub use spatial::{CellKey, SpatialIndex};
pub use world::{
    CollisionWorld, Entity, EntityId, GeometryProvider, StaticCollider, StaticId, Trigger,
    TriggerId, WorldEvent,
};

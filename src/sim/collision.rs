//! Narrow-phase contact generation and response
//!
//! Two kinds of contact:
//! - entity vs static: minimum-translation push-out along one axis
//! - entity vs entity: separation along the centre-to-centre normal plus an
//!   equal-mass impulse

use glam::Vec2;

use super::shape::Shape;
use crate::consts::COINCIDENT_PUSH;

/// Result of a contact check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a contact occurred
    pub hit: bool,
    /// Direction the first shape must move to separate (unit length)
    pub normal: Vec2,
    /// Penetration depth along `normal`
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Minimum-translation push-out of `body` out of `wall`.
///
/// Works on bounding boxes once the exact shapes are known to overlap. The
/// axis with the smaller penetration wins; equal penetration pushes along Y.
pub fn static_push_out(body: &Shape, wall: &Shape) -> CollisionResult {
    if !body.overlaps(wall) {
        return CollisionResult::miss();
    }

    let body_box = body.bounds();
    let wall_box = wall.bounds();
    let (x_push, x_sign) = axis_exit(body_box.min.x, body_box.max().x, wall_box.min.x, wall_box.max().x);
    let (y_push, y_sign) = axis_exit(body_box.min.y, body_box.max().y, wall_box.min.y, wall_box.max().y);

    if x_push < y_push {
        CollisionResult {
            hit: true,
            normal: Vec2::new(x_sign, 0.0),
            penetration: x_push,
        }
    } else {
        CollisionResult {
            hit: true,
            normal: Vec2::new(0.0, y_sign),
            penetration: y_push,
        }
    }
}

/// Shortest exit of interval [b0, b1] from [w0, w1] along one axis: (distance, sign)
fn axis_exit(b0: f32, b1: f32, w0: f32, w1: f32) -> (f32, f32) {
    let toward_min = b1 - w0;
    let toward_max = w1 - b0;
    if toward_min <= toward_max {
        (toward_min, -1.0)
    } else {
        (toward_max, 1.0)
    }
}

/// Contact between two dynamic bodies, normal pointing from `a` toward `b`.
///
/// Uses bounding-box overlap as the trigger. Coincident centres fall back to a
/// fixed small push along +X so the outcome stays deterministic.
pub fn dynamic_contact(a: &Shape, b: &Shape) -> CollisionResult {
    if a.is_degenerate() || b.is_degenerate() {
        return CollisionResult::miss();
    }
    let (a_box, b_box) = (a.bounds(), b.bounds());
    if !a_box.overlaps(&b_box) {
        return CollisionResult::miss();
    }

    let offset = b.center() - a.center();
    let distance = offset.length();
    if distance <= f32::EPSILON {
        return CollisionResult {
            hit: true,
            normal: Vec2::X,
            penetration: COINCIDENT_PUSH,
        };
    }

    let penetration = match (a, b) {
        (Shape::Circle(ca), Shape::Circle(cb)) => ca.radius + cb.radius - distance,
        _ => {
            let depth = a_box.overlap_depth(&b_box);
            depth.x.min(depth.y)
        }
    };
    if penetration <= 0.0 {
        // Boxes of two circles overlap at the corners without the discs touching
        return CollisionResult::miss();
    }

    CollisionResult {
        hit: true,
        normal: offset / distance,
        penetration,
    }
}

/// Equal-mass impulse along `normal` (pointing from body 1 to body 2).
///
/// Returns the new velocities, or `None` when the pair is already separating
/// (closing velocity non-negative).
pub fn equal_mass_impulse(v1: Vec2, v2: Vec2, normal: Vec2, restitution: f32) -> Option<(Vec2, Vec2)> {
    let closing = (v2 - v1).dot(normal);
    if closing >= 0.0 {
        return None;
    }
    // j for two unit masses: -(1 + e) * vn / (1/m1 + 1/m2)
    let j = -(1.0 + restitution) * closing / 2.0;
    Some((v1 - normal * j, v2 + normal * j))
}

/// Impulse against an immovable body: only `v` changes.
pub fn immovable_impulse(v: Vec2, normal: Vec2, restitution: f32) -> Option<Vec2> {
    // `normal` points from the moving body toward the immovable one
    let closing = (-v).dot(normal);
    if closing >= 0.0 {
        return None;
    }
    let j = -(1.0 + restitution) * closing;
    Some(v - normal * j)
}

//! Segment raycasts against collider shapes
//!
//! Used both for line-of-sight checks (detection) and world queries. Every
//! test is parametric over the segment `a + t * (b - a)`, `t` in [0, 1], and
//! the caller always gets the closest hit, not merely the first one found.

use glam::Vec2;

use super::shape::{Aabb, Circle, Shape};

/// Result of a raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Whether anything was hit
    pub hit: bool,
    /// Hit point (segment start when nothing was hit)
    pub point: Vec2,
    /// Distance from the segment start to the hit point
    pub distance: f32,
    /// Index of the obstacle that was hit
    pub obstacle: Option<usize>,
}

impl RayHit {
    pub fn miss(origin: Vec2) -> Self {
        Self {
            hit: false,
            point: origin,
            distance: 0.0,
            obstacle: None,
        }
    }
}

/// Below this segment length a ray is treated as zero-length
const MIN_RAY_LENGTH: f32 = 1e-6;

/// Stateless raycaster
#[derive(Debug, Clone, Copy, Default)]
pub struct Raycaster;

impl Raycaster {
    /// Closest intersection of segment `a -> b` with any obstacle.
    ///
    /// A segment starting inside an obstacle hits it at distance 0.
    /// Zero-length segments never hit.
    pub fn hit_test(a: Vec2, b: Vec2, obstacles: &[Shape]) -> RayHit {
        let delta = b - a;
        let length = delta.length();
        if length < MIN_RAY_LENGTH {
            return RayHit::miss(a);
        }

        let mut best: Option<(f32, usize)> = None;
        for (i, shape) in obstacles.iter().enumerate() {
            let t = match shape {
                Shape::Aabb(bx) => segment_aabb(a, delta, bx),
                Shape::Circle(c) => segment_circle(a, delta, c),
            };
            if let Some(t) = t {
                if best.is_none_or(|(best_t, _)| t < best_t) {
                    best = Some((t, i));
                }
            }
        }

        match best {
            Some((t, i)) => RayHit {
                hit: true,
                point: a + delta * t,
                distance: length * t,
                obstacle: Some(i),
            },
            None => RayHit::miss(a),
        }
    }

    /// True when no obstacle blocks the segment
    #[inline]
    pub fn has_line_of_sight(a: Vec2, b: Vec2, obstacles: &[Shape]) -> bool {
        !Self::hit_test(a, b, obstacles).hit
    }
}

/// Liang-Barsky clipping: each slab constraint narrows `[u1, u2]`; the segment
/// hits iff the interval survives and overlaps [0, 1]. Returns the entry `t`.
fn segment_aabb(a: Vec2, delta: Vec2, bx: &Aabb) -> Option<f32> {
    if bx.is_degenerate() {
        return None;
    }
    let max = bx.max();
    let p = [-delta.x, delta.x, -delta.y, delta.y];
    let q = [a.x - bx.min.x, max.x - a.x, a.y - bx.min.y, max.y - a.y];

    let mut u1 = f32::NEG_INFINITY;
    let mut u2 = f32::INFINITY;
    for i in 0..4 {
        if p[i] == 0.0 {
            // Parallel to this edge: outside means no hit at all
            if q[i] < 0.0 {
                return None;
            }
        } else {
            let r = q[i] / p[i];
            if p[i] < 0.0 {
                u1 = u1.max(r);
            } else {
                u2 = u2.min(r);
            }
        }
    }

    if u1 > u2 || u2 < 0.0 || u1 > 1.0 {
        return None;
    }
    Some(u1.max(0.0))
}

/// Substitute the segment into the circle equation and solve the quadratic.
fn segment_circle(a: Vec2, delta: Vec2, c: &Circle) -> Option<f32> {
    if c.is_degenerate() {
        return None;
    }
    let f = a - c.center;
    let qa = delta.dot(delta);
    let qb = 2.0 * f.dot(delta);
    let qc = f.dot(f) - c.radius * c.radius;

    let discriminant = qb * qb - 4.0 * qa * qc;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let t1 = (-qb - sqrt_d) / (2.0 * qa);
    let t2 = (-qb + sqrt_d) / (2.0 * qa);

    if (0.0..=1.0).contains(&t1) {
        Some(t1)
    } else if t1 < 0.0 && t2 >= 0.0 {
        // Starts inside (covers the segment lying wholly inside)
        Some(0.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_closest_hit_wins() {
        let obstacles = [
            Shape::aabb(80.0, -10.0, 10.0, 20.0),
            Shape::aabb(40.0, -10.0, 10.0, 20.0),
        ];
        let hit = Raycaster::hit_test(Vec2::ZERO, Vec2::new(100.0, 0.0), &obstacles);
        assert!(hit.hit);
        assert_eq!(hit.obstacle, Some(1));
        assert!((hit.distance - 40.0).abs() < 0.001);
        assert!((hit.point.x - 40.0).abs() < 0.001);
    }

    #[test]
    fn test_segment_stops_short() {
        let obstacles = [Shape::aabb(40.0, -10.0, 10.0, 20.0)];
        assert!(Raycaster::has_line_of_sight(
            Vec2::ZERO,
            Vec2::new(30.0, 0.0),
            &obstacles
        ));
        // Behind the start
        assert!(Raycaster::has_line_of_sight(
            Vec2::new(60.0, 0.0),
            Vec2::new(100.0, 0.0),
            &obstacles
        ));
    }

    #[test]
    fn test_axis_parallel_outside_slab() {
        // Horizontal ray passing above the box
        let obstacles = [Shape::aabb(40.0, 10.0, 10.0, 10.0)];
        assert!(Raycaster::has_line_of_sight(
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            &obstacles
        ));
    }

    #[test]
    fn test_start_inside_box() {
        let obstacles = [Shape::aabb(-5.0, -5.0, 10.0, 10.0)];
        let hit = Raycaster::hit_test(Vec2::ZERO, Vec2::new(100.0, 0.0), &obstacles);
        assert!(hit.hit);
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_circle_hits() {
        let obstacles = [Shape::circle(50.0, 0.0, 10.0)];
        let hit = Raycaster::hit_test(Vec2::ZERO, Vec2::new(100.0, 0.0), &obstacles);
        assert!(hit.hit);
        assert!((hit.distance - 40.0).abs() < 0.001);

        // Tangent miss
        assert!(Raycaster::has_line_of_sight(
            Vec2::new(0.0, 11.0),
            Vec2::new(100.0, 11.0),
            &obstacles
        ));

        // Segment wholly inside the circle
        let hit = Raycaster::hit_test(Vec2::new(48.0, 0.0), Vec2::new(52.0, 0.0), &obstacles);
        assert!(hit.hit);
        assert_eq!(hit.distance, 0.0);

        // Segment ends before reaching the circle
        assert!(Raycaster::has_line_of_sight(
            Vec2::ZERO,
            Vec2::new(30.0, 0.0),
            &obstacles
        ));
    }

    #[test]
    fn test_degenerate_obstacles_never_block() {
        let obstacles = [Shape::aabb(40.0, -10.0, 0.0, 20.0), Shape::circle(50.0, 0.0, 0.0)];
        assert!(Raycaster::has_line_of_sight(
            Vec2::ZERO,
            Vec2::new(100.0, 0.0),
            &obstacles
        ));
    }

    #[test]
    fn test_zero_length_ray() {
        let obstacles = [Shape::aabb(-5.0, -5.0, 10.0, 10.0)];
        let p = Vec2::new(20.0, 20.0);
        let hit = Raycaster::hit_test(p, p, &obstacles);
        assert!(!hit.hit);
        assert_eq!(hit.distance, 0.0);
    }

    proptest! {
        #[test]
        fn prop_zero_length_never_hits(x in -1000.0f32..1000.0, y in -1000.0f32..1000.0) {
            let a = Vec2::new(x, y);
            let obstacles = [
                Shape::aabb(2000.0, 2000.0, 50.0, 50.0),
                Shape::circle(-2000.0, 0.0, 30.0),
            ];
            let hit = Raycaster::hit_test(a, a, &obstacles);
            prop_assert!(!hit.hit);
            prop_assert_eq!(hit.distance, 0.0);
        }

        #[test]
        fn prop_empty_obstacles_clear(
            ax in -1000.0f32..1000.0, ay in -1000.0f32..1000.0,
            bx in -1000.0f32..1000.0, by in -1000.0f32..1000.0,
        ) {
            prop_assert!(Raycaster::has_line_of_sight(Vec2::new(ax, ay), Vec2::new(bx, by), &[]));
        }
    }
}

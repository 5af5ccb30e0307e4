//! Collider shapes
//!
//! Two primitives cover everything the level and actors need:
//! - `Aabb`: axis-aligned box anchored at its min (top-left) corner
//! - `Circle`: anchored at its centre
//!
//! A shape with non-positive extent is degenerate: it never overlaps,
//! contains or blocks anything.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box (x, y, w, h)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Min corner
    pub min: Vec2,
    /// Width and height
    pub size: Vec2,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Box of the given size centred on `center`
    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        Self {
            min: center - size * 0.5,
            size,
        }
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.min + self.size * 0.5
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.size.x > 0.0 && self.size.y > 0.0)
    }

    /// Strict overlap: boxes that merely touch do not overlap
    pub fn overlaps(&self, other: &Aabb) -> bool {
        if self.is_degenerate() || other.is_degenerate() {
            return false;
        }
        let (a_max, b_max) = (self.max(), other.max());
        self.min.x < b_max.x && other.min.x < a_max.x && self.min.y < b_max.y && other.min.y < a_max.y
    }

    /// Per-axis overlap depth (0 on an axis that does not overlap)
    pub fn overlap_depth(&self, other: &Aabb) -> Vec2 {
        let (a_max, b_max) = (self.max(), other.max());
        Vec2::new(
            (a_max.x.min(b_max.x) - self.min.x.max(other.min.x)).max(0.0),
            (a_max.y.min(b_max.y) - self.min.y.max(other.min.y)).max(0.0),
        )
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let max = self.max();
        p.x >= self.min.x && p.x <= max.x && p.y >= self.min.y && p.y <= max.y
    }

    /// Closest point inside the box to `p`
    #[inline]
    pub fn clamp_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max())
    }
}

/// Circle (x, y, r)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: Vec2::new(x, y),
            radius,
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.radius > 0.0)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center, Vec2::splat(self.radius * 2.0))
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        !self.is_degenerate() && (p - self.center).length_squared() <= self.radius * self.radius
    }
}

/// Collider shape: tagged union of the supported primitives
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Aabb(Aabb),
    Circle(Circle),
}

impl Shape {
    pub fn aabb(x: f32, y: f32, w: f32, h: f32) -> Self {
        Shape::Aabb(Aabb::new(x, y, w, h))
    }

    pub fn circle(x: f32, y: f32, radius: f32) -> Self {
        Shape::Circle(Circle::new(x, y, radius))
    }

    /// Anchor position (box min corner or circle centre)
    pub fn position(&self) -> Vec2 {
        match self {
            Shape::Aabb(b) => b.min,
            Shape::Circle(c) => c.center,
        }
    }

    /// Move the anchor to `pos`, keeping extents
    pub fn set_position(&mut self, pos: Vec2) {
        match self {
            Shape::Aabb(b) => b.min = pos,
            Shape::Circle(c) => c.center = pos,
        }
    }

    pub fn center(&self) -> Vec2 {
        match self {
            Shape::Aabb(b) => b.center(),
            Shape::Circle(c) => c.center,
        }
    }

    /// Bounding box (used by the broad-phase and push-out)
    pub fn bounds(&self) -> Aabb {
        match self {
            Shape::Aabb(b) => *b,
            Shape::Circle(c) => c.bounds(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        match self {
            Shape::Aabb(b) => b.is_degenerate(),
            Shape::Circle(c) => c.is_degenerate(),
        }
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        match self {
            Shape::Aabb(b) => b.contains_point(p),
            Shape::Circle(c) => c.contains_point(p),
        }
    }

    /// Exact shape-vs-shape overlap test (narrow-phase)
    pub fn overlaps(&self, other: &Shape) -> bool {
        if self.is_degenerate() || other.is_degenerate() {
            return false;
        }
        match (self, other) {
            (Shape::Aabb(a), Shape::Aabb(b)) => a.overlaps(b),
            (Shape::Circle(a), Shape::Circle(b)) => {
                let r = a.radius + b.radius;
                (a.center - b.center).length_squared() < r * r
            }
            (Shape::Aabb(b), Shape::Circle(c)) | (Shape::Circle(c), Shape::Aabb(b)) => {
                let closest = b.clamp_point(c.center);
                (c.center - closest).length_squared() < c.radius * c.radius
            }
        }
    }

    /// Whether this shape touches the disc at `point` with `radius`
    pub fn intersects_disc(&self, point: Vec2, radius: f32) -> bool {
        let closest = match self {
            Shape::Aabb(b) => b.clamp_point(point),
            Shape::Circle(c) => {
                let offset = point - c.center;
                let len = offset.length();
                if len <= c.radius {
                    point
                } else {
                    c.center + offset / len * c.radius
                }
            }
        };
        !self.is_degenerate() && (point - closest).length_squared() <= radius * radius
    }
}

//! Uniform-grid broad-phase
//!
//! Rebuilt from scratch every tick. The grid only prunes candidate pairs;
//! callers still run the exact shape test, and query order is unspecified.

use std::collections::{HashMap, HashSet};

use super::shape::Aabb;
use super::world::EntityId;

/// Integer grid cell coordinate
pub type CellKey = (i32, i32);

/// Uniform spatial hash of entity ids keyed by grid cell
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    buckets: HashMap<CellKey, Vec<EntityId>>,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 {
            cell_size
        } else {
            log::warn!("Spatial index cell size {} is not positive, using 1.0", cell_size);
            1.0
        };
        Self {
            cell_size,
            buckets: HashMap::new(),
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing a world point
    #[inline]
    pub fn cell_of(&self, x: f32, y: f32) -> CellKey {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Inclusive cell range covered by a bounding box
    pub fn cell_range(&self, bounds: &Aabb) -> (CellKey, CellKey) {
        let max = bounds.max();
        (
            self.cell_of(bounds.min.x, bounds.min.y),
            self.cell_of(max.x, max.y),
        )
    }

    /// Empty every bucket
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Insert an entity into every cell its bounds cover
    pub fn insert(&mut self, id: EntityId, bounds: &Aabb) {
        let ((x0, y0), (x1, y1)) = self.cell_range(bounds);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.buckets.entry((cx, cy)).or_default().push(id);
            }
        }
    }

    /// Deduplicated ids sharing at least one cell with `bounds`, excluding `id`
    pub fn query(&self, id: EntityId, bounds: &Aabb) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let ((x0, y0), (x1, y1)) = self.cell_range(bounds);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(bucket) = self.buckets.get(&(cx, cy)) {
                    for &other in bucket {
                        if other != id && seen.insert(other) {
                            out.push(other);
                        }
                    }
                }
            }
        }
        out
    }

    /// Number of non-empty buckets (diagnostics)
    pub fn occupied_cells(&self) -> usize {
        self.buckets.len()
    }
}

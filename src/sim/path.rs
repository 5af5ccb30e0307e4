//! Grid A* path planning
//!
//! The grid is implicit: nodes sit on a lattice anchored at the start point
//! with the broad-phase cell size as step. Walkability is a small probe box
//! tested against static geometry and a caller-supplied avoid list.
//!
//! Open nodes closer than one cell to a new candidate absorb it (their `g` is
//! relaxed instead of adding a node). This is an approximation and can give
//! slightly longer paths near cell boundaries; paths are for AI movement, not
//! exact shortest routes. Ties between equal `f` scores are broken arbitrarily.

use std::collections::HashSet;

use glam::Vec2;

use super::shape::{Aabb, Shape};
use super::world::GeometryProvider;
use crate::settings::Settings;

/// 8-connected neighbourhood: orthogonal first, then diagonals
const NEIGHBOURS: [(f32, f32); 8] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
    (-1.0, -1.0),
];

/// A* working node; only lives for one `find_path` call
#[derive(Debug, Clone)]
struct PathNode {
    pos: Vec2,
    g: f32,
    h: f32,
    parent: Option<usize>,
}

impl PathNode {
    #[inline]
    fn f(&self) -> f32 {
        self.g + self.h
    }
}

#[derive(Debug, Clone)]
pub struct PathPlanner {
    cell_size: f32,
    probe_size: f32,
    max_expansions: usize,
}

impl PathPlanner {
    pub fn new(cell_size: f32, probe_fraction: f32, max_expansions: usize) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        Self {
            cell_size,
            probe_size: cell_size * probe_fraction.clamp(0.05, 1.0),
            max_expansions: max_expansions.max(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.path_cell_size(),
            settings.path.probe_fraction,
            settings.path.max_expansions,
        )
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Whether a probe box centred on `pos` is clear
    pub fn is_walkable(
        &self,
        pos: Vec2,
        geometry: Option<&dyn GeometryProvider>,
        avoid: &[Shape],
    ) -> bool {
        let probe = Shape::Aabb(Aabb::from_center(pos, Vec2::splat(self.probe_size)));
        if avoid.iter().any(|s| s.overlaps(&probe)) {
            return false;
        }
        match geometry {
            Some(geometry) => !geometry
                .obstacles_near(pos, self.probe_size)
                .iter()
                .any(|s| s.overlaps(&probe)),
            // No level geometry: everything is open
            None => true,
        }
    }

    /// Waypoints from `start` toward `end`, or an empty path when no route is
    /// found within the expansion budget.
    pub fn find_path(
        &self,
        start: Vec2,
        end: Vec2,
        geometry: Option<&dyn GeometryProvider>,
        avoid: &[Shape],
    ) -> Vec<Vec2> {
        let cell = self.cell_size;
        let key = |p: Vec2| {
            let k = ((p - start) / cell).round();
            (k.x as i32, k.y as i32)
        };

        let mut nodes = vec![PathNode {
            pos: start,
            g: 0.0,
            h: start.distance(end),
            parent: None,
        }];
        let mut open: Vec<usize> = vec![0];
        let mut closed: HashSet<(i32, i32)> = HashSet::new();
        let mut expansions = 0;

        while !open.is_empty() && expansions < self.max_expansions {
            let Some((slot, current)) = open.iter().copied().enumerate().min_by(|(_, a), (_, b)| {
                nodes[*a]
                    .f()
                    .partial_cmp(&nodes[*b].f())
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) else {
                break;
            };
            open.swap_remove(slot);

            let current_pos = nodes[current].pos;
            if current_pos.distance(end) < cell {
                let path = self.reconstruct(&nodes, current, end, geometry, avoid);
                log::trace!(
                    "Path found after {} expansions ({} waypoints)",
                    expansions,
                    path.len()
                );
                return path;
            }

            if !closed.insert(key(current_pos)) {
                continue;
            }
            expansions += 1;

            for (dx, dy) in NEIGHBOURS {
                let step = Vec2::new(dx, dy) * cell;
                let next_pos = current_pos + step;
                if closed.contains(&key(next_pos)) {
                    continue;
                }
                if !self.is_walkable(next_pos, geometry, avoid) {
                    continue;
                }
                let g = nodes[current].g + step.length();

                if let Some(&existing) = open
                    .iter()
                    .find(|&&o| nodes[o].pos.distance(next_pos) < cell)
                {
                    if g < nodes[existing].g {
                        nodes[existing].g = g;
                        nodes[existing].parent = Some(current);
                    }
                    continue;
                }

                nodes.push(PathNode {
                    pos: next_pos,
                    g,
                    h: next_pos.distance(end),
                    parent: Some(current),
                });
                open.push(nodes.len() - 1);
            }
        }

        log::debug!(
            "No path from {:?} to {:?} ({} expansions, cap {})",
            start,
            end,
            expansions,
            self.max_expansions
        );
        Vec::new()
    }

    fn reconstruct(
        &self,
        nodes: &[PathNode],
        goal: usize,
        end: Vec2,
        geometry: Option<&dyn GeometryProvider>,
        avoid: &[Shape],
    ) -> Vec<Vec2> {
        let mut path = Vec::new();
        let mut cursor = Some(goal);
        while let Some(idx) = cursor {
            path.push(nodes[idx].pos);
            cursor = nodes[idx].parent;
        }
        path.reverse();

        // Finish exactly on the requested end point when it is reachable
        let last = path.last().copied().unwrap_or(end);
        if last.distance(end) > 1e-3 && self.is_walkable(end, geometry, avoid) {
            path.push(end);
        }
        path
    }
}

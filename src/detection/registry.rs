//! Owner of every detection source
//!
//! Passed by reference to whatever needs to reach all observers at once (the
//! aggregator, the tick driver, broadcast alerts).

use glam::Vec2;

use super::source::{DetectionSource, SourceId, StateChange};
use super::target::DetectionTarget;
use crate::sim::GeometryProvider;

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    /// Sorted by id; ids only grow so pushing keeps the order
    sources: Vec<DetectionSource>,
    next_id: u32,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `source` and assign it a fresh id
    pub fn insert(&mut self, mut source: DetectionSource) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        source.id = id;
        self.sources.push(source);
        log::debug!("Registered detection source {:?}", id);
        id
    }

    pub fn remove(&mut self, id: SourceId) -> Option<DetectionSource> {
        let index = self.index_of(id)?;
        Some(self.sources.remove(index))
    }

    pub fn get(&self, id: SourceId) -> Option<&DetectionSource> {
        self.index_of(id).map(|i| &self.sources[i])
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut DetectionSource> {
        self.index_of(id).map(move |i| &mut self.sources[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectionSource> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DetectionSource> {
        self.sources.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.sources.iter().map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn index_of(&self, id: SourceId) -> Option<usize> {
        self.sources.binary_search_by_key(&id, |s| s.id).ok()
    }

    /// Update every source in id order against the same target
    pub fn update_all<T: DetectionTarget + ?Sized>(
        &mut self,
        dt: f32,
        mut target: Option<&mut T>,
        geometry: Option<&dyn GeometryProvider>,
    ) -> Vec<StateChange> {
        self.sources
            .iter_mut()
            .filter_map(|source| source.update(dt, target.as_deref_mut(), geometry))
            .collect()
    }

    /// Put every source within `radius` of `point` on alert.
    ///
    /// Returns how many sources were within reach.
    pub fn alert_nearby(&mut self, point: Vec2, radius: f32) -> usize {
        let mut reached = 0;
        for source in self
            .sources
            .iter_mut()
            .filter(|s| s.position.distance(point) <= radius)
        {
            source.force_alert();
            reached += 1;
        }
        if reached > 0 {
            log::debug!("Alerted {} sources near {:?}", reached, point);
        }
        reached
    }
}

//! Spawn point allocation
//!
//! Tracks which tiles are claimed by live spawned objects and hands out free,
//! walkable tiles near a reference point. The placement map is explicitly
//! owned by the runtime, never a global.

use super::WorldPoint;
use crate::host::WorldPrimitives;
use crate::{GameRng, ObjectId};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Registry of claimed tiles plus the search over free ones
#[derive(Debug, Clone, Default)]
pub struct SpawnAllocator {
    /// Tile -> objects standing on it
    placements: IndexMap<WorldPoint, Vec<ObjectId>>,
    /// Object -> its tile
    locations: HashMap<ObjectId, WorldPoint>,
    /// Objects whose visuals were cleared by a region reload
    respawn_required: IndexSet<ObjectId>,
}

impl SpawnAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a random free, walkable tile within `radius` of `reference`
    ///
    /// Returns `None` when nothing qualifies; callers skip the spawn.
    pub fn find_spawn_point<W: WorldPrimitives + ?Sized>(
        &self,
        radius: u32,
        reference: WorldPoint,
        blacklist: &[WorldPoint],
        world: &W,
        rng: &mut GameRng,
    ) -> Option<WorldPoint> {
        let radius = radius.min(i32::MAX as u32) as i32;
        let mut candidates = Vec::new();

        for dx in -radius..=radius {
            for dy in -radius..=radius {
                let point = reference.offset(dx, dy);
                if self.placements.contains_key(&point) || blacklist.contains(&point) {
                    continue;
                }
                if world.is_walkable(point) {
                    candidates.push(point);
                }
            }
        }

        rng.pick(&candidates).copied()
    }

    /// Search rings of growing radius, returning the first free tile found
    ///
    /// Each ring scans a radius jittered inside its step. The last ring always
    /// scans `max_radius` in full.
    pub fn find_outward_spawn_point<W: WorldPrimitives + ?Sized>(
        &self,
        min_radius: u32,
        step: u32,
        max_radius: u32,
        reference: WorldPoint,
        blacklist: &[WorldPoint],
        world: &W,
        rng: &mut GameRng,
    ) -> Option<WorldPoint> {
        let step = step.max(1);
        let mut radius = min_radius.min(max_radius);

        loop {
            let ring_end = radius.saturating_add(step - 1).min(max_radius);
            let jittered = rng.range_i64(radius as i64, ring_end as i64) as u32;

            if let Some(point) = self.find_spawn_point(jittered, reference, blacklist, world, rng) {
                return Some(point);
            }
            if radius >= max_radius {
                return None;
            }
            radius = radius.saturating_add(step).min(max_radius);
        }
    }

    /// Find a tile and register `object` on it in one step
    ///
    /// Two successive claims can never return the same tile.
    pub fn claim_spawn_point<W: WorldPrimitives + ?Sized>(
        &mut self,
        object: ObjectId,
        min_radius: u32,
        step: u32,
        max_radius: u32,
        reference: WorldPoint,
        blacklist: &[WorldPoint],
        world: &W,
        rng: &mut GameRng,
    ) -> Option<WorldPoint> {
        let point = self.find_outward_spawn_point(
            min_radius, step, max_radius, reference, blacklist, world, rng,
        )?;
        self.register_placement(object, point);
        Some(point)
    }

    /// Record `object` as standing on `point`, moving it if already registered
    pub fn register_placement(&mut self, object: ObjectId, point: WorldPoint) {
        self.deregister_placement(object);
        self.placements.entry(point).or_default().push(object);
        self.locations.insert(object, point);
    }

    /// Release the tile held by `object`
    ///
    /// Returns the freed tile, or `None` when the object was not registered.
    pub fn deregister_placement(&mut self, object: ObjectId) -> Option<WorldPoint> {
        let point = self.locations.remove(&object)?;
        if let Some(objects) = self.placements.get_mut(&point) {
            objects.retain(|id| *id != object);
            if objects.is_empty() {
                self.placements.shift_remove(&point);
            }
        }
        self.respawn_required.shift_remove(&object);
        Some(point)
    }

    /// Flag every registered object for respawn
    ///
    /// Called when the host reloads the visible region, which clears every
    /// spawned visual.
    pub fn mark_all_respawn_required(&mut self) {
        self.respawn_required.extend(self.locations.keys().copied());
    }

    /// Take the objects flagged since the last call
    pub fn drain_respawn_required(&mut self) -> Vec<ObjectId> {
        self.respawn_required.drain(..).collect()
    }

    pub fn is_registered(&self, object: ObjectId) -> bool {
        self.locations.contains_key(&object)
    }

    pub fn location_of(&self, object: ObjectId) -> Option<WorldPoint> {
        self.locations.get(&object).copied()
    }

    pub fn is_claimed(&self, point: &WorldPoint) -> bool {
        self.placements.contains_key(point)
    }

    /// Objects standing on `point`
    pub fn objects_at(&self, point: &WorldPoint) -> &[ObjectId] {
        self.placements
            .get(point)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of claimed tiles
    pub fn claimed_tiles(&self) -> usize {
        self.placements.len()
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

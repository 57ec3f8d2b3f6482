//! Per-product behaviour scheduling
//!
//! Once per tick, for every active product, in order:
//!
//! 1. re-place objects whose visuals a region reload cleared
//! 2. retire objects whose own lifetime is over
//! 3. fire spawn behaviours whose interval has elapsed
//! 4. move following objects after the player
//! 5. roll random visual effects on visible objects
//! 6. register the product's movement override once
//!
//! Everything that must happen later goes through the deferred sequencer.

use crate::config::PlacementConfig;
use crate::definition::{FollowKind, LocationKind, SpawnDef, SpawnOption, SpawnerDef, VisualEffect};
use crate::host::{swallow, Host, LocalPlayer};
use crate::identity::IdAllocator;
use crate::overlay::{MovementOverlay, OverlayEngine};
use crate::product::Product;
use crate::sequencer::{DeferredAction, DeferredSequencer};
use crate::spawn::{ObjectRole, SpawnAllocator, SpawnedObject, WorldPoint};
use crate::time::{Millis, GAME_TICK_MS};
use crate::{GameRng, ObjectId, ProductId};
use indexmap::IndexMap;
use std::f64::consts::TAU;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Host orientation units per full turn
pub const ORIENTATION_UNITS: i64 = 2048;

/// Runtime state a tick works against, borrowed for its duration
pub struct TickContext<'a, H: ?Sized> {
    pub now: Millis,
    pub host: &'a mut H,
    pub allocator: &'a mut SpawnAllocator,
    pub sequencer: &'a mut DeferredSequencer,
    pub movement: &'a mut OverlayEngine<MovementOverlay>,
    pub rng: &'a mut GameRng,
    pub(crate) ids: &'a mut IdAllocator,
}

/// Orientation facing from `from` towards `to`; 0 faces +y
pub fn orientation_towards(from: WorldPoint, to: WorldPoint) -> i64 {
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;
    let turns = dx.atan2(dy) / TAU;
    ((turns * ORIENTATION_UNITS as f64).round() as i64).rem_euclid(ORIENTATION_UNITS)
}

/// Drives spawn, movement and effect behaviours of products
#[derive(Debug, Clone)]
pub struct BehaviourScheduler {
    roll_attempts: u32,
    placement: PlacementConfig,
}

impl BehaviourScheduler {
    pub fn new(roll_attempts: u32, placement: PlacementConfig) -> Self {
        Self {
            roll_attempts,
            placement,
        }
    }

    /// Run one tick of `product`; inactive products are left alone
    pub fn tick<H: Host + ?Sized>(&self, product: &mut Product, ctx: &mut TickContext<'_, H>) {
        if !product.is_active() {
            return;
        }
        self.respawn_objects(product, ctx);
        self.expire_objects(product, ctx);
        self.trigger_spawns(product, ctx);
        if let Some(player) = swallow("local_player", ctx.host.local_player()) {
            self.maintain_locations(product, player, ctx);
        }
        self.trigger_random_effects(product, ctx);
        self.sync_movement(product, ctx);
    }

    /// Hide everything of a paused product; show revealed objects of an
    /// active one
    pub fn sync_visibility<H: Host + ?Sized>(
        &self,
        product: &mut Product,
        ctx: &mut TickContext<'_, H>,
    ) {
        let active = product.is_active();
        for object in product.objects_mut() {
            if !active {
                object.hide(ctx.host);
            } else if object.revealed && !object.retiring && !object.is_visible() {
                object.show(ctx.host, ctx.allocator);
            }
        }
    }

    /// Make a placed object visible and start its own timers
    pub fn reveal_object<H: Host + ?Sized>(
        &self,
        product: &mut Product,
        id: ObjectId,
        ctx: &mut TickContext<'_, H>,
    ) {
        let owner = product.id;
        let Some(object) = product.object_mut(id) else {
            trace!(object = %id, "reveal of removed object");
            return;
        };
        if object.retiring {
            return;
        }
        object.revealed = true;
        if !object.is_placed() && !object.place(ctx.host) {
            object.needs_respawn = true;
            return;
        }
        if !object.show(ctx.host, ctx.allocator) || object.role != ObjectRole::Main {
            return;
        }

        let now = ctx.now;
        if let Some(expiry) = object.spawn.expiry_ms {
            object.expires_at = Some(now + expiry.roll(ctx.rng).max(0));
        }
        if let Some(interval) = &object.spawn.random_effects_interval {
            let delay = interval.delay_ms.roll(ctx.rng);
            object.restart_random_effect_timer(now, delay);
        }
        if let Some(effect) = object.spawn.show_effect.clone() {
            self.fire_visual_effect(owner, object, &effect, 0, ctx);
        }
    }

    /// Schedule every part of `effect`, starting `base_delay` from now
    ///
    /// The object's animations are locked until the whole bundle is done.
    pub fn fire_visual_effect<H: ?Sized>(
        &self,
        owner: ProductId,
        object: &mut SpawnedObject,
        effect: &VisualEffect,
        base_delay: Millis,
        ctx: &mut TickContext<'_, H>,
    ) {
        let now = ctx.now;
        let base_delay = base_delay.max(0);

        if let Some(frame) = &effect.model_animation {
            let start = base_delay + frame.delay_ms.max(0);
            let play = DeferredAction::PlayObjectAnimation {
                object: object.id,
                animation: frame.id,
                looping: false,
            };
            ctx.sequencer.schedule(owner, play, start, now);
            if let Some(reset) = frame.reset_after() {
                let action = DeferredAction::ResetObjectAnimation(object.id);
                ctx.sequencer.schedule(owner, action, start + reset, now);
            }
        }
        if let Some(frame) = &effect.player_animation {
            let start = base_delay + frame.delay_ms.max(0);
            ctx.sequencer
                .schedule(owner, DeferredAction::PlayerAnimation(frame.id), start, now);
            if let Some(reset) = frame.reset_after() {
                ctx.sequencer
                    .schedule(owner, DeferredAction::ResetPlayerAnimation, start + reset, now);
            }
        }
        if let Some(frame) = &effect.player_graphic {
            let start = base_delay + frame.delay_ms.max(0);
            ctx.sequencer
                .schedule(owner, DeferredAction::PlayerGraphic(frame.id), start, now);
            if let Some(reset) = frame.reset_after() {
                ctx.sequencer
                    .schedule(owner, DeferredAction::ResetPlayerGraphic, start + reset, now);
            }
        }

        object.lock_animations(now + base_delay + effect.span());
    }

    fn respawn_objects<H: Host + ?Sized>(&self, product: &mut Product, ctx: &mut TickContext<'_, H>) {
        for object in product.objects_mut() {
            if !object.needs_respawn || object.retiring {
                continue;
            }
            if !object.place(ctx.host) {
                object.needs_respawn = true;
                continue;
            }
            if object.revealed {
                object.show(ctx.host, ctx.allocator);
            }
            debug!(object = %object.id, "object respawned");
        }
    }

    fn expire_objects<H: Host + ?Sized>(&self, product: &mut Product, ctx: &mut TickContext<'_, H>) {
        let owner = product.id;
        let now = ctx.now;
        let mut despawn_now = Vec::new();

        for object in product.objects_mut() {
            if object.role != ObjectRole::Main || object.retiring || !object.is_expired(now) {
                continue;
            }
            object.retiring = true;
            match object.spawn.hide_effect.clone() {
                Some(effect) if !effect.is_empty() && object.is_visible() => {
                    self.fire_visual_effect(owner, object, &effect, 0, ctx);
                    let despawn = DeferredAction::DespawnObject(object.id);
                    ctx.sequencer.schedule(owner, despawn, effect.span(), now);
                }
                _ => despawn_now.push(object.id),
            }
        }

        for id in despawn_now {
            if let Some(mut object) = product.remove_object(id) {
                object.despawn(ctx.host, ctx.allocator);
            }
        }
    }

    fn trigger_spawns<H: Host + ?Sized>(&self, product: &mut Product, ctx: &mut TickContext<'_, H>) {
        let definition = Arc::clone(&product.definition);
        let now = ctx.now;

        for (index, behaviour) in definition.behaviour.spawn_behaviours.iter().enumerate() {
            let interval = behaviour.interval();
            let Some(state) = product.behaviour_state_mut(index) else {
                continue;
            };
            if state.trigger_count >= interval.repeat {
                continue;
            }
            let due = match state.last_trigger_at {
                None => true,
                Some(last) => now >= last + interval.delay_ms,
            };
            if !due {
                continue;
            }
            state.trigger_count += 1;
            state.last_trigger_at = Some(now);

            if !ctx.rng.roll_optional(interval.chance) {
                trace!(product = %product.id, behaviour = index, "spawn interval roll missed");
                continue;
            }
            let Some(option) = ctx.rng.roll_by_chance(&behaviour.options, self.roll_attempts)
            else {
                warn!(product = %product.id, behaviour = index, "spawn behaviour has no options, skipping");
                continue;
            };
            self.spawn_option(product, option, ctx);
        }
    }

    fn spawn_option<H: Host + ?Sized>(
        &self,
        product: &mut Product,
        option: &SpawnOption,
        ctx: &mut TickContext<'_, H>,
    ) {
        let amount = option.spawn_amount.roll(ctx.rng).max(0);
        for _ in 0..amount {
            for spawn in &option.spawns {
                let delay = option.spawn_delay_ms.roll(ctx.rng).max(0);
                self.spawn_entry(product, spawn, delay, ctx);
            }
        }
    }

    /// Materialize one declared model entry, revealed after `delay`
    fn spawn_entry<H: Host + ?Sized>(
        &self,
        product: &mut Product,
        spawn: &SpawnDef,
        delay: Millis,
        ctx: &mut TickContext<'_, H>,
    ) -> Option<ObjectId> {
        let now = ctx.now;
        let model_set = match ctx.rng.roll_by_chance(&spawn.model_sets, self.roll_attempts) {
            Some(set) if !set.model_ids.is_empty() => set.clone(),
            _ => {
                warn!(product = %product.id, "spawn without models, skipping");
                return None;
            }
        };
        let player = swallow("local_player", ctx.host.local_player())?;

        let id = ctx.ids.next_object();
        let max_radius = spawn.placement.radius.unwrap_or(self.placement.max_radius);
        let point = match spawn.placement.location {
            LocationKind::PlayerTile => self.claim_at_or_near(id, player.location, max_radius, ctx),
            LocationKind::PreviousTile => {
                self.claim_at_or_near(id, player.previous_location, max_radius, ctx)
            }
            LocationKind::Radius => ctx.allocator.claim_spawn_point(
                id,
                self.placement.min_radius,
                self.placement.radius_step,
                max_radius,
                player.location,
                &[player.location],
                &*ctx.host,
                ctx.rng,
            ),
        };
        let Some(point) = point else {
            debug!(product = %product.id, "no free spawn point, skipping");
            return None;
        };

        let mut object = SpawnedObject::new(
            id,
            product.id,
            ObjectRole::Main,
            spawn.clone(),
            model_set,
            point,
            now,
        );
        object.scale = spawn.scale.map_or(100, |scale| scale.roll(ctx.rng));
        object.rotation = spawn.rotation.map_or(0, |rotation| rotation.roll(ctx.rng));
        if !object.place(ctx.host) {
            object.needs_respawn = true;
        }

        let mut reveal_delay = delay;
        if let Some(spawner) = &spawn.spawner {
            reveal_delay += self.spawn_spawner(product, spawner, point, delay, ctx);
        }
        ctx.sequencer
            .schedule(product.id, DeferredAction::RevealObject(id), reveal_delay, now);
        product.add_object(object);
        debug!(product = %product.id, object = %id, %point, reveal_delay, "object spawned");
        Some(id)
    }

    /// Place a spawner on `point`; returns how long it stays up
    fn spawn_spawner<H: Host + ?Sized>(
        &self,
        product: &mut Product,
        spawner: &SpawnerDef,
        point: WorldPoint,
        delay: Millis,
        ctx: &mut TickContext<'_, H>,
    ) -> Millis {
        let now = ctx.now;
        let owner = product.id;
        let duration = spawner.duration_ms.max(0);
        let id = ctx.ids.next_object();
        ctx.allocator.register_placement(id, point);

        let mut object = SpawnedObject::new(
            id,
            owner,
            ObjectRole::Spawner,
            SpawnDef::new(vec![spawner.model_set.clone()]),
            spawner.model_set.clone(),
            point,
            now,
        );
        if !object.place(ctx.host) {
            object.needs_respawn = true;
        }
        ctx.sequencer
            .schedule(owner, DeferredAction::RevealObject(id), delay, now);
        if let Some(frame) = &spawner.animation {
            let play = DeferredAction::PlayObjectAnimation {
                object: id,
                animation: frame.id,
                looping: false,
            };
            ctx.sequencer
                .schedule(owner, play, delay + frame.delay_ms.max(0), now);
        }
        ctx.sequencer
            .schedule(owner, DeferredAction::DespawnObject(id), delay + duration, now);
        product.add_object(object);
        duration
    }

    /// Claim exactly `point` when free, otherwise the nearest free tile
    fn claim_at_or_near<H: Host + ?Sized>(
        &self,
        id: ObjectId,
        point: WorldPoint,
        max_radius: u32,
        ctx: &mut TickContext<'_, H>,
    ) -> Option<WorldPoint> {
        if !ctx.allocator.is_claimed(&point) && ctx.host.is_walkable(point) {
            ctx.allocator.register_placement(id, point);
            return Some(point);
        }
        ctx.allocator.claim_spawn_point(
            id,
            self.placement.min_radius,
            self.placement.radius_step,
            max_radius,
            point,
            &[],
            &*ctx.host,
            ctx.rng,
        )
    }

    /// Move following objects, batched per origin tile
    ///
    /// Objects that shared a tile move to the same new tile together.
    fn maintain_locations<H: Host + ?Sized>(
        &self,
        product: &mut Product,
        player: LocalPlayer,
        ctx: &mut TickContext<'_, H>,
    ) {
        let mut batches: IndexMap<(FollowKind, WorldPoint), Vec<ObjectId>> = IndexMap::new();
        for object in product.objects() {
            if object.role != ObjectRole::Main
                || !object.revealed
                || object.retiring
                || !object.is_placed()
            {
                continue;
            }
            let follow = object.spawn.placement.follow;
            let needs_move = match follow {
                FollowKind::None => false,
                FollowKind::InView => {
                    object.point.distance_to(&player.location) > self.placement.view_radius
                }
                FollowKind::PreviousTile => {
                    player.location != player.previous_location
                        && object.point != player.previous_location
                }
            };
            if needs_move {
                batches.entry((follow, object.point)).or_default().push(object.id);
            }
        }

        for ((follow, origin), ids) in batches {
            let target = match follow {
                FollowKind::InView => ctx.allocator.find_outward_spawn_point(
                    self.placement.min_radius,
                    self.placement.radius_step,
                    self.placement.max_radius,
                    player.location,
                    &[player.location],
                    &*ctx.host,
                    ctx.rng,
                ),
                FollowKind::PreviousTile => {
                    let tile = player.previous_location;
                    let free = ctx
                        .allocator
                        .objects_at(&tile)
                        .iter()
                        .all(|occupant| ids.contains(occupant));
                    (free && ctx.host.is_walkable(tile)).then_some(tile)
                }
                FollowKind::None => None,
            };
            let Some(target) = target else {
                trace!(product = %product.id, %origin, "no tile to follow to");
                continue;
            };
            for id in ids {
                if let Some(object) = product.object_mut(id) {
                    self.move_object(object, origin, target, ctx);
                }
            }
        }
    }

    fn move_object<H: Host + ?Sized>(
        &self,
        object: &mut SpawnedObject,
        origin: WorldPoint,
        target: WorldPoint,
        ctx: &mut TickContext<'_, H>,
    ) {
        object.face(ctx.host, orientation_towards(origin, target));
        object.relocate(target, ctx.host, ctx.allocator);

        if let Some(animation) = object.spawn.animations.movement {
            if !object.is_animation_locked(ctx.now) {
                object.play_animation(ctx.host, animation, true);
                ctx.sequencer.schedule(
                    object.product,
                    DeferredAction::ResetObjectAnimation(object.id),
                    GAME_TICK_MS,
                    ctx.now,
                );
            }
        }
    }

    fn trigger_random_effects<H: Host + ?Sized>(
        &self,
        product: &mut Product,
        ctx: &mut TickContext<'_, H>,
    ) {
        let owner = product.id;
        let now = ctx.now;
        for object in product.objects_mut() {
            if object.role != ObjectRole::Main || object.retiring || !object.is_visible() {
                continue;
            }
            let Some(interval) = object.spawn.random_effects_interval.clone() else {
                continue;
            };
            if object.spawn.random_effects.is_empty() || !object.random_effect_due(now) {
                continue;
            }
            let next_delay = interval.delay_ms.roll(ctx.rng);
            object.restart_random_effect_timer(now, next_delay);

            if object.is_animation_locked(now) || !ctx.rng.roll_optional(interval.chance) {
                continue;
            }
            let Some(effect) = ctx
                .rng
                .roll_by_chance(&object.spawn.random_effects, self.roll_attempts)
                .cloned()
            else {
                continue;
            };
            self.fire_visual_effect(owner, object, &effect, 0, ctx);
        }
    }

    /// Register the product's movement override once
    ///
    /// An override dropped at the cap is retried on later ticks; one that ran
    /// out its own duration is not re-added.
    fn sync_movement<H: ?Sized>(&self, product: &mut Product, ctx: &mut TickContext<'_, H>) {
        if product.movement_issued() {
            return;
        }
        let Some(frame) = &product.definition.behaviour.movement_animations else {
            return;
        };
        if ctx.movement.has_overlay_for(product.id)
            || ctx.movement.add_effect(product, frame.clone(), ctx.now)
        {
            product.mark_movement_issued();
        }
    }
}

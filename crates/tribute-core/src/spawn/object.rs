//! A renderable instance placed on behalf of a product

use super::{SpawnAllocator, WorldPoint};
use crate::definition::{ModelSet, SpawnDef};
use crate::host::{swallow, ObjectHandle, PlaceRequest, WorldPrimitives};
use crate::time::Millis;
use crate::{ObjectId, ProductId};
use tracing::debug;

/// What a spawned object is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRole {
    /// The object the product declared
    Main,
    /// Cosmetic object shown before a main object appears
    Spawner,
}

/// A spawned object and its render state
#[derive(Debug, Clone)]
pub struct SpawnedObject {
    pub id: ObjectId,
    pub product: ProductId,
    pub role: ObjectRole,
    /// The spawn rule this object came from
    pub spawn: SpawnDef,
    pub model_set: ModelSet,
    pub created_at: Millis,
    pub point: WorldPoint,
    /// Scale in percent
    pub scale: i64,
    pub rotation: i64,
    /// Animation currently playing
    pub animation: Option<u32>,
    /// Set when the object has appeared and its own lifetime started
    pub expires_at: Option<Millis>,
    /// Host visuals were cleared and must be placed again
    pub needs_respawn: bool,
    /// The object should be visible whenever its product is active
    pub revealed: bool,
    /// Hidden for good, waiting to be despawned
    pub retiring: bool,
    handle: Option<ObjectHandle>,
    visible: bool,
    animation_locked_until: Option<Millis>,
    last_random_effect_at: Millis,
    random_effect_delay: Millis,
}

impl SpawnedObject {
    pub fn new(
        id: ObjectId,
        product: ProductId,
        role: ObjectRole,
        spawn: SpawnDef,
        model_set: ModelSet,
        point: WorldPoint,
        created_at: Millis,
    ) -> Self {
        Self {
            id,
            product,
            role,
            spawn,
            model_set,
            created_at,
            point,
            scale: 100,
            rotation: 0,
            animation: None,
            expires_at: None,
            needs_respawn: false,
            revealed: false,
            retiring: false,
            handle: None,
            visible: false,
            animation_locked_until: None,
            last_random_effect_at: created_at,
            random_effect_delay: 0,
        }
    }

    pub fn handle(&self) -> Option<ObjectHandle> {
        self.handle
    }

    pub fn is_placed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Create the hidden host instance
    ///
    /// Replaces any previous instance, which is how region reloads are
    /// recovered from.
    pub fn place<W: WorldPrimitives + ?Sized>(&mut self, world: &mut W) -> bool {
        if let Some(old) = self.handle.take() {
            swallow("remove_object", world.remove_object(old));
        }
        self.visible = false;
        self.needs_respawn = false;

        let request = PlaceRequest {
            model_ids: &self.model_set.model_ids,
            point: self.point,
            scale: self.scale,
            orientation: self.rotation,
        };
        match swallow("place_object", world.place_object(request)) {
            Some(handle) => {
                self.handle = Some(handle);
                if let Some(animation) = self.animation.or(self.spawn.animations.idle) {
                    swallow("set_animation", world.set_animation(handle, Some(animation), true));
                }
                true
            }
            None => false,
        }
    }

    /// Make the object visible
    ///
    /// Refuses (returns false) unless the object is registered in the
    /// allocator and placed in the host.
    pub fn show<W: WorldPrimitives + ?Sized>(
        &mut self,
        world: &mut W,
        allocator: &SpawnAllocator,
    ) -> bool {
        if !allocator.is_registered(self.id) {
            debug!(object = %self.id, "refusing to show unregistered object");
            return false;
        }
        let Some(handle) = self.handle else {
            return false;
        };
        if !self.visible && swallow("set_active", world.set_active(handle, true)).is_some() {
            self.visible = true;
        }
        self.visible
    }

    pub fn hide<W: WorldPrimitives + ?Sized>(&mut self, world: &mut W) {
        if let (Some(handle), true) = (self.handle, self.visible) {
            swallow("set_active", world.set_active(handle, false));
        }
        self.visible = false;
    }

    /// Hide, release the host instance and free the tile
    pub fn despawn<W: WorldPrimitives + ?Sized>(
        &mut self,
        world: &mut W,
        allocator: &mut SpawnAllocator,
    ) {
        self.hide(world);
        allocator.deregister_placement(self.id);
        if let Some(handle) = self.handle.take() {
            swallow("remove_object", world.remove_object(handle));
        }
    }

    /// Move to `point`, keeping the allocator in step
    pub fn relocate<W: WorldPrimitives + ?Sized>(
        &mut self,
        point: WorldPoint,
        world: &mut W,
        allocator: &mut SpawnAllocator,
    ) {
        allocator.register_placement(self.id, point);
        self.point = point;
        if let Some(handle) = self.handle {
            swallow("set_location", world.set_location(handle, point));
        }
    }

    pub fn play_animation<W: WorldPrimitives + ?Sized>(
        &mut self,
        world: &mut W,
        animation: u32,
        looping: bool,
    ) {
        self.animation = Some(animation);
        if let Some(handle) = self.handle {
            swallow("set_animation", world.set_animation(handle, Some(animation), looping));
        }
    }

    /// Return to the idle animation, or to none
    pub fn reset_animation<W: WorldPrimitives + ?Sized>(&mut self, world: &mut W) {
        let idle = self.spawn.animations.idle;
        self.animation = idle;
        if let Some(handle) = self.handle {
            swallow("set_animation", world.set_animation(handle, idle, true));
        }
    }

    pub fn face<W: WorldPrimitives + ?Sized>(&mut self, world: &mut W, orientation: i64) {
        self.rotation = orientation;
        if let Some(handle) = self.handle {
            swallow("set_orientation", world.set_orientation(handle, orientation));
        }
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_animation_locked(&self, now: Millis) -> bool {
        self.animation_locked_until.is_some_and(|until| now < until)
    }

    pub fn lock_animations(&mut self, until: Millis) {
        self.animation_locked_until = Some(until);
    }

    /// Whether the random effect interval has elapsed
    pub fn random_effect_due(&self, now: Millis) -> bool {
        now >= self.last_random_effect_at + self.random_effect_delay
    }

    /// Start a new random effect interval of `delay` from `now`
    pub fn restart_random_effect_timer(&mut self, now: Millis, delay: Millis) {
        self.last_random_effect_at = now;
        self.random_effect_delay = delay.max(0);
    }

    pub fn last_random_effect_at(&self) -> Millis {
        self.last_random_effect_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_host::FakeHost;

    fn object(id: u64) -> SpawnedObject {
        let set = ModelSet::new(vec![10, 11]);
        SpawnedObject::new(
            ObjectId(id),
            ProductId(1),
            ObjectRole::Main,
            SpawnDef::new(vec![set.clone()]),
            set,
            WorldPoint::new(5, 5, 0),
            1_000,
        )
    }

    #[test]
    fn test_show_requires_registration() {
        let mut host = FakeHost::new();
        let mut allocator = SpawnAllocator::new();
        let mut object = object(1);
        assert!(object.place(&mut host));

        assert!(!object.show(&mut host, &allocator));
        assert_eq!(host.visible_objects(), 0);

        allocator.register_placement(object.id, object.point);
        assert!(object.show(&mut host, &allocator));
        assert_eq!(host.visible_objects(), 1);
    }

    #[test]
    fn test_show_requires_placement() {
        let mut host = FakeHost::new();
        let mut allocator = SpawnAllocator::new();
        let mut object = object(1);
        allocator.register_placement(object.id, object.point);
        assert!(!object.show(&mut host, &allocator));
    }

    #[test]
    fn test_despawn_deregisters_and_removes() {
        let mut host = FakeHost::new();
        let mut allocator = SpawnAllocator::new();
        let mut object = object(1);
        object.place(&mut host);
        allocator.register_placement(object.id, object.point);
        object.show(&mut host, &allocator);

        object.despawn(&mut host, &mut allocator);
        assert!(!allocator.is_registered(object.id));
        assert!(!object.is_visible());
        assert_eq!(host.placed_objects(), 0);
    }

    #[test]
    fn test_place_failure_is_swallowed() {
        let mut host = FakeHost::new();
        host.fail_placement = true;
        let mut object = object(1);
        assert!(!object.place(&mut host));
        assert!(!object.is_placed());
    }

    #[test]
    fn test_relocate_updates_allocator() {
        let mut host = FakeHost::new();
        let mut allocator = SpawnAllocator::new();
        let mut object = object(1);
        object.place(&mut host);
        allocator.register_placement(object.id, object.point);

        let target = WorldPoint::new(6, 6, 0);
        object.relocate(target, &mut host, &mut allocator);
        assert_eq!(allocator.location_of(object.id), Some(target));
        assert_eq!(host.location_of(object.handle().unwrap()), Some(target));
    }

    #[test]
    fn test_animation_lock_and_timer() {
        let mut object = object(1);
        assert!(!object.is_animation_locked(1_000));
        object.lock_animations(2_000);
        assert!(object.is_animation_locked(1_999));
        assert!(!object.is_animation_locked(2_000));

        object.restart_random_effect_timer(1_000, 500);
        assert!(!object.random_effect_due(1_499));
        assert!(object.random_effect_due(1_500));
    }

    #[test]
    fn test_expiry() {
        let mut object = object(1);
        assert!(!object.is_expired(i64::MAX));
        object.expires_at = Some(5_000);
        assert!(!object.is_expired(4_999));
        assert!(object.is_expired(5_000));
    }
}

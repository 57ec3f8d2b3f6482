//! In-memory host world for tests

use crate::definition::{ProductDefinition, StreamerConfig};
use crate::error::{HostError, HostResult};
use crate::host::{
    EquipmentAccess, LocalPlayer, MovementAccess, NotificationSink, ObjectHandle,
    OverheadTextAccess, PlaceRequest, RenderAccess, WidgetAccess, WorldPrimitives,
};
use crate::notification::Notification;
use crate::overlay::{
    EquipmentSlot, MovementAnimations, OverheadTarget, RenderFlag, WidgetId, WidgetState,
};
use crate::product::Product;
use crate::spawn::WorldPoint;
use crate::time::Millis;
use crate::transaction::TransactionRecord;
use crate::{DefId, ProductId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub model_ids: Vec<u32>,
    pub point: WorldPoint,
    pub active: bool,
    pub animation: Option<u32>,
    pub orientation: i64,
}

/// Every tile is walkable unless blocked
#[derive(Debug)]
pub struct FakeHost {
    pub player: LocalPlayer,
    pub blocked: HashSet<WorldPoint>,
    pub objects: HashMap<ObjectHandle, FakeObject>,
    /// Objects ever placed
    pub placements_total: usize,
    pub fail_placement: bool,
    pub fail_delivery: bool,
    pub player_animation: Option<u32>,
    pub player_graphic: Option<u32>,
    pub widgets: HashMap<WidgetId, WidgetState>,
    pub widget_writes: usize,
    pub equipment: HashMap<EquipmentSlot, i32>,
    pub movement: MovementAnimations,
    pub hidden: HashSet<RenderFlag>,
    pub overhead: HashMap<OverheadTarget, Option<String>>,
    pub delivered: Vec<Notification>,
    next_handle: u64,
}

impl FakeHost {
    pub fn new() -> Self {
        let location = WorldPoint::new(100, 100, 0);
        let mut overhead = HashMap::new();
        overhead.insert(OverheadTarget::LocalPlayer, None);
        Self {
            player: LocalPlayer {
                location,
                previous_location: location.offset(0, -1),
            },
            blocked: HashSet::new(),
            objects: HashMap::new(),
            placements_total: 0,
            fail_placement: false,
            fail_delivery: false,
            player_animation: None,
            player_graphic: None,
            widgets: HashMap::new(),
            widget_writes: 0,
            equipment: HashMap::new(),
            movement: MovementAnimations::default(),
            hidden: HashSet::new(),
            overhead,
            delivered: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn block(&mut self, point: WorldPoint) {
        self.blocked.insert(point);
    }

    /// Move the player one step
    pub fn walk_to(&mut self, point: WorldPoint) {
        self.player.previous_location = self.player.location;
        self.player.location = point;
    }

    pub fn visible_objects(&self) -> usize {
        self.objects.values().filter(|object| object.active).count()
    }

    pub fn placed_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn location_of(&self, handle: ObjectHandle) -> Option<WorldPoint> {
        self.objects.get(&handle).map(|object| object.point)
    }

    /// Drop every object, as a region reload does
    pub fn clear_objects(&mut self) {
        self.objects.clear();
    }

    pub fn widget_text(&self, id: WidgetId) -> String {
        self.widgets
            .get(&id)
            .map(|state| state.text.clone())
            .unwrap_or_default()
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> HostResult<&mut FakeObject> {
        self.objects
            .get_mut(&handle)
            .ok_or(HostError::StaleHandle(handle.0))
    }
}

impl WorldPrimitives for FakeHost {
    fn place_object(&mut self, request: PlaceRequest<'_>) -> HostResult<ObjectHandle> {
        if self.fail_placement {
            return Err(HostError::Other("placement rejected".into()));
        }
        self.next_handle += 1;
        self.placements_total += 1;
        let handle = ObjectHandle(self.next_handle);
        self.objects.insert(
            handle,
            FakeObject {
                model_ids: request.model_ids.to_vec(),
                point: request.point,
                active: false,
                animation: None,
                orientation: request.orientation,
            },
        );
        Ok(handle)
    }

    fn remove_object(&mut self, handle: ObjectHandle) -> HostResult<()> {
        self.objects
            .remove(&handle)
            .map(|_| ())
            .ok_or(HostError::StaleHandle(handle.0))
    }

    fn set_active(&mut self, handle: ObjectHandle, active: bool) -> HostResult<()> {
        self.object_mut(handle)?.active = active;
        Ok(())
    }

    fn set_location(&mut self, handle: ObjectHandle, point: WorldPoint) -> HostResult<()> {
        self.object_mut(handle)?.point = point;
        Ok(())
    }

    fn set_animation(
        &mut self,
        handle: ObjectHandle,
        animation: Option<u32>,
        _looping: bool,
    ) -> HostResult<()> {
        self.object_mut(handle)?.animation = animation;
        Ok(())
    }

    fn set_orientation(&mut self, handle: ObjectHandle, orientation: i64) -> HostResult<()> {
        self.object_mut(handle)?.orientation = orientation;
        Ok(())
    }

    fn is_walkable(&self, point: WorldPoint) -> bool {
        !self.blocked.contains(&point)
    }

    fn local_player(&self) -> HostResult<LocalPlayer> {
        Ok(self.player)
    }

    fn set_player_animation(&mut self, animation: Option<u32>) -> HostResult<()> {
        self.player_animation = animation;
        Ok(())
    }

    fn set_player_graphic(&mut self, graphic: Option<u32>) -> HostResult<()> {
        self.player_graphic = graphic;
        Ok(())
    }
}

impl WidgetAccess for FakeHost {
    fn widget(&self, id: WidgetId) -> HostResult<Option<WidgetState>> {
        Ok(self.widgets.get(&id).cloned())
    }

    fn set_widget(&mut self, id: WidgetId, state: &WidgetState) -> HostResult<()> {
        let widget = self
            .widgets
            .get_mut(&id)
            .ok_or_else(|| HostError::Unavailable(id.to_string()))?;
        *widget = state.clone();
        self.widget_writes += 1;
        Ok(())
    }
}

impl EquipmentAccess for FakeHost {
    fn equipment(&self, slot: EquipmentSlot) -> HostResult<Option<i32>> {
        Ok(self.equipment.get(&slot).copied())
    }

    fn set_equipment(&mut self, slot: EquipmentSlot, item: Option<i32>) -> HostResult<()> {
        match item {
            Some(item) => self.equipment.insert(slot, item),
            None => self.equipment.remove(&slot),
        };
        Ok(())
    }
}

impl MovementAccess for FakeHost {
    fn movement_animations(&self) -> HostResult<MovementAnimations> {
        Ok(self.movement)
    }

    fn set_movement_animations(&mut self, animations: &MovementAnimations) -> HostResult<()> {
        self.movement = *animations;
        Ok(())
    }
}

impl RenderAccess for FakeHost {
    fn is_hidden(&self, flag: RenderFlag) -> HostResult<bool> {
        Ok(self.hidden.contains(&flag))
    }

    fn set_hidden(&mut self, flag: RenderFlag, hidden: bool) -> HostResult<()> {
        if hidden {
            self.hidden.insert(flag);
        } else {
            self.hidden.remove(&flag);
        }
        Ok(())
    }
}

impl OverheadTextAccess for FakeHost {
    fn overhead_text(&self, target: &OverheadTarget) -> HostResult<Option<String>> {
        self.overhead
            .get(target)
            .cloned()
            .ok_or_else(|| HostError::Unavailable(format!("{:?}", target)))
    }

    fn set_overhead_text(&mut self, target: &OverheadTarget, text: Option<&str>) -> HostResult<()> {
        let slot = self
            .overhead
            .get_mut(target)
            .ok_or_else(|| HostError::Unavailable(format!("{:?}", target)))?;
        *slot = text.map(str::to_string);
        Ok(())
    }
}

impl NotificationSink for FakeHost {
    fn deliver(&mut self, notification: &Notification) -> HostResult<()> {
        if self.fail_delivery {
            return Err(HostError::Other("chat unavailable".into()));
        }
        self.delivered.push(notification.clone());
        Ok(())
    }
}

/// Product `id` of an empty definition, without expiry correction
pub fn product(id: u64, timestamp_ms: Millis, duration_ms: Millis) -> Product {
    let mut product = product_with(ProductDefinition::new("test", "Test"), timestamp_ms, duration_ms);
    product.id = ProductId(id);
    product
}

/// Product of `definition`, without expiry correction
pub fn product_with(
    definition: ProductDefinition,
    timestamp_ms: Millis,
    duration_ms: Millis,
) -> Product {
    let config = StreamerConfig {
        sku: "test".into(),
        product_id: DefId::new(definition.id.as_str()),
        duration_ms,
        cooldown_ms: 0,
    };
    let record = TransactionRecord::purchase("tx-test", timestamp_ms, "Viewer", "test");
    Product::new(
        ProductId(1),
        Arc::new(record),
        Arc::new(definition),
        config,
        timestamp_ms,
        0,
    )
}

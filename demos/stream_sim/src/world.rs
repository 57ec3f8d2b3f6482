//! A tiny in-memory world standing in for the game client

use std::collections::{HashMap, HashSet};
use tribute_core::host::{
    EquipmentAccess, LocalPlayer, MovementAccess, NotificationSink, ObjectHandle,
    OverheadTextAccess, PlaceRequest, RenderAccess, WidgetAccess, WorldPrimitives,
};
use tribute_core::overlay::{
    EquipmentSlot, MovementAnimations, OverheadTarget, RenderFlag, WidgetId, WidgetState,
};
use tribute_core::spawn::WorldPoint;
use tribute_core::{HostError, HostResult, Notification};

pub const CHATBOX: WidgetId = WidgetId::new(162, 5);

#[derive(Debug)]
struct WorldObject {
    models: Vec<u32>,
    point: WorldPoint,
    active: bool,
}

#[derive(Debug)]
pub struct SimWorld {
    player: LocalPlayer,
    walls: HashSet<WorldPoint>,
    objects: HashMap<ObjectHandle, WorldObject>,
    next_handle: u64,
    widgets: HashMap<WidgetId, WidgetState>,
    equipment: HashMap<EquipmentSlot, i32>,
    movement: MovementAnimations,
    hidden: HashSet<RenderFlag>,
    overhead: HashMap<OverheadTarget, Option<String>>,
    pub chat: Vec<String>,
}

impl SimWorld {
    pub fn new(spawn: WorldPoint) -> Self {
        let mut widgets = HashMap::new();
        widgets.insert(
            CHATBOX,
            WidgetState {
                text: "Welcome".into(),
                color: 0xffffff,
                hidden: false,
            },
        );
        let mut equipment = HashMap::new();
        equipment.insert(EquipmentSlot::Head, 1_163);
        equipment.insert(EquipmentSlot::Cape, 9_747);
        let mut overhead = HashMap::new();
        overhead.insert(OverheadTarget::LocalPlayer, None);

        // A short wall east of the spawn
        let walls = (-3..=3).map(|dy| spawn.offset(2, dy)).collect();

        Self {
            player: LocalPlayer {
                location: spawn,
                previous_location: spawn.offset(0, -1),
            },
            walls,
            objects: HashMap::new(),
            next_handle: 0,
            widgets,
            equipment,
            movement: MovementAnimations {
                idle: Some(808),
                walk: Some(819),
                run: Some(824),
                ..MovementAnimations::default()
            },
            hidden: HashSet::new(),
            overhead,
            chat: Vec::new(),
        }
    }

    pub fn walk(&mut self, dx: i32, dy: i32) {
        let next = self.player.location.offset(dx, dy);
        if self.walls.contains(&next) {
            return;
        }
        self.player.previous_location = self.player.location;
        self.player.location = next;
    }

    pub fn player_location(&self) -> WorldPoint {
        self.player.location
    }

    /// Drop every placed object, as a region change does
    pub fn reload_region(&mut self) {
        self.objects.clear();
    }

    pub fn visible_objects(&self) -> usize {
        self.objects.values().filter(|object| object.active).count()
    }

    pub fn visible_models(&self) -> Vec<(u32, WorldPoint)> {
        let mut models: Vec<_> = self
            .objects
            .values()
            .filter(|object| object.active)
            .filter_map(|object| object.models.first().map(|model| (*model, object.point)))
            .collect();
        models.sort_by_key(|(model, point)| (*model, *point));
        models
    }

    pub fn chatbox(&self) -> &str {
        self.widgets
            .get(&CHATBOX)
            .map(|state| state.text.as_str())
            .unwrap_or("")
    }

    pub fn head_item(&self) -> Option<i32> {
        self.equipment.get(&EquipmentSlot::Head).copied()
    }

    pub fn walk_animation(&self) -> Option<u32> {
        self.movement.walk
    }

    pub fn overhead(&self) -> Option<&str> {
        self.overhead
            .get(&OverheadTarget::LocalPlayer)
            .and_then(|text| text.as_deref())
    }

    pub fn hides_other_players(&self) -> bool {
        self.hidden.contains(&RenderFlag::OtherPlayers)
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> HostResult<&mut WorldObject> {
        self.objects
            .get_mut(&handle)
            .ok_or(HostError::StaleHandle(handle.0))
    }
}

impl WorldPrimitives for SimWorld {
    fn place_object(&mut self, request: PlaceRequest<'_>) -> HostResult<ObjectHandle> {
        self.next_handle += 1;
        let handle = ObjectHandle(self.next_handle);
        self.objects.insert(
            handle,
            WorldObject {
                models: request.model_ids.to_vec(),
                point: request.point,
                active: false,
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

    fn set_animation(&mut self, handle: ObjectHandle, _: Option<u32>, _: bool) -> HostResult<()> {
        self.object_mut(handle).map(|_| ())
    }

    fn set_orientation(&mut self, handle: ObjectHandle, _: i64) -> HostResult<()> {
        self.object_mut(handle).map(|_| ())
    }

    fn is_walkable(&self, point: WorldPoint) -> bool {
        !self.walls.contains(&point)
    }

    fn local_player(&self) -> HostResult<LocalPlayer> {
        Ok(self.player)
    }

    fn set_player_animation(&mut self, _: Option<u32>) -> HostResult<()> {
        Ok(())
    }

    fn set_player_graphic(&mut self, _: Option<u32>) -> HostResult<()> {
        Ok(())
    }
}

impl WidgetAccess for SimWorld {
    fn widget(&self, id: WidgetId) -> HostResult<Option<WidgetState>> {
        Ok(self.widgets.get(&id).cloned())
    }

    fn set_widget(&mut self, id: WidgetId, state: &WidgetState) -> HostResult<()> {
        let widget = self
            .widgets
            .get_mut(&id)
            .ok_or_else(|| HostError::Unavailable(id.to_string()))?;
        *widget = state.clone();
        Ok(())
    }
}

impl EquipmentAccess for SimWorld {
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

impl MovementAccess for SimWorld {
    fn movement_animations(&self) -> HostResult<MovementAnimations> {
        Ok(self.movement)
    }

    fn set_movement_animations(&mut self, animations: &MovementAnimations) -> HostResult<()> {
        self.movement = *animations;
        Ok(())
    }
}

impl RenderAccess for SimWorld {
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

impl OverheadTextAccess for SimWorld {
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

impl NotificationSink for SimWorld {
    fn deliver(&mut self, notification: &Notification) -> HostResult<()> {
        println!("  [chat] {}", notification.message);
        self.chat.push(notification.message.clone());
        Ok(())
    }
}

//! Host world primitives consumed by the runtime
//!
//! The host world is authoritative. The runtime only reaches it through these
//! narrow traits, one per resource kind, and treats every call as a side
//! effect that may fail. Failures are logged at the call site and never abort
//! a tick.

use crate::error::HostResult;
use crate::notification::Notification;
use crate::overlay::{
    EquipmentSlot, MovementAnimations, OverheadTarget, RenderFlag, WidgetId, WidgetState,
};
use crate::spawn::WorldPoint;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Opaque handle to a renderable instance owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

/// What the host needs to place a new object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceRequest<'a> {
    pub model_ids: &'a [u32],
    pub point: WorldPoint,
    /// Scale in percent
    pub scale: i64,
    pub orientation: i64,
}

/// The local player as seen this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPlayer {
    pub location: WorldPoint,
    pub previous_location: WorldPoint,
}

/// Placing, showing and animating world objects
pub trait WorldPrimitives {
    /// Create a hidden instance at `point`
    fn place_object(&mut self, request: PlaceRequest<'_>) -> HostResult<ObjectHandle>;

    /// Release an instance for good
    fn remove_object(&mut self, handle: ObjectHandle) -> HostResult<()>;

    fn set_active(&mut self, handle: ObjectHandle, active: bool) -> HostResult<()>;

    fn set_location(&mut self, handle: ObjectHandle, point: WorldPoint) -> HostResult<()>;

    /// Play an animation; `None` stops the current one
    fn set_animation(
        &mut self,
        handle: ObjectHandle,
        animation: Option<u32>,
        looping: bool,
    ) -> HostResult<()>;

    fn set_orientation(&mut self, handle: ObjectHandle, orientation: i64) -> HostResult<()>;

    fn is_walkable(&self, point: WorldPoint) -> bool;

    fn local_player(&self) -> HostResult<LocalPlayer>;

    /// Play an animation on the local player; `None` resets it
    fn set_player_animation(&mut self, animation: Option<u32>) -> HostResult<()>;

    /// Show a graphic on the local player; `None` clears it
    fn set_player_graphic(&mut self, graphic: Option<u32>) -> HostResult<()>;
}

/// Read-modify-write access to UI elements
pub trait WidgetAccess {
    /// Current state, `None` when the widget is not loaded
    fn widget(&self, id: WidgetId) -> HostResult<Option<WidgetState>>;

    fn set_widget(&mut self, id: WidgetId, state: &WidgetState) -> HostResult<()>;
}

/// Read-modify-write access to the local player's worn items
pub trait EquipmentAccess {
    /// Item worn in `slot`; `Ok(None)` is an empty slot
    fn equipment(&self, slot: EquipmentSlot) -> HostResult<Option<i32>>;

    fn set_equipment(&mut self, slot: EquipmentSlot, item: Option<i32>) -> HostResult<()>;
}

/// The local player's movement animation set
pub trait MovementAccess {
    fn movement_animations(&self) -> HostResult<MovementAnimations>;

    fn set_movement_animations(&mut self, animations: &MovementAnimations) -> HostResult<()>;
}

/// Render visibility toggles
pub trait RenderAccess {
    fn is_hidden(&self, flag: RenderFlag) -> HostResult<bool>;

    fn set_hidden(&mut self, flag: RenderFlag, hidden: bool) -> HostResult<()>;
}

/// Text rendered above characters
pub trait OverheadTextAccess {
    /// Current text; `Err(Unavailable)` when the target is gone
    fn overhead_text(&self, target: &OverheadTarget) -> HostResult<Option<String>>;

    fn set_overhead_text(&mut self, target: &OverheadTarget, text: Option<&str>) -> HostResult<()>;
}

/// Where rendered notifications go
pub trait NotificationSink {
    fn deliver(&mut self, notification: &Notification) -> HostResult<()>;
}

/// Everything the runtime needs from the host
pub trait Host:
    WorldPrimitives
    + WidgetAccess
    + EquipmentAccess
    + MovementAccess
    + RenderAccess
    + OverheadTextAccess
    + NotificationSink
{
}

impl<T> Host for T where
    T: WorldPrimitives
        + WidgetAccess
        + EquipmentAccess
        + MovementAccess
        + RenderAccess
        + OverheadTextAccess
        + NotificationSink
{
}

/// Log a failed host call and keep going
pub(crate) fn swallow<T>(operation: &'static str, result: HostResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(operation, %error, "host call failed");
            None
        }
    }
}

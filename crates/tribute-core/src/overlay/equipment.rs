//! Equipment transmog: temporary per-slot item overrides

use super::{OverlayHooks, OverlayKind, SnapshotStore};
use crate::error::HostResult;
use crate::host::EquipmentAccess;
use crate::time::Millis;
use serde::{Deserialize, Serialize};

/// A worn equipment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentSlot {
    Head,
    Cape,
    Amulet,
    Weapon,
    Torso,
    Shield,
    Arms,
    Legs,
    Hair,
    Hands,
    Boots,
    Jaw,
}

/// Item shown in one slot; `None` renders the slot empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOverride {
    pub slot: EquipmentSlot,
    #[serde(default)]
    pub item: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentFrame {
    pub slots: Vec<SlotOverride>,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
}

/// Overlay kind for the local player's equipment
#[derive(Debug, Clone, Copy, Default)]
pub struct EquipmentOverlay;

impl OverlayKind for EquipmentOverlay {
    type Frame = EquipmentFrame;
    type Key = EquipmentSlot;
    /// Item worn before the first override
    type Snapshot = Option<i32>;

    const NAME: &'static str = "equipment";

    fn duration_ms(frame: &EquipmentFrame) -> Option<Millis> {
        frame.duration_ms
    }

    fn keys(frame: &EquipmentFrame) -> Vec<EquipmentSlot> {
        frame.slots.iter().map(|o| o.slot).collect()
    }
}

impl<H: EquipmentAccess + ?Sized> OverlayHooks<H> for EquipmentOverlay {
    fn apply(
        &mut self,
        frame: &EquipmentFrame,
        snapshots: &mut SnapshotStore<EquipmentSlot, Option<i32>>,
        host: &mut H,
    ) -> HostResult<()> {
        for slot_override in &frame.slots {
            let slot = slot_override.slot;
            snapshots.capture_with(slot, || host.equipment(slot).map(Some))?;
            if host.equipment(slot)? != slot_override.item {
                host.set_equipment(slot, slot_override.item)?;
            }
        }
        Ok(())
    }

    fn restore(
        &mut self,
        frame: &EquipmentFrame,
        snapshots: &SnapshotStore<EquipmentSlot, Option<i32>>,
        host: &mut H,
    ) -> HostResult<()> {
        for slot_override in &frame.slots {
            if let Some(original) = snapshots.get(&slot_override.slot) {
                host.set_equipment(slot_override.slot, *original)?;
            }
        }
        Ok(())
    }
}

//! Player movement animation overrides
//!
//! There is a single movement animation set, so overrides layer: every
//! active overlay is applied in the order it was added and the newest one
//! wins for each animation it sets.

use super::{OverlayEngine, OverlayHooks, OverlayKind, SnapshotStore};
use crate::error::HostResult;
use crate::host::MovementAccess;
use crate::time::Millis;
use crate::ProductId;
use serde::{Deserialize, Serialize};

/// The local player's movement animations; unset entries use the host default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementAnimations {
    #[serde(default)]
    pub idle: Option<u32>,
    #[serde(default)]
    pub walk: Option<u32>,
    #[serde(default)]
    pub run: Option<u32>,
    #[serde(default)]
    pub turn_left: Option<u32>,
    #[serde(default)]
    pub turn_right: Option<u32>,
    #[serde(default)]
    pub rotate: Option<u32>,
}

impl MovementAnimations {
    /// `self` with every animation `other` sets replaced
    pub fn overridden_by(&self, other: &MovementAnimations) -> MovementAnimations {
        MovementAnimations {
            idle: other.idle.or(self.idle),
            walk: other.walk.or(self.walk),
            run: other.run.or(self.run),
            turn_left: other.turn_left.or(self.turn_left),
            turn_right: other.turn_right.or(self.turn_right),
            rotate: other.rotate.or(self.rotate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFrame {
    pub animations: MovementAnimations,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
}

/// Overlay kind for the movement animation set
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementOverlay;

impl OverlayKind for MovementOverlay {
    type Frame = MovementFrame;
    /// The local player's set is the only resource
    type Key = ();
    type Snapshot = MovementAnimations;

    const NAME: &'static str = "movement";

    fn duration_ms(frame: &MovementFrame) -> Option<Millis> {
        frame.duration_ms
    }

    fn keys(_frame: &MovementFrame) -> Vec<()> {
        vec![()]
    }
}

impl<H: MovementAccess + ?Sized> OverlayHooks<H> for MovementOverlay {
    fn apply(
        &mut self,
        frame: &MovementFrame,
        snapshots: &mut SnapshotStore<(), MovementAnimations>,
        host: &mut H,
    ) -> HostResult<()> {
        snapshots.capture_with((), || host.movement_animations().map(Some))?;
        let current = host.movement_animations()?;
        let updated = current.overridden_by(&frame.animations);
        if updated != current {
            host.set_movement_animations(&updated)?;
        }
        Ok(())
    }

    fn restore(
        &mut self,
        _frame: &MovementFrame,
        snapshots: &SnapshotStore<(), MovementAnimations>,
        host: &mut H,
    ) -> HostResult<()> {
        match snapshots.get(&()) {
            Some(original) => host.set_movement_animations(original),
            None => Ok(()),
        }
    }
}

impl OverlayEngine<MovementOverlay> {
    /// The product whose override is currently on top
    pub fn active_owner(&self) -> Option<ProductId> {
        self.overlays()
            .iter()
            .rev()
            .find(|overlay| overlay.is_applied())
            .map(|overlay| overlay.product)
    }
}

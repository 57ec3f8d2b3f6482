//! Text rendered above characters

use super::{OverlayHooks, OverlayKind, SnapshotStore};
use crate::error::HostResult;
use crate::host::OverheadTextAccess;
use crate::time::Millis;
use serde::{Deserialize, Serialize};

/// Character the text is rendered above
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverheadTarget {
    LocalPlayer,
    Player(String),
    Npc(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverheadTextFrame {
    pub target: OverheadTarget,
    /// Message template; rendered against the owning product when added
    pub text: String,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
}

/// Overlay kind for overhead text
#[derive(Debug, Clone, Copy, Default)]
pub struct OverheadTextOverlay;

impl OverlayKind for OverheadTextOverlay {
    type Frame = OverheadTextFrame;
    type Key = OverheadTarget;
    /// Text shown before the first overlay, if any
    type Snapshot = Option<String>;

    const NAME: &'static str = "overhead_text";

    fn duration_ms(frame: &OverheadTextFrame) -> Option<Millis> {
        frame.duration_ms
    }

    fn keys(frame: &OverheadTextFrame) -> Vec<OverheadTarget> {
        vec![frame.target.clone()]
    }
}

impl<H: OverheadTextAccess + ?Sized> OverlayHooks<H> for OverheadTextOverlay {
    fn apply(
        &mut self,
        frame: &OverheadTextFrame,
        snapshots: &mut SnapshotStore<OverheadTarget, Option<String>>,
        host: &mut H,
    ) -> HostResult<()> {
        snapshots.capture_with(frame.target.clone(), || {
            host.overhead_text(&frame.target).map(Some)
        })?;
        if host.overhead_text(&frame.target)?.as_deref() != Some(frame.text.as_str()) {
            host.set_overhead_text(&frame.target, Some(&frame.text))?;
        }
        Ok(())
    }

    fn restore(
        &mut self,
        frame: &OverheadTextFrame,
        snapshots: &SnapshotStore<OverheadTarget, Option<String>>,
        host: &mut H,
    ) -> HostResult<()> {
        match snapshots.get(&frame.target) {
            Some(original) => host.set_overhead_text(&frame.target, original.as_deref()),
            None => Ok(()),
        }
    }
}

//! UI element overrides

use super::{OverlayHooks, OverlayKind, SnapshotStore};
use crate::error::HostResult;
use crate::host::WidgetAccess;
use crate::time::Millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a UI element: interface group plus child index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetId {
    pub group: u32,
    pub child: u32,
}

impl WidgetId {
    pub const fn new(group: u32, child: u32) -> Self {
        Self { group, child }
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget:{}.{}", self.group, self.child)
    }
}

/// The fields of a UI element the runtime may touch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetState {
    pub text: String,
    /// RGB color
    pub color: u32,
    pub hidden: bool,
}

/// Override of one UI element; unset fields are left alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetFrame {
    pub widget: WidgetId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
}

impl WidgetFrame {
    fn applied_to(&self, current: &WidgetState) -> WidgetState {
        WidgetState {
            text: self.text.clone().unwrap_or_else(|| current.text.clone()),
            color: self.color.unwrap_or(current.color),
            hidden: self.hidden.unwrap_or(current.hidden),
        }
    }
}

/// Overlay kind for UI elements
#[derive(Debug, Clone, Copy, Default)]
pub struct WidgetOverlay;

impl OverlayKind for WidgetOverlay {
    type Frame = WidgetFrame;
    type Key = WidgetId;
    type Snapshot = WidgetState;

    const NAME: &'static str = "widget";

    fn duration_ms(frame: &WidgetFrame) -> Option<Millis> {
        frame.duration_ms
    }

    fn keys(frame: &WidgetFrame) -> Vec<WidgetId> {
        vec![frame.widget]
    }
}

impl<H: WidgetAccess + ?Sized> OverlayHooks<H> for WidgetOverlay {
    fn apply(
        &mut self,
        frame: &WidgetFrame,
        snapshots: &mut SnapshotStore<WidgetId, WidgetState>,
        host: &mut H,
    ) -> HostResult<()> {
        if !snapshots.capture_with(frame.widget, || host.widget(frame.widget))? {
            return Ok(());
        }
        // Widget may have unloaded since it was captured
        let Some(current) = host.widget(frame.widget)? else {
            return Ok(());
        };
        let updated = frame.applied_to(&current);
        if updated != current {
            host.set_widget(frame.widget, &updated)?;
        }
        Ok(())
    }

    fn restore(
        &mut self,
        frame: &WidgetFrame,
        snapshots: &SnapshotStore<WidgetId, WidgetState>,
        host: &mut H,
    ) -> HostResult<()> {
        let Some(original) = snapshots.get(&frame.widget) else {
            return Ok(());
        };
        match host.widget(frame.widget)? {
            Some(current) if current != *original => host.set_widget(frame.widget, original),
            _ => Ok(()),
        }
    }
}

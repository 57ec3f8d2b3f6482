//! Menu option interception
//!
//! While active, a matching menu click is consumed instead of reaching the
//! host, and the overlay's notifications fire. No external resource is
//! modified, so apply and restore have nothing to do.

use super::{Overlay, OverlayEngine, OverlayHooks, OverlayKind, SnapshotStore};
use crate::error::HostResult;
use crate::notification::NotificationDef;
use crate::time::Millis;
use serde::{Deserialize, Serialize};

/// A menu entry the player clicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClick {
    pub option: String,
    pub target: String,
}

impl MenuClick {
    pub fn new(option: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuOptionFrame {
    /// Option text to match, case-insensitive
    pub option: String,
    /// Target to match, case-insensitive; absent matches any target
    #[serde(default)]
    pub target: Option<String>,
    /// Fired each time a click is consumed
    #[serde(default)]
    pub notifications: Vec<NotificationDef>,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
}

impl MenuOptionFrame {
    pub fn matches(&self, click: &MenuClick) -> bool {
        self.option.eq_ignore_ascii_case(&click.option)
            && self
                .target
                .as_ref()
                .map_or(true, |target| target.eq_ignore_ascii_case(&click.target))
    }
}

/// Overlay kind for menu interception
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuOverlay;

impl OverlayKind for MenuOverlay {
    type Frame = MenuOptionFrame;
    type Key = ();
    type Snapshot = ();

    const NAME: &'static str = "menu_option";

    fn duration_ms(frame: &MenuOptionFrame) -> Option<Millis> {
        frame.duration_ms
    }

    fn keys(_frame: &MenuOptionFrame) -> Vec<()> {
        Vec::new()
    }
}

impl<H: ?Sized> OverlayHooks<H> for MenuOverlay {
    fn apply(
        &mut self,
        _frame: &MenuOptionFrame,
        _snapshots: &mut SnapshotStore<(), ()>,
        _host: &mut H,
    ) -> HostResult<()> {
        Ok(())
    }

    fn restore(
        &mut self,
        _frame: &MenuOptionFrame,
        _snapshots: &SnapshotStore<(), ()>,
        _host: &mut H,
    ) -> HostResult<()> {
        Ok(())
    }
}

impl OverlayEngine<MenuOverlay> {
    /// The applied overlay that consumes `click`, if any
    ///
    /// The most recently added match wins.
    pub fn intercept(&self, click: &MenuClick) -> Option<&Overlay<MenuOptionFrame>> {
        self.overlays()
            .iter()
            .rev()
            .find(|overlay| overlay.is_applied() && overlay.frame.matches(click))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductStatus;
    use crate::test_host::product;
    use crate::ProductId;

    fn frame(option: &str, target: Option<&str>) -> MenuOptionFrame {
        MenuOptionFrame {
            option: option.into(),
            target: target.map(str::to_string),
            notifications: Vec::new(),
            duration_ms: None,
        }
    }

    #[test]
    fn test_matching() {
        let click = MenuClick::new("Walk here", "");
        assert!(frame("walk here", None).matches(&click));
        assert!(!frame("walk here", Some("Goblin")).matches(&click));
        assert!(frame("Attack", Some("goblin")).matches(&MenuClick::new("attack", "Goblin")));
    }

    #[test]
    fn test_only_applied_overlays_intercept() {
        let owner = product(1, 0, 10_000);
        let mut engine = OverlayEngine::new(MenuOverlay, 4);
        engine.add_effect(&owner, frame("Bank", None), 0);
        let click = MenuClick::new("Bank", "Banker");
        assert!(engine.intercept(&click).is_none());

        let paused = |_: ProductId| ProductStatus::Paused;
        engine.update_effects(0, &paused, &mut ());
        assert!(engine.intercept(&click).is_none());

        let active = |_: ProductId| ProductStatus::Active;
        engine.update_effects(0, &active, &mut ());
        assert_eq!(engine.intercept(&click).map(|o| o.product), Some(owner.id));
    }
}

//! Render visibility toggles
//!
//! Each overlay hides any combination of flags. The effective state is the OR
//! of every applied overlay: a flag stays hidden while at least one applied
//! overlay hides it.

use super::{OverlayEngine, OverlayHooks, OverlayKind, SnapshotStore};
use crate::error::HostResult;
use crate::host::RenderAccess;
use crate::time::Millis;
use serde::{Deserialize, Serialize};

/// Something the host can stop rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderFlag {
    LocalPlayer,
    OtherPlayers,
    Npcs,
    Projectiles,
}

impl RenderFlag {
    pub const ALL: [RenderFlag; 4] = [
        RenderFlag::LocalPlayer,
        RenderFlag::OtherPlayers,
        RenderFlag::Npcs,
        RenderFlag::Projectiles,
    ];
}

/// Which flags are hidden
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityFlags {
    pub local_player: bool,
    pub other_players: bool,
    pub npcs: bool,
    pub projectiles: bool,
}

impl VisibilityFlags {
    pub fn get(&self, flag: RenderFlag) -> bool {
        match flag {
            RenderFlag::LocalPlayer => self.local_player,
            RenderFlag::OtherPlayers => self.other_players,
            RenderFlag::Npcs => self.npcs,
            RenderFlag::Projectiles => self.projectiles,
        }
    }

    pub fn union(&self, other: &VisibilityFlags) -> VisibilityFlags {
        VisibilityFlags {
            local_player: self.local_player || other.local_player,
            other_players: self.other_players || other.other_players,
            npcs: self.npcs || other.npcs,
            projectiles: self.projectiles || other.projectiles,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityFrame {
    #[serde(default)]
    pub hide_local_player: bool,
    #[serde(default)]
    pub hide_other_players: bool,
    #[serde(default)]
    pub hide_npcs: bool,
    #[serde(default)]
    pub hide_projectiles: bool,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
}

impl VisibilityFrame {
    pub fn flags(&self) -> VisibilityFlags {
        VisibilityFlags {
            local_player: self.hide_local_player,
            other_players: self.hide_other_players,
            npcs: self.hide_npcs,
            projectiles: self.hide_projectiles,
        }
    }

    fn hidden(&self) -> impl Iterator<Item = RenderFlag> + '_ {
        let flags = self.flags();
        RenderFlag::ALL.into_iter().filter(move |flag| flags.get(*flag))
    }
}

/// Overlay kind for render visibility
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityOverlay;

impl OverlayKind for VisibilityOverlay {
    type Frame = VisibilityFrame;
    type Key = RenderFlag;
    /// Whether the flag was hidden before the first overlay
    type Snapshot = bool;

    const NAME: &'static str = "visibility";

    fn duration_ms(frame: &VisibilityFrame) -> Option<Millis> {
        frame.duration_ms
    }

    fn keys(frame: &VisibilityFrame) -> Vec<RenderFlag> {
        frame.hidden().collect()
    }
}

impl<H: RenderAccess + ?Sized> OverlayHooks<H> for VisibilityOverlay {
    fn apply(
        &mut self,
        frame: &VisibilityFrame,
        snapshots: &mut SnapshotStore<RenderFlag, bool>,
        host: &mut H,
    ) -> HostResult<()> {
        for flag in frame.hidden() {
            snapshots.capture_with(flag, || host.is_hidden(flag).map(Some))?;
            if !host.is_hidden(flag)? {
                host.set_hidden(flag, true)?;
            }
        }
        Ok(())
    }

    fn restore(
        &mut self,
        frame: &VisibilityFrame,
        snapshots: &SnapshotStore<RenderFlag, bool>,
        host: &mut H,
    ) -> HostResult<()> {
        for flag in frame.hidden() {
            if let Some(original) = snapshots.get(&flag) {
                host.set_hidden(flag, *original)?;
            }
        }
        Ok(())
    }
}

impl OverlayEngine<VisibilityOverlay> {
    /// OR of the flags of every applied overlay
    pub fn combined_flags(&self) -> VisibilityFlags {
        self.overlays()
            .iter()
            .filter(|overlay| overlay.is_applied())
            .fold(VisibilityFlags::default(), |acc, overlay| {
                acc.union(&overlay.frame.flags())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductStatus;
    use crate::test_host::{product, FakeHost};
    use crate::ProductId;

    #[test]
    fn test_flags_or_combined() {
        let mut host = FakeHost::new();
        let owner = product(1, 0, 10_000);
        let mut engine = OverlayEngine::new(VisibilityOverlay, 4);
        engine.add_effect(
            &owner,
            VisibilityFrame {
                hide_npcs: true,
                duration_ms: Some(1_000),
                ..VisibilityFrame::default()
            },
            0,
        );
        engine.add_effect(
            &owner,
            VisibilityFrame {
                hide_npcs: true,
                hide_projectiles: true,
                duration_ms: Some(2_000),
                ..VisibilityFrame::default()
            },
            0,
        );

        let active = |_: ProductId| ProductStatus::Active;
        engine.update_effects(0, &active, &mut host);
        let combined = engine.combined_flags();
        assert!(combined.npcs && combined.projectiles);
        assert!(!combined.local_player);

        // First overlay ends, NPCs stay hidden through the second
        engine.update_effects(1_000, &active, &mut host);
        assert!(host.hidden.contains(&RenderFlag::Npcs));
        assert!(host.hidden.contains(&RenderFlag::Projectiles));

        engine.update_effects(2_000, &active, &mut host);
        assert!(host.hidden.is_empty());
        assert_eq!(engine.combined_flags(), VisibilityFlags::default());
    }

    #[test]
    fn test_already_hidden_flag_stays_hidden() {
        let mut host = FakeHost::new();
        host.hidden.insert(RenderFlag::OtherPlayers);
        let owner = product(1, 0, 10_000);
        let mut engine = OverlayEngine::new(VisibilityOverlay, 4);
        engine.add_effect(
            &owner,
            VisibilityFrame {
                hide_other_players: true,
                duration_ms: Some(100),
                ..VisibilityFrame::default()
            },
            0,
        );
        let active = |_: ProductId| ProductStatus::Active;
        engine.update_effects(0, &active, &mut host);
        engine.update_effects(100, &active, &mut host);
        assert!(host.hidden.contains(&RenderFlag::OtherPlayers));
    }
}

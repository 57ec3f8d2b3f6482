//! Time-bounded overlays on shared external resources
//!
//! One generic engine drives every overlay kind:
//!
//! ```text
//! add_effect ──► active set ──► update_effects (once per tick)
//!                                 │
//!                                 ├── clean: expired / stopped  → restore + remove
//!                                 │          paused + applied   → restore, keep
//!                                 └── apply: product active     → apply, mark applied
//! ```
//!
//! A kind supplies its frame payload and the apply/restore hooks. The engine
//! owns the snapshot store: hooks capture a resource on first touch and
//! restore writes the captured value back verbatim. Snapshots are released
//! once no overlay references their resource any more.

mod equipment;
mod menu;
mod movement;
mod overhead;
mod snapshot;
mod visibility;
mod widget;

pub use equipment::{EquipmentFrame, EquipmentOverlay, EquipmentSlot, SlotOverride};
pub use menu::{MenuClick, MenuOptionFrame, MenuOverlay};
pub use movement::{MovementAnimations, MovementFrame, MovementOverlay};
pub use overhead::{OverheadTarget, OverheadTextFrame, OverheadTextOverlay};
pub use snapshot::SnapshotStore;
pub use visibility::{RenderFlag, VisibilityFlags, VisibilityFrame, VisibilityOverlay};
pub use widget::{WidgetFrame, WidgetId, WidgetOverlay, WidgetState};

use crate::config::OverlayCaps;
use crate::error::HostResult;
use crate::host::Host;
use crate::product::{Product, ProductStatus};
use crate::time::Millis;
use crate::ProductId;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, trace, warn};

/// Static description of an overlay kind
pub trait OverlayKind {
    /// Resource-specific payload of one overlay
    type Frame: Clone + Debug;
    /// Identity of a touched resource
    type Key: Clone + Eq + Hash + Debug;
    /// Original value of a resource
    type Snapshot: Clone + Debug;

    const NAME: &'static str;

    /// Explicit duration, overriding the product's remaining life
    fn duration_ms(frame: &Self::Frame) -> Option<Millis>;

    /// Resources this frame modifies
    fn keys(frame: &Self::Frame) -> Vec<Self::Key>;
}

/// Apply and restore hooks of an overlay kind against host `H`
pub trait OverlayHooks<H: ?Sized>: OverlayKind {
    /// Modify the resource, capturing its snapshot first
    fn apply(
        &mut self,
        frame: &Self::Frame,
        snapshots: &mut SnapshotStore<Self::Key, Self::Snapshot>,
        host: &mut H,
    ) -> HostResult<()>;

    /// Write the captured snapshot back
    fn restore(
        &mut self,
        frame: &Self::Frame,
        snapshots: &SnapshotStore<Self::Key, Self::Snapshot>,
        host: &mut H,
    ) -> HostResult<()>;
}

/// One active overlay
#[derive(Debug, Clone)]
pub struct Overlay<F> {
    pub product: ProductId,
    pub frame: F,
    pub added_at: Millis,
    /// Absolute instant, fixed when the overlay is added
    pub expires_at: Millis,
    is_applied: bool,
}

impl<F> Overlay<F> {
    pub fn is_applied(&self) -> bool {
        self.is_applied
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expires_at
    }
}

/// Lifecycle manager for one overlay kind
#[derive(Debug)]
pub struct OverlayEngine<K: OverlayKind> {
    kind: K,
    overlays: Vec<Overlay<K::Frame>>,
    snapshots: SnapshotStore<K::Key, K::Snapshot>,
    max_active: usize,
}

impl<K: OverlayKind> OverlayEngine<K> {
    pub fn new(kind: K, max_active: usize) -> Self {
        Self {
            kind,
            overlays: Vec::new(),
            snapshots: SnapshotStore::new(),
            max_active,
        }
    }

    /// Add an overlay owned by `product`
    ///
    /// Dropped (returns false) when the kind is at its cap; existing overlays
    /// are untouched.
    pub fn add_effect(&mut self, product: &Product, frame: K::Frame, now: Millis) -> bool {
        if self.overlays.len() >= self.max_active {
            debug!(
                kind = K::NAME,
                product = %product.id,
                cap = self.max_active,
                "overlay cap reached, dropping"
            );
            return false;
        }

        let expires_at = match K::duration_ms(&frame) {
            Some(duration) => now + duration.max(0),
            None => now + product.expires_in_ms(now),
        };
        trace!(kind = K::NAME, product = %product.id, expires_at, "overlay added");
        self.overlays.push(Overlay {
            product: product.id,
            frame,
            added_at: now,
            expires_at,
            is_applied: false,
        });
        true
    }

    /// Clean then apply
    pub fn update_effects<H: ?Sized>(
        &mut self,
        now: Millis,
        status: &dyn Fn(ProductId) -> ProductStatus,
        host: &mut H,
    ) where
        K: OverlayHooks<H>,
    {
        self.clean_effects(now, status, host);
        self.apply_effects(status, host);
    }

    /// Remove expired overlays and overlays of stopped products, restoring
    /// their resources; restore (but keep) applied overlays of paused products
    pub fn clean_effects<H: ?Sized>(
        &mut self,
        now: Millis,
        status: &dyn Fn(ProductId) -> ProductStatus,
        host: &mut H,
    ) where
        K: OverlayHooks<H>,
    {
        let overlays = std::mem::take(&mut self.overlays);
        let mut kept = Vec::with_capacity(overlays.len());

        for mut overlay in overlays {
            let product_status = status(overlay.product);

            if overlay.is_expired(now) || product_status == ProductStatus::Stopped {
                self.restore(&overlay, host);
                debug!(kind = K::NAME, product = %overlay.product, "overlay removed");
                continue;
            }

            if product_status == ProductStatus::Paused && overlay.is_applied {
                self.restore(&overlay, host);
                overlay.is_applied = false;
            }
            kept.push(overlay);
        }

        self.overlays = kept;
        self.release_snapshots();
    }

    /// Apply every overlay whose product is active
    pub fn apply_effects<H: ?Sized>(
        &mut self,
        status: &dyn Fn(ProductId) -> ProductStatus,
        host: &mut H,
    ) where
        K: OverlayHooks<H>,
    {
        for overlay in &mut self.overlays {
            if status(overlay.product) != ProductStatus::Active {
                continue;
            }
            if let Err(error) = self.kind.apply(&overlay.frame, &mut self.snapshots, host) {
                warn!(kind = K::NAME, product = %overlay.product, %error, "overlay apply failed");
            }
            overlay.is_applied = true;
        }
    }

    fn restore<H: ?Sized>(&mut self, overlay: &Overlay<K::Frame>, host: &mut H)
    where
        K: OverlayHooks<H>,
    {
        if let Err(error) = self.kind.restore(&overlay.frame, &self.snapshots, host) {
            // Resource vanished since it was captured; nothing left to restore
            debug!(kind = K::NAME, product = %overlay.product, %error, "overlay restore skipped");
        }
    }

    fn release_snapshots(&mut self) {
        let referenced: Vec<K::Key> = self
            .overlays
            .iter()
            .flat_map(|overlay| K::keys(&overlay.frame))
            .collect();
        self.snapshots.retain(|key| referenced.contains(key));
    }

    pub fn overlays(&self) -> &[Overlay<K::Frame>] {
        &self.overlays
    }

    pub fn has_overlay_for(&self, product: ProductId) -> bool {
        self.overlays.iter().any(|overlay| overlay.product == product)
    }

    pub fn snapshots(&self) -> &SnapshotStore<K::Key, K::Snapshot> {
        &self.snapshots
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}

/// The overlay engines of every kind
#[derive(Debug)]
pub struct Overlays {
    pub widgets: OverlayEngine<WidgetOverlay>,
    pub equipment: OverlayEngine<EquipmentOverlay>,
    pub menu_options: OverlayEngine<MenuOverlay>,
    pub movement: OverlayEngine<MovementOverlay>,
    pub visibility: OverlayEngine<VisibilityOverlay>,
    pub overhead_text: OverlayEngine<OverheadTextOverlay>,
}

impl Overlays {
    pub fn new(caps: &OverlayCaps) -> Self {
        Self {
            widgets: OverlayEngine::new(WidgetOverlay, caps.widgets),
            equipment: OverlayEngine::new(EquipmentOverlay, caps.equipment),
            menu_options: OverlayEngine::new(MenuOverlay, caps.menu_options),
            movement: OverlayEngine::new(MovementOverlay, caps.movement),
            visibility: OverlayEngine::new(VisibilityOverlay, caps.visibility),
            overhead_text: OverlayEngine::new(OverheadTextOverlay, caps.overhead_text),
        }
    }

    /// Run the clean and apply passes of every kind
    pub fn update<H: Host + ?Sized>(
        &mut self,
        now: Millis,
        status: &dyn Fn(ProductId) -> ProductStatus,
        host: &mut H,
    ) {
        self.widgets.update_effects(now, status, host);
        self.equipment.update_effects(now, status, host);
        self.menu_options.update_effects(now, status, host);
        self.movement.update_effects(now, status, host);
        self.visibility.update_effects(now, status, host);
        self.overhead_text.update_effects(now, status, host);
    }

    pub fn total_active(&self) -> usize {
        self.widgets.len()
            + self.equipment.len()
            + self.menu_options.len()
            + self.movement.len()
            + self.visibility.len()
            + self.overhead_text.len()
    }
}

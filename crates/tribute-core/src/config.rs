//! Runtime Configuration - Bounds, timing and placement settings
//!
//! Every collection the runtime grows from outside input is bounded here.
//! Exceeding a bound drops the newest request and leaves existing entries
//! untouched.

use crate::rng::DEFAULT_ROLL_ATTEMPTS;
use crate::time::Millis;
use serde::{Deserialize, Serialize};

/// Per overlay kind cap on concurrently active overlays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayCaps {
    pub widgets: usize,
    pub equipment: usize,
    pub menu_options: usize,
    pub movement: usize,
    pub visibility: usize,
    pub overhead_text: usize,
}

impl Default for OverlayCaps {
    fn default() -> Self {
        Self {
            widgets: 200,
            equipment: 50,
            menu_options: 50,
            movement: 50,
            visibility: 50,
            overhead_text: 50,
        }
    }
}

/// Settings for spawn point allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// First radius tried by the outward search
    pub min_radius: u32,
    /// Radius increment between outward search rings
    pub radius_step: u32,
    /// Largest radius scanned before giving up
    pub max_radius: u32,
    /// Objects further than this from the player are out of view
    pub view_radius: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_radius: 1,
            radius_step: 2,
            max_radius: 12,
            view_radius: 15,
        }
    }
}

/// Configuration for the product runtime
///
/// # Example
///
/// ```
/// use tribute_core::RuntimeConfig;
///
/// let config = RuntimeConfig::default();
/// assert_eq!(config.max_products, 100);
/// assert_eq!(config.roll_attempts, 50);
///
/// let config = RuntimeConfig::default().with_max_products(0);
/// assert_eq!(config.max_products, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum products tracked at the same time
    pub max_products: usize,
    /// Caps per overlay kind
    pub overlay_caps: OverlayCaps,
    /// Passes `roll_by_chance` makes before falling back to the first candidate
    pub roll_attempts: u32,
    /// Added to every product's expiry to absorb feed latency
    pub expiry_correction_ms: Millis,
    /// Minimum gap between two delivered notifications
    pub notification_cooldown_ms: Millis,
    /// Maximum queued notifications
    pub max_queued_notifications: usize,
    /// How many transaction ids are remembered for duplicate detection
    pub dedupe_window: usize,
    /// Spawn placement settings
    pub placement: PlacementConfig,
    /// Seed for the runtime RNG; `None` seeds from the wall clock
    pub rng_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_products: 100,
            overlay_caps: OverlayCaps::default(),
            roll_attempts: DEFAULT_ROLL_ATTEMPTS,
            expiry_correction_ms: 1_000,
            notification_cooldown_ms: 2_500,
            max_queued_notifications: 50,
            dedupe_window: 1_024,
            placement: PlacementConfig::default(),
            rng_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Set the product cap, clamped to at least one
    pub fn with_max_products(mut self, max_products: usize) -> Self {
        self.max_products = max_products.max(1);
        self
    }

    /// Use a fixed RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set the expiry correction
    pub fn with_expiry_correction(mut self, correction_ms: Millis) -> Self {
        self.expiry_correction_ms = correction_ms;
        self
    }

    /// Set the notification cooldown
    pub fn with_notification_cooldown(mut self, cooldown_ms: Millis) -> Self {
        self.notification_cooldown_ms = cooldown_ms.max(0);
        self
    }
}

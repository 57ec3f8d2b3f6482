//! Product definitions: the versioned behaviour scripts a sku activates
//!
//! Definitions are loaded once (usually from RON), wrapped in an `Arc` and
//! shared read-only by every product bound to them.

use crate::error::{Error, Result};
use crate::notification::NotificationDef;
use crate::overlay::{
    EquipmentFrame, MenuOptionFrame, MovementFrame, OverheadTextFrame, VisibilityFrame,
    WidgetFrame,
};
use crate::rng::{Chance, GameRng};
use crate::time::Millis;
use crate::DefId;
use serde::{Deserialize, Serialize};

/// Inclusive random range, rolled fresh every time it is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomRange {
    pub min: i64,
    pub max: i64,
}

impl RandomRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// A range that always rolls `value`
    pub const fn fixed(value: i64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn roll(&self, rng: &mut GameRng) -> i64 {
        rng.range_i64(self.min, self.max)
    }
}

impl Default for RandomRange {
    fn default() -> Self {
        Self::fixed(0)
    }
}

/// Interval that governs when a spawn behaviour fires again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnInterval {
    /// Chance that an elapsed interval actually spawns
    #[serde(default)]
    pub chance: Option<f64>,
    /// Minimum time between two triggers
    #[serde(default)]
    pub delay_ms: Millis,
    /// Total number of triggers, including the first
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

impl SpawnInterval {
    /// Fire exactly once, immediately
    pub fn once() -> Self {
        Self {
            chance: None,
            delay_ms: 0,
            repeat: 1,
        }
    }
}

/// An interval for random visual effects on a spawned object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectInterval {
    #[serde(default)]
    pub chance: Option<f64>,
    pub delay_ms: RandomRange,
}

/// One animation or graphic in a visual effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationFrame {
    pub id: u32,
    /// Wait before starting, added on top of every enclosing delay
    #[serde(default)]
    pub delay_ms: Millis,
    /// How long until the animation is reset; absent or negative never resets
    #[serde(default)]
    pub duration_ms: Option<Millis>,
}

impl AnimationFrame {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            delay_ms: 0,
            duration_ms: None,
        }
    }

    pub fn delayed(mut self, delay_ms: Millis) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn lasting(mut self, duration_ms: Millis) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// The reset delay, if this frame ever resets
    pub fn reset_after(&self) -> Option<Millis> {
        self.duration_ms.filter(|duration| *duration >= 0)
    }

    /// Time from the enclosing start until this frame is done
    pub fn span(&self) -> Millis {
        self.delay_ms.max(0) + self.reset_after().unwrap_or(0)
    }
}

/// A bundle of animations and graphics fired together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualEffect {
    #[serde(default)]
    pub chance: Option<f64>,
    #[serde(default)]
    pub model_animation: Option<AnimationFrame>,
    #[serde(default)]
    pub player_animation: Option<AnimationFrame>,
    #[serde(default)]
    pub player_graphic: Option<AnimationFrame>,
}

impl Chance for VisualEffect {
    fn chance(&self) -> Option<f64> {
        self.chance
    }
}

impl VisualEffect {
    /// Time until every part of the bundle has finished
    pub fn span(&self) -> Millis {
        [
            &self.model_animation,
            &self.player_animation,
            &self.player_graphic,
        ]
        .into_iter()
        .flatten()
        .map(AnimationFrame::span)
        .max()
        .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.model_animation.is_none()
            && self.player_animation.is_none()
            && self.player_graphic.is_none()
    }
}

/// Models rendered together as one spawned object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSet {
    #[serde(default)]
    pub chance: Option<f64>,
    pub model_ids: Vec<u32>,
}

impl ModelSet {
    pub fn new(model_ids: Vec<u32>) -> Self {
        Self {
            chance: None,
            model_ids,
        }
    }
}

impl Chance for ModelSet {
    fn chance(&self) -> Option<f64> {
        self.chance
    }
}

/// Where a new object is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocationKind {
    /// On the player's current tile
    PlayerTile,
    /// On the tile the player just left
    PreviousTile,
    /// On a free tile around the player
    #[default]
    Radius,
}

/// How an object keeps up with the player after spawning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FollowKind {
    #[default]
    None,
    /// Relocate near the player once out of view
    InView,
    /// Trail one tile behind the player
    PreviousTile,
}

/// Placement rules for a spawn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub location: LocationKind,
    #[serde(default)]
    pub follow: FollowKind,
    /// Maximum search radius; the runtime default applies when absent
    #[serde(default)]
    pub radius: Option<u32>,
}

/// Looping animations of a spawned object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAnimations {
    #[serde(default)]
    pub idle: Option<u32>,
    /// Played while the object is relocating
    #[serde(default)]
    pub movement: Option<u32>,
}

/// A cosmetic object shown before the real one appears
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnerDef {
    pub model_set: ModelSet,
    /// How long the spawner is visible; the real object appears after it
    pub duration_ms: Millis,
    #[serde(default)]
    pub animation: Option<AnimationFrame>,
}

/// One declared model entry of a spawn option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnDef {
    /// Alternatives picked by chance
    pub model_sets: Vec<ModelSet>,
    #[serde(default)]
    pub placement: Placement,
    /// Scale in percent
    #[serde(default)]
    pub scale: Option<RandomRange>,
    /// Orientation in host units
    #[serde(default)]
    pub rotation: Option<RandomRange>,
    #[serde(default)]
    pub animations: ObjectAnimations,
    #[serde(default)]
    pub show_effect: Option<VisualEffect>,
    #[serde(default)]
    pub hide_effect: Option<VisualEffect>,
    #[serde(default)]
    pub random_effects: Vec<VisualEffect>,
    #[serde(default)]
    pub random_effects_interval: Option<EffectInterval>,
    #[serde(default)]
    pub spawner: Option<SpawnerDef>,
    /// Lifetime after appearing; absent lives as long as the product
    #[serde(default)]
    pub expiry_ms: Option<RandomRange>,
}

impl SpawnDef {
    pub fn new(model_sets: Vec<ModelSet>) -> Self {
        Self {
            model_sets,
            placement: Placement::default(),
            scale: None,
            rotation: None,
            animations: ObjectAnimations::default(),
            show_effect: None,
            hide_effect: None,
            random_effects: Vec::new(),
            random_effects_interval: None,
            spawner: None,
            expiry_ms: None,
        }
    }
}

/// A weighted alternative of a spawn behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnOption {
    #[serde(default)]
    pub chance: Option<f64>,
    /// How many times the spawn list is materialized per trigger
    #[serde(default = "default_spawn_amount")]
    pub spawn_amount: RandomRange,
    /// Delay before each object appears
    #[serde(default)]
    pub spawn_delay_ms: RandomRange,
    pub spawns: Vec<SpawnDef>,
}

fn default_spawn_amount() -> RandomRange {
    RandomRange::fixed(1)
}

impl SpawnOption {
    pub fn new(spawns: Vec<SpawnDef>) -> Self {
        Self {
            chance: None,
            spawn_amount: default_spawn_amount(),
            spawn_delay_ms: RandomRange::default(),
            spawns,
        }
    }
}

impl Chance for SpawnOption {
    fn chance(&self) -> Option<f64> {
        self.chance
    }
}

/// A spawn rule with its own trigger interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnBehaviour {
    /// Absent means fire once when the product starts
    #[serde(default)]
    pub interval: Option<SpawnInterval>,
    pub options: Vec<SpawnOption>,
}

impl SpawnBehaviour {
    /// The effective interval
    pub fn interval(&self) -> SpawnInterval {
        self.interval.clone().unwrap_or_else(SpawnInterval::once)
    }
}

/// Everything a product does while it is active
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Behaviour {
    #[serde(default)]
    pub spawn_behaviours: Vec<SpawnBehaviour>,
    #[serde(default)]
    pub equipment: Option<EquipmentFrame>,
    #[serde(default)]
    pub movement_animations: Option<MovementFrame>,
    #[serde(default)]
    pub widgets: Vec<WidgetFrame>,
    #[serde(default)]
    pub menu_options: Vec<MenuOptionFrame>,
    #[serde(default)]
    pub visibility: Option<VisibilityFrame>,
    #[serde(default)]
    pub overhead_text: Option<OverheadTextFrame>,
    #[serde(default)]
    pub notifications: Vec<NotificationDef>,
}

/// A versioned behaviour script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDefinition {
    pub id: DefId,
    #[serde(default)]
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub behaviour: Behaviour,
}

impl ProductDefinition {
    pub fn new(id: impl Into<DefId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            name: name.into(),
            behaviour: Behaviour::default(),
        }
    }

    /// Check structural rules the runtime relies on
    ///
    /// The runtime also tolerates definitions that fail these checks (it
    /// skips the broken behaviour), but loaders reject them up front.
    pub fn validate(&self) -> Result<()> {
        let id = self.id.as_str();
        for (b, behaviour) in self.behaviour.spawn_behaviours.iter().enumerate() {
            if behaviour.options.is_empty() {
                return Err(Error::invalid(id, format!("spawn behaviour {} has no options", b)));
            }
            if let Some(interval) = &behaviour.interval {
                if interval.delay_ms < 0 {
                    return Err(Error::invalid(id, format!("spawn behaviour {} has a negative delay", b)));
                }
            }
            for (o, option) in behaviour.options.iter().enumerate() {
                check_chance(id, option.chance)?;
                if option.spawns.is_empty() {
                    return Err(Error::invalid(
                        id,
                        format!("spawn option {}.{} has no spawns", b, o),
                    ));
                }
                for spawn in &option.spawns {
                    if spawn.model_sets.iter().all(|set| set.model_ids.is_empty()) {
                        return Err(Error::invalid(
                            id,
                            format!("spawn option {}.{} has a spawn without models", b, o),
                        ));
                    }
                    for set in &spawn.model_sets {
                        check_chance(id, set.chance)?;
                    }
                    for effect in &spawn.random_effects {
                        check_chance(id, effect.chance)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_chance(id: &str, chance: Option<f64>) -> Result<()> {
    match chance {
        Some(chance) if !(0.0..=1.0).contains(&chance) => Err(Error::invalid(
            id,
            format!("chance {} is outside 0..=1", chance),
        )),
        _ => Ok(()),
    }
}

/// Streamer-side settings that bind a sku to a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerConfig {
    pub sku: String,
    pub product_id: DefId,
    /// How long a product stays active
    pub duration_ms: Millis,
    /// Minimum gap between two purchases of this sku
    #[serde(default)]
    pub cooldown_ms: Millis,
}

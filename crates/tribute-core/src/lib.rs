//! Tribute Core - Runtime for viewer-triggered effects over a host world
//!
//! A marketplace transaction (a viewer buying an effect for a streamer)
//! becomes a time-bounded `Product`. While it lives, the runtime:
//! - Spawns and animates visual objects around the local player
//! - Layers overlays on shared resources (widgets, equipment, menus,
//!   movement animations, render flags, overhead text) and restores them
//! - Queues chat notifications at purchase, start and end
//!
//! ## Threading
//!
//! `Runtime` is driven from the single world thread. Transactions enter
//! through a cloneable `TransactionInbox` and definitions are swapped
//! through a shared `DefinitionStore`; both can be fed from any thread.
//!
//! ## Host
//!
//! Everything the runtime does to the world goes through the narrow traits
//! in [`host`]. Host failures are logged and never abort a tick.

pub mod config;
pub mod definition;
mod error;
pub mod host;
mod identity;
pub mod notification;
pub mod overlay;
mod product;
mod rng;
pub mod runtime;
pub mod scheduler;
pub mod sequencer;
pub mod spawn;
pub mod store;
pub mod time;
pub mod transaction;

#[cfg(test)]
mod test_host;

pub use config::{OverlayCaps, PlacementConfig, RuntimeConfig};
pub use definition::{ProductDefinition, StreamerConfig};
pub use error::{Error, HostError, HostResult, Result};
pub use host::Host;
pub use identity::{DefId, ObjectId, ProductId};
pub use notification::{Notification, NotificationDispatcher};
pub use product::{BehaviourState, Product, ProductStatus};
pub use rng::{Chance, GameRng};
pub use runtime::{Acceptance, Runtime, TickReport};
pub use store::{Catalog, DefinitionStore};
pub use time::{Clock, ManualClock, Millis, SystemClock};
pub use transaction::{TransactionId, TransactionInbox, TransactionOrigin, TransactionRecord};

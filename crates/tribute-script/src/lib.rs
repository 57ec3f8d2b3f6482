//! Tribute Script - RON loader for the effect catalog
//!
//! Loads from RON files:
//! - Product definitions (`products: [...]` or a single definition)
//! - Streamer configs binding skus to definitions (`streamer_configs: [...]`)
//! - Runtime settings
//!
//! A finished `Loader` yields a validated `Catalog` that can be published to
//! a running `DefinitionStore`.

mod error;
mod loader;

pub use error::{Error, Result};
pub use loader::Loader;

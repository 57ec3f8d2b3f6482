//! Hot-reloadable catalog of definitions and streamer configs
//!
//! A sync task publishes whole catalogs from any thread; the runtime resolves
//! skus against the latest one. Definitions are handed out as `Arc`s, so a
//! product keeps the instance it was bound to across reloads.

use crate::definition::{ProductDefinition, StreamerConfig};
use crate::error::{Error, Result};
use crate::DefId;
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// One consistent set of definitions and streamer configs
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub definitions: IndexMap<DefId, Arc<ProductDefinition>>,
    /// Keyed by sku
    pub streamer_configs: IndexMap<String, StreamerConfig>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition
    pub fn insert_definition(&mut self, definition: ProductDefinition) {
        self.definitions
            .insert(definition.id.clone(), Arc::new(definition));
    }

    /// Add or replace the config of a sku
    pub fn insert_streamer_config(&mut self, config: StreamerConfig) {
        self.streamer_configs.insert(config.sku.clone(), config);
    }

    pub fn definition(&self, id: &DefId) -> Option<&Arc<ProductDefinition>> {
        self.definitions.get(id)
    }

    /// Look up `sku -> StreamerConfig -> ProductDefinition`
    pub fn resolve(&self, sku: &str) -> Result<(StreamerConfig, Arc<ProductDefinition>)> {
        let config = self
            .streamer_configs
            .get(sku)
            .ok_or_else(|| Error::UnknownSku(sku.to_string()))?;
        let definition = self
            .definitions
            .get(&config.product_id)
            .ok_or_else(|| Error::DefinitionNotFound(config.product_id.to_string()))?;
        Ok((config.clone(), Arc::clone(definition)))
    }
}

#[derive(Debug, Default)]
struct Published {
    revision: u64,
    catalog: Catalog,
}

/// Shared handle to the current catalog; clones see the same catalog
#[derive(Debug, Clone, Default)]
pub struct DefinitionStore {
    inner: Arc<RwLock<Published>>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `catalog` as revision 1
    pub fn with_catalog(catalog: Catalog) -> Self {
        let store = Self::new();
        store.publish(catalog);
        store
    }

    /// Replace the catalog, returning the new revision
    pub fn publish(&self, catalog: Catalog) -> u64 {
        let mut published = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        published.revision += 1;
        info!(
            revision = published.revision,
            definitions = catalog.definitions.len(),
            skus = catalog.streamer_configs.len(),
            "definition catalog published"
        );
        published.catalog = catalog;
        published.revision
    }

    pub fn revision(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revision
    }

    pub fn resolve(&self, sku: &str) -> Result<(StreamerConfig, Arc<ProductDefinition>)> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .catalog
            .resolve(sku)
    }

    pub fn definition(&self, id: &DefId) -> Option<Arc<ProductDefinition>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .catalog
            .definition(id)
            .cloned()
    }
}

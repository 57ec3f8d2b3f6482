//! RON catalog loader

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use tribute_core::{Catalog, DefinitionStore, ProductDefinition, RuntimeConfig, StreamerConfig};

/// Accumulates definitions and streamer configs from RON sources
#[derive(Debug, Default)]
pub struct Loader {
    catalog: Catalog,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let loaded = self.load_str(&content)?;
        debug!(path = %path.display(), loaded, "catalog file loaded");
        Ok(())
    }

    /// Load a RON catalog source; returns how many entries it held
    ///
    /// The kind is taken from the top-level fields: `products` and
    /// `streamer_configs` (both may appear in one source), or else a lone
    /// product definition.
    pub fn load_str(&mut self, content: &str) -> Result<usize> {
        #[derive(serde::Deserialize)]
        struct CatalogFile {
            #[serde(default)]
            products: Option<Vec<ProductDefinition>>,
            #[serde(default)]
            streamer_configs: Option<Vec<StreamerConfig>>,
        }

        let file: CatalogFile = ron::from_str(content)?;
        if file.products.is_none() && file.streamer_configs.is_none() {
            self.load_single_definition(content)?;
            return Ok(1);
        }
        let mut loaded = 0;
        if let Some(products) = file.products {
            loaded += self.insert_definitions(products)?;
        }
        if let Some(configs) = file.streamer_configs {
            loaded += self.insert_streamer_configs(configs)?;
        }
        Ok(loaded)
    }

    /// Load product definitions from a RON string; returns how many
    pub fn load_products_str(&mut self, content: &str) -> Result<usize> {
        #[derive(serde::Deserialize)]
        struct ProductFile {
            products: Vec<ProductDefinition>,
        }

        let file: ProductFile = ron::from_str(content)?;
        self.insert_definitions(file.products)
    }

    /// Load streamer configs from a RON string; returns how many
    pub fn load_streamer_configs_str(&mut self, content: &str) -> Result<usize> {
        #[derive(serde::Deserialize)]
        struct StreamerFile {
            streamer_configs: Vec<StreamerConfig>,
        }

        let file: StreamerFile = ron::from_str(content)?;
        self.insert_streamer_configs(file.streamer_configs)
    }

    fn load_single_definition(&mut self, content: &str) -> Result<()> {
        let definition: ProductDefinition =
            ron::from_str(content).map_err(Error::UnknownFormat)?;
        self.insert_definition(definition)
    }

    fn insert_definitions(&mut self, definitions: Vec<ProductDefinition>) -> Result<usize> {
        let count = definitions.len();
        for definition in definitions {
            self.insert_definition(definition)?;
        }
        Ok(count)
    }

    fn insert_streamer_configs(&mut self, configs: Vec<StreamerConfig>) -> Result<usize> {
        let count = configs.len();
        for config in configs {
            if self.catalog.streamer_configs.contains_key(&config.sku) {
                return Err(Error::DuplicateSku(config.sku));
            }
            self.catalog.insert_streamer_config(config);
        }
        Ok(count)
    }

    fn insert_definition(&mut self, definition: ProductDefinition) -> Result<()> {
        definition.validate()?;
        if self.catalog.definitions.contains_key(&definition.id) {
            return Err(Error::DuplicateDefinition(definition.id.to_string()));
        }
        self.catalog.insert_definition(definition);
        Ok(())
    }

    /// Load all RON files from a directory, recursively, in name order
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for file_path in entries {
            if file_path.is_dir() {
                self.load_directory(&file_path)?;
            } else if file_path.extension().is_some_and(|e| e == "ron") {
                self.load_file(&file_path)?;
            }
        }
        Ok(())
    }

    /// Check that every streamer config points at a loaded definition
    pub fn validate(&self) -> Result<()> {
        for config in self.catalog.streamer_configs.values() {
            if self.catalog.definition(&config.product_id).is_none() {
                return Err(Error::DanglingConfig {
                    sku: config.sku.clone(),
                    product_id: config.product_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate and return the catalog
    pub fn finish(self) -> Result<Catalog> {
        self.validate()?;
        Ok(self.catalog)
    }

    /// Validate and hot-swap the catalog into `store`; returns the revision
    pub fn publish(self, store: &DefinitionStore) -> Result<u64> {
        let catalog = self.finish()?;
        let revision = store.publish(catalog);
        info!(revision, "catalog loaded and published");
        Ok(revision)
    }

    /// Current state (for inspection during loading)
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parse runtime settings; omitted fields keep their defaults
    pub fn load_runtime_config_str(content: &str) -> Result<RuntimeConfig> {
        Ok(ron::from_str(content)?)
    }

    pub fn load_runtime_config(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
        Self::load_runtime_config_str(&fs::read_to_string(path)?)
    }
}

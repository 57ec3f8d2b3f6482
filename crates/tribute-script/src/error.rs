//! Error types for tribute-script

use thiserror::Error;

/// Loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error(transparent)]
    Core(#[from] tribute_core::Error),

    #[error("Could not parse as any known file type: {0}")]
    UnknownFormat(ron::error::SpannedError),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("Duplicate streamer config for sku {0}")]
    DuplicateSku(String),

    #[error("Streamer config for sku {sku} references unknown definition {product_id}")]
    DanglingConfig { sku: String, product_id: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

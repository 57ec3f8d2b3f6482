//! Error types for tribute-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Host call failed: {0}")]
    Host(#[from] HostError),

    #[error("No streamer config for sku: {0}")]
    UnknownSku(String),

    #[error("Definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("Invalid definition {id}: {reason}")]
    InvalidDefinition { id: String, reason: String },

    #[error("Product not found: {0}")]
    ProductNotFound(String),
}

impl Error {
    /// Create an invalid definition error
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a host primitive
///
/// Host calls have no return contract beyond success. The runtime logs these
/// and carries on with the tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    #[error("object handle {0} is no longer valid")]
    StaleHandle(u64),

    #[error("{0}")]
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for host primitives
pub type HostResult<T> = std::result::Result<T, HostError>;

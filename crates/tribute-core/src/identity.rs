//! Identity types for products, spawned objects and definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime identifier of an accepted product instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub u64);

impl ProductId {
    /// Create a new product ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product:{}", self.0)
    }
}

/// Runtime identifier of a spawned world object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Create a new object ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object:{}", self.0)
    }
}

/// Identifier for a definition (product, sku, etc.) loaded from scripts
///
/// Uses a string-based ID for easy reference from RON scripts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefId(pub String);

impl DefId {
    /// Create a new definition ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DefId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DefId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hands out monotonically increasing raw IDs
#[derive(Debug, Clone, Default)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn next_product(&mut self) -> ProductId {
        ProductId(self.bump())
    }

    pub(crate) fn next_object(&mut self) -> ObjectId {
        ObjectId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

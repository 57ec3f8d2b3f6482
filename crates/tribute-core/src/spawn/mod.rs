//! Spawned world objects and the tiles they occupy

mod allocator;
mod object;

pub use allocator::SpawnAllocator;
pub use object::{ObjectRole, SpawnedObject};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A world tile on a vertical layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: i32,
    pub y: i32,
    pub plane: u8,
}

impl WorldPoint {
    pub const fn new(x: i32, y: i32, plane: u8) -> Self {
        Self { x, y, plane }
    }

    /// Chebyshev distance; tiles on other planes are infinitely far
    pub fn distance_to(&self, other: &WorldPoint) -> u32 {
        if self.plane != other.plane {
            return u32::MAX;
        }
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            plane: self.plane,
        }
    }
}

impl fmt::Display for WorldPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.plane)
    }
}

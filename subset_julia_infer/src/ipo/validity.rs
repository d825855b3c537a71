//! World-age validity windows.
//!
//! Every inferred result is only correct for a contiguous range of world
//! ages: the worlds in which the same methods would be selected for every
//! call it saw.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive range of world ages `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldRange {
    pub min: u64,
    pub max: u64,
}

impl WorldRange {
    /// Every world.
    pub const ALL: WorldRange = WorldRange {
        min: 0,
        max: u64::MAX,
    };

    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Valid from `min` onward.
    pub fn since(min: u64) -> Self {
        Self { min, max: u64::MAX }
    }

    pub fn contains(&self, world: u64) -> bool {
        self.min <= world && world <= self.max
    }

    /// The worlds in both ranges. May be empty.
    pub fn intersect(&self, other: &WorldRange) -> WorldRange {
        WorldRange {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn overlaps(&self, other: &WorldRange) -> bool {
        !self.intersect(other).is_empty()
    }
}

impl Default for WorldRange {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for WorldRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max == u64::MAX {
            write!(f, "[{}, max]", self.min)
        } else {
            write!(f, "[{}, {}]", self.min, self.max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect() {
        let a = WorldRange::new(1, 10);
        let b = WorldRange::since(5);
        assert_eq!(a.intersect(&b), WorldRange::new(5, 10));
        assert!(a.intersect(&WorldRange::new(11, 12)).is_empty());
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_contains_and_display() {
        let r = WorldRange::new(3, 7);
        assert!(r.contains(3) && r.contains(7));
        assert!(!r.contains(8));
        assert_eq!(r.to_string(), "[3, 7]");
        assert_eq!(WorldRange::since(2).to_string(), "[2, max]");
    }
}

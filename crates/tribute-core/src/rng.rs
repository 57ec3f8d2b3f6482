//! Deterministic random number generator
//!
//! Uses a simple xorshift64 algorithm so a seeded runtime replays the same
//! spawn positions, delays and effect rolls.

use serde::{Deserialize, Serialize};

/// Default number of passes `roll_by_chance` makes over its candidates
pub const DEFAULT_ROLL_ATTEMPTS: u32 = 50;

/// Something that can be picked by a chance roll
///
/// `None` means "no explicit chance": the candidate gets `1 / N` where `N` is
/// the number of candidates in the roll.
pub trait Chance {
    fn chance(&self) -> Option<f64>;
}

impl Chance for Option<f64> {
    fn chance(&self) -> Option<f64> {
        *self
    }
}

/// A deterministic random number generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRng {
    state: u64,
}

impl GameRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        // Ensure non-zero state (xorshift requires this)
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Get the current state (useful for saving/loading)
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next raw u64 value
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64 algorithm
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generate a random f64 in range [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64 + 1.0)
    }

    /// Generate a random f64 in range [min, max)
    pub fn range_f64(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// Generate a random i64 in range [min, max]
    ///
    /// Swapped bounds are tolerated.
    pub fn range_i64(&mut self, min: i64, max: i64) -> i64 {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let Some(range) = max.abs_diff(min).checked_add(1) else {
            return self.next_u64() as i64;
        };
        let value = self.next_u64() % range;
        min.wrapping_add(value as i64)
    }

    /// Generate a random bool with given probability of true
    pub fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Pick a random element from a slice
    pub fn pick<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let i = (self.next_u64() as usize) % slice.len();
            Some(&slice[i])
        }
    }

    /// Pick one candidate by its individual chance
    ///
    /// Walks the candidates in declaration order, accepting the first one whose
    /// roll lands inside its chance. After `max_attempts` full passes without an
    /// acceptance the first candidate is returned. Empty input yields `None`.
    pub fn roll_by_chance<'a, T: Chance>(
        &mut self,
        candidates: &'a [T],
        max_attempts: u32,
    ) -> Option<&'a T> {
        let first = candidates.first()?;
        let default_chance = 1.0 / candidates.len() as f64;

        for _ in 0..max_attempts {
            for candidate in candidates {
                let chance = candidate.chance().unwrap_or(default_chance);
                if self.chance(chance) {
                    return Some(candidate);
                }
            }
        }

        Some(first)
    }

    /// Roll an optional chance, where `None` always succeeds
    pub fn roll_optional(&mut self, chance: Option<f64>) -> bool {
        match chance {
            Some(chance) => self.chance(chance),
            None => true,
        }
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::new(12345)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut rng1 = GameRng::new(42);
        let mut rng2 = GameRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_range() {
        let mut rng = GameRng::new(42);

        for _ in 0..100 {
            let f = rng.next_f64();
            assert!((0.0..1.0).contains(&f));
        }

        for _ in 0..100 {
            let i = rng.range_i64(10, 20);
            assert!((10..=20).contains(&i));
        }

        for _ in 0..100 {
            let i = rng.range_i64(5, -5);
            assert!((-5..=5).contains(&i));
        }

        assert_eq!(rng.range_i64(7, 7), 7);
    }

    #[test]
    fn test_range_extreme_bounds() {
        let mut rng = GameRng::new(3);
        for _ in 0..100 {
            let i = rng.range_i64(i64::MIN, 0);
            assert!(i <= 0);
            let j = rng.range_i64(i64::MAX - 2, i64::MAX);
            assert!(j >= i64::MAX - 2);
        }
        rng.range_i64(i64::MIN, i64::MAX);
    }

    #[test]
    fn test_roll_by_chance_empty() {
        let mut rng = GameRng::new(42);
        let empty: [Option<f64>; 0] = [];
        assert!(rng.roll_by_chance(&empty, DEFAULT_ROLL_ATTEMPTS).is_none());
    }

    #[test]
    fn test_roll_by_chance_falls_back_to_first() {
        let mut rng = GameRng::new(42);
        let candidates = [Some(0.0), Some(0.0), Some(0.0)];
        let picked = rng.roll_by_chance(&candidates, DEFAULT_ROLL_ATTEMPTS);
        assert!(std::ptr::eq(picked.unwrap(), &candidates[0]));
    }

    #[test]
    fn test_roll_by_chance_zero_attempts_is_first() {
        let mut rng = GameRng::new(42);
        let candidates = [Some(1.0), Some(1.0)];
        let picked = rng.roll_by_chance(&candidates, 0).unwrap();
        assert!(std::ptr::eq(picked, &candidates[0]));
    }

    #[test]
    fn test_roll_by_chance_certain_candidate() {
        let mut rng = GameRng::new(7);
        let candidates = [Some(0.0), Some(1.0), Some(0.0)];
        for _ in 0..20 {
            let picked = rng.roll_by_chance(&candidates, DEFAULT_ROLL_ATTEMPTS).unwrap();
            assert!(std::ptr::eq(picked, &candidates[1]));
        }
    }

    #[test]
    fn test_roll_by_chance_default_share() {
        let mut rng = GameRng::new(99);
        let candidates = [None, None, None, None];
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            let picked = rng.roll_by_chance(&candidates, DEFAULT_ROLL_ATTEMPTS).unwrap();
            let index = candidates
                .iter()
                .position(|c| std::ptr::eq(c, picked))
                .unwrap();
            counts[index] += 1;
        }
        // Declaration order biases toward earlier candidates, but all are reachable
        assert!(counts.iter().all(|&c| c > 0));
        assert!(counts[0] > counts[3]);
    }

    #[test]
    fn test_roll_optional() {
        let mut rng = GameRng::new(1);
        assert!(rng.roll_optional(None));
        assert!(!rng.roll_optional(Some(0.0)));
        assert!(rng.roll_optional(Some(1.0)));
    }
}

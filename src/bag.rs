//! The depleting tile bag.
//!
//! Next tiles are drawn without replacement from a bag of base ranks
//! (1, 2, 3). Once the bag runs dry it is refilled to the configured
//! composition. The bag is a small `Copy` value so that it can travel with
//! every solver state and be part of its key.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{Rank, TILE_KINDS};

/// Base ranks that can be drawn, in the order their counts are stored.
pub const BASE_RANKS: [Rank; 3] = [1, 2, 3];

/// Refill composition of the bag: how many tiles of rank 1, 2 and 3 it holds
/// when full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BagConfig {
    pub refill: [u8; 3],
}

impl Default for BagConfig {
    fn default() -> Self { Self { refill: [1, 1, 1] } }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bag refill composition is empty")]
    EmptyRefill,
    #[error("bag holds {count} tiles of rank {rank}; at most {max} are supported")]
    TooMany { rank: Rank, count: u8, max: u8 },
}

impl BagConfig {
    /// Reject compositions the state key cannot represent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refill.iter().all(|&c| c == 0) {
            return Err(ConfigError::EmptyRefill);
        }
        for (&rank, &count) in BASE_RANKS.iter().zip(self.refill.iter()) {
            if count >= TILE_KINDS {
                return Err(ConfigError::TooMany { rank, count, max: TILE_KINDS - 1 });
            }
        }
        Ok(())
    }
}

/// Undrawn tiles, as a count per base rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bag {
    counts: [u8; 3],
}

impl Bag {
    /// A freshly filled bag.
    pub fn full(cfg: &BagConfig) -> Self { Self { counts: cfg.refill } }

    pub fn from_counts(counts: [u8; 3]) -> Self { Self { counts } }

    #[inline]
    pub fn counts(&self) -> [u8; 3] { self.counts }

    /// Number of undrawn tiles of `rank` (0 for non-base ranks).
    #[inline]
    pub fn count(&self, rank: Rank) -> u8 {
        match rank {
            1..=3 => self.counts[rank as usize - 1],
            _ => 0,
        }
    }

    #[inline]
    pub fn total(&self) -> u32 { self.counts.iter().map(|&c| c as u32).sum() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.total() == 0 }

    /// Take one tile of `rank` out of the bag, or `None` if there is none.
    pub fn remove(self, rank: Rank) -> Option<Bag> {
        if self.count(rank) == 0 {
            return None;
        }
        let mut counts = self.counts;
        counts[rank as usize - 1] -= 1;
        Some(Bag { counts })
    }

    /// Refill to `cfg` if the bag is empty; otherwise unchanged.
    #[inline]
    pub fn check(self, cfg: &BagConfig) -> Bag {
        if self.is_empty() { Bag::full(cfg) } else { self }
    }

    /// Every non-empty bag a game under `cfg` can hold: each count between
    /// zero and its refill count.
    pub fn compositions(cfg: &BagConfig) -> impl Iterator<Item = Bag> {
        let [a, b, c] = cfg.refill;
        (0..=a)
            .flat_map(move |i| (0..=b).flat_map(move |j| (0..=c).map(move |k| Bag::from_counts([i, j, k]))))
            .filter(|bag| !bag.is_empty())
    }

    /// Remove a placed tile and refill if that emptied the bag.
    ///
    /// ```
    /// use mini_threes::bag::{Bag, BagConfig};
    /// let cfg = BagConfig::default();
    /// let bag = Bag::from_counts([0, 0, 1]);
    /// assert_eq!(bag.take(3, &cfg), Some(Bag::full(&cfg)));
    /// assert_eq!(bag.take(1, &cfg), None);
    /// ```
    pub fn take(self, rank: Rank, cfg: &BagConfig) -> Option<Bag> {
        self.remove(rank).map(|b| b.check(cfg))
    }

    /// Distinct ranks that could be drawn next, with their draw probability.
    pub fn draws(&self) -> impl Iterator<Item = (Rank, f64)> + '_ {
        let total = self.total() as f64;
        BASE_RANKS
            .iter()
            .zip(self.counts.iter())
            .filter(|&(_, &c)| c > 0)
            .map(move |(&rank, &c)| (rank, c as f64 / total))
    }

    /// Draw a rank at random, weighted by the remaining counts. Does not
    /// remove it; the tile leaves the bag when it is placed.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Rank> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let mut pick = rng.gen_range(0..total);
        for (&rank, &c) in BASE_RANKS.iter().zip(self.counts.iter()) {
            if pick < c as u32 {
                return Some(rank);
            }
            pick -= c as u32;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn remove_and_refill() {
        let cfg = BagConfig::default();
        let bag = Bag::full(&cfg);
        assert_eq!(bag.total(), 3);
        let bag = bag.take(2, &cfg).unwrap();
        assert_eq!(bag.counts(), [1, 0, 1]);
        assert!(bag.remove(2).is_none());
        let bag = bag.take(1, &cfg).unwrap().take(3, &cfg).unwrap();
        assert_eq!(bag, Bag::full(&cfg));
    }

    #[test]
    fn draws_are_weighted() {
        let bag = Bag::from_counts([2, 0, 1]);
        let draws: Vec<_> = bag.draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].0, 1);
        assert!((draws[0].1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(draws[1].0, 3);
        assert!((draws.iter().map(|d| d.1).sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn random_draw_stays_in_bag() {
        let mut rng = StdRng::seed_from_u64(5);
        let bag = Bag::from_counts([0, 3, 1]);
        for _ in 0..100 {
            let r = bag.draw(&mut rng).unwrap();
            assert!(bag.count(r) > 0);
        }
        assert_eq!(Bag::default().draw(&mut rng), None);
    }

    #[test]
    fn compositions_skip_the_empty_bag() {
        let all: Vec<_> = Bag::compositions(&BagConfig::default()).collect();
        assert_eq!(all.len(), 7);
        assert!(all.contains(&Bag::from_counts([0, 1, 1])));
        assert!(all.iter().all(|b| !b.is_empty()));
        let two_twos: Vec<_> = Bag::compositions(&BagConfig { refill: [0, 2, 0] }).collect();
        assert_eq!(two_twos, vec![Bag::from_counts([0, 1, 0]), Bag::from_counts([0, 2, 0])]);
    }

    #[test]
    fn config_validation() {
        assert!(BagConfig::default().validate().is_ok());
        assert_eq!(BagConfig { refill: [0, 0, 0] }.validate(), Err(ConfigError::EmptyRefill));
        assert!(matches!(
            BagConfig { refill: [4, 4, 15] }.validate(),
            Err(ConfigError::TooMany { rank: 3, count: 15, .. })
        ));
    }
}

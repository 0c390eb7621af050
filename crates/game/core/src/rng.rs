//! Seedable random source handed explicitly to round resolution.
//!
//! Every random draw the rules make (walkaway prices, valuation jitter, tie-break
//! coin flips, the GPU market random walk) goes through [`GameRng`], so a match
//! seeded with the same value replays identically. Cloning the generator clones
//! its position in the stream, which is how tests replay a single round.

use std::ops::RangeInclusive;

use rand::distributions::uniform::SampleUniform;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic ChaCha8 generator tagged with the seed it started from.
#[derive(Clone, Debug)]
pub struct GameRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl GameRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw from an inclusive range.
    pub fn range<T>(&mut self, range: RangeInclusive<T>) -> T
    where
        T: SampleUniform + PartialOrd,
    {
        self.inner.gen_range(range)
    }

    /// Uniform float in `[low, high)`.
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.inner.gen_range(low..high)
    }

    pub fn coin_flip(&mut self) -> bool {
        self.inner.gen_bool(0.5)
    }

    /// Picks an index with probability proportional to its weight.
    ///
    /// Returns `None` when the weights are empty, negative, or all zero.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let dist = WeightedIndex::new(weights).ok()?;
        Some(dist.sample(&mut self.inner))
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.inner)
    }
}

//! Random Price Generator
//!
//! Simulated price source. Each call produces a batch of samples for the
//! fixed symbol, each priced independently around a baseline.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::application::ports::{FeedError, PriceSource};
use crate::domain::price::{MIN_PRICE, PriceSample, SYMBOL};

/// Centre of the simulated price distribution.
pub const BASELINE_PRICE: f64 = 150.0;

/// Half-width of the uniform offset: prices fall in `[baseline - s, baseline + s)`.
pub const PRICE_SPREAD: f64 = 5.0;

/// Samples per tick for the multi-sample feed.
pub const BATCH_SIZE: usize = 5;

/// Samples per tick for the single-tick variant.
pub const SINGLE_TICK_SIZE: usize = 1;

/// Uniform random price source.
///
/// # Example
///
/// ```rust
/// use price_stream::application::ports::PriceSource;
/// use price_stream::infrastructure::generator::RandomPriceGenerator;
///
/// let generator = RandomPriceGenerator::batched().seeded(7);
/// let batch = generator.next_batch().unwrap();
/// assert_eq!(batch.len(), 5);
/// assert!(batch.iter().all(|s| s.symbol == "AAPL"));
/// ```
#[derive(Debug)]
pub struct RandomPriceGenerator {
    batch_size: usize,
    rng: Mutex<StdRng>,
}

impl RandomPriceGenerator {
    /// Generator producing `batch_size` samples per call.
    #[must_use]
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Generator for the multi-sample feed (five samples per tick).
    #[must_use]
    pub fn batched() -> Self {
        Self::with_batch_size(BATCH_SIZE)
    }

    /// Generator for the single-tick variant (one sample per call).
    #[must_use]
    pub fn single_tick() -> Self {
        Self::with_batch_size(SINGLE_TICK_SIZE)
    }

    /// Replace the entropy-seeded RNG with a deterministic one.
    #[must_use]
    pub fn seeded(self, seed: u64) -> Self {
        Self {
            batch_size: self.batch_size,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn random_price(rng: &mut StdRng) -> f64 {
        let offset: f64 = rng.random_range(-PRICE_SPREAD..PRICE_SPREAD);
        (BASELINE_PRICE + offset).max(MIN_PRICE)
    }
}

impl PriceSource for RandomPriceGenerator {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn next_batch(&self) -> Result<Vec<PriceSample>, FeedError> {
        let mut rng = self.rng.lock();
        (0..self.batch_size)
            .map(|_| {
                let price = Self::random_price(&mut rng);
                PriceSample::new(SYMBOL, price, Utc::now()).map_err(FeedError::from)
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn batched_produces_five_samples() {
        let generator = RandomPriceGenerator::batched();
        assert_eq!(generator.batch_size(), 5);
        assert_eq!(generator.next_batch().unwrap().len(), 5);
    }

    #[test]
    fn single_tick_produces_one_sample() {
        let generator = RandomPriceGenerator::single_tick();
        assert_eq!(generator.next_batch().unwrap().len(), 1);
    }

    #[test]
    fn same_seed_same_prices() {
        let a = RandomPriceGenerator::batched().seeded(42);
        let b = RandomPriceGenerator::batched().seeded(42);

        let prices_a: Vec<f64> = a.next_batch().unwrap().iter().map(|s| s.price).collect();
        let prices_b: Vec<f64> = b.next_batch().unwrap().iter().map(|s| s.price).collect();
        assert_eq!(prices_a, prices_b);
    }

    #[test]
    fn prices_vary_within_batch() {
        let generator = RandomPriceGenerator::with_batch_size(20).seeded(1);
        let batch = generator.next_batch().unwrap();
        let first = batch[0].price;
        assert!(batch.iter().any(|s| s.price != first));
    }

    proptest! {
        #[test]
        fn samples_stay_in_range(seed in any::<u64>(), size in 1usize..16) {
            let generator = RandomPriceGenerator::with_batch_size(size).seeded(seed);
            let batch = generator.next_batch().unwrap();

            prop_assert_eq!(batch.len(), size);
            for sample in &batch {
                prop_assert_eq!(sample.symbol.as_str(), SYMBOL);
                prop_assert!(sample.price.is_finite());
                prop_assert!(sample.price >= BASELINE_PRICE - PRICE_SPREAD);
                prop_assert!(sample.price < BASELINE_PRICE + PRICE_SPREAD);
            }
        }
    }
}

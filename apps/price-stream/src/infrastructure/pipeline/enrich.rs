//! Asynchronous Enrichment
//!
//! Simulated external enrichment call plus the limiter that bounds how many
//! enrichments run at once.
//!
//! Enrichments for different samples run concurrently and may complete out
//! of order. The feed delivers enriched samples in completion order, so
//! consumers must treat delivery order as unordered when enrichment is on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::application::ports::{Enricher, FeedError};
use crate::domain::price::PriceSample;
use crate::infrastructure::metrics;

/// Artificial latency of the simulated external call.
pub const ENRICHMENT_DELAY: Duration = Duration::from_millis(500);

/// Price shift applied by enrichment.
pub const ENRICHMENT_OFFSET: f64 = 3.0;

/// Enricher that sleeps, then shifts the price.
#[derive(Debug, Clone)]
pub struct SimulatedEnricher {
    delay: Duration,
    offset: f64,
}

impl Default for SimulatedEnricher {
    fn default() -> Self {
        Self::new(ENRICHMENT_DELAY, ENRICHMENT_OFFSET)
    }
}

impl SimulatedEnricher {
    /// Create an enricher with a custom delay and offset.
    #[must_use]
    pub const fn new(delay: Duration, offset: f64) -> Self {
        Self { delay, offset }
    }
}

#[async_trait]
impl Enricher for SimulatedEnricher {
    async fn enrich(&self, sample: PriceSample) -> Result<PriceSample, FeedError> {
        let started = Instant::now();
        tokio::time::sleep(self.delay).await;
        metrics::record_enrichment_duration(started.elapsed());
        Ok(sample.shifted(self.offset))
    }
}

/// Bounds concurrent enrichments.
///
/// Cloning shares the same permit pool.
#[derive(Debug, Clone)]
pub struct EnrichmentLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl EnrichmentLimiter {
    /// Create a limiter admitting `capacity` concurrent enrichments
    /// (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum concurrent enrichments.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a permit. The permit is released when dropped.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::LimiterClosed` if the semaphore was closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, FeedError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| FeedError::LimiterClosed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::price::SYMBOL;

    #[tokio::test(start_paused = true)]
    async fn enrich_waits_then_shifts() {
        let enricher = SimulatedEnricher::default();
        let sample = PriceSample::new(SYMBOL, 150.0, Utc::now()).unwrap();

        let started = tokio::time::Instant::now();
        let enriched = enricher.enrich(sample.clone()).await.unwrap();

        assert_eq!(enriched.price, 153.0);
        assert_eq!(enriched.observed_at, sample.observed_at);
        assert!(started.elapsed() >= ENRICHMENT_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_bounds_permits() {
        let limiter = EnrichmentLimiter::new(2);
        let a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(10), limiter.acquire()).await;
        assert!(blocked.is_err());

        drop(a);
        assert!(limiter.acquire().await.is_ok());
    }

    #[test]
    fn limiter_capacity_is_at_least_one() {
        assert_eq!(EnrichmentLimiter::new(0).capacity(), 1);
    }
}

//! Single-Value Accessor
//!
//! On-demand variant of the feed: one raw sample per call, run through the
//! single-value pipeline, no timer, no sharing and no retry.

use std::sync::Arc;

use crate::application::ports::{FeedError, PriceSource};
use crate::domain::price::PriceSample;
use crate::infrastructure::generator::RandomPriceGenerator;
use crate::infrastructure::metrics::{self, SingleOutcome};
use crate::infrastructure::pipeline::PipelineStage;

/// Callback invoked once per finished request, with the outcome.
pub type CompletionHook = Arc<dyn Fn(SingleOutcome) + Send + Sync>;

/// Produces exactly one (possibly filtered-out) sample per invocation.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use price_stream::infrastructure::generator::RandomPriceGenerator;
/// use price_stream::infrastructure::pipeline::PipelineStage;
/// use price_stream::infrastructure::single::SinglePriceAccessor;
///
/// let accessor = SinglePriceAccessor::new(
///     Arc::new(RandomPriceGenerator::single_tick().seeded(3)),
///     PipelineStage::single_value(),
/// );
///
/// if let Some(sample) = accessor.get().unwrap() {
///     assert!(sample.price > 150.0);
/// }
/// ```
pub struct SinglePriceAccessor {
    source: Arc<dyn PriceSource>,
    stage: PipelineStage,
    on_complete: Option<CompletionHook>,
}

impl std::fmt::Debug for SinglePriceAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinglePriceAccessor")
            .field("stage", &self.stage)
            .field("has_completion_hook", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for SinglePriceAccessor {
    fn default() -> Self {
        Self::new(
            Arc::new(RandomPriceGenerator::single_tick()),
            PipelineStage::single_value(),
        )
    }
}

impl SinglePriceAccessor {
    /// Create an accessor over `source` using `stage`.
    #[must_use]
    pub fn new(source: Arc<dyn PriceSource>, stage: PipelineStage) -> Self {
        Self {
            source,
            stage,
            on_complete: None,
        }
    }

    /// Install a hook called after every request.
    #[must_use]
    pub fn with_completion_hook(mut self, hook: impl Fn(SingleOutcome) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(hook));
        self
    }

    /// Compute one sample.
    ///
    /// Returns `Ok(None)` when the filter rejects the sample.
    ///
    /// # Errors
    ///
    /// Returns the source's error if it fails to produce a sample.
    pub fn get(&self) -> Result<Option<PriceSample>, FeedError> {
        let result = self.compute();

        let outcome = match &result {
            Ok(Some(_)) => SingleOutcome::Value,
            Ok(None) => SingleOutcome::Empty,
            Err(_) => SingleOutcome::Error,
        };
        metrics::record_single_price(outcome);
        tracing::debug!(outcome = ?outcome, "Single price request completed");

        if let Some(hook) = &self.on_complete {
            hook(outcome);
        }

        result
    }

    fn compute(&self) -> Result<Option<PriceSample>, FeedError> {
        let raw = self.source.next_batch()?.into_iter().next();
        Ok(raw.and_then(|sample| self.stage.process(sample)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::MockPriceSource;
    use crate::domain::price::SYMBOL;

    fn source_returning(price: f64) -> Arc<dyn PriceSource> {
        let mut source = MockPriceSource::new();
        source.expect_batch_size().return_const(1_usize);
        source
            .expect_next_batch()
            .returning(move || Ok(vec![PriceSample::new(SYMBOL, price, Utc::now()).unwrap()]));
        Arc::new(source)
    }

    fn accessor(source: Arc<dyn PriceSource>) -> SinglePriceAccessor {
        SinglePriceAccessor::new(source, PipelineStage::single_value())
    }

    #[test]
    fn shifts_then_keeps_above_threshold() {
        let sample = accessor(source_returning(146.0)).get().unwrap().unwrap();
        assert_eq!(sample.price, 151.0);
        assert_eq!(sample.symbol, SYMBOL);
    }

    #[test]
    fn rejected_sample_is_empty() {
        assert_eq!(accessor(source_returning(145.0)).get().unwrap(), None);
        assert_eq!(accessor(source_returning(140.0)).get().unwrap(), None);
    }

    #[test]
    fn source_failure_is_returned_once() {
        let mut source = MockPriceSource::new();
        source.expect_next_batch().times(1).returning(|| {
            Err(FeedError::Generation {
                message: "offline".to_string(),
            })
        });

        let result = accessor(Arc::new(source)).get();
        assert!(matches!(result, Err(FeedError::Generation { .. })));
    }

    #[test]
    fn hook_fires_for_every_outcome() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut source = MockPriceSource::new();
        let counter = Arc::clone(&calls);
        source.expect_next_batch().returning(move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(vec![PriceSample::new(SYMBOL, 149.0, Utc::now())?]),
                1 => Ok(vec![PriceSample::new(SYMBOL, 145.0, Utc::now())?]),
                _ => Err(FeedError::Generation {
                    message: "offline".to_string(),
                }),
            }
        });

        let recorded = Arc::clone(&seen);
        let accessor = accessor(Arc::new(source))
            .with_completion_hook(move |outcome| recorded.lock().push(outcome));

        let _ = accessor.get();
        let _ = accessor.get();
        let _ = accessor.get();

        assert_eq!(
            *seen.lock(),
            vec![SingleOutcome::Value, SingleOutcome::Empty, SingleOutcome::Error]
        );
    }

    #[test]
    fn seeded_generator_follows_transform_chain() {
        let raw = RandomPriceGenerator::single_tick()
            .seeded(99)
            .next_batch()
            .unwrap()[0]
            .price;

        let accessor = SinglePriceAccessor::new(
            Arc::new(RandomPriceGenerator::single_tick().seeded(99)),
            PipelineStage::single_value(),
        );
        let result = accessor.get().unwrap();

        if raw + 5.0 > 150.0 {
            assert_eq!(result.map(|s| s.price), Some(raw + 5.0));
        } else {
            assert_eq!(result, None);
        }
    }

    #[test]
    fn default_uses_random_generator() {
        let accessor = SinglePriceAccessor::default();
        if let Some(sample) = accessor.get().unwrap() {
            assert!(sample.price > 150.0);
            assert!(sample.price < 160.0);
        }
    }
}

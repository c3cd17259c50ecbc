//! Price Feed Driver
//!
//! Runs one producer execution: on every tick it generates a raw batch,
//! passes it through the pipeline stage, optionally enriches each survivor
//! asynchronously, and hands the results to the sink.
//!
//! # Failure Handling
//!
//! The retry policy wraps the whole chain. Any error while computing a
//! batch or an enrichment tears the chain down (timer, in-flight
//! enrichments, tick count) and, after the fixed retry delay, starts it
//! again from scratch. Items already delivered by a failed attempt stay
//! delivered; nothing is replayed or deduplicated.
//!
//! # Cancellation
//!
//! Cancellation always wins over a tick or retry wakeup that is due at the
//! same instant, so a stopped execution never generates again.
//!
//! # Ordering
//!
//! Without enrichment, a batch is delivered in enumeration order and
//! batches arrive in tick order. With enrichment, samples are delivered in
//! the order their enrichment completes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Enricher, FeedError, FeedProducer, PriceSource, SampleSink};
use crate::domain::price::PriceSample;
use crate::infrastructure::metrics::{self, FailureKind};
use crate::infrastructure::pipeline::{EnrichmentLimiter, PipelineStage};
use crate::infrastructure::retry::{RetryConfig, RetryPolicy};

/// Period of the generation timer.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

type InFlight = JoinSet<Result<PriceSample, FeedError>>;

/// Timing configuration for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    /// Generation period.
    pub tick_interval: Duration,
    /// Retry budget and delay.
    pub retry: RetryConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
            retry: RetryConfig::default(),
        }
    }
}

struct Enrichment {
    enricher: Arc<dyn Enricher>,
    limiter: EnrichmentLimiter,
}

/// Periodic producer: generator, pipeline stage, optional enrichment and
/// retry, driven by a timer.
pub struct PriceFeed {
    source: Arc<dyn PriceSource>,
    stage: PipelineStage,
    enrichment: Option<Enrichment>,
    config: FeedConfig,
}

impl std::fmt::Debug for PriceFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeed")
            .field("batch_size", &self.source.batch_size())
            .field("stage", &self.stage)
            .field("enrichment", &self.enrichment.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PriceFeed {
    /// Create a feed without enrichment and with default timing.
    #[must_use]
    pub fn new(source: Arc<dyn PriceSource>, stage: PipelineStage) -> Self {
        Self {
            source,
            stage,
            enrichment: None,
            config: FeedConfig::default(),
        }
    }

    /// Enrich every surviving sample, at most `limiter.capacity()` at a time.
    #[must_use]
    pub fn with_enrichment(mut self, enricher: Arc<dyn Enricher>, limiter: EnrichmentLimiter) -> Self {
        self.enrichment = Some(Enrichment { enricher, limiter });
        self
    }

    /// Override timing.
    #[must_use]
    pub const fn with_config(mut self, config: FeedConfig) -> Self {
        self.config = config;
        self
    }

    /// One attempt of the chain. Returns `Ok` only when cancelled.
    async fn run_chain(
        &self,
        sink: &dyn SampleSink,
        cancel: &CancellationToken,
        retry: &mut RetryPolicy,
    ) -> Result<(), FeedError> {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight = InFlight::new();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                _ = interval.tick() => {
                    self.process_tick(sink, cancel, &mut in_flight).await?;
                    retry.reset();
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    let sample = joined.map_err(|e| FeedError::Enrichment {
                        message: e.to_string(),
                    })??;
                    emit(sink, sample);
                }
            }
        }
    }

    async fn process_tick(
        &self,
        sink: &dyn SampleSink,
        cancel: &CancellationToken,
        in_flight: &mut InFlight,
    ) -> Result<(), FeedError> {
        metrics::record_tick();

        let raw = self.source.next_batch()?;
        let generated = raw.len();
        let kept = self.stage.process_batch(raw);

        metrics::record_generated(generated as u64);
        metrics::record_filtered((generated - kept.len()) as u64);
        tracing::trace!(generated, kept = kept.len(), "Tick processed");

        let Some(enrichment) = &self.enrichment else {
            for sample in kept {
                emit(sink, sample);
            }
            return Ok(());
        };

        for sample in kept {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                permit = enrichment.limiter.acquire() => permit?,
            };
            let enricher = Arc::clone(&enrichment.enricher);
            in_flight.spawn(async move {
                let _permit = permit;
                enricher.enrich(sample).await
            });
        }

        Ok(())
    }
}

fn emit(sink: &dyn SampleSink, sample: PriceSample) {
    let receivers = sink.emit(sample);
    metrics::record_emitted();
    tracing::trace!(receivers, "Sample emitted");
}

#[async_trait]
impl FeedProducer for PriceFeed {
    async fn run(&self, sink: &dyn SampleSink, cancel: CancellationToken) -> Result<(), FeedError> {
        let mut retry = RetryPolicy::new(self.config.retry);

        loop {
            let Err(error) = self.run_chain(sink, &cancel, &mut retry).await else {
                tracing::debug!("Feed cancelled");
                return Ok(());
            };

            let Some(delay) = retry.next_delay() else {
                metrics::record_failure(FailureKind::Exhausted, error.kind());
                tracing::error!(
                    error = %error,
                    retries = retry.attempt_count(),
                    "Feed retry budget exhausted"
                );
                return Err(FeedError::RetryExhausted {
                    retries: retry.attempt_count(),
                    last: Box::new(error),
                });
            };

            metrics::record_failure(FailureKind::Transient, error.kind());
            metrics::record_retry();
            tracing::warn!(
                error = %error,
                attempt = retry.attempt_count(),
                max_retries = self.config.retry.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Feed failed, restarting"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

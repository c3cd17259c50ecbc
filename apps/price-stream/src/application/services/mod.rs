//! Application Services
//!
//! `PriceStreamService` is the boundary the transport layer talks to. It
//! exposes the shared feed and the single-value accessor, and converts
//! every internal error into empty completion. The error itself is logged
//! and counted, never surfaced to consumers.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::Stream;

use crate::domain::price::PriceSample;
use crate::infrastructure::broadcast::{
    BroadcastConfig, BroadcastHub, SharedBroadcastHub, Subscription,
};
use crate::infrastructure::config::{BroadcastSettings, FeedSettings};
use crate::infrastructure::feed::PriceFeed;
use crate::infrastructure::generator::RandomPriceGenerator;
use crate::infrastructure::pipeline::{EnrichmentLimiter, PipelineStage, SimulatedEnricher};
use crate::infrastructure::single::SinglePriceAccessor;

/// Boundary service over the broadcast hub and the single-value accessor.
#[derive(Debug, Clone)]
pub struct PriceStreamService {
    hub: SharedBroadcastHub,
    single: Arc<SinglePriceAccessor>,
}

impl PriceStreamService {
    /// Create a service from already-built components.
    #[must_use]
    pub const fn new(hub: SharedBroadcastHub, single: Arc<SinglePriceAccessor>) -> Self {
        Self { hub, single }
    }

    /// Wire the simulated feed from settings.
    ///
    /// The multi-sample feed uses the batched generator with the feed
    /// pipeline (and enrichment when enabled). The single-value accessor
    /// uses its own single-tick generator.
    #[must_use]
    pub fn from_settings(feed: FeedSettings, broadcast: BroadcastSettings) -> Self {
        let mut producer = PriceFeed::new(
            Arc::new(RandomPriceGenerator::batched()),
            PipelineStage::feed(),
        );
        if feed.enrichment {
            producer = producer.with_enrichment(
                Arc::new(SimulatedEnricher::default()),
                EnrichmentLimiter::new(feed.enrichment_concurrency),
            );
        }

        let hub = Arc::new(BroadcastHub::new(
            BroadcastConfig::from(broadcast),
            Arc::new(producer),
        ));

        Self::new(hub, Arc::new(SinglePriceAccessor::default()))
    }

    /// Attach to the shared feed.
    ///
    /// The stream yields samples emitted from now on. It completes when the
    /// feed fails terminally or the hub shuts down; dropping it detaches.
    #[must_use]
    pub fn stream_prices(&self) -> PriceStream {
        PriceStream {
            subscription: self.hub.attach(),
        }
    }

    /// Compute one price on demand. `None` when filtered out or on error.
    #[must_use]
    pub fn get_single_price(&self) -> Option<PriceSample> {
        match self.single.get() {
            Ok(sample) => sample,
            Err(error) => {
                tracing::error!(kind = error.kind(), error = %error, "Single price computation failed");
                None
            }
        }
    }

    /// Underlying hub, for health reporting and shutdown.
    #[must_use]
    pub const fn hub(&self) -> &SharedBroadcastHub {
        &self.hub
    }
}

/// Subscriber-facing price stream. Errors end the stream.
#[derive(Debug)]
pub struct PriceStream {
    subscription: Subscription,
}

impl PriceStream {
    /// Subscriber ID of the underlying subscription.
    #[must_use]
    pub const fn subscriber_id(&self) -> u64 {
        self.subscription.id()
    }
}

impl Stream for PriceStream {
    type Item = PriceSample;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.subscription).poll_next(cx)) {
            Some(Ok(sample)) => Poll::Ready(Some(sample)),
            Some(Err(error)) => {
                tracing::error!(
                    subscriber_id = this.subscription.id(),
                    kind = error.kind(),
                    retries_exhausted = error.is_terminal(),
                    error = %error,
                    "Price stream ended by feed failure"
                );
                Poll::Ready(None)
            }
            None => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use futures::StreamExt;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::application::ports::{FeedError, FeedProducer, MockPriceSource, SampleSink};
    use crate::domain::price::SYMBOL;

    /// Emits one sample, then fails terminally.
    struct OneThenFail;

    #[async_trait]
    impl FeedProducer for OneThenFail {
        async fn run(&self, sink: &dyn SampleSink, _cancel: CancellationToken) -> Result<(), FeedError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sink.emit(PriceSample::new(SYMBOL, 151.0, Utc::now())?);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(FeedError::RetryExhausted {
                retries: 3,
                last: Box::new(FeedError::Generation {
                    message: "offline".to_string(),
                }),
            })
        }
    }

    fn failing_accessor() -> SinglePriceAccessor {
        let mut source = MockPriceSource::new();
        source.expect_next_batch().returning(|| {
            Err(FeedError::Generation {
                message: "offline".to_string(),
            })
        });
        SinglePriceAccessor::new(Arc::new(source), PipelineStage::single_value())
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_becomes_empty_completion() {
        let hub = Arc::new(BroadcastHub::new(BroadcastConfig::default(), Arc::new(OneThenFail)));
        let service = PriceStreamService::new(hub, Arc::new(SinglePriceAccessor::default()));

        let prices: Vec<f64> = service.stream_prices().map(|s| s.price).collect().await;

        assert_eq!(prices, vec![151.0]);
    }

    #[test]
    fn single_price_error_becomes_none() {
        let hub = Arc::new(BroadcastHub::new(BroadcastConfig::default(), Arc::new(OneThenFail)));
        let service = PriceStreamService::new(hub, Arc::new(failing_accessor()));

        assert_eq!(service.get_single_price(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn wired_feed_emits_shifted_prices() {
        let service =
            PriceStreamService::from_settings(FeedSettings::default(), BroadcastSettings::default());
        let mut stream = service.stream_prices();

        // Five ticks almost surely yield at least one survivor.
        let sample = stream.next().await.unwrap();
        assert!(sample.price > 150.0 && sample.price < 157.0);
        assert!(service.hub().is_running());

        drop(stream);
        assert!(!service.hub().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn wired_feed_with_enrichment_adds_offset() {
        let settings = FeedSettings {
            enrichment: true,
            enrichment_concurrency: 5,
        };
        let service = PriceStreamService::from_settings(settings, BroadcastSettings::default());
        let mut stream = service.stream_prices();

        let sample = stream.next().await.unwrap();
        assert!(sample.price > 153.0 && sample.price < 160.0);
    }
}

//! Port Interfaces
//!
//! Defines the interfaces (ports) between the feed pipeline and its
//! collaborators following the Hexagonal Architecture pattern. These are
//! the contracts that infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `PriceSource`: Produces one raw batch of samples per tick
//! - `Enricher`: Asynchronous per-sample augmentation
//! - `SampleSink`: Delivers processed samples to attached subscribers
//!
//! ## Driver Ports (Inbound)
//!
//! - `FeedProducer`: One producer execution driven by the broadcast hub

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::price::{PriceError, PriceSample};

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while computing the feed.
///
/// `Generation`, `Enrichment` and `LimiterClosed` are transient: the retry
/// policy absorbs them. `RetryExhausted` is terminal for one producer
/// execution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    /// Raw batch generation failed.
    #[error("price generation failed: {message}")]
    Generation {
        /// Failure description.
        message: String,
    },

    /// Per-sample enrichment failed.
    #[error("price enrichment failed: {message}")]
    Enrichment {
        /// Failure description.
        message: String,
    },

    /// The enrichment concurrency limiter was closed.
    #[error("enrichment limiter closed")]
    LimiterClosed,

    /// A produced sample violated the sample invariants.
    #[error("invalid price sample: {0}")]
    InvalidSample(#[from] PriceError),

    /// The retry budget ran out.
    #[error("retry budget of {retries} exhausted, last error: {last}")]
    RetryExhausted {
        /// Retries attempted before giving up.
        retries: u32,
        /// Failure of the final attempt.
        last: Box<FeedError>,
    },
}

impl FeedError {
    /// Whether this error ends the producer execution.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Short label used for metrics and log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Generation { .. } => "generation",
            Self::Enrichment { .. } => "enrichment",
            Self::LimiterClosed => "limiter_closed",
            Self::InvalidSample(_) => "invalid_sample",
            Self::RetryExhausted { .. } => "retry_exhausted",
        }
    }
}

// =============================================================================
// Ports
// =============================================================================

/// Source of raw price samples, called once per tick.
#[cfg_attr(test, mockall::automock)]
pub trait PriceSource: Send + Sync {
    /// Number of samples produced per call.
    fn batch_size(&self) -> usize;

    /// Produce the raw batch for one tick, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` when the batch cannot be computed.
    fn next_batch(&self) -> Result<Vec<PriceSample>, FeedError>;
}

/// Asynchronous per-sample enrichment (simulated external call).
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Produce an enriched copy of `sample`.
    async fn enrich(&self, sample: PriceSample) -> Result<PriceSample, FeedError>;
}

/// Destination for processed samples.
pub trait SampleSink: Send + Sync {
    /// Deliver one sample to every attached subscriber.
    ///
    /// Returns the number of receivers the sample was handed to.
    fn emit(&self, sample: PriceSample) -> usize;
}

/// One restartable producer execution.
#[async_trait]
pub trait FeedProducer: Send + Sync {
    /// Run until `cancel` fires (returns `Ok`) or the retry budget is
    /// exhausted (returns the terminal error).
    async fn run(&self, sink: &dyn SampleSink, cancel: CancellationToken) -> Result<(), FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhaustion_is_terminal() {
        let transient = FeedError::Generation {
            message: "boom".to_string(),
        };
        assert!(!transient.is_terminal());

        let exhausted = FeedError::RetryExhausted {
            retries: 3,
            last: Box::new(transient),
        };
        assert!(exhausted.is_terminal());
    }

    #[test]
    fn exhausted_message_includes_cause() {
        let err = FeedError::RetryExhausted {
            retries: 3,
            last: Box::new(FeedError::Enrichment {
                message: "timeout".to_string(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("retry budget of 3 exhausted"));
        assert!(text.contains("timeout"));
    }

    #[test]
    fn price_error_converts() {
        let err: FeedError = PriceError::EmptySymbol.into();
        assert_eq!(err.kind(), "invalid_sample");
    }
}

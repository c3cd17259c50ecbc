//! Broadcast Hub
//!
//! Turns one producer into a shared, hot, multicast source using a tokio
//! broadcast channel for fan-out to many subscribers.
//!
//! # Architecture
//!
//! - The producer runs at most once at a time, no matter how many
//!   subscribers are attached. The first attach starts it; the last detach
//!   cancels it.
//! - Each subscriber gets its own receiver on the execution's channel, so it
//!   only sees items emitted after it attached (no replay buffer).
//! - A subscriber that falls more than `capacity` items behind skips the
//!   lost items; sends never wait on slow consumers.
//! - When the producer fails terminally, every attached subscription yields
//!   the error once and then ends. The next attach starts a fresh execution.
//!
//! Start and stop decisions are made under a single lock, so concurrent
//! attach/detach calls cannot start duplicate producers.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, ready};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedError, FeedProducer, SampleSink};
use crate::domain::price::PriceSample;
use crate::domain::subscription::{
    DemandChange, SubscriberId, SubscriberRegistry, next_subscriber_id,
};
use crate::infrastructure::config::BroadcastSettings;
use crate::infrastructure::metrics;

/// Default per-execution channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

// =============================================================================
// Broadcast Messages
// =============================================================================

/// Message carried on an execution's channel.
#[derive(Debug, Clone)]
pub enum HubMessage {
    /// A processed sample.
    Sample(PriceSample),
    /// The producer execution failed terminally.
    Failed(FeedError),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the broadcast hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Items a subscriber may fall behind before it starts skipping.
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            capacity: settings.capacity,
        }
    }
}

// =============================================================================
// Hub State
// =============================================================================

/// One running producer execution.
struct Execution {
    id: u64,
    tx: broadcast::Sender<HubMessage>,
    cancel: CancellationToken,
    subscribers: SubscriberRegistry,
}

#[derive(Default)]
struct HubState {
    execution: Option<Execution>,
    executions_started: u64,
}

/// Sink handed to the producer; publishes onto the execution's channel.
struct ChannelSink {
    tx: broadcast::Sender<HubMessage>,
}

impl SampleSink for ChannelSink {
    fn emit(&self, sample: PriceSample) -> usize {
        // No receivers is not an error: the execution is about to be cancelled.
        self.tx.send(HubMessage::Sample(sample)).unwrap_or(0)
    }
}

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Multicast hub with a demand-driven producer lifecycle.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use futures::StreamExt;
/// use price_stream::application::ports::FeedProducer;
/// use price_stream::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
///
/// async fn example(producer: Arc<dyn FeedProducer>) {
///     let hub = Arc::new(BroadcastHub::new(BroadcastConfig::default(), producer));
///
///     // First attach starts the producer.
///     let mut subscription = hub.attach();
///     while let Some(Ok(sample)) = subscription.next().await {
///         println!("{} {}", sample.symbol, sample.price);
///     }
///     // Dropping the last subscription stops it.
/// }
/// ```
pub struct BroadcastHub {
    config: BroadcastConfig,
    producer: Arc<dyn FeedProducer>,
    state: Mutex<HubState>,
}

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl BroadcastHub {
    /// Create an idle hub. Nothing runs until the first attach.
    #[must_use]
    pub fn new(config: BroadcastConfig, producer: Arc<dyn FeedProducer>) -> Self {
        Self {
            config,
            producer,
            state: Mutex::new(HubState::default()),
        }
    }

    /// Attach a new subscriber, starting the producer if it is idle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when a producer has to be
    /// started.
    #[must_use]
    pub fn attach(self: &Arc<Self>) -> Subscription {
        let subscriber_id = next_subscriber_id();
        let mut state = self.state.lock();

        let started = state.execution.is_none();
        if started {
            state.executions_started += 1;
        }
        let next_id = state.executions_started;
        let capacity = self.config.capacity.max(1);

        let execution = state.execution.get_or_insert_with(|| Execution {
            id: next_id,
            tx: broadcast::channel(capacity).0,
            cancel: CancellationToken::new(),
            subscribers: SubscriberRegistry::new(),
        });

        // Subscribe before the producer task exists so the first batch is seen.
        let receiver = execution.tx.subscribe();
        let demand = execution.subscribers.add(subscriber_id);
        let execution_id = execution.id;
        let subscribers = execution.subscribers.len();

        if started {
            debug_assert_eq!(demand, DemandChange::Started);
            self.spawn_execution(execution);
        }
        drop(state);

        metrics::set_subscribers(subscribers);
        tracing::debug!(
            subscriber_id,
            execution_id,
            subscribers,
            "Subscriber attached"
        );

        Subscription {
            id: subscriber_id,
            execution_id,
            hub: Arc::downgrade(self),
            receiver: BroadcastStream::new(receiver),
            finished: false,
        }
    }

    fn spawn_execution(self: &Arc<Self>, execution: &Execution) {
        let hub = Arc::downgrade(self);
        let producer = Arc::clone(&self.producer);
        let sink = ChannelSink {
            tx: execution.tx.clone(),
        };
        let cancel = execution.cancel.clone();
        let execution_id = execution.id;

        metrics::record_execution_started();
        metrics::set_producer_running(true);
        tracing::info!(execution_id, "Producer started");

        tokio::spawn(async move {
            let result = producer.run(&sink, cancel).await;

            if let Some(hub) = hub.upgrade() {
                hub.finish_execution(execution_id);
            }

            match result {
                Ok(()) => tracing::info!(execution_id, "Producer stopped"),
                Err(error) => {
                    tracing::error!(execution_id, error = %error, "Producer failed");
                    // Cleared above, so later attaches never see this failure.
                    let _ = sink.tx.send(HubMessage::Failed(error));
                }
            }
        });
    }

    /// Clear the execution if it is still the current one.
    fn finish_execution(&self, execution_id: u64) {
        let mut state = self.state.lock();
        if state
            .execution
            .as_ref()
            .is_some_and(|execution| execution.id == execution_id)
        {
            state.execution = None;
            metrics::set_producer_running(false);
            metrics::set_subscribers(0);
        }
    }

    fn detach(&self, subscriber_id: SubscriberId, execution_id: u64) {
        let mut state = self.state.lock();
        let Some(execution) = state.execution.as_mut() else {
            return;
        };
        // Subscriptions of a finished execution do not affect the current one.
        if execution.id != execution_id {
            return;
        }

        let demand = execution.subscribers.remove(subscriber_id);
        let remaining = execution.subscribers.len();

        if demand == DemandChange::Released {
            if let Some(execution) = state.execution.take() {
                execution.cancel.cancel();
            }
            metrics::set_producer_running(false);
            tracing::info!(execution_id, "Last subscriber detached, stopping producer");
        }
        drop(state);

        metrics::set_subscribers(remaining);
        tracing::debug!(subscriber_id, execution_id, remaining, "Subscriber detached");
    }

    /// Cancel any running producer. Attached subscriptions end cleanly.
    pub fn shutdown(&self) {
        if let Some(execution) = self.state.lock().execution.take() {
            execution.cancel.cancel();
            metrics::set_producer_running(false);
            tracing::info!(execution_id = execution.id, "Broadcast hub shut down");
        }
    }

    /// Whether a producer execution is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().execution.is_some()
    }

    /// Number of subscribers attached to the current execution.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .execution
            .as_ref()
            .map_or(0, |execution| execution.subscribers.len())
    }

    /// Snapshot of hub statistics.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        let state = self.state.lock();
        BroadcastStats {
            running: state.execution.is_some(),
            subscribers: state
                .execution
                .as_ref()
                .map_or(0, |execution| execution.subscribers.len()),
            executions_started: state.executions_started,
        }
    }
}

/// Statistics about the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Whether a producer execution is active.
    pub running: bool,
    /// Subscribers attached to the current execution.
    pub subscribers: usize,
    /// Producer executions started since creation.
    pub executions_started: u64,
}

// =============================================================================
// Subscription
// =============================================================================

/// One consumer's attachment to the hub.
///
/// Yields every sample emitted after the attach. If the producer fails
/// terminally it yields that error once and ends. Dropping the
/// subscription detaches it.
pub struct Subscription {
    id: SubscriberId,
    execution_id: u64,
    hub: Weak<BroadcastHub>,
    receiver: BroadcastStream<HubMessage>,
    finished: bool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("execution_id", &self.execution_id)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Subscriber ID.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// ID of the producer execution this subscription belongs to.
    #[must_use]
    pub const fn execution_id(&self) -> u64 {
        self.execution_id
    }

    /// Detach explicitly. Equivalent to dropping.
    pub fn detach(self) {
        drop(self);
    }
}

impl Stream for Subscription {
    type Item = Result<PriceSample, FeedError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match ready!(Pin::new(&mut this.receiver).poll_next(cx)) {
                Some(Ok(HubMessage::Sample(sample))) => return Poll::Ready(Some(Ok(sample))),
                Some(Ok(HubMessage::Failed(error))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    metrics::record_lagged(skipped);
                    tracing::warn!(
                        subscriber_id = this.id,
                        skipped,
                        "Subscriber lagged, samples skipped"
                    );
                }
                None => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.detach(self.id, self.execution_id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

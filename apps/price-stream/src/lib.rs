#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Price Stream - Simulated Multicast Price Feed
//!
//! Generates simulated prices for one symbol on a fixed timer, runs them
//! through a filter/transform/enrich pipeline wrapped in a bounded retry
//! policy, and multicasts the result to any number of subscribers through
//! a single shared producer.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core data types
//!   - `price`: `PriceSample` and the fixed symbol
//!   - `subscription`: Subscriber identity and producer demand
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Source, enricher, sink and producer interfaces
//!   - `services`: `PriceStreamService`, the transport boundary
//!
//! - **Infrastructure**: Adapters and runtime
//!   - `generator`: Random price source
//!   - `pipeline`: Filter, transform and enrichment steps
//!   - `retry`: Fixed-delay bounded retry
//!   - `feed`: Tick-driven producer driver
//!   - `broadcast`: Shared producer lifecycle and fan-out
//!   - `single`: On-demand single-value accessor
//!   - `http`: SSE and JSON transport, health and metrics
//!
//! # Data Flow
//!
//! ```text
//! tick ─► Generator ─► Pipeline ─► (Enrich) ─┐
//!            ▲                               │
//!            └──── Retry (restart chain) ◄───┤ error
//!                                            ▼
//!                                     Broadcast Hub ─► Subscriber 1
//!                                                   ─► Subscriber N
//!
//! request ─► Generator (k=1) ─► Pipeline ─► Option<PriceSample>
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core price types with no runtime dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and runtime.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::price::{PriceError, PriceSample, SYMBOL};
pub use domain::subscription::{DemandChange, SubscriberId, SubscriberRegistry};

// Ports and services
pub use application::ports::{Enricher, FeedError, FeedProducer, PriceSource, SampleSink};
pub use application::services::{PriceStream, PriceStreamService};

// Infrastructure config
pub use infrastructure::config::{
    AppConfig, BroadcastSettings, ConfigError, FeedSettings, ServerSettings,
};

// Feed components
pub use infrastructure::feed::{FeedConfig, PriceFeed};
pub use infrastructure::generator::RandomPriceGenerator;
pub use infrastructure::pipeline::{EnrichmentLimiter, PipelineStage, SimulatedEnricher, Step};
pub use infrastructure::retry::{RetryConfig, RetryPolicy};
pub use infrastructure::single::SinglePriceAccessor;

// Broadcast hub
pub use infrastructure::broadcast::{
    BroadcastConfig, BroadcastHub, BroadcastStats, HubMessage, SharedBroadcastHub, Subscription,
};

// HTTP transport
pub use infrastructure::http::{HttpServer, HttpServerError, HttpState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

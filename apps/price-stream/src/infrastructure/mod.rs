//! Infrastructure Layer - Adapters and runtime.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, and the process-level plumbing.

/// Random price source.
pub mod generator;

/// Filter, transform and enrichment steps.
pub mod pipeline;

/// Fixed-delay bounded retry.
pub mod retry;

/// Tick-driven producer driver.
pub mod feed;

/// Shared producer lifecycle and subscriber fan-out.
pub mod broadcast;

/// On-demand single-value accessor.
pub mod single;

/// HTTP transport, health and metrics endpoints.
pub mod http;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing and OpenTelemetry integration.
pub mod telemetry;

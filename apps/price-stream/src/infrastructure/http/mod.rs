//! HTTP Transport
//!
//! Thin axum layer over `PriceStreamService`, plus health and metrics
//! routes for orchestrators and monitoring.
//!
//! # Endpoints
//!
//! - `GET /stream` - Server-Sent Events, one JSON sample per event
//! - `GET /price` - One JSON sample, or `204 No Content` when filtered out
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (not ready once shutdown starts)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::PriceStreamService;
use crate::infrastructure::metrics::get_metrics_handle;

const EVENT_STREAM: &str = "text/event-stream";

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Shared feed status.
    pub feed: FeedStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving requests.
    Healthy,
    /// Shutting down.
    Draining,
}

/// Shared feed status.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeedStatus {
    /// Whether a producer execution is active.
    pub producer_running: bool,
    /// Subscribers attached to the current execution.
    pub subscribers: usize,
    /// Producer executions started since boot.
    pub executions_started: u64,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the HTTP handlers.
pub struct HttpState {
    version: String,
    started_at: Instant,
    service: PriceStreamService,
    cancel: CancellationToken,
}

impl HttpState {
    /// Create new server state.
    #[must_use]
    pub fn new(version: String, service: PriceStreamService, cancel: CancellationToken) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            service,
            cancel,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/stream", get(stream_handler))
        .route("/price", get(price_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Price stream HTTP server.
pub struct HttpServer {
    port: u16,
    state: Arc<HttpState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HttpState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn stream_handler(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> Response {
    if !accepts_event_stream(&headers) {
        return (StatusCode::NOT_ACCEPTABLE, "Only text/event-stream is supported").into_response();
    }

    let prices = state.service.stream_prices();
    tracing::debug!(subscriber_id = prices.subscriber_id(), "SSE client connected");

    // Closing the connection drops the stream, which detaches the subscriber.
    let cancel = state.cancel.clone();
    let events = prices
        .take_until(cancel.cancelled_owned())
        .map(|sample| Event::default().json_data(sample));

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn price_handler(State(state): State<Arc<HttpState>>) -> Response {
    match state.service.get_single_price() {
        Some(sample) => (StatusCode::OK, Json(sample)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Draining => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    if state.cancel.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    } else {
        (StatusCode::OK, "READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HttpState) -> HealthResponse {
    let stats = state.service.hub().stats();
    let status = if state.cancel.is_cancelled() {
        HealthStatus::Draining
    } else {
        HealthStatus::Healthy
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed: FeedStatus {
            producer_running: stats.running,
            subscribers: stats.subscribers,
            executions_started: stats.executions_started,
        },
    }
}

/// Whether the `Accept` header admits an event stream. A missing header does.
fn accepts_event_stream(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(header::ACCEPT) else {
        return true;
    };
    let Ok(accept) = accept.to_str() else {
        return false;
    };

    accept.split(',').any(|range| {
        let media = range.split(';').next().unwrap_or_default().trim();
        media.eq_ignore_ascii_case(EVENT_STREAM)
            || media == "*/*"
            || media.eq_ignore_ascii_case("text/*")
    })
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

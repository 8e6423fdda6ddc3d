//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one full resolution pass over procfs and returns the
//! encoded registry. The pass itself is blocking filesystem work, so it runs
//! on the blocking thread pool.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
    TaskFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let body = match self {
            MetricsError::EncodingFailed => "Failed to encode metrics",
            MetricsError::TaskFailed => "Metrics collection task failed",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Handler for the telemetry endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing metrics request");

    let scraper = state.scraper.clone();
    let body = tokio::task::spawn_blocking(move || scraper.scrape())
        .await
        .map_err(|e| {
            error!("Metrics collection task panicked: {}", e);
            MetricsError::TaskFailed
        })?
        .map_err(|e| {
            error!("Failed to encode Prometheus metrics: {}", e);
            MetricsError::EncodingFailed
        })?;

    debug!(
        "Metrics request completed: {} bytes, {:.3}ms",
        body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(body)
}

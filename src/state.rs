//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use named_process_exporter::Scraper;
use std::sync::Arc;
use std::time::Instant;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// State shared across requests.
pub struct AppState {
    /// Runs one resolution pass and encodes the registry.
    pub scraper: Arc<dyn Scraper>,
    pub telemetry_path: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page linking to the telemetry path
//! - telemetry path (default `/metrics`): Prometheus metrics endpoint

pub mod metrics;
pub mod root;

// Re-export handlers
pub use metrics::metrics_handler;
pub use root::root_handler;

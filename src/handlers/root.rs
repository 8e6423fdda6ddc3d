//! Root endpoint handler for the landing page.

use axum::{extract::State, response::Html};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> Html<String> {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Named Process Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }}
        .container {{ max-width: 700px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; }}
        .meta {{ color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Named Process Exporter</h1>
    <p class="meta">Version {version} &middot; Uptime {uptime}</p>
    <p><a href="{path}">Metrics</a></p>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        path = state.telemetry_path
    );

    Html(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use named_process_exporter::{CollectError, Scraper};
    use std::sync::Arc;
    use std::time::Instant;

    struct Empty;

    impl Scraper for Empty {
        fn scrape(&self) -> Result<String, CollectError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_root_links_to_telemetry_path() {
        let state = Arc::new(AppState {
            scraper: Arc::new(Empty),
            telemetry_path: "/custom".to_string(),
            start_time: Instant::now(),
        });
        let Html(body) = root_handler(State(state)).await;
        assert!(body.contains(r#"<a href="/custom">Metrics</a>"#));
    }
}

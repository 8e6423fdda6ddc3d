//! named-process-exporter
//!
//! Prometheus exporter that reports per-process resource usage under
//! operator-defined group names. This is the main entry point that resolves
//! the configuration and either serves HTTP or prints a one-shot snapshot.

mod cli;
mod config;
mod handlers;
mod manual;
mod state;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use named_process_exporter::{
    GroupMetrics, ProcessCollector, RegistryScraper, ScrapeDriver, Scraper,
};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use cli::{Args, LogLevel};
use config::ExporterConfig;
use handlers::{metrics_handler, root_handler};
use state::{AppState, SharedState};

/// Maximum level for `--log-level`.
///
/// `--debug` raises the level to at least DEBUG so the constructed matchers
/// are visible, even when logging is otherwise off.
fn level_filter(level: LogLevel, debug: bool) -> LevelFilter {
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };
    if debug {
        filter.max(LevelFilter::DEBUG)
    } else {
        filter
    }
}

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) -> Result<()> {
    let log_level = level_filter(args.log_level, args.debug);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Logging initialized with level: {}", log_level);
    Ok(())
}

/// Resolves once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Serves `/` and the telemetry path until a shutdown signal arrives.
async fn serve(config: &ExporterConfig, scraper: Arc<dyn Scraper>) -> Result<()> {
    let state: SharedState = Arc::new(AppState {
        scraper,
        telemetry_path: config.telemetry_path.clone(),
        start_time: Instant::now(),
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route(&config.telemetry_path, get(metrics_handler))
        .with_state(state);

    let addr = config.listen_address;

    if let Some(tls) = &config.tls {
        info!("Loading TLS certificate from: {}", tls.cert.display());
        info!("Loading TLS private key from: {}", tls.key.display());

        let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "named-process-exporter listening on https://{}{}",
            addr, config.telemetry_path
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("unable to bind {}", addr))?;
        info!(
            "named-process-exporter listening on http://{}{}",
            addr, config.telemetry_path
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("Server error: {}", e);
                e
            })?;
    }

    info!("named-process-exporter stopped gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.man {
        print!("{}", manual::MANUAL);
        return Ok(());
    }

    setup_logging(&args)?;

    let config = match ExporterConfig::from_args(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    debug!("Effective configuration: {:?}", config);

    let resolver = match config.namer.build(config.debug) {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Reading metrics from {}",
        config.collector.procfs.display()
    );

    let registry = Registry::new();
    let metrics = GroupMetrics::new(&registry).context("failed to register metrics")?;
    let collector = Arc::new(ProcessCollector::new(
        config.collector.clone(),
        resolver,
        metrics,
    ));
    let scraper = Arc::new(RegistryScraper::new(collector, registry));

    let mut driver = ScrapeDriver::new(config.mode);
    let mut stdout = std::io::stdout();
    driver
        .run(scraper, &mut stdout, |scraper| {
            serve(&config, scraper as Arc<dyn Scraper>)
        })
        .await
}

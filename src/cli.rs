//! CLI arguments for named-process-exporter.
//!
//! This module defines the command-line interface structure using the clap library.
//! Flag names follow the dotted style of other Prometheus exporters
//! (`--config.path`, `--web.listen-address`).

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "named-process-exporter",
    about = "Prometheus exporter for per-process resource usage aggregated by group name",
    long_about = "Prometheus exporter for per-process resource usage aggregated by group name.\n\n\
                  Processes are selected and named either with --procnames/--namemapping or \
                  with a matcher config file (--config.path). Run with --man for details.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// Address on which to expose metrics and web interface
    #[arg(long = "web.listen-address", default_value = ":9256")]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", default_value = "/metrics")]
    pub telemetry_path: String,

    /// Don't bind, just wait this much time, print the metrics once to stdout, and exit
    #[arg(long = "once-to-stdout-delay", default_value = "0", value_parser = humantime::parse_duration)]
    pub once_to_stdout_delay: Duration,

    /// Comma-separated list of process names to monitor
    #[arg(long, default_value = "")]
    pub procnames: String,

    /// Comma-separated list, alternating process name and capturing regex to apply to cmdline
    #[arg(long, default_value = "")]
    pub namemapping: String,

    /// Path to proc data
    #[arg(long, default_value = "/proc")]
    pub procfs: PathBuf,

    /// If a proc is tracked, track with it any children that aren't part of their own group
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub children: bool,

    /// Gather metrics from smaps_rollup, which contains proportional resident memory size
    #[arg(long = "gather-smaps", default_value_t = true, action = ArgAction::Set)]
    pub gather_smaps: bool,

    /// Report on per-threadname metrics as well
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub threads: bool,

    /// Print the manual and exit
    #[arg(long)]
    pub man: bool,

    /// Path to matcher config file (YAML/JSON/TOML)
    #[arg(long = "config.path")]
    pub config_path: Option<PathBuf>,

    /// Recheck process names on each scrape
    #[arg(long)]
    pub recheck: bool,

    /// Log debugging information, including the constructed matchers
    #[arg(long)]
    pub debug: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Path to TLS certificate file (PEM format)
    #[arg(long, requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long, requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

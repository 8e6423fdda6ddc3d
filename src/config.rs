//! Effective exporter configuration.
//!
//! The command line is turned into one immutable `ExporterConfig` at startup,
//! which is then passed by reference to everything that needs it.

use named_process_exporter::{CollectorOptions, DeliveryMode, NamerSource, ResolverError};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use crate::cli::Args;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// TLS key material for the HTTPS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_address: SocketAddr,
    pub telemetry_path: String,
    pub mode: DeliveryMode,
    pub namer: NamerSource,
    pub collector: CollectorOptions,
    pub tls: Option<TlsPaths>,
    pub debug: bool,
}

/// Errors turning the command line into an `ExporterConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("invalid --web.listen-address '{0}'")]
    ListenAddress(String),

    #[error("--web.telemetry-path must start with '/', got '{0}'")]
    TelemetryPath(String),
}

impl ExporterConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let namer =
            NamerSource::from_flags(args.config_path.as_deref(), &args.procnames, &args.namemapping)?;

        if !args.telemetry_path.starts_with('/') {
            return Err(ConfigError::TelemetryPath(args.telemetry_path.clone()));
        }

        let tls = match (&args.tls_cert, &args.tls_key) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            listen_address: parse_listen_address(&args.listen_address)?,
            telemetry_path: args.telemetry_path.clone(),
            mode: DeliveryMode::from_delay(args.once_to_stdout_delay),
            namer,
            collector: CollectorOptions {
                procfs: args.procfs.clone(),
                children: args.children,
                gather_smaps: args.gather_smaps,
                threads: args.threads,
                recheck: args.recheck,
                debug: args.debug,
            },
            tls,
            debug: args.debug,
        })
    }
}

/// Accepts `host:port` as well as the bare `:port` form, which binds all interfaces.
///
/// Host names are resolved once at startup and the first address is used.
pub fn parse_listen_address(s: &str) -> Result<SocketAddr, ConfigError> {
    let full = if s.starts_with(':') {
        format!("{}{}", DEFAULT_BIND_ADDR, s)
    } else {
        s.to_string()
    };
    full.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::ListenAddress(s.to_string()))
}

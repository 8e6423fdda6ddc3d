//! Named Process Exporter Library
//!
//! Exports per-process resource usage aggregated under operator-defined group
//! names instead of PIDs. The heart of the crate is the name resolution
//! policy: every observed process is either dropped or assigned a stable
//! group name, which keeps the exported series set small.
//!
//! # Features
//!
//! - **Command-line resolver**: exact process names, optionally refined by a
//!   capturing regex applied to the command line
//! - **Config resolver**: ordered matcher rules loaded from YAML/JSON/TOML
//! - **Process collector**: procfs sampling with per-group aggregation
//! - **Scrape driver**: continuous serving or a two-pass one-shot snapshot
//!
//! # Usage
//!
//! ```rust
//! use named_process_exporter::{CommandLineResolver, NameResolver, ProcAttributes};
//!
//! let resolver = CommandLineResolver::from_flags(
//!     "nginx",
//!     r"python2,([^/]+)\.py,java,-jar\s+([^/]+).jar",
//! )
//! .unwrap();
//!
//! let attrs = ProcAttributes::new("java", vec!["java".into(), "-jar".into(), "bar.jar".into()]);
//! assert_eq!(resolver.match_and_name(&attrs), (true, "java:bar".to_string()));
//!
//! let attrs = ProcAttributes::new("bash", vec!["bash".into()]);
//! assert_eq!(resolver.match_and_name(&attrs), (false, String::new()));
//! ```

pub mod collector;
pub mod error;
pub mod metrics;
pub mod process;
pub mod resolver;
pub mod scrape;

// Re-export main types for convenience
pub use collector::{CollectorOptions, ProcessCollector};
pub use error::{CollectError, MappingDefect, ResolverError};
pub use metrics::GroupMetrics;
pub use resolver::{
    CommandLineResolver, ConfigResolver, NameResolver, NamerSource, PrefixRule, ProcAttributes,
};
pub use scrape::{DeliveryMode, RegistryScraper, ScrapeDriver, Scraper};

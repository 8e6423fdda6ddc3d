//! Process name resolution.
//!
//! This module provides:
//! - `ProcAttributes`: the identity of one observed process
//! - `NameResolver`: the accept/reject + group name capability
//! - `cmdline`: resolver built from `--procnames` / `--namemapping`
//! - `config`: resolver built from a structured matcher document
//! - `NamerSource`: selection between the two, with mutual exclusion

pub mod cmdline;
pub mod config;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ResolverError;

pub use cmdline::{CommandLineResolver, PrefixRule};
pub use config::ConfigResolver;

/// Snapshot of a process as seen during one collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcAttributes {
    /// Short name from `/proc/<pid>/stat`, truncated by the kernel to 15 chars.
    pub name: String,
    pub cmdline: Vec<String>,
}

impl ProcAttributes {
    pub fn new(name: impl Into<String>, cmdline: Vec<String>) -> Self {
        Self {
            name: name.into(),
            cmdline,
        }
    }
}

/// Decides whether a process is reported and under which group name.
///
/// Implementations are immutable after construction; `match_and_name` may be
/// called concurrently from several scrapes. An empty name is returned
/// whenever the first element is `false`.
pub trait NameResolver: fmt::Debug + Send + Sync {
    fn match_and_name(&self, attrs: &ProcAttributes) -> (bool, String);
}

impl<T: NameResolver + ?Sized> NameResolver for Arc<T> {
    fn match_and_name(&self, attrs: &ProcAttributes) -> (bool, String) {
        (**self).match_and_name(attrs)
    }
}

/// Where the naming policy comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamerSource {
    ConfigFile(PathBuf),
    CommandLine {
        proc_names: String,
        name_mapping: String,
    },
}

impl NamerSource {
    /// Picks the policy source from the raw flag values.
    ///
    /// A config path together with either command-line flag is rejected.
    pub fn from_flags(
        config_path: Option<&Path>,
        proc_names: &str,
        name_mapping: &str,
    ) -> Result<Self, ResolverError> {
        match config_path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => {
                if !proc_names.is_empty() || !name_mapping.is_empty() {
                    return Err(ResolverError::ConflictingConfiguration);
                }
                Ok(NamerSource::ConfigFile(path.to_path_buf()))
            }
            None => Ok(NamerSource::CommandLine {
                proc_names: proc_names.to_string(),
                name_mapping: name_mapping.to_string(),
            }),
        }
    }

    /// Builds the resolver this source describes.
    pub fn build(&self, debug: bool) -> Result<Arc<dyn NameResolver>, ResolverError> {
        match self {
            NamerSource::ConfigFile(path) => {
                let resolver = ConfigResolver::read_file(path, debug)?;
                info!("Using matchers from config file {}", path.display());
                if debug {
                    debug!("using config matchnamer: {:?}", resolver);
                }
                Ok(Arc::new(resolver))
            }
            NamerSource::CommandLine {
                proc_names,
                name_mapping,
            } => {
                let resolver = CommandLineResolver::from_flags(proc_names, name_mapping)?;
                let names: Vec<&str> = cmdline::split_names(proc_names).collect();
                info!("Using procnames: {:?}", names);
                if debug {
                    debug!("using cmdline matchnamer: {:?}", resolver);
                }
                Ok(Arc::new(resolver))
            }
        }
    }
}

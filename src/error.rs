//! Error types for resolver construction and process collection.
//!
//! Every `ResolverError` is a startup error: an invalid naming policy must
//! never run, so the binary logs it and exits. Per-scrape resolution has no
//! error path at all.

use std::path::PathBuf;
use thiserror::Error;

/// Reason a `--namemapping` value could not be turned into rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingDefect {
    #[error("odd number of tokens, the list could not be paired into (name, regex)")]
    OddTokenCount,

    #[error("token {index} is empty")]
    EmptyToken { index: usize },

    #[error("process name '{name}' is mapped more than once")]
    DuplicateName { name: String },
}

/// Errors raised while building a name resolver.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("bad namemapping: {0}")]
    MalformedMapping(#[from] MappingDefect),

    #[error("error compiling regexp '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("--config.path cannot be used with --namemapping or --procnames")]
    ConflictingConfiguration,

    #[error("error reading config file {}: {message}", path.display())]
    ConfigLoadFailure { path: PathBuf, message: String },
}

impl ResolverError {
    pub(crate) fn config_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ResolverError::ConfigLoadFailure {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Errors raised by a collection pass as a whole.
///
/// Failures reading a single process are counted, not returned.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("cannot enumerate processes under {}: {source}", path.display())]
    Enumerate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

//! Name resolver built from the `--procnames` and `--namemapping` flags.
//!
//! Every process whose short name is not listed is dropped. A listed name
//! either passes through unchanged or, when a mapping regex is configured for
//! it, is refined by the first non-empty capture the regex finds in the
//! space-joined command line.

use ahash::AHashMap as HashMap;
use regex::Regex;
use std::fmt;
use tracing::warn;

use crate::error::{MappingDefect, ResolverError};
use crate::resolver::{NameResolver, ProcAttributes};

/// A regex-backed mapping rule for one process name.
#[derive(Clone)]
pub struct PrefixRule {
    prefix: String,
    pattern: Regex,
}

impl PrefixRule {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Group name for `cmdline`, if the pattern captures something non-empty.
    fn apply(&self, cmdline: &str) -> Option<String> {
        let caps = self.pattern.captures(cmdline)?;
        caps.iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str())
            .find(|s| !s.is_empty())
            .map(|suffix| format!("{}{}", self.prefix, suffix))
    }
}

impl fmt::Debug for PrefixRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixRule")
            .field("prefix", &self.prefix)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Exact-name gate plus optional cmdline refinement.
///
/// A `None` rule is a passthrough entry.
#[derive(Clone, Default)]
pub struct CommandLineResolver {
    mapping: HashMap<String, Option<PrefixRule>>,
}

impl CommandLineResolver {
    /// Builds a resolver from both flags at once: mapping pairs first, then
    /// the bare names merged in as passthrough rules.
    pub fn from_flags(proc_names: &str, name_mapping: &str) -> Result<Self, ResolverError> {
        let resolver = Self::parse_name_mapping(name_mapping)?;
        Ok(resolver.with_proc_names(split_names(proc_names)))
    }

    /// Parses a comma-separated list alternating process name and regex.
    pub fn parse_name_mapping(s: &str) -> Result<Self, ResolverError> {
        let mut mapping = HashMap::new();
        if s.is_empty() {
            return Ok(Self { mapping });
        }

        let toks: Vec<&str> = s.split(',').collect();
        if toks.len() % 2 == 1 {
            return Err(MappingDefect::OddTokenCount.into());
        }

        for (i, tok) in toks.iter().enumerate() {
            if tok.is_empty() {
                return Err(MappingDefect::EmptyToken { index: i }.into());
            }
            if i % 2 == 0 {
                continue;
            }

            let name = toks[i - 1];
            let pattern = Regex::new(tok).map_err(|source| ResolverError::InvalidPattern {
                pattern: tok.to_string(),
                source,
            })?;
            if pattern.captures_len() == 1 {
                warn!(
                    "namemapping pattern '{}' for '{}' has no capture group and will never match",
                    tok, name
                );
            }

            if mapping.contains_key(name) {
                return Err(MappingDefect::DuplicateName {
                    name: name.to_string(),
                }
                .into());
            }
            mapping.insert(
                name.to_string(),
                Some(PrefixRule {
                    prefix: format!("{}:", name),
                    pattern,
                }),
            );
        }

        Ok(Self { mapping })
    }

    /// Adds passthrough entries for `names` that have no rule yet.
    pub fn with_proc_names<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.mapping.entry(name.to_string()).or_insert(None);
        }
        self
    }

    /// Configured process names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.mapping.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn rule(&self, name: &str) -> Option<&Option<PrefixRule>> {
        self.mapping.get(name)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

impl NameResolver for CommandLineResolver {
    fn match_and_name(&self, attrs: &ProcAttributes) -> (bool, String) {
        match self.mapping.get(attrs.name.as_str()) {
            None => (false, String::new()),
            Some(None) => (true, attrs.name.clone()),
            Some(Some(rule)) => match rule.apply(&attrs.cmdline.join(" ")) {
                Some(group) => (true, group),
                None => (false, String::new()),
            },
        }
    }
}

impl fmt::Debug for CommandLineResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.mapping.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        f.debug_map().entries(entries).finish()
    }
}

/// Splits a `--procnames` value, skipping empty entries.
pub fn split_names(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').filter(|n| !n.is_empty())
}

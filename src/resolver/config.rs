//! Name resolver built from a structured matcher document.
//!
//! The document holds an ordered list of rules under `process_names`. A rule
//! selects processes by short name (`comm`), executable (`exe`) and command
//! line regexes (`cmdline`); every selector present must match. The first
//! matching rule names the process by rendering its `name` template.
//!
//! ```yaml
//! process_names:
//!   - comm: [bash, sshd]
//!     name: "{{.Comm}}"
//!   - exe: [/usr/local/bin/prometheus]
//!     cmdline: ['--config\.file=(?P<Cfg>\S+)']
//!     name: "{{.ExeBase}}:{{.Matches.Cfg}}"
//! ```

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ResolverError;
use crate::resolver::{NameResolver, ProcAttributes};

/// Template used when a rule has no `name`.
pub const DEFAULT_NAME_TEMPLATE: &str = "{{.ExeBase}}";

static TEMPLATE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z]+)(?:\.([A-Za-z0-9_]+))?\s*\}\}")
        .expect("template field regex is valid")
});

/// On-disk format of the matcher document, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => DocumentFormat::Json,
            Some("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherDocument {
    #[serde(default)]
    pub process_names: Vec<MatcherRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comm: Vec<String>,
    #[serde(default)]
    pub exe: Vec<String>,
    #[serde(default)]
    pub cmdline: Vec<String>,
}

/// One piece of a parsed name template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Comm,
    ExeBase,
    ExeFull,
    Match(String),
}

#[derive(Clone, PartialEq, Eq)]
struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NameTemplate {
    fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in TEMPLATE_FIELD.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            let field = &caps[1];
            let sub = caps.get(2).map(|m| m.as_str());
            let segment = match (field, sub) {
                ("Comm", None) => Segment::Comm,
                ("ExeBase", None) => Segment::ExeBase,
                ("ExeFull", None) => Segment::ExeFull,
                ("Matches", Some(key)) => Segment::Match(key.to_string()),
                _ => {
                    return Err(format!(
                        "unsupported template field '{}' in name '{}' \
                         (expected .Comm, .ExeBase, .ExeFull or .Matches.<name>)",
                        whole.as_str(),
                        source
                    ))
                }
            };
            segments.push(segment);
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }
        if segments.iter().all(|s| matches!(s, Segment::Literal(_)))
            && source.contains("{{")
        {
            return Err(format!("malformed template in name '{}'", source));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    fn render(&self, attrs: &ProcAttributes, matches: &HashMap<String, String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Comm => out.push_str(&attrs.name),
                Segment::ExeBase => out.push_str(&exe_base(attrs)),
                Segment::ExeFull => out.push_str(exe_full(attrs)),
                Segment::Match(key) => {
                    if let Some(v) = matches.get(key) {
                        out.push_str(v);
                    }
                }
            }
        }
        out
    }
}

fn exe_full(attrs: &ProcAttributes) -> &str {
    attrs.cmdline.first().map(String::as_str).unwrap_or(&attrs.name)
}

fn exe_base(attrs: &ProcAttributes) -> String {
    match attrs.cmdline.first() {
        Some(exe) => basename(exe).to_string(),
        None => attrs.name.clone(),
    }
}

fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Executable selector: basename -> required full path (`None` = any path).
#[derive(Clone, Default)]
struct ExeMatcher {
    exes: HashMap<String, Option<String>>,
}

impl ExeMatcher {
    fn new(entries: &[String]) -> Self {
        let mut exes = HashMap::new();
        for e in entries {
            if e.contains('/') {
                exes.insert(basename(e).to_string(), Some(e.clone()));
            } else {
                exes.insert(e.clone(), None);
            }
        }
        Self { exes }
    }

    fn matches(&self, attrs: &ProcAttributes) -> bool {
        let Some(first) = attrs.cmdline.first() else {
            return false;
        };
        match self.exes.get(basename(first)) {
            None => false,
            Some(None) => true,
            Some(Some(full)) => full == first,
        }
    }
}

#[derive(Clone)]
struct Matcher {
    name: NameTemplate,
    comm: Option<HashSet<String>>,
    exe: Option<ExeMatcher>,
    cmdline: Vec<Regex>,
}

impl Matcher {
    fn compile(index: usize, rule: &MatcherRule) -> Result<Self, String> {
        if rule.comm.is_empty() && rule.exe.is_empty() && rule.cmdline.is_empty() {
            return Err(format!("process_names[{}]: no matchers provided", index));
        }

        let template = rule.name.as_deref().unwrap_or(DEFAULT_NAME_TEMPLATE);
        let name =
            NameTemplate::parse(template).map_err(|e| format!("process_names[{}]: {}", index, e))?;

        let cmdline = rule
            .cmdline
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    format!(
                        "process_names[{}]: error compiling cmdline regexp '{}': {}",
                        index, pattern, e
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            comm: (!rule.comm.is_empty()).then(|| rule.comm.iter().cloned().collect()),
            exe: (!rule.exe.is_empty()).then(|| ExeMatcher::new(&rule.exe)),
            cmdline,
        })
    }

    /// Returns the named captures when every selector matches.
    fn select(&self, attrs: &ProcAttributes) -> Option<HashMap<String, String>> {
        if let Some(comm) = &self.comm {
            if !comm.contains(&attrs.name) {
                return None;
            }
        }
        if let Some(exe) = &self.exe {
            if !exe.matches(attrs) {
                return None;
            }
        }

        let mut captures = HashMap::new();
        if !self.cmdline.is_empty() {
            let joined = attrs.cmdline.join(" ");
            for re in &self.cmdline {
                let caps = re.captures(&joined)?;
                for (i, group) in re.capture_names().enumerate() {
                    if let Some(group) = group {
                        let value = caps.get(i).map(|m| m.as_str()).unwrap_or_default();
                        captures.insert(group.to_string(), value.to_string());
                    }
                }
            }
        }
        Some(captures)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut comm: Vec<&String> = self.comm.iter().flat_map(|c| c.iter()).collect();
        comm.sort_unstable();
        let mut exe: Vec<&String> = self.exe.iter().flat_map(|e| e.exes.keys()).collect();
        exe.sort_unstable();
        let cmdline: Vec<&str> = self.cmdline.iter().map(Regex::as_str).collect();
        f.debug_struct("Matcher")
            .field("name", &self.name.source)
            .field("comm", &comm)
            .field("exe", &exe)
            .field("cmdline", &cmdline)
            .finish()
    }
}

/// First-match-wins list of matcher rules.
#[derive(Clone, Default)]
pub struct ConfigResolver {
    matchers: Vec<Matcher>,
}

impl ConfigResolver {
    /// Reads and compiles a matcher document.
    ///
    /// Any read, parse or compile failure is reported as `ConfigLoadFailure`.
    pub fn read_file(path: &Path, debug: bool) -> Result<Self, ResolverError> {
        let content =
            fs::read_to_string(path).map_err(|e| ResolverError::config_load(path, e))?;
        let resolver = Self::parse(&content, DocumentFormat::from_path(path))
            .map_err(|e| ResolverError::config_load(path, e))?;

        info!(
            "Loaded {} matcher rule(s) from: {}",
            resolver.len(),
            path.display()
        );
        if debug {
            for (i, m) in resolver.matchers.iter().enumerate() {
                debug!("matcher {}: {:?}", i, m);
            }
        }
        Ok(resolver)
    }

    /// Parses a matcher document already held in memory.
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self, String> {
        let doc: MatcherDocument = match format {
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string())?,
            DocumentFormat::Toml => toml::from_str(content).map_err(|e| e.to_string())?,
            DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string())?,
        };
        Self::from_document(&doc)
    }

    pub fn from_document(doc: &MatcherDocument) -> Result<Self, String> {
        let matchers = doc
            .process_names
            .iter()
            .enumerate()
            .map(|(i, rule)| Matcher::compile(i, rule))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl NameResolver for ConfigResolver {
    fn match_and_name(&self, attrs: &ProcAttributes) -> (bool, String) {
        for matcher in &self.matchers {
            if let Some(captures) = matcher.select(attrs) {
                let name = matcher.name.render(attrs, &captures);
                if name.is_empty() {
                    return (false, String::new());
                }
                return (true, name);
            }
        }
        (false, String::new())
    }
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.matchers).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(name: &str, cmdline: &[&str]) -> ProcAttributes {
        ProcAttributes::new(name, cmdline.iter().map(|s| s.to_string()).collect())
    }

    fn yaml(content: &str) -> ConfigResolver {
        ConfigResolver::parse(content, DocumentFormat::Yaml).expect("valid document")
    }

    // -------------------------------------------------------------------------
    // Tests for template parsing
    // -------------------------------------------------------------------------

    #[test]
    fn test_template_segments() {
        let t = NameTemplate::parse("svc-{{.Comm}}:{{ .Matches.Port }}").unwrap();
        assert_eq!(
            t.segments,
            vec![
                Segment::Literal("svc-".into()),
                Segment::Comm,
                Segment::Literal(":".into()),
                Segment::Match("Port".into()),
            ]
        );
    }

    #[test]
    fn test_template_rejects_unknown_field() {
        assert!(NameTemplate::parse("{{.Username}}").is_err());
        assert!(NameTemplate::parse("{{.Matches}}").is_err());
        assert!(NameTemplate::parse("{{Comm}}").is_err());
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/usr/bin/bash"), "bash");
        assert_eq!(basename("bash"), "bash");
        assert_eq!(basename("/opt/app/"), "app");
    }

    // -------------------------------------------------------------------------
    // Tests for matching
    // -------------------------------------------------------------------------

    #[test]
    fn test_comm_rule_with_default_template() {
        let r = yaml("process_names:\n  - comm: [bash]\n");
        assert_eq!(
            r.match_and_name(&attrs("bash", &["/bin/bash", "-l"])),
            (true, "bash".to_string())
        );
        assert_eq!(
            r.match_and_name(&attrs("zsh", &["/bin/zsh"])),
            (false, String::new())
        );
    }

    #[test]
    fn test_exe_full_path_and_basename() {
        let r = yaml(
            "process_names:\n  - exe: [/usr/sbin/sshd, node_exporter]\n    name: \"{{.ExeFull}}\"\n",
        );
        assert_eq!(
            r.match_and_name(&attrs("sshd", &["/usr/sbin/sshd", "-D"])),
            (true, "/usr/sbin/sshd".to_string())
        );
        assert_eq!(
            r.match_and_name(&attrs("sshd", &["/opt/sshd"])),
            (false, String::new())
        );
        assert_eq!(
            r.match_and_name(&attrs("node_exporter", &["/srv/node_exporter"])),
            (true, "/srv/node_exporter".to_string())
        );
    }

    #[test]
    fn test_cmdline_named_capture_renders() {
        let r = yaml(
            r#"
process_names:
  - exe: [prometheus]
    cmdline: ['--config\.file=(?P<Cfg>\S+)']
    name: "{{.ExeBase}}:{{.Matches.Cfg}}"
"#,
        );
        assert_eq!(
            r.match_and_name(&attrs(
                "prometheus",
                &["/bin/prometheus", "--config.file=/etc/prom.yml"]
            )),
            (true, "prometheus:/etc/prom.yml".to_string())
        );
        assert_eq!(
            r.match_and_name(&attrs("prometheus", &["/bin/prometheus"])),
            (false, String::new())
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let r = yaml(
            r#"
process_names:
  - comm: [postgres]
    cmdline: ['postgres: (?P<Role>\w+)']
    name: "pg-{{.Matches.Role}}"
  - comm: [postgres]
    name: "pg-other"
"#,
        );
        assert_eq!(
            r.match_and_name(&attrs("postgres", &["postgres: checkpointer"])),
            (true, "pg-checkpointer".to_string())
        );
        assert_eq!(
            r.match_and_name(&attrs("postgres", &["/usr/lib/postgres", "-D", "/data"])),
            (true, "pg-other".to_string())
        );
    }

    #[test]
    fn test_all_selectors_must_match() {
        let r = yaml("process_names:\n  - comm: [java]\n    exe: [/usr/bin/java]\n");
        assert_eq!(
            r.match_and_name(&attrs("java", &["/usr/bin/java"])),
            (true, "java".to_string())
        );
        assert_eq!(
            r.match_and_name(&attrs("java", &["/opt/jdk/bin/java"])),
            (false, String::new())
        );
    }

    #[test]
    fn test_empty_rendered_name_is_no_match() {
        let r = yaml(
            "process_names:\n  - cmdline: ['(?P<Opt>x*)']\n    name: \"{{.Matches.Opt}}\"\n",
        );
        assert_eq!(
            r.match_and_name(&attrs("app", &["app"])),
            (false, String::new())
        );
    }

    #[test]
    fn test_empty_document_matches_nothing() {
        let r = yaml("process_names: []\n");
        assert!(r.is_empty());
        assert_eq!(
            r.match_and_name(&attrs("bash", &["bash"])),
            (false, String::new())
        );
    }

    // -------------------------------------------------------------------------
    // Tests for document loading
    // -------------------------------------------------------------------------

    #[test]
    fn test_rule_without_matchers_rejected() {
        let err = ConfigResolver::parse("process_names:\n  - name: x\n", DocumentFormat::Yaml)
            .unwrap_err();
        assert!(err.contains("no matchers"));
    }

    #[test]
    fn test_bad_cmdline_regex_rejected() {
        let err = ConfigResolver::parse("process_names:\n  - cmdline: ['[']\n", DocumentFormat::Yaml)
            .unwrap_err();
        assert!(err.contains("'['"));
    }

    #[test]
    fn test_json_and_toml_documents() {
        let json = r#"{"process_names": [{"comm": ["nginx"]}]}"#;
        let r = ConfigResolver::parse(json, DocumentFormat::Json).unwrap();
        assert_eq!(r.len(), 1);

        let toml = "[[process_names]]\ncomm = [\"nginx\"]\nname = \"web\"\n";
        let r = ConfigResolver::parse(toml, DocumentFormat::Toml).unwrap();
        assert_eq!(
            r.match_and_name(&attrs("nginx", &["nginx"])),
            (true, "web".to_string())
        );
    }

    #[test]
    fn test_document_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.toml")), DocumentFormat::Toml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a")), DocumentFormat::Yaml);
    }
}

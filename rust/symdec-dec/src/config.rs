//! Configuration file parsing for `symdec.toml`.
//!
//! Searches the current directory then its ancestors. Every setting lives
//! under the `[decision]` table; missing tables fall back to defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

pub const CONFIG_FILE: &str = "symdec.toml";

/// Leaf decision procedure the chain delegates to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    /// No checking at all; every query is satisfiable.
    AlwaysSat,
    /// In-process interval and resolution reasoning.
    #[default]
    Builtin,
    /// An SMT-LIB2 solver process.
    Smtlib,
}

impl TryFrom<String> for BackendKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse().map_err(|_| {
            use strum::IntoEnumIterator;
            let known: Vec<String> = BackendKind::iter().map(|b| b.to_string()).collect();
            format!("unknown backend '{}' (expected one of: {})", s, known.join(", "))
        })
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtLibConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_command() -> String {
    "z3".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-in".to_string(), "-smt2".to_string()]
}

impl Default for SmtLibConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
        }
    }
}

/// Method under analysis. Informational for the checker; the engine
/// builds its initial states from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub class: String,
    pub method: String,
    #[serde(default)]
    pub classpath: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservativeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub scope_exhaustion_means_success: bool,
    /// Class name -> check method, overriding the class-hierarchy marker.
    #[serde(default)]
    pub methods: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetConfig>,
}

impl Default for ConservativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scope_exhaustion_means_success: true,
            methods: BTreeMap::new(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Wrap the chain in a timer.
    #[serde(default = "default_true")]
    pub timing: bool,
    #[serde(default)]
    pub smtlib: SmtLibConfig,
    #[serde(default)]
    pub conservative: ConservativeConfig,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            timing: true,
            smtlib: SmtLibConfig::default(),
            conservative: ConservativeConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigFile {
    #[serde(default)]
    decision: DecisionConfig,
}

impl DecisionConfig {
    /// Load config from `symdec.toml`, searching current dir then parents.
    /// Returns `Default` when no file is found.
    pub fn load() -> Self {
        Self::find_and_load()
            .map(|(_path, cfg)| cfg)
            .unwrap_or_default()
    }

    /// Load config and return the path to the config file that was found.
    pub fn load_with_path() -> Option<(PathBuf, Self)> {
        Self::find_and_load()
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        Self::from_str(&content).map_err(|e| format!("invalid toml in '{}': {}", path.display(), e))
    }

    fn find_and_load() -> Option<(PathBuf, Self)> {
        Self::find_and_load_from(std::env::current_dir().ok()?)
    }

    /// The nearest `symdec.toml` at or above `dir`. A file that cannot be
    /// read or parsed ends the search with a warning.
    fn find_and_load_from(mut dir: PathBuf) -> Option<(PathBuf, Self)> {
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load_from(&config_path) {
                    Ok(cfg) => Some((config_path, cfg)),
                    Err(e) => {
                        warn!(error = %e, "ignoring config file, using defaults");
                        None
                    }
                };
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Parse a TOML string directly.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<ConfigFile>(s).map(|file| file.decision)
    }

    /// Render as a complete `symdec.toml`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(&ConfigFile {
            decision: self.clone(),
        })
    }

    /// Generate a default `symdec.toml` template.
    pub fn default_template() -> &'static str {
        r#"# Symdec decision-procedure configuration

[decision]
# "always-sat" | "builtin" | "smtlib"
backend = "builtin"
# Measure time spent in decision procedures
timing = true

[decision.smtlib]
command = "z3"
args = ["-in", "-smt2"]

[decision.conservative]
enabled = false
scope_exhaustion_means_success = true
# Check method per class, overriding the ConservativeRepOk marker
# methods = { "List" = "repOk" }

# [decision.conservative.target]
# class = "Main"
# method = "main"
# classpath = ["."]
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_returns_default() {
        let cfg = DecisionConfig::from_str("").expect("empty config parses");
        assert_eq!(cfg, DecisionConfig::default());
        assert_eq!(cfg.backend, BackendKind::Builtin);
        assert!(cfg.timing);
        assert!(!cfg.conservative.enabled);
        assert!(cfg.conservative.scope_exhaustion_means_success);
        assert_eq!(cfg.smtlib.command, "z3");
    }

    #[test]
    fn parse_full_config() {
        let cfg = DecisionConfig::from_str(
            r#"
[decision]
backend = "smtlib"
timing = false

[decision.smtlib]
command = "cvc5"
args = ["--incremental", "--lang=smt2"]

[decision.conservative]
enabled = true
scope_exhaustion_means_success = false
methods = { "List" = "repOk" }

[decision.conservative.target]
class = "Main"
method = "main"
classpath = [".", "lib"]
"#,
        )
        .expect("should parse");
        assert_eq!(cfg.backend, BackendKind::Smtlib);
        assert!(!cfg.timing);
        assert_eq!(cfg.smtlib.command, "cvc5");
        assert_eq!(cfg.smtlib.args.len(), 2);
        assert!(cfg.conservative.enabled);
        assert!(!cfg.conservative.scope_exhaustion_means_success);
        assert_eq!(cfg.conservative.methods.get("List").map(String::as_str), Some("repOk"));
        let target = cfg.conservative.target.expect("target");
        assert_eq!(target.class, "Main");
        assert_eq!(target.classpath, vec![".", "lib"]);
    }

    #[test]
    fn backend_names_are_kebab_case() {
        assert_eq!("always-sat".parse::<BackendKind>(), Ok(BackendKind::AlwaysSat));
        assert_eq!(BackendKind::Smtlib.to_string(), "smtlib");
        let cfg = DecisionConfig::from_str("[decision]\nbackend = \"always-sat\"\n").unwrap();
        assert_eq!(cfg.backend, BackendKind::AlwaysSat);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = DecisionConfig::from_str("[decision]\nbackend = \"yices\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown backend 'yices'"));
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(DecisionConfig::from_str("[decision\nbackend = ").is_err());
    }

    #[test]
    fn default_template_round_trips() {
        let cfg = DecisionConfig::from_str(DecisionConfig::default_template())
            .expect("template must parse");
        assert_eq!(cfg, DecisionConfig::default());
    }

    #[test]
    fn to_toml_round_trips() {
        let mut cfg = DecisionConfig::default();
        cfg.backend = BackendKind::AlwaysSat;
        cfg.conservative.methods.insert("Node".into(), "ok".into());
        let text = cfg.to_toml().unwrap();
        assert_eq!(DecisionConfig::from_str(&text).unwrap(), cfg);
    }

    #[test]
    fn search_finds_the_nearest_ancestor_file() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE),
            "[decision]\nbackend = \"always-sat\"\n",
        )
        .unwrap();

        let (path, cfg) = DecisionConfig::find_and_load_from(nested).unwrap();
        assert_eq!(path, root.path().join(CONFIG_FILE));
        assert_eq!(cfg.backend, BackendKind::AlwaysSat);
    }

    #[test]
    fn malformed_ancestor_file_ends_the_search() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join(CONFIG_FILE), "[decision\nbackend = ").unwrap();
        assert!(DecisionConfig::find_and_load_from(nested).is_none());
    }

    #[test]
    fn load_from_missing_file_names_the_path() {
        let err = DecisionConfig::load_from(Path::new("/nonexistent/symdec.toml")).unwrap_err();
        assert!(err.contains("/nonexistent/symdec.toml"));
    }
}

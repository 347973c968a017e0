//! Matrix configuration: the `toxide.toml` schema and its validation.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::envlist::resolve_envlist;
use crate::error::{ConfigError, Result};
use crate::factor::{extract_factors, FactorMap, FactorVocabulary, PyVersion};
use crate::rules::{DepRule, Predicate, RoleConfig};

/// Top-level configuration, one file per project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    #[serde(default)]
    pub matrix: MatrixSection,

    #[serde(default)]
    pub factors: FactorVocabulary,

    #[serde(default)]
    pub env: EnvDefaults,

    #[serde(default, rename = "dep_rule")]
    pub dep_rules: Vec<DepRule>,

    #[serde(default, rename = "role")]
    pub roles: Vec<RoleConfig>,

    #[serde(default)]
    pub ci: CiMatrixConfig,
}

/// The `[matrix]` section: what to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixSection {
    /// Environment specs, expanded in declaration order.
    #[serde(default)]
    pub envlist: Vec<String>,

    /// Skip cells whose interpreter is not on this host instead of
    /// failing them. The CLI flag forces this on.
    #[serde(default)]
    pub skip_missing_interpreters: bool,
}

/// The `[env]` section: defaults shared by every cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvDefaults {
    /// Dependencies installed in every cell, in declaration order.
    #[serde(default)]
    pub deps: Vec<String>,

    /// Commands of the built-in test role.
    #[serde(default)]
    pub commands: Vec<Vec<String>>,

    /// Programs a pipeline may invoke from outside the environment
    /// without a warning.
    #[serde(default)]
    pub allowlist_externals: Vec<String>,

    /// Per-command timeout in seconds; 0 means no timeout.
    #[serde(default)]
    pub command_timeout_secs: u64,

    /// Interpreter executable for cells without an interpreter factor.
    #[serde(default = "default_interpreter")]
    pub default_interpreter: String,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

impl Default for EnvDefaults {
    fn default() -> Self {
        Self {
            deps: Vec::new(),
            commands: Vec::new(),
            allowlist_externals: Vec::new(),
            command_timeout_secs: 0,
            default_interpreter: default_interpreter(),
        }
    }
}

/// The `[ci]` section: the workflow-style view over the same matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CiMatrixConfig {
    /// Runner labels (`ubuntu-latest`, ...), outer axis.
    #[serde(default)]
    pub os: Vec<String>,

    /// Interpreter versions (`"3.7"`, ...), inner axis.
    #[serde(default)]
    pub python: Vec<String>,

    /// (os, python) pairs removed from both views after expansion.
    #[serde(default, rename = "exclude")]
    pub exclude: Vec<CiExclude>,

    /// Mirrors the workflow's fail-fast strategy knob; carried on the
    /// CI view only, local runs never cancel sibling cells.
    #[serde(default)]
    pub fail_fast: bool,
}

impl CiMatrixConfig {
    /// Whether the (os, python) pair is excluded.
    pub fn is_excluded(&self, os: &str, python: &str) -> bool {
        self.exclude
            .iter()
            .any(|e| e.os == os && e.python == python)
    }

    /// Python versions excluded on the given runner label.
    pub fn excluded_pythons<'a>(&'a self, os: &str) -> Vec<&'a str> {
        self.exclude
            .iter()
            .filter(|e| e.os == os)
            .map(|e| e.python.as_str())
            .collect()
    }
}

/// One `[[ci.exclude]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiExclude {
    pub os: String,
    pub python: String,
}

impl MatrixConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Every predicate in the configuration, for validation sweeps.
    fn predicates(&self) -> Vec<&Predicate> {
        let mut out: Vec<&Predicate> = Vec::new();
        for rule in &self.dep_rules {
            out.push(&rule.when);
        }
        for role in &self.roles {
            out.push(&role.when);
            for rule in &role.rules {
                out.push(&rule.when);
            }
        }
        out
    }
}

/// Validate the configuration's rules against the resolved cells.
///
/// Checks, in order:
/// - every version string in an interpreter predicate parses;
/// - every exact reference (atom, exact interpreter version) names a
///   value some resolved cell actually carries;
/// - no cell matches more than one role selector.
///
/// Runs after envlist resolution and before any pipeline is built, so a
/// broken rule aborts the whole invocation up front.
pub fn validate_rules(config: &MatrixConfig, cells: &[FactorMap]) -> Result<()> {
    let declared_atoms: BTreeSet<&str> = cells
        .iter()
        .flat_map(|c| c.atoms.iter().map(String::as_str))
        .collect();
    let declared_versions: BTreeSet<PyVersion> = cells
        .iter()
        .filter_map(|c| c.interpreter.as_ref().map(|i| i.version))
        .collect();

    for predicate in config.predicates() {
        if let Some(atom) = predicate.referenced_atom() {
            if !declared_atoms.contains(atom) {
                return Err(ConfigError::UndeclaredFactor {
                    value: atom.to_string(),
                });
            }
        }
        if let Some((version, exact)) = predicate.referenced_version() {
            let parsed =
                PyVersion::parse(version).ok_or_else(|| ConfigError::InvalidInterpreterVersion {
                    value: version.to_string(),
                })?;
            if exact && !declared_versions.contains(&parsed) {
                return Err(ConfigError::UndeclaredFactor {
                    value: version.to_string(),
                });
            }
        }
    }

    for cell in cells {
        let matching: Vec<&str> = config
            .roles
            .iter()
            .filter(|r| r.when.matches(cell))
            .map(|r| r.name.as_str())
            .collect();
        if matching.len() > 1 {
            return Err(ConfigError::AmbiguousRole {
                env: cell.env.clone(),
                roles: matching.iter().map(|s| s.to_string()).collect(),
            });
        }
    }

    Ok(())
}

/// Resolve the envlist and extract factors for every identifier.
pub fn resolve_cells(config: &MatrixConfig) -> Result<Vec<FactorMap>> {
    let resolved = resolve_envlist(&config.matrix.envlist)?;
    resolved
        .ids
        .iter()
        .map(|id| extract_factors(id, &config.factors))
        .collect()
}

//! Conditional rules keyed on factors.
//!
//! Dependency rules are additive: every matching rule contributes its
//! deps. Command rules live inside a role and are exclusive: at most one
//! may match a given cell.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::factor::{FactorMap, PyVersion};

/// A condition over the factors of one cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every cell.
    Always,
    /// Matches when the cell carries the named atom.
    Atom { atom: String },
    /// Matches when the cell's interpreter version equals `version`.
    Interpreter { version: String },
    /// Matches when the cell's interpreter version is `version` or newer.
    InterpreterAtLeast { version: String },
}

impl Predicate {
    /// Whether this predicate holds for the given factor map.
    ///
    /// Version strings are validated up front (see config validation),
    /// so an unparseable version here simply never matches.
    pub fn matches(&self, factors: &FactorMap) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Atom { atom } => factors.has_atom(atom),
            Predicate::Interpreter { version } => match (&factors.interpreter, PyVersion::parse(version)) {
                (Some(interp), Some(wanted)) => interp.version == wanted,
                _ => false,
            },
            Predicate::InterpreterAtLeast { version } => {
                match (&factors.interpreter, PyVersion::parse(version)) {
                    (Some(interp), Some(floor)) => interp.version >= floor,
                    _ => false,
                }
            }
        }
    }

    /// The atom this predicate references, if any.
    pub fn referenced_atom(&self) -> Option<&str> {
        match self {
            Predicate::Atom { atom } => Some(atom),
            _ => None,
        }
    }

    /// The version string this predicate references, if any, paired with
    /// whether it is an exact reference (`true`) or a threshold.
    pub fn referenced_version(&self) -> Option<(&str, bool)> {
        match self {
            Predicate::Interpreter { version } => Some((version, true)),
            Predicate::InterpreterAtLeast { version } => Some((version, false)),
            _ => None,
        }
    }
}

/// A conditional dependency contribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepRule {
    pub when: Predicate,
    pub deps: Vec<String>,
}

impl DepRule {
    pub fn new(when: Predicate, deps: &[&str]) -> Self {
        Self {
            when,
            deps: deps.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// A conditional command list inside a role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRule {
    pub when: Predicate,
    pub commands: Vec<Vec<String>>,
}

/// A role: the command profile selected by a cell's factors.
///
/// Role selectors must not overlap; a cell matching none falls back to
/// the built-in test role built from the `[env]` defaults. Within a
/// role, command rules refine the default command list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleConfig {
    pub name: String,
    pub when: Predicate,

    /// Commands when no command rule matches.
    #[serde(default)]
    pub commands: Vec<Vec<String>>,

    #[serde(default, rename = "rule")]
    pub rules: Vec<CommandRule>,

    /// Working directory for this role's commands.
    #[serde(default)]
    pub changedir: Option<PathBuf>,
}

impl RoleConfig {
    pub fn new(name: &str, when: Predicate, commands: Vec<Vec<String>>) -> Self {
        Self {
            name: name.to_string(),
            when,
            commands,
            rules: Vec::new(),
            changedir: None,
        }
    }

    /// Append a command rule and return `self` (builder pattern).
    pub fn with_rule(mut self, rule: CommandRule) -> Self {
        self.rules.push(rule);
        self
    }
}

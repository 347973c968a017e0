//! Pipeline construction: from a cell's factors to its concrete
//! dependency list and command sequence.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MatrixConfig;
use crate::error::{ConfigError, Result};
use crate::factor::{FactorMap, Interpreter};

/// Name of the implicit role used when no configured role matches.
pub const TEST_ROLE: &str = "test";

/// One fully resolved matrix cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub env: String,
    pub factors: FactorMap,
    pub pipeline: Pipeline,
}

/// The concrete work for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub env: String,

    /// Role that produced the command list.
    pub role: String,

    /// Interpreter executable the cell runs under.
    pub exe: String,

    /// Interpreter factor, when the cell has one. Drives the
    /// availability probe before execution.
    pub interpreter: Option<Interpreter>,

    /// Requirement strings in install order.
    pub deps: Vec<String>,

    /// Tool commands after interpreter substitution, in run order.
    pub commands: Vec<Vec<String>>,

    /// Programs invoked from outside the environment, first-use order.
    pub externals: Vec<String>,

    /// Working directory for the commands, when the role constrains it.
    pub changedir: Option<PathBuf>,
}

impl Pipeline {
    /// The dependency install command, absent when the cell has no deps.
    pub fn install_command(&self) -> Option<Vec<String>> {
        if self.deps.is_empty() {
            return None;
        }
        let mut argv = vec![
            self.exe.clone(),
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
        ];
        argv.extend(self.deps.iter().cloned());
        Some(argv)
    }

    /// The full ordered command sequence: install first, then tools.
    pub fn command_sequence(&self) -> Vec<Vec<String>> {
        let mut sequence = Vec::with_capacity(self.commands.len() + 1);
        if let Some(install) = self.install_command() {
            sequence.push(install);
        }
        sequence.extend(self.commands.iter().cloned());
        sequence
    }
}

/// Package name of a requirement string: the leading name characters,
/// lowercased with underscores folded to hyphens (`Sphinx` and
/// `xmlschema>=1.9.0` yield `sphinx` and `xmlschema`).
fn dep_package_name(dep: &str) -> String {
    dep.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect::<String>()
        .to_ascii_lowercase()
        .replace('_', "-")
}

/// Build the pipeline for one cell.
///
/// Dependencies are the union of the `[env]` base deps and every
/// matching dep rule, declaration-ordered with exact duplicates
/// dropped. The command list comes from the cell's role: exactly one
/// command rule may match; none selects the role default; more than one
/// is a configuration error.
pub fn build_pipeline(config: &MatrixConfig, factors: &FactorMap) -> Result<Pipeline> {
    let env = factors.env.clone();

    // Additive dep union, first occurrence wins.
    let mut deps: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut add_deps = |list: &[String]| {
        for dep in list {
            if seen.insert(dep.clone()) {
                deps.push(dep.clone());
            }
        }
    };
    add_deps(&config.env.deps);
    for rule in &config.dep_rules {
        if rule.when.matches(factors) {
            add_deps(&rule.deps);
        }
    }

    // Role selection: selectors are validated as non-overlapping, but a
    // directly constructed config still gets a precise error here.
    let matching: Vec<_> = config
        .roles
        .iter()
        .filter(|r| r.when.matches(factors))
        .collect();
    let (role_name, role_commands, role_rules, changedir) = match matching.as_slice() {
        [] => (
            TEST_ROLE.to_string(),
            config.env.commands.clone(),
            &[][..],
            None,
        ),
        [role] => (
            role.name.clone(),
            role.commands.clone(),
            role.rules.as_slice(),
            role.changedir.clone(),
        ),
        many => {
            return Err(ConfigError::AmbiguousRole {
                env,
                roles: many.iter().map(|r| r.name.clone()).collect(),
            })
        }
    };

    // Command rules: exactly one may match, none selects the default.
    let matched_rules: Vec<_> = role_rules
        .iter()
        .filter(|r| r.when.matches(factors))
        .collect();
    let commands = match matched_rules.as_slice() {
        [] => role_commands,
        [rule] => rule.commands.clone(),
        many => {
            return Err(ConfigError::AmbiguousCommandRule {
                env,
                role: role_name,
                matched: many.len(),
            })
        }
    };

    let exe = match &factors.interpreter {
        Some(interp) => interp.executable(),
        None => config.env.default_interpreter.clone(),
    };

    // A leading `python` argv element means "this cell's interpreter".
    let commands: Vec<Vec<String>> = commands
        .into_iter()
        .map(|mut argv| {
            if argv.first().map(String::as_str) == Some("python") {
                argv[0] = exe.clone();
            }
            argv
        })
        .collect();

    // Everything not run through the interpreter or provided by an
    // installed dep is external.
    let dep_names: BTreeSet<String> = deps.iter().map(|d| dep_package_name(d)).collect();
    let mut externals = Vec::new();
    for argv in &commands {
        if let Some(program) = argv.first() {
            let internal = program == &exe || dep_names.contains(&dep_package_name(program));
            if !internal && !externals.contains(program) {
                externals.push(program.clone());
            }
        }
    }

    debug!(
        env = %factors.env,
        role = %role_name,
        deps = deps.len(),
        commands = commands.len(),
        "Resolved pipeline"
    );

    Ok(Pipeline {
        env: factors.env.clone(),
        role: role_name,
        exe,
        interpreter: factors.interpreter.clone(),
        deps,
        commands,
        externals,
        changedir,
    })
}

//! Cross-view consistency checking.
//!
//! The envlist and the CI axes describe the same matrix twice; this pass
//! reports where the two views drifted apart. Findings are warnings, not
//! errors: a run proceeds, `toxide check` fails on them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{resolve_cells, MatrixConfig};
use crate::error::Result;
use crate::factor::PyVersion;

/// One divergence between the envlist and the CI axes.
///
/// Only environments under the primary interpreter base participate in
/// the axis comparison; alternative interpreters (`pypy3`) have no axis
/// spelling and are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inconsistency {
    /// A python axis value no environment covers.
    AxisWithoutEnvironment { python: String },
    /// An environment whose interpreter version the axis lacks.
    EnvironmentWithoutAxis { env: String, python: String },
    /// An exclusion referencing a runner label not on the os axis.
    ExcludeUnknownOs { os: String },
    /// An exclusion referencing a version not on the python axis.
    ExcludeUnknownPython { python: String },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::AxisWithoutEnvironment { python } => {
                write!(f, "ci python {} has no matching environment", python)
            }
            Inconsistency::EnvironmentWithoutAxis { env, python } => {
                write!(f, "environment {} (python {}) is missing from the ci python axis", env, python)
            }
            Inconsistency::ExcludeUnknownOs { os } => {
                write!(f, "exclusion references unknown os {}", os)
            }
            Inconsistency::ExcludeUnknownPython { python } => {
                write!(f, "exclusion references unknown python {}", python)
            }
        }
    }
}

/// The outcome of a consistency pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub findings: Vec<Inconsistency>,
}

impl ConsistencyReport {
    /// Whether the two views agree (no findings).
    pub fn consistent(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Compare the envlist view with the CI axes.
///
/// A configuration without CI axes is trivially consistent.
pub fn check_consistency(config: &MatrixConfig) -> Result<ConsistencyReport> {
    let mut findings = Vec::new();

    if config.ci.os.is_empty() && config.ci.python.is_empty() {
        return Ok(ConsistencyReport { findings });
    }

    let cells = resolve_cells(config)?;
    let primary = config.factors.primary_interpreter_base();

    let axis_versions: BTreeSet<Option<PyVersion>> = config
        .ci
        .python
        .iter()
        .map(|p| PyVersion::parse(p))
        .collect();

    // Envlist versions under the primary base, with one witness env each.
    let mut env_versions: Vec<(PyVersion, &str)> = Vec::new();
    for cell in &cells {
        if let Some(interp) = &cell.interpreter {
            if Some(interp.base.as_str()) == primary
                && !env_versions.iter().any(|(v, _)| *v == interp.version)
            {
                env_versions.push((interp.version, cell.env.as_str()));
            }
        }
    }

    for python in &config.ci.python {
        let parsed = PyVersion::parse(python);
        let covered = parsed
            .map(|p| env_versions.iter().any(|(v, _)| *v == p))
            .unwrap_or(false);
        if !covered {
            findings.push(Inconsistency::AxisWithoutEnvironment {
                python: python.clone(),
            });
        }
    }

    for (version, env) in &env_versions {
        if !axis_versions.contains(&Some(*version)) {
            findings.push(Inconsistency::EnvironmentWithoutAxis {
                env: env.to_string(),
                python: version.to_string(),
            });
        }
    }

    for exclude in &config.ci.exclude {
        if !config.ci.os.contains(&exclude.os) {
            findings.push(Inconsistency::ExcludeUnknownOs {
                os: exclude.os.clone(),
            });
        }
        if !config.ci.python.contains(&exclude.python) {
            findings.push(Inconsistency::ExcludeUnknownPython {
                python: exclude.python.clone(),
            });
        }
    }

    Ok(ConsistencyReport { findings })
}

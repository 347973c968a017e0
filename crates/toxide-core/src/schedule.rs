//! Schedules: the two views over one resolved matrix.
//!
//! The local schedule is the envlist view (what `toxide run` executes on
//! this host); the CI schedule is the workflow view (os x python axes).
//! Both share the exclusion list, applied after expansion and before any
//! pipeline is built.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{resolve_cells, validate_rules, MatrixConfig};
use crate::digest::compute_digest;
use crate::error::{ConfigError, Result};
use crate::factor::extract_factors;
use crate::pipeline::{build_pipeline, Cell, Pipeline};

/// The envlist view, filtered for one platform label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub platform: String,
    pub skip_missing_interpreters: bool,
    pub cells: Vec<Cell>,
}

impl Schedule {
    /// Resolve, validate and build every cell for `platform`.
    ///
    /// Excluded (platform, python) pairs drop every cell whose
    /// interpreter has that version; cells without an interpreter are
    /// never excluded.
    pub fn build(config: &MatrixConfig, platform: &str) -> Result<Self> {
        let factor_maps = resolve_cells(config)?;
        validate_rules(config, &factor_maps)?;

        let excluded = config.ci.excluded_pythons(platform);
        let mut cells = Vec::new();
        for factors in factor_maps {
            if let Some(interp) = &factors.interpreter {
                let version = interp.version.to_string();
                if excluded.iter().any(|p| *p == version) {
                    debug!(env = %factors.env, platform = %platform, "Cell excluded on this platform");
                    continue;
                }
            }
            let pipeline = build_pipeline(config, &factors)?;
            cells.push(Cell {
                env: factors.env.clone(),
                factors,
                pipeline,
            });
        }

        Ok(Self {
            platform: platform.to_string(),
            skip_missing_interpreters: config.matrix.skip_missing_interpreters,
            cells,
        })
    }

    pub fn env_names(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.env.as_str()).collect()
    }

    /// Cells selected by the given identifier filters; an empty filter
    /// list selects everything. Unknown names are rejected.
    pub fn select(&self, filters: &[String]) -> Result<Vec<Cell>> {
        if filters.is_empty() {
            return Ok(self.cells.clone());
        }
        let known = self.env_names().join(", ");
        for name in filters {
            if !self.cells.iter().any(|c| &c.env == name) {
                return Err(ConfigError::UnknownEnvironment {
                    name: name.clone(),
                    known: known.clone(),
                });
            }
        }
        Ok(self
            .cells
            .iter()
            .filter(|c| filters.contains(&c.env))
            .cloned()
            .collect())
    }

    /// Canonical digest of the whole schedule. Equal inputs give equal
    /// digests across invocations.
    pub fn digest(&self) -> Result<String> {
        compute_digest(&serde_json::to_value(&self.cells)?)
    }
}

/// One cell of the CI view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiCell {
    pub os: String,
    pub python: String,
    /// The interpreter environment this pair maps to (`py39`).
    pub env: String,
    pub pipeline: Pipeline,
}

/// The workflow view: os x python minus exclusions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiSchedule {
    pub fail_fast: bool,
    pub cells: Vec<CiCell>,
}

impl CiSchedule {
    /// Expand the CI axes into cells, skipping excluded pairs.
    ///
    /// Axis order is os-major: every python for the first os, then the
    /// next os.
    pub fn build(config: &MatrixConfig) -> Result<Self> {
        if config.ci.os.is_empty() || config.ci.python.is_empty() {
            return Ok(Self {
                fail_fast: config.ci.fail_fast,
                cells: Vec::new(),
            });
        }

        let factor_maps = resolve_cells(config)?;
        validate_rules(config, &factor_maps)?;

        let mut cells = Vec::new();
        for os in &config.ci.os {
            for python in &config.ci.python {
                if config.ci.is_excluded(os, python) {
                    debug!(os = %os, python = %python, "Pair excluded from CI matrix");
                    continue;
                }
                let env = config
                    .factors
                    .env_for_python(python)
                    .ok_or(ConfigError::MissingInterpreterBase)?;
                let factors = extract_factors(&env, &config.factors)?;
                let pipeline = build_pipeline(config, &factors)?;
                cells.push(CiCell {
                    os: os.clone(),
                    python: python.clone(),
                    env,
                    pipeline,
                });
            }
        }

        Ok(Self {
            fail_fast: config.ci.fail_fast,
            cells,
        })
    }

    /// Cells for one (os, python) pair.
    pub fn cells_for(&self, os: &str, python: &str) -> Vec<&CiCell> {
        self.cells
            .iter()
            .filter(|c| c.os == os && c.python == python)
            .collect()
    }
}

/// The runner label for the host this process runs on.
pub fn host_platform() -> String {
    match std::env::consts::OS {
        "linux" => "ubuntu-latest",
        "macos" => "macos-latest",
        "windows" => "windows-latest",
        other => other,
    }
    .to_string()
}

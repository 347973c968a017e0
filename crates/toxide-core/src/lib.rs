//! Toxide Core Library
//!
//! Resolves a factor matrix (envlist grammar, factor vocabulary,
//! conditional dep and command rules) into concrete per-cell pipelines,
//! and exposes the mirrored CI view plus the consistency check between
//! the two.

pub mod config;
pub mod consistency;
pub mod digest;
pub mod envlist;
pub mod error;
pub mod factor;
pub mod pipeline;
pub mod rules;
pub mod schedule;
pub mod telemetry;

pub use config::{
    resolve_cells, validate_rules, CiExclude, CiMatrixConfig, EnvDefaults, MatrixConfig,
    MatrixSection,
};
pub use consistency::{check_consistency, ConsistencyReport, Inconsistency};
pub use digest::{canonical_json, compute_digest};
pub use envlist::{expand_spec, resolve_envlist, ResolvedEnvs};
pub use error::{ConfigError, Result};
pub use factor::{extract_factors, FactorMap, FactorVocabulary, Interpreter, PinFactor, PyVersion};
pub use pipeline::{build_pipeline, Cell, Pipeline, TEST_ROLE};
pub use rules::{CommandRule, DepRule, Predicate, RoleConfig};
pub use schedule::{host_platform, CiCell, CiSchedule, Schedule};
pub use telemetry::{init_tracing, level_for};

/// Toxide version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration-level error taxonomy for toxide.
//!
//! Every variant here is fatal: it describes a matrix that cannot be
//! resolved into pipelines, and is surfaced before anything executes.

/// Errors produced while resolving a factor matrix into pipelines.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unbalanced braces in environment spec: {spec}")]
    UnbalancedBrace { spec: String },

    #[error("empty variant in environment spec: {spec}")]
    EmptyVariant { spec: String },

    #[error("invalid character {ch:?} in environment spec: {spec}")]
    InvalidCharacter { spec: String, ch: char },

    #[error("environment spec must not be empty")]
    EmptySpec,

    #[error("environment {env} has conflicting {kind} atoms: {first} and {second}")]
    ConflictingFactors {
        env: String,
        kind: String,
        first: String,
        second: String,
    },

    #[error("rule references factor value {value} that no environment in the matrix carries")]
    UndeclaredFactor { value: String },

    #[error("rule references unparseable interpreter version: {value}")]
    InvalidInterpreterVersion { value: String },

    #[error("environment {env} matches multiple roles: {roles:?}")]
    AmbiguousRole { env: String, roles: Vec<String> },

    #[error("environment {env} matches {matched} command rules in role {role}, expected at most one")]
    AmbiguousCommandRule {
        env: String,
        role: String,
        matched: usize,
    },

    #[error("unknown environment: {name} (known environments: {known})")]
    UnknownEnvironment { name: String, known: String },

    #[error("ci matrix requires at least one interpreter base in [factors].interpreters")]
    MissingInterpreterBase,

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for matrix resolution operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

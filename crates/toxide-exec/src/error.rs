//! Execution-level errors.
//!
//! Command failures (non-zero exit) are not errors here; they are
//! recorded outcomes. These variants cover the machinery around the
//! commands: spawning, timeouts, missing interpreters, report IO.

/// Errors produced while executing cells.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("command must not be empty")]
    EmptyCommand,

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("command {command} timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("interpreter {executable} not found for environment {env}")]
    MissingInterpreter { env: String, executable: String },

    #[error(transparent)]
    Config(#[from] toxide_core::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for execution operations.
pub type Result<T> = std::result::Result<T, ExecError>;

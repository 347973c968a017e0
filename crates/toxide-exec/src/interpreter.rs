//! Interpreter discovery on the host.

use std::process::{Command, Stdio};

use tracing::debug;

/// Answers whether an interpreter executable is runnable on this host.
///
/// The probe runs before a cell enters execution, so a missing
/// interpreter can resolve to a skip instead of a failure.
pub trait InterpreterProbe: Send + Sync {
    fn available(&self, executable: &str) -> bool;
}

/// Probes the PATH by invoking `<executable> --version`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathProbe;

impl PathProbe {
    pub fn new() -> Self {
        Self
    }
}

impl InterpreterProbe for PathProbe {
    fn available(&self, executable: &str) -> bool {
        let result = Command::new(executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match result {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(executable = %executable, error = %e, "Interpreter probe failed");
                false
            }
        }
    }
}

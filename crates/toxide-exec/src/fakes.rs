//! Test doubles for executor tests.
//!
//! `ScriptedRunner` replays configured exit codes instead of spawning
//! processes and records every argv and working directory it receives.
//! `StaticProbe` answers interpreter lookups from a fixed set. Both are
//! used by unit and integration tests; nothing here touches the
//! operating system.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ExecError, Result};
use crate::interpreter::InterpreterProbe;
use crate::runner::{CommandOutput, CommandRunner};

/// A runner that resolves commands from a script of exit codes.
///
/// Outcomes are keyed by the program name (argv\[0\]); unknown programs
/// exit 0. Programs registered as spawn errors fail before producing
/// output, like a missing binary would. Every call is recorded with
/// the working directory it was given.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    exit_codes: Mutex<HashMap<String, i32>>,
    spawn_errors: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(Vec<String>, Option<PathBuf>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a non-default exit code for a program.
    pub fn with_exit_code(self, program: &str, code: i32) -> Self {
        self.exit_codes
            .lock()
            .unwrap()
            .insert(program.to_string(), code);
        self
    }

    /// Make spawning a program fail outright.
    pub fn with_spawn_error(self, program: &str) -> Self {
        self.spawn_errors.lock().unwrap().insert(program.to_string());
        self
    }

    /// Every argv this runner has been asked to run, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(argv, _)| argv.clone())
            .collect()
    }

    /// The working directory each call carried, in call order.
    pub fn cwds(&self) -> Vec<Option<PathBuf>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cwd)| cwd.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, argv: &[String], cwd: Option<&Path>, _timeout_secs: u64) -> Result<CommandOutput> {
        let program = argv.first().ok_or(ExecError::EmptyCommand)?.clone();
        self.calls
            .lock()
            .unwrap()
            .push((argv.to_vec(), cwd.map(Path::to_path_buf)));

        if self.spawn_errors.lock().unwrap().contains(&program) {
            return Err(ExecError::Spawn {
                command: program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn error"),
            });
        }

        let exit_code = self
            .exit_codes
            .lock()
            .unwrap()
            .get(&program)
            .copied()
            .unwrap_or(0);

        Ok(CommandOutput {
            argv: argv.to_vec(),
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
        })
    }
}

/// A probe that resolves availability from a fixed set of executables.
#[derive(Debug, Default)]
pub struct StaticProbe {
    available: HashSet<String>,
}

impl StaticProbe {
    /// A probe that knows the given executables.
    pub fn with(executables: &[&str]) -> Self {
        Self {
            available: executables.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// A probe that finds nothing.
    pub fn none() -> Self {
        Self::default()
    }
}

impl InterpreterProbe for StaticProbe {
    fn available(&self, executable: &str) -> bool {
        self.available.contains(executable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_runner_replays_exit_codes() {
        let runner = ScriptedRunner::new().with_exit_code("mypy", 2);

        let argv = vec!["mypy".to_string(), "src".to_string()];
        let output = runner.run(&argv, None, 0).await.expect("run failed");
        assert_eq!(output.exit_code, 2);
        assert!(!output.passed());

        let argv = vec!["flake8".to_string()];
        let output = runner
            .run(&argv, Some(Path::new("src")), 0)
            .await
            .expect("run failed");
        assert_eq!(output.exit_code, 0);

        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.calls()[0][0], "mypy");
        assert_eq!(runner.cwds(), vec![None, Some(PathBuf::from("src"))]);
    }

    #[tokio::test]
    async fn test_scripted_runner_spawn_error() {
        let runner = ScriptedRunner::new().with_spawn_error("make");
        let argv = vec!["make".to_string(), "html".to_string()];
        let err = runner.run(&argv, None, 0).await.expect_err("expected error");
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[test]
    fn test_static_probe() {
        let probe = StaticProbe::with(&["python3.8"]);
        assert!(probe.available("python3.8"));
        assert!(!probe.available("python3.7"));
        assert!(!StaticProbe::none().available("python3"));
    }
}

//! Cell execution: drives each pipeline through its lifecycle.
//!
//! A cell starts Pending, enters Running once its interpreter is known
//! to exist, and finishes Passed, Failed or Errored. A missing
//! interpreter resolves before Running: to SkippedMissingInterpreter
//! when skipping is enabled, to Failed otherwise. Commands run strictly
//! in pipeline order and the first non-passing command ends the cell.

use std::fmt;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use toxide_core::{Cell, Schedule};

use crate::error::{ExecError, Result};
use crate::interpreter::InterpreterProbe;
use crate::report::RunReport;
use crate::runner::{CommandOutput, CommandRunner};

/// Lifecycle state of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Errored,
    SkippedMissingInterpreter,
}

impl CellStatus {
    /// Whether this state ends the cell's lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CellStatus::Pending | CellStatus::Running)
    }

    /// Whether this state counts toward a successful run.
    pub fn is_ok(&self) -> bool {
        matches!(self, CellStatus::Passed | CellStatus::SkippedMissingInterpreter)
    }

    /// Legal lifecycle transitions. Skips and missing-interpreter
    /// failures happen before Running; everything else goes through it.
    pub fn can_transition_to(&self, next: CellStatus) -> bool {
        matches!(
            (self, next),
            (CellStatus::Pending, CellStatus::Running)
                | (CellStatus::Pending, CellStatus::SkippedMissingInterpreter)
                | (CellStatus::Pending, CellStatus::Failed)
                | (CellStatus::Running, CellStatus::Passed)
                | (CellStatus::Running, CellStatus::Failed)
                | (CellStatus::Running, CellStatus::Errored)
        )
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CellStatus::Pending => "pending",
            CellStatus::Running => "running",
            CellStatus::Passed => "passed",
            CellStatus::Failed => "failed",
            CellStatus::Errored => "errored",
            CellStatus::SkippedMissingInterpreter => "skipped (missing interpreter)",
        };
        write!(f, "{}", text)
    }
}

/// The recorded outcome of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellResult {
    pub env: String,
    pub status: CellStatus,

    /// Outputs of the commands that ran, in order.
    pub commands: Vec<CommandOutput>,

    /// Why the cell stopped short of Passed, when it did.
    pub reason: Option<String>,

    pub duration_ms: u64,
}

impl CellResult {
    fn finished(
        env: &str,
        status: CellStatus,
        commands: Vec<CommandOutput>,
        reason: Option<String>,
        start: Instant,
    ) -> Self {
        Self {
            env: env.to_string(),
            status,
            commands,
            reason,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Knobs for one run, combined from config and CLI flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub skip_missing_interpreters: bool,

    /// Per-command timeout in seconds; 0 means no timeout.
    pub timeout_secs: u64,

    /// Cells executed concurrently; 1 means sequential.
    pub parallel: usize,

    pub allowlist_externals: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_missing_interpreters: false,
            timeout_secs: 0,
            parallel: 1,
            allowlist_externals: Vec::new(),
        }
    }
}

/// Executes the cells of a schedule and aggregates a run report.
pub struct ScheduleExecutor<'a> {
    runner: &'a dyn CommandRunner,
    probe: &'a dyn InterpreterProbe,
    options: RunOptions,
}

impl<'a> ScheduleExecutor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        probe: &'a dyn InterpreterProbe,
        options: RunOptions,
    ) -> Self {
        Self {
            runner,
            probe,
            options,
        }
    }

    /// Execute one cell to a terminal status. Failures are captured in
    /// the result, never propagated; sibling cells are unaffected.
    pub async fn run_cell(&self, cell: &Cell) -> CellResult {
        let start = Instant::now();
        let pipeline = &cell.pipeline;

        info!(env = %cell.env, role = %pipeline.role, "Running environment");

        // Interpreter probe, before the cell enters Running.
        if !self.probe.available(&pipeline.exe) {
            if self.options.skip_missing_interpreters {
                info!(env = %cell.env, executable = %pipeline.exe, "Skipping environment, interpreter not found");
                return CellResult::finished(
                    &cell.env,
                    CellStatus::SkippedMissingInterpreter,
                    Vec::new(),
                    Some(format!("interpreter {} not found", pipeline.exe)),
                    start,
                );
            }
            let err = ExecError::MissingInterpreter {
                env: cell.env.clone(),
                executable: pipeline.exe.clone(),
            };
            warn!(env = %cell.env, executable = %pipeline.exe, "Interpreter not found");
            return CellResult::finished(
                &cell.env,
                CellStatus::Failed,
                Vec::new(),
                Some(err.to_string()),
                start,
            );
        }

        for program in &pipeline.externals {
            if !self.options.allowlist_externals.contains(program) {
                warn!(env = %cell.env, program = %program, "External program not allowlisted");
            }
        }

        let mut outputs = Vec::new();
        for argv in pipeline.command_sequence() {
            debug!(env = %cell.env, command = ?argv, "Running command");
            match self
                .runner
                .run(&argv, pipeline.changedir.as_deref(), self.options.timeout_secs)
                .await
            {
                Ok(output) if output.passed() => outputs.push(output),
                Ok(output) => {
                    let reason = format!(
                        "command {} exited with code {}",
                        argv.first().map(String::as_str).unwrap_or(""),
                        output.exit_code
                    );
                    outputs.push(output);
                    info!(env = %cell.env, "Environment failed");
                    return CellResult::finished(
                        &cell.env,
                        CellStatus::Failed,
                        outputs,
                        Some(reason),
                        start,
                    );
                }
                Err(e) => {
                    warn!(env = %cell.env, error = %e, "Command execution error");
                    return CellResult::finished(
                        &cell.env,
                        CellStatus::Errored,
                        outputs,
                        Some(e.to_string()),
                        start,
                    );
                }
            }
        }

        info!(env = %cell.env, "Environment passed");
        CellResult::finished(&cell.env, CellStatus::Passed, outputs, None, start)
    }

    /// Execute the given cells and build a report in their order.
    ///
    /// Cells run with bounded concurrency (`options.parallel`); order of
    /// results always matches the input order.
    pub async fn run(&self, schedule: &Schedule, cells: &[Cell]) -> Result<RunReport> {
        let start = Instant::now();
        let digest = schedule.digest()?;

        let concurrency = self.options.parallel.max(1);
        let results: Vec<CellResult> = stream::iter(cells.iter().map(|cell| self.run_cell(cell)))
            .buffered(concurrency)
            .collect()
            .await;

        Ok(RunReport::new(
            &schedule.platform,
            digest,
            results,
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ScriptedRunner, StaticProbe};
    use toxide_core::{MatrixConfig, Schedule};

    const CONFIG: &str = r#"
        [matrix]
        envlist = ["py{37,38}", "docs", "smoke"]

        [factors]
        interpreters = ["py"]
        tools = ["docs"]

        [env]
        deps = ["lxml"]
        commands = [["python", "-m", "unittest"]]
        allowlist_externals = ["make"]

        [[dep_rule]]
        when = { type = "atom", atom = "docs" }
        deps = ["Sphinx"]

        [[role]]
        name = "docs"
        when = { type = "atom", atom = "docs" }
        commands = [["make", "-C", "doc", "html"]]
    "#;

    fn schedule() -> Schedule {
        let config = MatrixConfig::from_toml_str(CONFIG).expect("parse failed");
        Schedule::build(&config, "ubuntu-latest").expect("build failed")
    }

    fn options() -> RunOptions {
        RunOptions {
            allowlist_externals: vec!["make".to_string()],
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_status_transitions() {
        use CellStatus::*;

        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(SkippedMissingInterpreter));
        assert!(Pending.can_transition_to(Failed));
        assert!(Running.can_transition_to(Passed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Errored));

        assert!(!Pending.can_transition_to(Passed), "Passed requires Running");
        assert!(!Running.can_transition_to(SkippedMissingInterpreter));
        assert!(!Passed.can_transition_to(Failed));
        assert!(Passed.is_terminal());
        assert!(SkippedMissingInterpreter.is_ok());
        assert!(!Failed.is_ok());
    }

    #[tokio::test]
    async fn test_all_cells_pass_with_available_interpreters() {
        let runner = ScriptedRunner::new();
        let probe = StaticProbe::with(&["python3.7", "python3.8", "python3"]);
        let executor = ScheduleExecutor::new(&runner, &probe, options());

        let schedule = schedule();
        let report = executor
            .run(&schedule, &schedule.cells)
            .await
            .expect("run failed");

        assert!(report.success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.passed_count(), 4);
        let envs: Vec<_> = report.cells.iter().map(|c| c.env.as_str()).collect();
        assert_eq!(envs, vec!["py37", "py38", "docs", "smoke"]);
    }

    #[tokio::test]
    async fn test_missing_interpreter_skips_when_enabled() {
        let runner = ScriptedRunner::new();
        let probe = StaticProbe::with(&["python3.8", "python3"]);
        let executor = ScheduleExecutor::new(
            &runner,
            &probe,
            RunOptions {
                skip_missing_interpreters: true,
                ..options()
            },
        );

        let schedule = schedule();
        let report = executor
            .run(&schedule, &schedule.cells)
            .await
            .expect("run failed");

        let py37 = &report.cells[0];
        assert_eq!(py37.status, CellStatus::SkippedMissingInterpreter);
        assert!(py37.commands.is_empty(), "skipped cells never run commands");
        assert!(report.success(), "skips still count as success");
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.passed_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_when_skip_disabled() {
        let runner = ScriptedRunner::new();
        let probe = StaticProbe::with(&["python3.8", "python3"]);
        let executor = ScheduleExecutor::new(&runner, &probe, options());

        let schedule = schedule();
        let report = executor
            .run(&schedule, &schedule.cells)
            .await
            .expect("run failed");

        let py37 = &report.cells[0];
        assert_eq!(py37.status, CellStatus::Failed);
        let reason = py37.reason.as_deref().expect("failure reason");
        assert!(reason.contains("python3.7"));
        assert!(!report.success());
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_first_failing_command_stops_the_cell() {
        // Fail the install step; the test command must never run.
        let runner = ScriptedRunner::new().with_exit_code("python3.7", 1);
        let probe = StaticProbe::with(&["python3.7", "python3.8", "python3"]);
        let executor = ScheduleExecutor::new(&runner, &probe, options());

        let schedule = schedule();
        let cells = schedule.select(&["py37".to_string()]).expect("select");
        let report = executor.run(&schedule, &cells).await.expect("run failed");

        let cell = &report.cells[0];
        assert_eq!(cell.status, CellStatus::Failed);
        assert_eq!(cell.commands.len(), 1, "stopped after the install step");
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_error_marks_cell_errored() {
        let runner = ScriptedRunner::new().with_spawn_error("make");
        let probe = StaticProbe::with(&["python3"]);
        let executor = ScheduleExecutor::new(&runner, &probe, options());

        let schedule = schedule();
        let cells = schedule.select(&["docs".to_string()]).expect("select");
        let report = executor.run(&schedule, &cells).await.expect("run failed");

        let cell = &report.cells[0];
        assert_eq!(cell.status, CellStatus::Errored);
        assert!(cell.reason.as_deref().expect("reason").contains("make"));
        assert_eq!(report.errored_count(), 1);
    }

    #[tokio::test]
    async fn test_sibling_cells_unaffected_by_failure() {
        let runner = ScriptedRunner::new().with_exit_code("python3.7", 1);
        let probe = StaticProbe::with(&["python3.7", "python3.8", "python3"]);
        let executor = ScheduleExecutor::new(&runner, &probe, options());

        let schedule = schedule();
        let report = executor
            .run(&schedule, &schedule.cells)
            .await
            .expect("run failed");

        assert_eq!(report.cells[0].status, CellStatus::Failed);
        assert_eq!(report.cells[1].status, CellStatus::Passed);
        assert_eq!(report.cells[2].status, CellStatus::Passed);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.passed_count(), 3);
    }

    #[tokio::test]
    async fn test_parallel_run_preserves_report_order() {
        let runner = ScriptedRunner::new();
        let probe = StaticProbe::with(&["python3.7", "python3.8", "python3"]);
        let executor = ScheduleExecutor::new(
            &runner,
            &probe,
            RunOptions {
                parallel: 4,
                ..options()
            },
        );

        let schedule = schedule();
        let report = executor
            .run(&schedule, &schedule.cells)
            .await
            .expect("run failed");

        let envs: Vec<_> = report.cells.iter().map(|c| c.env.as_str()).collect();
        assert_eq!(envs, vec!["py37", "py38", "docs", "smoke"]);
        assert!(report.success());
    }
}

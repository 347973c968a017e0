//! Toxide Exec: Cell Execution for Toxide
//!
//! This crate runs the cells a schedule resolves to. It owns the
//! process plumbing (spawning, timeouts, output capture), the
//! interpreter probe, the per-cell state machine, and the run report.
//!
//! ## Key Components
//!
//! - `CommandRunner` / `ProcessRunner`: spawn one command and capture its output
//! - `InterpreterProbe` / `PathProbe`: check that an interpreter executable exists
//! - `ScheduleExecutor`: drive cells to terminal states with bounded concurrency
//! - `RunReport`: the aggregated, JSON-serializable outcome of a run

mod error;
mod executor;
pub mod fakes;
mod interpreter;
mod report;
mod runner;

pub use error::{ExecError, Result};
pub use executor::{CellResult, CellStatus, RunOptions, ScheduleExecutor};
pub use interpreter::{InterpreterProbe, PathProbe};
pub use report::RunReport;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

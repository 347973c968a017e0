//! Run reports.
//!
//! A report captures one full execution of a schedule: which cells ran,
//! how each ended, and the digest of the schedule they came from. The
//! JSON form is the machine-readable artifact for CI.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::executor::{CellResult, CellStatus};
use crate::Result;

/// Outcome of executing a set of cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub platform: String,

    /// Digest of the schedule that produced these cells.
    pub schedule_digest: String,

    /// Results in schedule order.
    pub cells: Vec<CellResult>,
}

impl RunReport {
    pub fn new(platform: &str, schedule_digest: String, cells: Vec<CellResult>, duration_ms: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            duration_ms,
            platform: platform.to_string(),
            schedule_digest,
            cells,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.count(CellStatus::Passed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(CellStatus::Failed)
    }

    pub fn errored_count(&self) -> usize {
        self.count(CellStatus::Errored)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(CellStatus::SkippedMissingInterpreter)
    }

    fn count(&self, status: CellStatus) -> usize {
        self.cells.iter().filter(|c| c.status == status).count()
    }

    /// A run succeeds when every cell passed or was skipped.
    pub fn success(&self) -> bool {
        self.cells.iter().all(|c| c.status.is_ok())
    }

    /// Process exit code for this run: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    /// One-line human summary of the counts.
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} errored, {} skipped",
            self.passed_count(),
            self.failed_count(),
            self.errored_count(),
            self.skipped_count()
        )
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

//! Status projection DTOs
//!
//! The shapes returned by the polling endpoint. Identical whether the run is
//! active or terminal; pollers use `finished` to decide when to stop.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::log::LogLine;
use crate::domain::run::{RunStatus, StageStatus, TriggeredBy};

/// Badge classification for dashboard rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBadge {
    Neutral,
    Active,
    Success,
    Failure,
    Muted,
}

/// Per-status stage counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub pending: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StageCounts {
    pub fn record(&mut self, status: StageStatus) {
        match status {
            StageStatus::Pending => self.pending += 1,
            StageStatus::Running => self.running += 1,
            StageStatus::Success => self.success += 1,
            StageStatus::Failed => self.failed += 1,
            StageStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Aggregate run summary for pollers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub counts: StageCounts,
    pub elapsed_seconds: i64,
    pub finished: bool,
}

/// Projection of one stage run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRunView {
    pub id: Uuid,
    pub stage_id: Uuid,
    pub name: String,
    pub status: StageStatus,
    pub badge: StatusBadge,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: Option<i64>,
    pub duration: Option<String>,
    pub output: Vec<LogLine>,
    pub error_message: Option<String>,
    pub attempts: u32,
}

/// Projection of one run plus its stage runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunView {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub run_number: u64,
    pub status: RunStatus,
    pub badge: StatusBadge,
    pub triggered_by: TriggeredBy,
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub artifacts: std::collections::HashMap<String, String>,
    pub stages: Vec<StageRunView>,
    pub progress: f64,
    pub summary: RunSummary,
    pub finished: bool,
}

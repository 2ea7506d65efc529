//! Run domain types
//!
//! A `PipelineRun` is one timestamped execution attempt of a pipeline; a
//! `PipelineStageRun` is one execution attempt of a stage within that run.
//! Both are owned by the engine; everything else only reads snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Run-level status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed | RunStatus::Cancelled)
    }

    /// A pipeline may have at most one active run at a time
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

/// What started the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    Manual,
    Webhook,
    Schedule,
}

/// One execution instance of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    /// Monotonically increasing per pipeline, assigned at creation, never reused
    pub run_number: u64,
    pub status: RunStatus,
    pub triggered_by: TriggeredBy,
    /// Opaque provenance from the trigger source (webhook payload, schedule id, ...)
    pub trigger_data: serde_json::Value,
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Set if and only if the run is terminal
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Produced-file labels to locations; may be backfilled after the run is terminal
    pub artifacts: HashMap<String, String>,
    /// Cooperative cancellation flag, observed by the orchestrator between stages
    pub cancel_requested: bool,
}

/// Stage-level status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::Failed | StageStatus::Skipped)
    }
}

/// One execution instance of a stage, scoped to a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStageRun {
    pub id: Uuid,
    pub run_id: Uuid,
    pub stage_id: Uuid,
    pub stage_name: String,
    pub status: StageStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: Option<i64>,
    /// Combined stdout/stderr, accumulated across retry attempts
    pub output: String,
    pub error_message: Option<String>,
    /// Dispatch attempts made so far (retries included)
    pub attempts: u32,
}

/// Terminal outcome of a stage attempt
///
/// Modeled as a sum type rather than status strings so that every consumer
/// has to handle all three categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failure { error: String },
    Timeout,
}

impl StageOutcome {
    /// The stage-run status this outcome resolves to
    pub fn status(&self) -> StageStatus {
        match self {
            StageOutcome::Success => StageStatus::Success,
            StageOutcome::Failure { .. } | StageOutcome::Timeout => StageStatus::Failed,
        }
    }

    /// Error message recorded on the stage run, if any
    pub fn error_message(&self) -> Option<String> {
        match self {
            StageOutcome::Success => None,
            StageOutcome::Failure { error } => Some(error.clone()),
            StageOutcome::Timeout => Some("timeout".to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success)
    }
}

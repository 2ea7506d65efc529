//! Run DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::run::TriggeredBy;

/// Request to start a run
///
/// The engine does not parse webhook payloads or cron expressions; trigger
/// sources hand over `triggered_by` plus opaque provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRun {
    pub triggered_by: TriggeredBy,
    #[serde(default)]
    pub trigger_data: Option<serde_json::Value>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl TriggerRun {
    pub fn manual() -> Self {
        Self {
            triggered_by: TriggeredBy::Manual,
            trigger_data: None,
            commit_sha: None,
            branch: None,
        }
    }
}

/// Request to retry a failed run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryRun {
    /// Replay only from the first stage whose prior attempt did not succeed;
    /// stages that previously succeeded are carried forward as skipped.
    /// Default is a full replay.
    #[serde(default)]
    pub from_failure: bool,
}

/// Artifact labels and locations to record on a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBackfill {
    pub artifacts: HashMap<String, String>,
}

//! Pipeline domain types
//!
//! A `Pipeline` is the reusable, configured execution plan for a project;
//! it never executes itself. Each run references (never copies) the
//! pipeline's ordered stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Pipeline definition
///
/// Bound to exactly one project; at most one pipeline is the active
/// execution plan per project at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub provider: PipelineProvider,
    pub triggers: Vec<TriggerKind>,
    pub active: bool,
    pub target: ExecutionTarget,
    pub stages: Vec<PipelineStage>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Pipeline {
    /// Stages in execution order: pre_deploy, then deploy, then post_deploy,
    /// ascending `order` within each partition. Disabled stages are omitted.
    pub fn execution_order(&self) -> Vec<&PipelineStage> {
        let mut stages: Vec<&PipelineStage> =
            self.stages.iter().filter(|s| s.enabled).collect();
        stages.sort_by_key(|s| (s.stage_type, s.order));
        stages
    }
}

/// How the pipeline definition was authored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineProvider {
    /// Configured manually through the dashboard
    Manual,
    /// Imported from an external definition
    Imported,
}

/// Events that may start a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Push,
    Manual,
    Webhook,
    Schedule,
}

/// The logical target a run's commands execute against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTarget {
    /// Human-readable label (project slug, server name, ...)
    pub label: String,
    /// Working directory for command execution, if the executor needs one
    pub working_dir: Option<PathBuf>,
}

/// Stage type partition
///
/// Partitions execute in declaration order of this enum; the derived `Ord`
/// is the partition order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    PreDeploy,
    Deploy,
    PostDeploy,
}

/// One ordered unit of work within a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStage {
    pub id: Uuid,
    pub name: String,
    pub stage_type: StageType,
    /// Unique within the stage's type partition, dense from 0
    pub order: u32,
    pub commands: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout_seconds: u64,
    pub retry: RetryPolicy,
    /// A failure of this stage does not abort the remainder of the run
    pub continue_on_error: bool,
    /// Disabled stages are never attempted and get no stage-run row
    pub enabled: bool,
}

impl PipelineStage {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Per-stage retry policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Fixed backoff between attempts
    pub backoff_seconds: u64,
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_seconds)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_seconds: 5,
        }
    }
}

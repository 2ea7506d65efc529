//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::pipeline::{PipelineProvider, RetryPolicy, StageType, TriggerKind};

/// Request to create a new pipeline with its ordered stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub project_id: Uuid,
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: PipelineProvider,
    #[serde(default)]
    pub triggers: Vec<TriggerKind>,
    /// Logical execution target label; defaults to the pipeline name
    #[serde(default)]
    pub target_label: Option<String>,
    #[serde(default)]
    pub working_dir: Option<std::path::PathBuf>,
    pub stages: Vec<CreateStage>,
}

fn default_provider() -> PipelineProvider {
    PipelineProvider::Manual
}

/// One stage in a creation request
///
/// `order` within each type partition is assigned from list position, so
/// callers only declare the partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStage {
    pub name: String,
    pub stage_type: StageType,
    pub commands: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout_seconds() -> u64 {
    600
}

fn default_enabled() -> bool {
    true
}

/// Compact pipeline listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub provider: PipelineProvider,
    pub active: bool,
    pub stage_count: usize,
}

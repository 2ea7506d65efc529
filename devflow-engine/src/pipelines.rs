//! Pipeline configuration
//!
//! CRUD over pipeline definitions. Thin next to the run machinery; the one
//! piece of logic is dense `order` assignment within each type partition.

use chrono::Utc;
use devflow_core::domain::pipeline::{
    ExecutionTarget, Pipeline, PipelineStage, StageType,
};
use devflow_core::dto::pipeline::{CreatePipeline, CreateStage, PipelineSummary};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::store::Store;

/// Create a new pipeline with its ordered stages
pub fn create_pipeline(store: &Store, req: CreatePipeline) -> Result<Pipeline> {
    validate(&req)?;

    let now = Utc::now();
    let target = ExecutionTarget {
        label: req.target_label.unwrap_or_else(|| req.name.clone()),
        working_dir: req.working_dir,
    };

    // Orders are assigned from list position, independently per partition
    let mut next_order: HashMap<StageType, u32> = HashMap::new();
    let stages = req
        .stages
        .into_iter()
        .map(|s| build_stage(s, &mut next_order))
        .collect();

    let pipeline = Pipeline {
        id: Uuid::new_v4(),
        project_id: req.project_id,
        name: req.name,
        provider: req.provider,
        triggers: req.triggers,
        active: true,
        target,
        stages,
        created_at: now,
        updated_at: now,
    };

    let pipeline = store.insert_pipeline(pipeline)?;
    tracing::info!(pipeline = %pipeline.name, id = %pipeline.id, "pipeline created");
    Ok(pipeline)
}

/// Get a pipeline by ID
pub fn get_pipeline(store: &Store, id: Uuid) -> Result<Pipeline> {
    store.get_pipeline(id)
}

/// List all pipelines as summaries, newest first
pub fn list_pipelines(store: &Store) -> Vec<PipelineSummary> {
    store
        .list_pipelines()
        .into_iter()
        .map(|p| PipelineSummary {
            id: p.id,
            project_id: p.project_id,
            name: p.name,
            provider: p.provider,
            active: p.active,
            stage_count: p.stages.len(),
        })
        .collect()
}

/// Delete a pipeline definition; refused while a run is active
pub fn delete_pipeline(store: &Store, id: Uuid) -> Result<()> {
    store.remove_pipeline(id)?;
    tracing::info!(%id, "pipeline deleted");
    Ok(())
}

fn build_stage(req: CreateStage, next_order: &mut HashMap<StageType, u32>) -> PipelineStage {
    let order = next_order.entry(req.stage_type).or_insert(0);
    let stage = PipelineStage {
        id: Uuid::new_v4(),
        name: req.name,
        stage_type: req.stage_type,
        order: *order,
        commands: req.commands,
        env: req.env,
        timeout_seconds: req.timeout_seconds,
        retry: req.retry.unwrap_or_default(),
        continue_on_error: req.continue_on_error,
        enabled: req.enabled,
    };
    *order += 1;
    stage
}

fn validate(req: &CreatePipeline) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(EngineError::Validation("pipeline name is required".to_string()));
    }
    if req.stages.is_empty() {
        return Err(EngineError::Validation(
            "a pipeline needs at least one stage".to_string(),
        ));
    }

    for stage in &req.stages {
        if stage.name.trim().is_empty() {
            return Err(EngineError::Validation("stage name is required".to_string()));
        }
        if stage.commands.is_empty() || stage.commands.iter().any(|c| c.trim().is_empty()) {
            return Err(EngineError::Validation(format!(
                "stage '{}' needs a non-empty command list",
                stage.name
            )));
        }
        if stage.timeout_seconds == 0 {
            return Err(EngineError::Validation(format!(
                "stage '{}' needs a non-zero timeout",
                stage.name
            )));
        }
    }

    Ok(())
}

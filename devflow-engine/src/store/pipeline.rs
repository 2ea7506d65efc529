//! Pipeline definition store
//!
//! Pure data operations on pipeline records. Mutated by the configuration
//! surface, read by the tracker and orchestrator.

use devflow_core::domain::pipeline::Pipeline;
use uuid::Uuid;

use super::{Store, read_lock, write_lock};
use crate::error::{EngineError, Result};

impl Store {
    /// Insert a new pipeline definition
    pub fn insert_pipeline(&self, pipeline: Pipeline) -> Result<Pipeline> {
        let mut pipelines = write_lock(&self.pipelines);

        // One active execution plan per project at a time
        if pipeline.active
            && pipelines
                .values()
                .any(|p| p.project_id == pipeline.project_id && p.active)
        {
            return Err(EngineError::Validation(format!(
                "project {} already has an active pipeline",
                pipeline.project_id
            )));
        }

        pipelines.insert(pipeline.id, pipeline.clone());
        Ok(pipeline)
    }

    /// Find a pipeline by ID
    pub fn find_pipeline(&self, id: Uuid) -> Option<Pipeline> {
        read_lock(&self.pipelines).get(&id).cloned()
    }

    /// Get a pipeline by ID, erroring when absent
    pub fn get_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        self.find_pipeline(id)
            .ok_or(EngineError::PipelineNotFound(id))
    }

    /// List all pipelines, newest first
    pub fn list_pipelines(&self) -> Vec<Pipeline> {
        let mut pipelines: Vec<Pipeline> =
            read_lock(&self.pipelines).values().cloned().collect();
        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pipelines
    }

    /// Delete a pipeline definition
    ///
    /// Refused while a run of the pipeline is still active. Historic runs
    /// are kept; only the definition goes away.
    pub fn remove_pipeline(&self, id: Uuid) -> Result<()> {
        if self.has_active_run(id) {
            return Err(EngineError::InvalidState(format!(
                "pipeline {id} has an active run"
            )));
        }

        let mut pipelines = write_lock(&self.pipelines);
        pipelines
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::PipelineNotFound(id))
    }
}

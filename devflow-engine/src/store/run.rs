//! Run and stage-run store
//!
//! Run creation is the single-flight gate: the active-run check and the
//! run-number assignment happen inside one write-lock critical section, the
//! in-memory equivalent of a unique-constraint insert.

use chrono::Utc;
use devflow_core::domain::run::{PipelineRun, PipelineStageRun, RunStatus};
use devflow_core::dto::run::TriggerRun;
use std::collections::HashMap;
use uuid::Uuid;

use super::{Store, read_lock, write_lock};
use crate::error::{EngineError, Result};

impl Store {
    /// Create a new pending run for a pipeline
    ///
    /// Fails with `Conflict` if the pipeline already has a pending or
    /// running run. The assigned `run_number` is previous max + 1, starting
    /// at 1; runs are never deleted, so the sequence stays gap-free.
    pub fn create_run(&self, pipeline_id: Uuid, trigger: TriggerRun) -> Result<PipelineRun> {
        if self.find_pipeline(pipeline_id).is_none() {
            return Err(EngineError::PipelineNotFound(pipeline_id));
        }

        let mut runs = write_lock(&self.runs);

        if runs
            .values()
            .any(|r| r.pipeline_id == pipeline_id && r.status.is_active())
        {
            return Err(EngineError::Conflict(pipeline_id));
        }

        let run_number = runs
            .values()
            .filter(|r| r.pipeline_id == pipeline_id)
            .map(|r| r.run_number)
            .max()
            .unwrap_or(0)
            + 1;

        let run = PipelineRun {
            id: Uuid::new_v4(),
            pipeline_id,
            run_number,
            status: RunStatus::Pending,
            triggered_by: trigger.triggered_by,
            trigger_data: trigger.trigger_data.unwrap_or(serde_json::Value::Null),
            commit_sha: trigger.commit_sha,
            branch: trigger.branch,
            started_at: Utc::now(),
            finished_at: None,
            artifacts: HashMap::new(),
            cancel_requested: false,
        };

        runs.insert(run.id, run.clone());
        Ok(run)
    }

    /// Get a run by ID
    pub fn get_run(&self, id: Uuid) -> Result<PipelineRun> {
        read_lock(&self.runs)
            .get(&id)
            .cloned()
            .ok_or(EngineError::RunNotFound(id))
    }

    /// Run history for a pipeline, newest first
    pub fn runs_for_pipeline(&self, pipeline_id: Uuid) -> Vec<PipelineRun> {
        let mut runs: Vec<PipelineRun> = read_lock(&self.runs)
            .values()
            .filter(|r| r.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.run_number.cmp(&a.run_number));
        runs
    }

    /// Whether the pipeline has a pending or running run
    pub fn has_active_run(&self, pipeline_id: Uuid) -> bool {
        read_lock(&self.runs)
            .values()
            .any(|r| r.pipeline_id == pipeline_id && r.status.is_active())
    }

    /// Transition a pending run to running
    ///
    /// Returns `false` without transitioning if the run is already terminal
    /// or cancellation was requested first; the orchestrator then finishes
    /// the run as cancelled instead of dispatching.
    pub fn mark_running(&self, run_id: Uuid) -> Result<bool> {
        let mut runs = write_lock(&self.runs);
        let run = runs
            .get_mut(&run_id)
            .ok_or(EngineError::RunNotFound(run_id))?;

        if run.status.is_terminal() || run.cancel_requested {
            return Ok(false);
        }

        run.status = RunStatus::Running;
        Ok(true)
    }

    /// Transition a run to a terminal status
    ///
    /// Idempotent: an already-terminal run is returned unchanged, so a late
    /// second transition can never renumber `finished_at` or flip status.
    pub fn finish_run(&self, run_id: Uuid, status: RunStatus) -> Result<PipelineRun> {
        debug_assert!(status.is_terminal());

        let mut runs = write_lock(&self.runs);
        let run = runs
            .get_mut(&run_id)
            .ok_or(EngineError::RunNotFound(run_id))?;

        if !run.status.is_terminal() {
            run.status = status;
            run.finished_at = Some(Utc::now());
        }

        Ok(run.clone())
    }

    /// Flag a run for cooperative cancellation
    pub fn request_cancel(&self, run_id: Uuid) -> Result<PipelineRun> {
        let mut runs = write_lock(&self.runs);
        let run = runs
            .get_mut(&run_id)
            .ok_or(EngineError::RunNotFound(run_id))?;

        if run.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "run {} is already {:?}",
                run_id, run.status
            )));
        }

        run.cancel_requested = true;
        Ok(run.clone())
    }

    /// Record produced artifacts on a run
    ///
    /// The only mutation permitted after a run is terminal.
    pub fn backfill_artifacts(
        &self,
        run_id: Uuid,
        artifacts: HashMap<String, String>,
    ) -> Result<PipelineRun> {
        let mut runs = write_lock(&self.runs);
        let run = runs
            .get_mut(&run_id)
            .ok_or(EngineError::RunNotFound(run_id))?;

        run.artifacts.extend(artifacts);
        Ok(run.clone())
    }

    /// Insert a stage run for a (run, stage) pair
    ///
    /// Fails with `DuplicateStageRun` if the stage was already attempted or
    /// skipped in this run.
    pub fn insert_stage_run(&self, stage_run: PipelineStageRun) -> Result<PipelineStageRun> {
        let mut stage_runs = write_lock(&self.stage_runs);
        let rows = stage_runs.entry(stage_run.run_id).or_default();

        if rows.iter().any(|r| r.stage_id == stage_run.stage_id) {
            return Err(EngineError::DuplicateStageRun {
                run_id: stage_run.run_id,
                stage_id: stage_run.stage_id,
            });
        }

        rows.push(stage_run.clone());
        Ok(stage_run)
    }

    /// Stage runs of a run, in attempt order
    pub fn stage_runs(&self, run_id: Uuid) -> Vec<PipelineStageRun> {
        read_lock(&self.stage_runs)
            .get(&run_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Get one stage run of a run
    pub fn get_stage_run(&self, run_id: Uuid, stage_run_id: Uuid) -> Result<PipelineStageRun> {
        read_lock(&self.stage_runs)
            .get(&run_id)
            .and_then(|rows| rows.iter().find(|r| r.id == stage_run_id))
            .cloned()
            .ok_or(EngineError::StageRunNotFound(stage_run_id))
    }

    /// Stage IDs already materialized (attempted or skipped) in a run
    pub fn attempted_stage_ids(&self, run_id: Uuid) -> Vec<Uuid> {
        read_lock(&self.stage_runs)
            .get(&run_id)
            .map(|rows| rows.iter().map(|r| r.stage_id).collect())
            .unwrap_or_default()
    }

    /// Apply a mutation to one stage run
    ///
    /// Serialized through the run's owning orchestrator task; the closure
    /// runs under the write lock and must not block.
    pub(crate) fn update_stage_run<F>(
        &self,
        run_id: Uuid,
        stage_run_id: Uuid,
        mutate: F,
    ) -> Result<PipelineStageRun>
    where
        F: FnOnce(&mut PipelineStageRun),
    {
        let mut stage_runs = write_lock(&self.stage_runs);
        let row = stage_runs
            .get_mut(&run_id)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == stage_run_id))
            .ok_or(EngineError::StageRunNotFound(stage_run_id))?;

        mutate(row);
        Ok(row.clone())
    }
}

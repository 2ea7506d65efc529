//! Stage Run Tracker
//!
//! Materializes and mutates per-stage execution records in strict order.
//! A stage-run row exists for every stage the controller decided to attempt
//! or explicitly skip; stages never reached have no row at all.

use chrono::Utc;
use devflow_core::domain::pipeline::PipelineStage;
use devflow_core::domain::run::{PipelineRun, PipelineStageRun, StageOutcome, StageStatus};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::store::Store;

/// Next stage to attempt for a run, honoring partition order then `order`
///
/// Stages already attempted (or skipped) in this run are passed over.
/// `None` means the run has exhausted its stages — the completion signal.
pub fn next_stage(store: &Store, run: &PipelineRun) -> Result<Option<PipelineStage>> {
    let pipeline = store.get_pipeline(run.pipeline_id)?;
    let attempted = store.attempted_stage_ids(run.id);

    Ok(pipeline
        .execution_order()
        .into_iter()
        .find(|stage| !attempted.contains(&stage.id))
        .cloned())
}

/// Create a running stage-run row immediately before dispatch
pub fn begin_stage(
    store: &Store,
    run_id: Uuid,
    stage: &PipelineStage,
) -> Result<PipelineStageRun> {
    let stage_run = PipelineStageRun {
        id: Uuid::new_v4(),
        run_id,
        stage_id: stage.id,
        stage_name: stage.name.clone(),
        status: StageStatus::Running,
        started_at: Some(Utc::now()),
        completed_at: None,
        duration_seconds: None,
        output: String::new(),
        error_message: None,
        attempts: 0,
    };

    store.insert_stage_run(stage_run)
}

/// Resolve a stage run to its terminal state
///
/// Idempotent for a repeated identical outcome; a conflicting outcome after
/// the record is terminal is an `InvalidState` error. Output is not written
/// here — it accumulates through [`append_output`] as attempts produce it.
pub fn complete_stage(
    store: &Store,
    run_id: Uuid,
    stage_run_id: Uuid,
    outcome: &StageOutcome,
) -> Result<PipelineStageRun> {
    let current = store.get_stage_run(run_id, stage_run_id)?;

    if current.status.is_terminal() {
        if current.status == outcome.status()
            && current.error_message == outcome.error_message()
        {
            // Duplicate completion signal from the executor: no-op
            return Ok(current);
        }
        return Err(EngineError::InvalidState(format!(
            "stage run {stage_run_id} is already {:?}",
            current.status
        )));
    }

    store.update_stage_run(run_id, stage_run_id, |row| {
        let now = Utc::now();
        row.status = outcome.status();
        row.completed_at = Some(now);
        row.duration_seconds = row.started_at.map(|s| (now - s).num_seconds());
        row.error_message = outcome.error_message();
    })
}

/// Create a skipped stage-run row directly, with no running transition
///
/// Used when an earlier failure aborts the remainder, and by
/// retry-from-failure to carry a previously successful stage forward.
pub fn skip_stage(
    store: &Store,
    run_id: Uuid,
    stage: &PipelineStage,
    carried_output: Option<String>,
) -> Result<PipelineStageRun> {
    let stage_run = PipelineStageRun {
        id: Uuid::new_v4(),
        run_id,
        stage_id: stage.id,
        stage_name: stage.name.clone(),
        status: StageStatus::Skipped,
        started_at: None,
        completed_at: None,
        duration_seconds: None,
        output: carried_output.unwrap_or_default(),
        error_message: None,
        attempts: 0,
    };

    store.insert_stage_run(stage_run)
}

/// Bump the attempt counter before a dispatch
pub fn record_attempt(store: &Store, run_id: Uuid, stage_run_id: Uuid) -> Result<u32> {
    let row = store.update_stage_run(run_id, stage_run_id, |row| {
        row.attempts += 1;
    })?;
    Ok(row.attempts)
}

/// Append executor output to a stage run
pub fn append_output(
    store: &Store,
    run_id: Uuid,
    stage_run_id: Uuid,
    chunk: &str,
) -> Result<()> {
    if chunk.is_empty() {
        return Ok(());
    }

    store.update_stage_run(run_id, stage_run_id, |row| {
        row.output.push_str(chunk);
    })?;
    Ok(())
}

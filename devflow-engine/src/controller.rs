//! Pipeline Run Controller
//!
//! Owns the run-level state machine (`pending → running → success | failed |
//! cancelled`) and the single-flight guarantee. All terminal transitions go
//! through this module, invoked from the run's orchestrator task, so each
//! run finishes (and its terminal event fires) exactly once.

use devflow_core::domain::pipeline::PipelineStage;
use devflow_core::domain::run::{
    PipelineRun, PipelineStageRun, RunStatus, StageStatus, TriggeredBy,
};
use devflow_core::dto::run::TriggerRun;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::events::EngineEvent;
use crate::{Engine, orchestrator, tracker};

/// Start a new run for a pipeline
///
/// Fails with `Conflict` while another run of the pipeline is active. On
/// success the run is created `Pending` and an orchestrator task is spawned
/// to drive it.
pub fn start(engine: &Engine, pipeline_id: Uuid, trigger: TriggerRun) -> Result<PipelineRun> {
    let pipeline = engine.store().get_pipeline(pipeline_id)?;
    if !pipeline.active {
        return Err(EngineError::InvalidState(format!(
            "pipeline {pipeline_id} is not active"
        )));
    }

    let run = engine.store().create_run(pipeline_id, trigger)?;

    tracing::info!(
        pipeline = %pipeline.name,
        run_number = run.run_number,
        triggered_by = ?run.triggered_by,
        "run created"
    );

    orchestrator::spawn(engine.clone(), run.id);
    Ok(run)
}

/// Request cancellation of an active run
///
/// Valid only while the run is pending or running. Cancellation is
/// cooperative: the flag is observed by the orchestrator between stage
/// dispatches, the in-flight stage (if any) is allowed to resolve, and the
/// run is then forced to `Cancelled` regardless of that stage's outcome.
pub fn cancel(engine: &Engine, run_id: Uuid) -> Result<PipelineRun> {
    let run = engine.store().request_cancel(run_id)?;
    tracing::info!(run_number = run.run_number, "cancellation requested");
    Ok(run)
}

/// Create a new run that re-executes a failed one
///
/// Full replay by default. With `from_failure`, stages that succeeded in the
/// failed run are carried forward as `Skipped` rows preserving their prior
/// output, so execution resumes at the first stage that did not succeed.
pub fn retry(engine: &Engine, run_id: Uuid, from_failure: bool) -> Result<PipelineRun> {
    let failed = engine.store().get_run(run_id)?;
    if failed.status != RunStatus::Failed {
        return Err(EngineError::InvalidState(format!(
            "run {} is {:?}, only failed runs can be retried",
            run_id, failed.status
        )));
    }

    let pipeline = engine.store().get_pipeline(failed.pipeline_id)?;

    let trigger = TriggerRun {
        triggered_by: TriggeredBy::Manual,
        trigger_data: Some(serde_json::json!({
            "retry_of": failed.run_number,
            "from_failure": from_failure,
        })),
        commit_sha: failed.commit_sha.clone(),
        branch: failed.branch.clone(),
    };

    let run = engine.store().create_run(pipeline.id, trigger)?;

    if from_failure {
        let prior = engine.store().stage_runs(failed.id);
        for stage in pipeline.execution_order() {
            let succeeded = prior
                .iter()
                .find(|r| r.stage_id == stage.id)
                .filter(|r| r.status == StageStatus::Success);

            if let Some(row) = succeeded {
                tracker::skip_stage(
                    engine.store(),
                    run.id,
                    stage,
                    Some(row.output.clone()),
                )?;
            }
        }
    }

    tracing::info!(
        run_number = run.run_number,
        retry_of = failed.run_number,
        from_failure,
        "retry run created"
    );

    orchestrator::spawn(engine.clone(), run.id);
    Ok(run)
}

/// Re-evaluate the run after a stage run reached a terminal state
///
/// The single transition point for run status. An already-terminal run makes
/// this a no-op, which guards against double evaluation when the executor
/// signals completion more than once.
pub fn evaluate_after_stage(
    engine: &Engine,
    run_id: Uuid,
    stage: &PipelineStage,
    stage_run: &PipelineStageRun,
) -> Result<RunStatus> {
    let store = engine.store();
    let run = store.get_run(run_id)?;

    if run.status.is_terminal() {
        return Ok(run.status);
    }

    // Cancellation wins over the last stage's outcome. Unattempted stages
    // get no rows: they were never decided, not skipped.
    if run.cancel_requested {
        return finish_and_emit(engine, run_id, RunStatus::Cancelled);
    }

    if stage_run.status == StageStatus::Failed && !stage.continue_on_error {
        skip_remaining(engine, &run)?;
        return finish_and_emit(engine, run_id, RunStatus::Failed);
    }

    if tracker::next_stage(store, &run)?.is_none() {
        return finish_and_emit(engine, run_id, RunStatus::Success);
    }

    Ok(RunStatus::Running)
}

/// Finish a run whose stage list is exhausted without a fatal failure
///
/// Reached directly only by runs with nothing to attempt (all stages
/// disabled or pre-skipped); otherwise [`evaluate_after_stage`] completes
/// the run after its final stage.
pub(crate) fn complete_run(engine: &Engine, run_id: Uuid) -> Result<RunStatus> {
    let run = engine.store().get_run(run_id)?;
    if run.status.is_terminal() {
        return Ok(run.status);
    }

    let status = if run.cancel_requested {
        RunStatus::Cancelled
    } else {
        RunStatus::Success
    };
    finish_and_emit(engine, run_id, status)
}

/// Force a flagged run to `Cancelled` between stage dispatches
pub(crate) fn force_cancel(engine: &Engine, run_id: Uuid) -> Result<RunStatus> {
    finish_and_emit(engine, run_id, RunStatus::Cancelled)
}

/// Force a run to `Failed` after an internal orchestrator error
///
/// A run left non-terminal would hold its pipeline's single-flight slot
/// forever. No-op if the run already reached a terminal state.
pub(crate) fn force_fail(engine: &Engine, run_id: Uuid) -> Result<RunStatus> {
    finish_and_emit(engine, run_id, RunStatus::Failed)
}

/// Create skipped rows for every stage not yet attempted in this run
fn skip_remaining(engine: &Engine, run: &PipelineRun) -> Result<()> {
    let store = engine.store();
    let pipeline = store.get_pipeline(run.pipeline_id)?;
    let attempted = store.attempted_stage_ids(run.id);

    for stage in pipeline.execution_order() {
        if !attempted.contains(&stage.id) {
            tracker::skip_stage(store, run.id, stage, None)?;
        }
    }
    Ok(())
}

fn finish_and_emit(engine: &Engine, run_id: Uuid, status: RunStatus) -> Result<RunStatus> {
    // Exactly-once terminal event: a run that is already terminal was
    // finished (and announced) by an earlier call on this task.
    let current = engine.store().get_run(run_id)?;
    if current.status.is_terminal() {
        return Ok(current.status);
    }

    let run = engine.store().finish_run(run_id, status)?;

    tracing::info!(
        run_number = run.run_number,
        status = ?run.status,
        "run finished"
    );

    engine.emit(EngineEvent::RunFinished {
        run_id: run.id,
        pipeline_id: run.pipeline_id,
        run_number: run.run_number,
        status: run.status,
    });

    Ok(run.status)
}

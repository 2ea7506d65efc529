//! Orchestrator
//!
//! The active control loop that turns a pending run into a terminal one.
//! One task per in-flight run; the single-flight invariant guarantees at
//! most one loop per pipeline. Within a run, stages execute strictly
//! sequentially: later stages may depend on state produced by earlier ones.

use devflow_core::domain::pipeline::PipelineStage;
use devflow_core::domain::run::{PipelineRun, StageOutcome, StageStatus};
use uuid::Uuid;

use crate::error::Result;
use crate::events::EngineEvent;
use crate::{Engine, controller, tracker};

/// Spawn the orchestrator task for a run
pub fn spawn(engine: Engine, run_id: Uuid) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_loop(&engine, run_id).await {
            tracing::error!(%run_id, error = %e, "orchestrator loop aborted");
            // The run must still reach a terminal state, or its pipeline's
            // single-flight slot is never released
            if let Err(e) = controller::force_fail(&engine, run_id) {
                tracing::error!(%run_id, error = %e, "failed to finish aborted run");
            }
        }
    })
}

async fn run_loop(engine: &Engine, run_id: Uuid) -> Result<()> {
    let store = engine.store();

    // Refused when cancellation beat us to the pending run
    if !store.mark_running(run_id)? {
        controller::force_cancel(engine, run_id)?;
        return Ok(());
    }

    loop {
        let run = store.get_run(run_id)?;
        if run.status.is_terminal() {
            break;
        }
        if run.cancel_requested {
            controller::force_cancel(engine, run_id)?;
            break;
        }

        let Some(stage) = tracker::next_stage(store, &run)? else {
            controller::complete_run(engine, run_id)?;
            break;
        };

        let stage_run = tracker::begin_stage(store, run_id, &stage)?;
        tracing::info!(
            run_number = run.run_number,
            stage = %stage.name,
            "stage started"
        );

        let outcome = dispatch_stage(engine, &run, &stage, stage_run.id).await?;
        let stage_run = tracker::complete_stage(store, run_id, stage_run.id, &outcome)?;

        tracing::info!(
            run_number = run.run_number,
            stage = %stage.name,
            status = ?stage_run.status,
            duration_seconds = stage_run.duration_seconds,
            "stage finished"
        );

        if stage_run.status == StageStatus::Failed {
            engine.emit(EngineEvent::StageFailed {
                run_id,
                stage_run_id: stage_run.id,
                stage_name: stage_run.stage_name.clone(),
                error: stage_run
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "stage failed".to_string()),
            });
        }

        controller::evaluate_after_stage(engine, run_id, &stage, &stage_run)?;
    }

    Ok(())
}

/// Dispatch a stage to the executor, honoring its timeout and retry policy
///
/// The executor future races `tokio::time::timeout`; a timed-out attempt is
/// a failed attempt with `error_message = "timeout"`. Failed attempts are
/// re-dispatched into the same stage run (output appended, attempt counter
/// bumped) up to the declared count, with a fixed backoff between attempts.
async fn dispatch_stage(
    engine: &Engine,
    run: &PipelineRun,
    stage: &PipelineStage,
    stage_run_id: Uuid,
) -> Result<StageOutcome> {
    let store = engine.store();
    let pipeline = store.get_pipeline(run.pipeline_id)?;
    let max_attempts = stage.retry.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracker::record_attempt(store, run.id, stage_run_id)?;

        let execute = engine
            .executor()
            .execute(&pipeline.target, &stage.commands, &stage.env);

        let outcome = match tokio::time::timeout(stage.timeout(), execute).await {
            Err(_) => StageOutcome::Timeout,
            Ok(Err(e)) => {
                tracker::append_output(store, run.id, stage_run_id, &format!("{e}\n"))?;
                StageOutcome::Failure {
                    error: format!("execution error: {e}"),
                }
            }
            Ok(Ok(out)) => {
                tracker::append_output(store, run.id, stage_run_id, &out.output)?;
                if out.succeeded() {
                    StageOutcome::Success
                } else {
                    StageOutcome::Failure {
                        error: format!("exit code {}", out.exit_code),
                    }
                }
            }
        };

        if outcome.is_success() || attempt >= max_attempts {
            return Ok(outcome);
        }

        tracing::warn!(
            stage = %stage.name,
            attempt,
            max_attempts,
            error = ?outcome.error_message(),
            "stage attempt failed, retrying after backoff"
        );
        tokio::time::sleep(stage.retry.backoff()).await;
    }
}

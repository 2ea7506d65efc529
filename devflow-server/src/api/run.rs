//! Run API Handlers
//!
//! HTTP endpoints for triggering, polling and steering runs.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use devflow_core::domain::run::PipelineRun;
use devflow_core::dto::run::{ArtifactBackfill, RetryRun, TriggerRun};
use devflow_core::dto::status::RunView;
use devflow_engine::{Engine, controller, status};
use uuid::Uuid;

use crate::api::error::ApiResult;

/// POST /pipeline/{id}/trigger
/// Start a new run for a pipeline
pub async fn trigger_run(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(req): Json<TriggerRun>,
) -> ApiResult<(StatusCode, Json<PipelineRun>)> {
    tracing::info!("Triggering run for pipeline: {}", id);

    let run = controller::start(&engine, id, req)?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// GET /run/{id}
/// Poll a run: record, stage runs, progress and summary in one shape
pub async fn get_run(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunView>> {
    tracing::debug!("Getting run: {}", id);

    let view = status::run_view(engine.store(), id)?;
    Ok(Json(view))
}

/// GET /run/pipeline/{pipeline_id}
/// Run history for a pipeline, newest first
pub async fn list_runs_by_pipeline(
    State(engine): State<Engine>,
    Path(pipeline_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PipelineRun>>> {
    tracing::debug!("Listing runs for pipeline: {}", pipeline_id);

    engine.store().get_pipeline(pipeline_id)?;
    Ok(Json(engine.store().runs_for_pipeline(pipeline_id)))
}

/// POST /run/{id}/cancel
/// Request cancellation of an active run
pub async fn cancel_run(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Cancelling run: {}", id);

    controller::cancel(&engine, id)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /run/{id}/retry
/// Start a fresh run replaying a failed one
pub async fn retry_run(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(req): Json<RetryRun>,
) -> ApiResult<(StatusCode, Json<PipelineRun>)> {
    tracing::info!("Retrying run: {} (from_failure: {})", id, req.from_failure);

    let run = controller::retry(&engine, id, req.from_failure)?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// POST /run/{id}/artifacts
/// Record artifact labels/locations on a run; allowed on terminal runs
pub async fn backfill_artifacts(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    Json(req): Json<ArtifactBackfill>,
) -> ApiResult<Json<PipelineRun>> {
    tracing::debug!("Recording {} artifacts on run: {}", req.artifacts.len(), id);

    let run = engine.store().backfill_artifacts(id, req.artifacts)?;
    Ok(Json(run))
}

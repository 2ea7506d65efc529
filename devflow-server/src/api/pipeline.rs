//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline configuration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use devflow_core::domain::pipeline::Pipeline;
use devflow_core::dto::pipeline::{CreatePipeline, PipelineSummary};
use devflow_engine::{Engine, pipelines};
use uuid::Uuid;

use crate::api::error::ApiResult;

/// POST /pipeline/create
/// Create a new pipeline
pub async fn create_pipeline(
    State(engine): State<Engine>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<Pipeline>)> {
    tracing::info!("Creating pipeline: {}", req.name);

    let pipeline = pipelines::create_pipeline(engine.store(), req)?;
    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// GET /pipeline/list
/// List all pipelines
pub async fn list_pipelines(State(engine): State<Engine>) -> ApiResult<Json<Vec<PipelineSummary>>> {
    tracing::debug!("Listing all pipelines");

    Ok(Json(pipelines::list_pipelines(engine.store())))
}

/// GET /pipeline/{id}
/// Get pipeline by ID
pub async fn get_pipeline(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = pipelines::get_pipeline(engine.store(), id)?;
    Ok(Json(pipeline))
}

/// DELETE /pipeline/{id}
/// Delete a pipeline; refused while a run is active
pub async fn delete_pipeline(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    pipelines::delete_pipeline(engine.store(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

//! API Module
//!
//! HTTP API layer over the engine.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod pipeline;
pub mod run;

use axum::{
    Router,
    routing::{delete, get, post},
};
use devflow_engine::Engine;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router with all endpoints
pub fn create_router(engine: Engine) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/create", post(pipeline::create_pipeline))
        .route("/pipeline/list", get(pipeline::list_pipelines))
        .route("/pipeline/{id}", get(pipeline::get_pipeline))
        .route("/pipeline/{id}", delete(pipeline::delete_pipeline))
        .route("/pipeline/{id}/trigger", post(run::trigger_run))
        // Run endpoints
        .route("/run/{id}", get(run::get_run))
        .route("/run/{id}/cancel", post(run::cancel_run))
        .route("/run/{id}/retry", post(run::retry_run))
        .route("/run/{id}/artifacts", post(run::backfill_artifacts))
        .route("/run/pipeline/{pipeline_id}", get(run::list_runs_by_pipeline))
        // Add state and middleware
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devflow_engine::Engine;
use devflow_engine::events::EngineEvent;
use devflow_engine::executor::LocalExecutor;

pub mod api;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DevFlow server...");

    let engine = Engine::new(Arc::new(LocalExecutor::new()));

    // Log terminal and stage-failure events; the hook where outbound
    // notifications would fan out
    tokio::spawn(log_events(engine.subscribe()));

    // Build router with all API endpoints
    let app = api::create_router(engine);

    // Get bind address
    let addr = std::env::var("DEVFLOW_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::RunFinished {
                run_id,
                pipeline_id,
                run_number,
                status,
            }) => {
                tracing::info!(%run_id, %pipeline_id, run_number, ?status, "run finished");
            }
            Ok(EngineEvent::StageFailed {
                run_id,
                stage_name,
                error,
                ..
            }) => {
                tracing::warn!(%run_id, stage = %stage_name, %error, "stage failed");
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event subscriber lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

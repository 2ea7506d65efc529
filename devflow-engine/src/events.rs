//! Engine events
//!
//! Terminal and per-stage-failure events broadcast for external subscribers
//! (notification delivery lives outside the engine). Lagging or absent
//! subscribers never block the orchestrator.

use devflow_core::domain::run::RunStatus;
use uuid::Uuid;

/// Event emitted by the engine on a broadcast channel
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A run reached a terminal state
    RunFinished {
        run_id: Uuid,
        pipeline_id: Uuid,
        run_number: u64,
        status: RunStatus,
    },
    /// A stage run resolved as failed (after exhausting its retries)
    StageFailed {
        run_id: Uuid,
        stage_run_id: Uuid,
        stage_name: String,
        error: String,
    },
}

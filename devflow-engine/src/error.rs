//! Engine error taxonomy
//!
//! `EngineError` covers API misuse (Conflict/InvalidState) and lookups;
//! stage-level failures never surface here, they become state transitions.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// An active (pending/running) run already exists for the pipeline
    #[error("pipeline {0} already has an active run")]
    Conflict(Uuid),

    /// Operation invoked against a run/stage in a state that forbids it
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("pipeline {0} not found")]
    PipelineNotFound(Uuid),

    #[error("run {0} not found")]
    RunNotFound(Uuid),

    #[error("stage run {0} not found")]
    StageRunNotFound(Uuid),

    /// A stage run already exists for this (run, stage) pair
    #[error("stage {stage_id} already attempted in run {run_id}")]
    DuplicateStageRun { run_id: Uuid, stage_id: Uuid },

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors from the remote command executor boundary
///
/// Distinct from a command running and exiting non-zero: these mean the
/// command could not be run at all.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("failed to launch command: {0}")]
    Launch(#[from] std::io::Error),
}

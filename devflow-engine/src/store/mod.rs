//! Record store
//!
//! Holds pipeline definitions and run/stage-run records. Each submodule
//! carries the operations for one entity, mirroring the persistence layout
//! the engine's consumers expect: run/stage records persist for the life of
//! the store (audit history), `run_number` is stable and gap-free per
//! pipeline, and runs are never deleted.
//!
//! Concurrency contract: all writes to a given run's records go through the
//! run's owning orchestrator task (single writer); readers take short read
//! locks and get cloned snapshots, so a poller may observe slightly stale
//! but never half-updated state.

pub mod pipeline;
pub mod run;

use devflow_core::domain::pipeline::Pipeline;
use devflow_core::domain::run::{PipelineRun, PipelineStageRun};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory record set for pipelines, runs and stage runs
#[derive(Debug, Default)]
pub struct Store {
    pipelines: RwLock<HashMap<Uuid, Pipeline>>,
    runs: RwLock<HashMap<Uuid, PipelineRun>>,
    /// Stage runs per run, in creation (= attempt) order
    stage_runs: RwLock<HashMap<Uuid, Vec<PipelineStageRun>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}

// Poisoned locks are recovered rather than propagated: a panic while holding
// a guard can only leave a record set that was fully written before the
// panic point, since every mutation is a single record transition.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

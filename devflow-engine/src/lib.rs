//! DevFlow Engine
//!
//! The deployment pipeline execution engine: runs an ordered sequence of
//! stages against a target, tracks per-stage and aggregate status, and
//! exposes that status for polling, cancellation and retry.
//!
//! Layout:
//! - [`store`]: pipeline/run/stage-run record store
//! - [`tracker`]: per-stage state machine (Stage Run Tracker)
//! - [`controller`]: run-level state machine and single-flight gate
//! - [`orchestrator`]: the scheduler loop driving one run per task
//! - [`status`]: read-side projections for polling clients
//! - [`executor`]: the remote command executor boundary
//! - [`events`]: terminal/failure events for notification subscribers

pub mod controller;
pub mod error;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod pipelines;
pub mod status;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::events::EngineEvent;
use crate::executor::CommandExecutor;
use crate::store::Store;

/// Capacity of the engine event channel; slow subscribers lag, never block
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handle to the engine, cheap to clone
///
/// One `Engine` serves all pipelines; each started run gets its own
/// orchestrator task holding a clone.
#[derive(Clone)]
pub struct Engine {
    store: Arc<Store>,
    executor: Arc<dyn CommandExecutor>,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store: Arc::new(Store::new()),
            executor,
            events,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }

    /// Subscribe to terminal and stage-failure events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        // Err here just means nobody is listening right now
        let _ = self.events.send(event);
    }
}

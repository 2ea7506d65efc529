//! End-to-end engine scenarios
//!
//! Drives the engine through its public surface with a scripted executor:
//! trigger, poll until terminal, then assert on the recorded trail.

use async_trait::async_trait;
use devflow_core::domain::pipeline::{ExecutionTarget, StageType};
use devflow_core::domain::run::{PipelineRun, RunStatus, StageStatus, TriggeredBy};
use devflow_core::dto::pipeline::{CreatePipeline, CreateStage};
use devflow_core::dto::run::TriggerRun;
use devflow_engine::error::{EngineError, ExecutorError};
use devflow_engine::events::EngineEvent;
use devflow_engine::executor::{CommandExecutor, ExecutionOutput};
use devflow_engine::{Engine, controller, pipelines, status};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Executor scripted through command names:
/// - a command containing "fail" exits 1
/// - a command containing "hang" sleeps far past any stage timeout
/// - a command containing "flaky" fails until its third call
/// - everything else succeeds and echoes the command
struct ScriptedExecutor {
    delay: Duration,
    call_counts: Mutex<HashMap<String, u32>>,
}

impl ScriptedExecutor {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            call_counts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        _target: &ExecutionTarget,
        commands: &[String],
        _env: &HashMap<String, String>,
    ) -> Result<ExecutionOutput, ExecutorError> {
        let command = commands.first().cloned().unwrap_or_default();

        let calls = {
            let mut counts = self.call_counts.lock().unwrap();
            let entry = counts.entry(command.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if command.contains("hang") {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        tokio::time::sleep(self.delay).await;

        if command.contains("unreachable") {
            return Err(ExecutorError::Unreachable("host down".to_string()));
        }

        let exit_code = if command.contains("fail") || (command.contains("flaky") && calls < 3)
        {
            1
        } else {
            0
        };

        Ok(ExecutionOutput {
            exit_code,
            output: format!("{command}\n"),
            duration: self.delay,
        })
    }
}

fn stage(name: &str, stage_type: StageType, command: &str) -> CreateStage {
    CreateStage {
        name: name.to_string(),
        stage_type,
        commands: vec![command.to_string()],
        env: HashMap::new(),
        timeout_seconds: 600,
        retry: None,
        continue_on_error: false,
        enabled: true,
    }
}

fn create(engine: &Engine, name: &str, stages: Vec<CreateStage>) -> Uuid {
    pipelines::create_pipeline(
        engine.store(),
        CreatePipeline {
            project_id: Uuid::new_v4(),
            name: name.to_string(),
            provider: devflow_core::domain::pipeline::PipelineProvider::Manual,
            triggers: vec![],
            target_label: None,
            working_dir: None,
            stages,
        },
    )
    .unwrap()
    .id
}

fn engine_with_delay(delay_ms: u64) -> Engine {
    Engine::new(Arc::new(ScriptedExecutor::new(Duration::from_millis(
        delay_ms,
    ))))
}

async fn wait_terminal(engine: &Engine, run_id: Uuid) -> PipelineRun {
    for _ in 0..500 {
        let run = engine.store().get_run(run_id).unwrap();
        if run.status.is_terminal() {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not reach a terminal state");
}

#[tokio::test]
async fn scenario_all_stages_succeed() {
    let engine = engine_with_delay(10);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("one", StageType::Deploy, "echo one"),
            stage("two", StageType::Deploy, "echo two"),
            stage("three", StageType::Deploy, "echo three"),
        ],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    assert_eq!(run.run_number, 1);

    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.finished_at.is_some());

    let rows = engine.store().stage_runs(run.id);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.status == StageStatus::Success));
    assert!(rows.iter().all(|r| r.attempts == 1));

    // Stage order invariant: started_at is non-decreasing in attempt order
    let starts: Vec<_> = rows.iter().map(|r| r.started_at.unwrap()).collect();
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(status::progress(engine.store(), run.id).unwrap(), 1.0);
    let summary = status::summary(engine.store(), run.id).unwrap();
    assert!(summary.finished);
    assert_eq!(summary.counts.success, 3);
}

#[tokio::test]
async fn scenario_partitions_run_before_order() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("smoke", StageType::PostDeploy, "echo smoke"),
            stage("release", StageType::Deploy, "echo release"),
            stage("build", StageType::PreDeploy, "echo build"),
        ],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Success);

    let names: Vec<String> = engine
        .store()
        .stage_runs(run.id)
        .into_iter()
        .map(|r| r.stage_name)
        .collect();
    assert_eq!(names, vec!["build", "release", "smoke"]);
}

#[tokio::test]
async fn scenario_midway_failure_skips_remainder() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("one", StageType::Deploy, "echo one"),
            stage("two", StageType::Deploy, "fail two"),
            stage("three", StageType::Deploy, "echo three"),
        ],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Failed);

    let rows = engine.store().stage_runs(run.id);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].status, StageStatus::Success);
    assert_eq!(rows[1].status, StageStatus::Failed);
    assert_eq!(rows[1].error_message.as_deref(), Some("exit code 1"));
    assert_eq!(rows[2].status, StageStatus::Skipped);
    assert!(rows[2].started_at.is_none());

    // 2 of 2 attempted stages completed; the skipped one never counts
    assert_eq!(status::progress(engine.store(), run.id).unwrap(), 1.0);
}

#[tokio::test]
async fn scenario_continue_on_error_tolerates_failure() {
    let engine = engine_with_delay(5);
    let mut optional = stage("optional", StageType::Deploy, "fail optional");
    optional.continue_on_error = true;
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            optional,
            stage("release", StageType::Deploy, "echo release"),
        ],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Success);

    let rows = engine.store().stage_runs(run.id);
    assert_eq!(rows[0].status, StageStatus::Failed);
    assert_eq!(rows[1].status, StageStatus::Success);
}

#[tokio::test]
async fn scenario_cancel_during_running_stage() {
    let engine = engine_with_delay(300);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("one", StageType::Deploy, "echo one"),
            stage("two", StageType::Deploy, "echo two"),
        ],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller::cancel(&engine, run.id).unwrap();

    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.finished_at.is_some());

    // The in-flight stage resolved and was recorded; nothing further was
    // dispatched and unattempted stages got no rows at all
    let rows = engine.store().stage_runs(run.id);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].status.is_terminal());
}

#[tokio::test]
async fn scenario_cancel_pending_run_never_dispatches() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![stage("one", StageType::Deploy, "echo one")],
    );

    // Flag the run before yielding to the orchestrator task
    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let cancel = controller::cancel(&engine, run.id);

    let run = wait_terminal(&engine, run.id).await;
    if cancel.is_ok() {
        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(engine.store().stage_runs(run.id).is_empty());
    } else {
        // The orchestrator won the race and the run had already finished
        assert_eq!(run.status, RunStatus::Success);
    }
}

#[tokio::test]
async fn cancel_terminal_run_is_invalid() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![stage("one", StageType::Deploy, "echo one")],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    wait_terminal(&engine, run.id).await;

    let err = controller::cancel(&engine, run.id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn single_flight_rejects_second_trigger() {
    let engine = engine_with_delay(200);
    let pipeline_id = create(
        &engine,
        "web",
        vec![stage("one", StageType::Deploy, "echo one")],
    );

    let first = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let err = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    wait_terminal(&engine, first.id).await;

    let second = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    assert_eq!(second.run_number, 2);
}

#[tokio::test]
async fn stage_timeout_fails_with_distinct_message() {
    let engine = engine_with_delay(5);
    let mut hanging = stage("hang", StageType::Deploy, "hang forever");
    hanging.timeout_seconds = 1;
    let pipeline_id = create(&engine, "web", vec![hanging]);

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Failed);

    let rows = engine.store().stage_runs(run.id);
    assert_eq!(rows[0].status, StageStatus::Failed);
    assert_eq!(rows[0].error_message.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn transport_error_fails_with_executor_reason() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![stage("deploy", StageType::Deploy, "unreachable host")],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Failed);

    let rows = engine.store().stage_runs(run.id);
    let error = rows[0].error_message.as_deref().unwrap();
    assert!(error.starts_with("execution error:"), "got: {error}");
}

#[tokio::test]
async fn per_stage_retry_recovers_transient_failure() {
    let engine = engine_with_delay(5);
    let mut flaky = stage("flaky", StageType::Deploy, "flaky deploy");
    flaky.retry = Some(devflow_core::domain::pipeline::RetryPolicy {
        max_attempts: 3,
        backoff_seconds: 0,
    });
    let pipeline_id = create(&engine, "web", vec![flaky]);

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Success);

    let rows = engine.store().stage_runs(run.id);
    assert_eq!(rows[0].attempts, 3);
    assert_eq!(rows[0].status, StageStatus::Success);
    // Output accumulated across all attempts
    assert_eq!(rows[0].output.matches("flaky deploy").count(), 3);
}

#[tokio::test]
async fn per_stage_retry_exhaustion_surfaces_failure() {
    let engine = engine_with_delay(5);
    let mut failing = stage("deploy", StageType::Deploy, "fail always");
    failing.retry = Some(devflow_core::domain::pipeline::RetryPolicy {
        max_attempts: 2,
        backoff_seconds: 0,
    });
    let pipeline_id = create(&engine, "web", vec![failing]);

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Failed);

    let rows = engine.store().stage_runs(run.id);
    assert_eq!(rows[0].attempts, 2);
    assert_eq!(rows[0].status, StageStatus::Failed);
}

#[tokio::test]
async fn scenario_retry_full_replay() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("one", StageType::Deploy, "echo one"),
            stage("two", StageType::Deploy, "fail two"),
        ],
    );

    let failed = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let failed = wait_terminal(&engine, failed.id).await;
    assert_eq!(failed.status, RunStatus::Failed);

    let retried = controller::retry(&engine, failed.id, false).unwrap();
    assert_eq!(retried.run_number, 2);
    assert_eq!(retried.triggered_by, TriggeredBy::Manual);

    let retried = wait_terminal(&engine, retried.id).await;
    let rows = engine.store().stage_runs(retried.id);

    // Full replay re-attempts the previously successful stage
    assert_eq!(rows[0].stage_name, "one");
    assert_eq!(rows[0].status, StageStatus::Success);
    assert_eq!(rows[0].attempts, 1);
    assert_eq!(rows[1].status, StageStatus::Failed);
}

#[tokio::test]
async fn scenario_retry_from_failure_carries_prior_success() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("one", StageType::Deploy, "echo one"),
            stage("two", StageType::Deploy, "fail two"),
        ],
    );

    let failed = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let failed = wait_terminal(&engine, failed.id).await;
    assert_eq!(failed.status, RunStatus::Failed);

    let retried = controller::retry(&engine, failed.id, true).unwrap();
    let retried = wait_terminal(&engine, retried.id).await;

    let rows = engine.store().stage_runs(retried.id);
    assert_eq!(rows[0].stage_name, "one");
    assert_eq!(rows[0].status, StageStatus::Skipped);
    assert!(rows[0].output.contains("echo one"));
    assert_eq!(rows[0].attempts, 0);

    assert_eq!(rows[1].stage_name, "two");
    assert_eq!(rows[1].status, StageStatus::Failed);
    assert_eq!(rows[1].attempts, 1);
}

#[tokio::test]
async fn retry_requires_failed_run() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![stage("one", StageType::Deploy, "echo one")],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    let run = wait_terminal(&engine, run.id).await;
    assert_eq!(run.status, RunStatus::Success);

    let err = controller::retry(&engine, run.id, false).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn run_numbers_stay_gap_free_across_outcomes() {
    let engine = engine_with_delay(5);
    let pipeline_id = create(
        &engine,
        "web",
        vec![stage("one", StageType::Deploy, "echo one")],
    );

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
        numbers.push(run.run_number);
        wait_terminal(&engine, run.id).await;
    }

    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn terminal_and_stage_failure_events_are_emitted() {
    let engine = engine_with_delay(5);
    let mut events = engine.subscribe();
    let pipeline_id = create(
        &engine,
        "web",
        vec![stage("deploy", StageType::Deploy, "fail deploy")],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();
    wait_terminal(&engine, run.id).await;

    let mut saw_stage_failed = false;
    let mut saw_run_finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::StageFailed {
                run_id, stage_name, ..
            } => {
                assert_eq!(run_id, run.id);
                assert_eq!(stage_name, "deploy");
                saw_stage_failed = true;
            }
            EngineEvent::RunFinished {
                run_id, status, ..
            } => {
                assert_eq!(run_id, run.id);
                assert_eq!(status, RunStatus::Failed);
                saw_run_finished = true;
            }
        }
    }

    assert!(saw_stage_failed);
    assert!(saw_run_finished);
}

#[tokio::test]
async fn polling_view_keeps_shape_across_lifecycle() {
    let engine = engine_with_delay(100);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("one", StageType::Deploy, "echo one"),
            stage("two", StageType::Deploy, "echo two"),
        ],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let mid = status::run_view(engine.store(), run.id).unwrap();
    assert!(!mid.finished);
    assert!(mid.progress < 1.0);

    wait_terminal(&engine, run.id).await;
    let done = status::run_view(engine.store(), run.id).unwrap();
    assert!(done.finished);
    assert_eq!(done.status, RunStatus::Success);
    assert_eq!(done.progress, 1.0);
    assert_eq!(done.stages.len(), 2);
    assert!(done.stages.iter().all(|s| s.duration.is_some()));
}

#[tokio::test]
async fn progress_is_monotone_while_polling() {
    let engine = engine_with_delay(60);
    let pipeline_id = create(
        &engine,
        "web",
        vec![
            stage("one", StageType::Deploy, "echo one"),
            stage("two", StageType::Deploy, "echo two"),
            stage("three", StageType::Deploy, "echo three"),
        ],
    );

    let run = controller::start(&engine, pipeline_id, TriggerRun::manual()).unwrap();

    let mut last = 0.0;
    loop {
        let p = status::progress(engine.store(), run.id).unwrap();
        assert!(p >= last, "progress went backwards: {last} -> {p}");
        last = p;

        if engine.store().get_run(run.id).unwrap().status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(last, 1.0);
}

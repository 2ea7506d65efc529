//! Status Publisher
//!
//! Projects engine-internal state into the shapes polled by dashboards.
//! Everything here is read-only over store snapshots, so projections never
//! contend with an in-flight stage dispatch.

use chrono::Utc;
use devflow_core::domain::log::{LogLevel, LogLine};
use devflow_core::domain::run::{PipelineStageRun, RunStatus, StageStatus};
use devflow_core::dto::status::{RunSummary, RunView, StageCounts, StageRunView, StatusBadge};
use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;
use crate::tracker;

/// Completed fraction of the stages attempted so far
///
/// Skipped rows are excluded from the denominator: an aborted remainder was
/// never attempted, so a fail-fast run still converges to 1.0. While the run
/// is active and another stage is still due, that upcoming attempt counts in
/// the denominator too; otherwise a poller reading between one stage's
/// completion and the next stage's row insertion would see a false 1.0 and
/// then a drop. Returns 0.0 before any stage attempt, reaches 1.0 only once
/// no further stage can follow, and never decreases over a run's lifetime.
pub fn progress(store: &Store, run_id: Uuid) -> Result<f64> {
    let run = store.get_run(run_id)?;

    let rows = store.stage_runs(run_id);
    let attempted: Vec<&PipelineStageRun> = rows
        .iter()
        .filter(|r| r.status != StageStatus::Skipped)
        .collect();

    let completed = attempted.iter().filter(|r| r.status.is_terminal()).count();
    let mut denominator = attempted.len();

    if !run.status.is_terminal() && tracker::next_stage(store, &run)?.is_some() {
        denominator += 1;
    }

    if denominator == 0 {
        return Ok(0.0);
    }
    Ok(completed as f64 / denominator as f64)
}

/// Aggregate counts, elapsed time and the poll-stop flag for a run
pub fn summary(store: &Store, run_id: Uuid) -> Result<RunSummary> {
    let run = store.get_run(run_id)?;

    let mut counts = StageCounts::default();
    for row in store.stage_runs(run_id) {
        counts.record(row.status);
    }

    let end = run.finished_at.unwrap_or_else(Utc::now);
    Ok(RunSummary {
        counts,
        elapsed_seconds: (end - run.started_at).num_seconds(),
        finished: run.status.is_terminal(),
    })
}

/// Full projection of a run and its stage runs for the polling endpoint
///
/// Same shape whether the run is active or terminal.
pub fn run_view(store: &Store, run_id: Uuid) -> Result<RunView> {
    let run = store.get_run(run_id)?;
    let stages = store
        .stage_runs(run_id)
        .into_iter()
        .map(stage_run_view)
        .collect();

    Ok(RunView {
        id: run.id,
        pipeline_id: run.pipeline_id,
        run_number: run.run_number,
        status: run.status,
        badge: run_badge(run.status),
        triggered_by: run.triggered_by,
        commit_sha: run.commit_sha,
        branch: run.branch,
        started_at: run.started_at,
        finished_at: run.finished_at,
        artifacts: run.artifacts,
        stages,
        progress: progress(store, run_id)?,
        summary: summary(store, run_id)?,
        finished: run.status.is_terminal(),
    })
}

fn stage_run_view(row: PipelineStageRun) -> StageRunView {
    StageRunView {
        id: row.id,
        stage_id: row.stage_id,
        name: row.stage_name,
        status: row.status,
        badge: stage_badge(row.status),
        started_at: row.started_at,
        completed_at: row.completed_at,
        duration_seconds: row.duration_seconds,
        duration: row.duration_seconds.map(format_duration),
        output: classify_output(&row.output),
        error_message: row.error_message,
        attempts: row.attempts,
    }
}

/// Badge classification for a run status
pub fn run_badge(status: RunStatus) -> StatusBadge {
    match status {
        RunStatus::Pending => StatusBadge::Neutral,
        RunStatus::Running => StatusBadge::Active,
        RunStatus::Success => StatusBadge::Success,
        RunStatus::Failed => StatusBadge::Failure,
        RunStatus::Cancelled => StatusBadge::Muted,
    }
}

/// Badge classification for a stage status
pub fn stage_badge(status: StageStatus) -> StatusBadge {
    match status {
        StageStatus::Pending => StatusBadge::Neutral,
        StageStatus::Running => StatusBadge::Active,
        StageStatus::Success => StatusBadge::Success,
        StageStatus::Failed => StatusBadge::Failure,
        StageStatus::Skipped => StatusBadge::Muted,
    }
}

/// Humanize a duration in seconds ("42s", "2m 3s", "1h 12m")
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Split accumulated stage output into classified lines
pub fn classify_output(output: &str) -> Vec<LogLine> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| LogLine {
            level: classify_line(line),
            message: line.to_string(),
        })
        .collect()
}

/// Heuristic severity for one output line
fn classify_line(line: &str) -> LogLevel {
    let lower = line.to_lowercase();

    if lower.starts_with("error")
        || lower.starts_with("fatal")
        || lower.starts_with("failed")
        || lower.contains("exception")
        || lower.contains("fatal error")
        || lower.contains("failed")
    {
        return LogLevel::Error;
    }

    if lower.starts_with("warning")
        || lower.starts_with("warn")
        || lower.starts_with("notice")
        || lower.contains("deprecated")
        || lower.contains("skipped")
    {
        return LogLevel::Warning;
    }

    LogLevel::Info
}

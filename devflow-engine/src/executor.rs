//! Remote command executor boundary
//!
//! The engine dispatches a stage's command list to a `CommandExecutor` and
//! treats any transport error or non-zero exit code as stage failure. The
//! stage timeout is enforced by the orchestrator racing the returned future,
//! so implementations do not need their own deadline handling.

use async_trait::async_trait;
use devflow_core::domain::pipeline::ExecutionTarget;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::error::ExecutorError;

/// Result of executing a command list
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Exit code of the last command run (first non-zero stops the list)
    pub exit_code: i32,
    /// Combined stdout/stderr of all commands run
    pub output: String,
    pub duration: Duration,
}

impl ExecutionOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes a stage's command list against a target
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        target: &ExecutionTarget,
        commands: &[String],
        env: &HashMap<String, String>,
    ) -> Result<ExecutionOutput, ExecutorError>;
}

/// Runs commands as local shell processes
///
/// Commands run sequentially through `sh -c` in the target's working
/// directory; the first non-zero exit stops the list.
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn execute(
        &self,
        target: &ExecutionTarget,
        commands: &[String],
        env: &HashMap<String, String>,
    ) -> Result<ExecutionOutput, ExecutorError> {
        let started = Instant::now();
        let mut combined = String::new();
        let mut exit_code = 0;

        for command in commands {
            tracing::debug!(target = %target.label, %command, "executing command");

            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command).envs(env).kill_on_drop(true);
            if let Some(dir) = &target.working_dir {
                cmd.current_dir(dir);
            }

            let out = cmd.output().await?;

            combined.push_str(&String::from_utf8_lossy(&out.stdout));
            combined.push_str(&String::from_utf8_lossy(&out.stderr));

            exit_code = out.status.code().unwrap_or(-1);
            if exit_code != 0 {
                break;
            }
        }

        Ok(ExecutionOutput {
            exit_code,
            output: combined,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ExecutionTarget {
        ExecutionTarget {
            label: "local".to_string(),
            working_dir: None,
        }
    }

    #[tokio::test]
    async fn test_local_executor_runs_commands_in_order() {
        let executor = LocalExecutor::new();
        let out = executor
            .execute(
                &target(),
                &["echo first".to_string(), "echo second".to_string()],
                &HashMap::new(),
            )
            .await
            .unwrap();

        assert!(out.succeeded());
        let first = out.output.find("first").unwrap();
        let second = out.output.find("second").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_local_executor_stops_at_first_failure() {
        let executor = LocalExecutor::new();
        let out = executor
            .execute(
                &target(),
                &[
                    "echo before".to_string(),
                    "exit 3".to_string(),
                    "echo after".to_string(),
                ],
                &HashMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(out.exit_code, 3);
        assert!(out.output.contains("before"));
        assert!(!out.output.contains("after"));
    }

    #[tokio::test]
    async fn test_local_executor_passes_env() {
        let executor = LocalExecutor::new();
        let mut env = HashMap::new();
        env.insert("DEVFLOW_TEST_VAR".to_string(), "hello".to_string());

        let out = executor
            .execute(&target(), &["echo $DEVFLOW_TEST_VAR".to_string()], &env)
            .await
            .unwrap();

        assert!(out.output.contains("hello"));
    }

    #[tokio::test]
    async fn test_local_executor_respects_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let executor = LocalExecutor::new();
        let target = ExecutionTarget {
            label: "tmp".to_string(),
            working_dir: Some(dir.path().to_path_buf()),
        };

        let out = executor
            .execute(&target, &["pwd".to_string()], &HashMap::new())
            .await
            .unwrap();

        assert!(out.output.trim_end().ends_with(
            dir.path().file_name().unwrap().to_str().unwrap()
        ));
    }
}

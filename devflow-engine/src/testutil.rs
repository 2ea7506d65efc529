//! Shared helpers for unit tests

use devflow_core::domain::pipeline::{
    ExecutionTarget, Pipeline, PipelineProvider, PipelineStage, RetryPolicy, StageType,
    TriggerKind,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::store::Store;

pub(crate) fn shell_stage(name: &str, stage_type: StageType, order: u32) -> PipelineStage {
    PipelineStage {
        id: Uuid::new_v4(),
        name: name.to_string(),
        stage_type,
        order,
        commands: vec!["true".to_string()],
        env: HashMap::new(),
        timeout_seconds: 600,
        retry: RetryPolicy::default(),
        continue_on_error: false,
        enabled: true,
    }
}

pub(crate) fn pipeline_with_stages(stages: Vec<PipelineStage>) -> Pipeline {
    let now = chrono::Utc::now();
    Pipeline {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        name: format!("pipeline-{}", Uuid::new_v4()),
        provider: PipelineProvider::Manual,
        triggers: vec![TriggerKind::Manual],
        active: true,
        target: ExecutionTarget {
            label: "test-target".to_string(),
            working_dir: None,
        },
        stages,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn insert_test_pipeline(store: &Store, stages: Vec<PipelineStage>) -> Pipeline {
    store
        .insert_pipeline(pipeline_with_stages(stages))
        .expect("insert test pipeline")
}

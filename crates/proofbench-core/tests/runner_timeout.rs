use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proofbench_core::{
    ExecutionMode, Phase, PhaseStatus, RunSettings, ScoringKind, Suite, Task, TaskRunner,
};
use proofbench_llm::{ChatClient, ChatRequest, ChatResponse};

/// Answers correctly, but only after `delay`.
struct SlowClient {
    delay: Duration,
}

#[async_trait]
impl ChatClient for SlowClient {
    async fn chat(&self, request: &ChatRequest) -> proofbench_llm::Result<ChatResponse> {
        tokio::time::sleep(self.delay).await;
        Ok(ChatResponse {
            text: request.prompt.clone(),
            raw: serde_json::Value::Null,
        })
    }

    fn endpoint(&self) -> &str {
        "memory://slow"
    }

    fn model(&self) -> &str {
        "slow"
    }
}

fn echo_suite() -> Suite {
    Suite::new(vec![
        Task::new("1", "echo", "echo", ScoringKind::Exact, Phase::Endurance),
        Task::new("2", "again", "again", ScoringKind::Exact, Phase::Endurance),
    ])
}

#[tokio::test(start_paused = true)]
async fn slow_tasks_time_out_and_run_continues() {
    let client = SlowClient {
        delay: Duration::from_secs(120),
    };
    let settings = RunSettings {
        task_timeout: Duration::from_secs(5),
        ..RunSettings::default()
    };
    let out = TaskRunner::new("soak", ExecutionMode::Real(Arc::new(client)))
        .with_settings(settings)
        .run(&echo_suite())
        .await;

    assert_eq!(out.task_traces.len(), 2);
    for trace in &out.task_traces {
        assert!(!trace.ok);
        assert_eq!(trace.score, 0.0);
        assert_eq!(trace.latency_ms, None);
        let error = trace.error.as_deref().unwrap_or_default();
        assert!(error.contains("timed out after 5s"), "{error}");
        assert!(error.contains(&trace.id));
    }

    let entry = &out.phase_entries[0];
    assert_eq!(entry.phase, Phase::Endurance);
    assert_eq!(entry.status, PhaseStatus::Fail);
    assert_eq!(entry.trace, "samples=2 avg latency=n/a");
}

#[tokio::test(start_paused = true)]
async fn tasks_within_timeout_are_graded() {
    let client = SlowClient {
        delay: Duration::from_millis(200),
    };
    let out = TaskRunner::new("soak", ExecutionMode::Real(Arc::new(client)))
        .run(&echo_suite())
        .await;

    assert!(out.task_traces.iter().all(|t| t.ok && t.error.is_none()));
    assert_eq!(out.phase_entries[0].status, PhaseStatus::Pass);
    assert_eq!(out.phase_entries[0].retries, 0);
}

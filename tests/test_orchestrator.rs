//! Batch and background execution through the orchestrator

mod test_helpers;

use mcp_isolation::agent::{Orchestrator, TaskOutcome};
use mcp_isolation::config::FailurePolicy;
use mcp_isolation::error::{AgentError, FailureKind};
use mcp_isolation::routing::CapabilityProfile;
use mcp_isolation::session::SessionError;
use mcp_isolation::testing::MockRuntime;
use std::time::Duration;
use test_helpers::{mock_orchestrator, BROWSER_TASK, DATABASE_TASK, FILESYSTEM_TASK, GENERAL_TASK};

const TASKS: [&str; 4] = [BROWSER_TASK, FILESYSTEM_TASK, DATABASE_TASK, GENERAL_TASK];

#[tokio::test]
async fn test_batch_reports_in_input_order() {
    let runtime = MockRuntime::new();
    let orchestrator = mock_orchestrator(&runtime);

    let report = orchestrator.run_all(&TASKS).await.unwrap();

    assert_eq!(report.len(), 4);
    assert!(report.all_succeeded());
    let profiles: Vec<_> = report.completed().map(|r| r.analysis.profile).collect();
    assert_eq!(profiles, CapabilityProfile::ALL.to_vec());
    assert_eq!(runtime.prompts().await, TASKS.to_vec());
}

#[tokio::test]
async fn test_abort_policy_stops_at_first_failure() {
    let runtime = MockRuntime::new().fail_on_prompt("files");
    let orchestrator = mock_orchestrator(&runtime);
    assert_eq!(orchestrator.failure_policy(), FailurePolicy::Abort);

    let result = orchestrator.run_all(&TASKS).await;

    match result {
        Err(AgentError::Session(SessionError::Stream { .. })) => {}
        other => panic!("expected stream failure, got {other:?}"),
    }
    // Tasks after the failing one never started
    assert_eq!(runtime.prompts().await, vec![BROWSER_TASK, FILESYSTEM_TASK]);
    assert_eq!(runtime.live_sessions(), 0);
}

#[tokio::test]
async fn test_continue_policy_marks_failures_in_place() {
    let runtime = MockRuntime::new().fail_on_prompt("files");
    let orchestrator = mock_orchestrator(&runtime).with_failure_policy(FailurePolicy::Continue);

    let report = orchestrator.run_all(&TASKS).await.unwrap();

    assert_eq!(report.len(), 4);
    assert!(report.outcomes[0].is_completed());
    match &report.outcomes[1] {
        TaskOutcome::Failed(failure) => {
            assert_eq!(failure.task, FILESYSTEM_TASK);
            assert_eq!(failure.profile, CapabilityProfile::Filesystem);
            assert_eq!(failure.kind, FailureKind::Stream);
        }
        other => panic!("expected failure marker, got {other:?}"),
    }
    assert!(report.outcomes[2].is_completed());
    assert!(report.outcomes[3].is_completed());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(runtime.live_sessions(), 0);
}

#[tokio::test]
async fn test_concurrent_batch_preserves_order() {
    let runtime = MockRuntime::new().with_message_delay(Duration::from_millis(20));
    let orchestrator = mock_orchestrator(&runtime).with_max_concurrency(4);

    let tasks: Vec<String> = (0..8).map(|i| format!("task number {i}")).collect();
    let report = orchestrator.run_all(&tasks).await.unwrap();

    let reported: Vec<&str> = report.outcomes.iter().map(TaskOutcome::task).collect();
    assert_eq!(reported, tasks.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(runtime.peak_live_sessions() > 1);
    assert!(runtime.peak_live_sessions() <= 4);
    assert_eq!(runtime.live_sessions(), 0);
}

#[tokio::test]
async fn test_sequential_batch_has_one_session_at_a_time() {
    let runtime = MockRuntime::new().with_message_delay(Duration::from_millis(5));
    let orchestrator = mock_orchestrator(&runtime);

    orchestrator.run_all(&TASKS).await.unwrap();

    assert_eq!(runtime.peak_live_sessions(), 1);
}

#[tokio::test]
async fn test_empty_batch() {
    let orchestrator = mock_orchestrator(&MockRuntime::new());
    let tasks: [&str; 0] = [];

    let report = orchestrator.run_all(&tasks).await.unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_spawned_task_completes() {
    let runtime = MockRuntime::new();
    let orchestrator = std::sync::Arc::new(mock_orchestrator(&runtime));

    let report = orchestrator.spawn(DATABASE_TASK).join().await.unwrap();

    assert_eq!(report.analysis.profile, CapabilityProfile::Database);
}

#[tokio::test]
async fn test_cancelled_task_releases_session() {
    let runtime = MockRuntime::new().with_message_delay(Duration::from_secs(10));
    let orchestrator = std::sync::Arc::new(mock_orchestrator(&runtime));

    let handle = orchestrator.spawn(GENERAL_TASK);
    while runtime.live_sessions() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    handle.cancel();
    let result = handle.join().await;

    assert!(matches!(
        result,
        Err(AgentError::Session(SessionError::Cancelled))
    ));
    assert_eq!(runtime.live_sessions(), 0);

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.sessions.cancelled, 1);
    assert_eq!(snapshot.sessions.active, 0);
}

#[tokio::test]
async fn test_orchestrator_new_uses_defaults() {
    let runtime = MockRuntime::new();
    let orchestrator = Orchestrator::new(
        test_helpers::default_registry(),
        std::sync::Arc::new(runtime.clone()),
    );

    let report = orchestrator.execute_task(GENERAL_TASK).await.unwrap();
    assert_eq!(report.result.profile, CapabilityProfile::General);
}

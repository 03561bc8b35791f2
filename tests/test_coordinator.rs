//! Integration tests for job submission, polling and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{test_params, MockBackend, Poll, PROJECT};
use odps_query_rs::{Error, ExecutionCoordinator, ExecutionOutcome, JobStatus, Settings};
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

fn coordinator(backend: &Arc<MockBackend>) -> ExecutionCoordinator<MockBackend> {
    ExecutionCoordinator::new(Arc::clone(backend), &test_params())
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_reports_reason_and_sql() {
    let backend = Arc::new(
        MockBackend::new()
            .with_polls([Poll::Status(JobStatus::Running)])
            .with_failure("syntax error"),
    );
    let coordinator = coordinator(&backend);

    let job = assert_ok!(
        coordinator
            .run(PROJECT, "select 1", &Settings::new(), &Settings::new())
            .await
    );
    assert_eq!(job.sql(), "select 1;");

    let err = assert_err!(coordinator.await_terminal(&job).await);
    let message = err.to_string();
    assert!(message.contains("syntax error"), "{}", message);
    assert!(message.contains("select 1"), "{}", message);
    assert!(matches!(err, Error::ExecutionFailed { .. }));

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.failure_reason().as_deref(), Some("syntax error"));
}

#[tokio::test(start_paused = true)]
async fn test_polls_at_fixed_interval() {
    let backend = Arc::new(MockBackend::new().with_polls([
        Poll::Status(JobStatus::Waiting),
        Poll::Status(JobStatus::Running),
        Poll::Status(JobStatus::Suspended),
    ]));
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(PROJECT, "select * from t", &Settings::new(), &Settings::new())
        .await
        .unwrap();

    let started = Instant::now();
    let outcome = assert_ok!(coordinator.await_terminal(&job).await);

    assert_eq!(outcome, ExecutionOutcome::ResultSet);
    assert_eq!(backend.polls(), 4);
    assert!(started.elapsed() >= coordinator.poll_interval() * 4);
    assert_eq!(job.status(), JobStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_missing_status_is_tolerated() {
    let backend = Arc::new(MockBackend::new().with_polls([
        Poll::Missing,
        Poll::Unavailable,
        Poll::Status(JobStatus::Running),
        Poll::Missing,
    ]));
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(PROJECT, "select * from t", &Settings::new(), &Settings::new())
        .await
        .unwrap();

    assert_ok!(coordinator.await_terminal(&job).await);
    assert_eq!(backend.polls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_update_count_from_summary() {
    let backend = Arc::new(MockBackend::new().with_summary(
        r#"{"Outputs": {"proj.dst": [10, 496], "proj.dst/ds=1": [5, 80]}}"#,
    ));
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(
            PROJECT,
            "insert into dst select * from src",
            &Settings::new(),
            &Settings::new(),
        )
        .await
        .unwrap();

    let outcome = assert_ok!(coordinator.await_terminal(&job).await);
    assert_eq!(outcome, ExecutionOutcome::UpdateCount(15));
}

#[tokio::test(start_paused = true)]
async fn test_missing_summary_yields_zero_count() {
    let backend = Arc::new(MockBackend::new());
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(PROJECT, "drop table t", &Settings::new(), &Settings::new())
        .await
        .unwrap();

    let outcome = assert_ok!(coordinator.await_terminal(&job).await);
    assert_eq!(outcome, ExecutionOutcome::UpdateCount(0));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_from_another_task() {
    let backend = Arc::new(MockBackend::new().with_final_status(JobStatus::Running));
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(PROJECT, "select * from big", &Settings::new(), &Settings::new())
        .await
        .unwrap();

    let waiter = {
        let coordinator = coordinator.clone();
        let job = Arc::clone(&job);
        tokio::spawn(async move { coordinator.await_terminal(&job).await })
    };

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_ok!(coordinator.cancel(&job).await);

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(Error::ExecutionCancelled { .. })));
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert_eq!(backend.stops(), 1);

    // already terminal
    assert_ok!(coordinator.cancel(&job).await);
    assert_eq!(backend.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_success_is_noop() {
    let backend = Arc::new(MockBackend::new());
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(PROJECT, "select 1", &Settings::new(), &Settings::new())
        .await
        .unwrap();
    assert_ok!(coordinator.await_terminal(&job).await);

    assert_ok!(coordinator.cancel(&job).await);
    assert_eq!(backend.stops(), 0);
    assert_eq!(job.status(), JobStatus::Success);
    assert!(!job.cancel_requested());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent_while_running() {
    let backend = Arc::new(MockBackend::new().with_final_status(JobStatus::Running));
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(PROJECT, "select 1", &Settings::new(), &Settings::new())
        .await
        .unwrap();

    assert_ok!(coordinator.cancel(&job).await);
    assert_ok!(coordinator.cancel(&job).await);
    assert_eq!(backend.stops(), 1);
}

#[tokio::test]
async fn test_statement_settings_override_connection() {
    let backend = Arc::new(MockBackend::new());
    let coordinator = coordinator(&backend);

    let connection: Settings = [("a", "1"), ("b", "1")].into_iter().collect();
    let statement: Settings = [("b", "2")].into_iter().collect();
    let job = coordinator
        .run(PROJECT, "select 1;", &connection, &statement)
        .await
        .unwrap();

    assert_eq!(job.settings().get("a"), Some("1"));
    assert_eq!(job.settings().get("b"), Some("2"));
    let (project, sql, settings) = backend.last_submitted().unwrap();
    assert_eq!(project, PROJECT);
    assert_eq!(sql, "select 1;");
    assert_eq!(&settings, job.settings());
}

#[tokio::test]
async fn test_trace_url() {
    let backend = Arc::new(MockBackend::new());
    let coordinator = coordinator(&backend);
    let job = coordinator
        .run(PROJECT, "select 1", &Settings::new(), &Settings::new())
        .await
        .unwrap();

    assert_eq!(
        job.trace_url(),
        "http://console.test/logview/?h=http://service.test/api&p=proj&i=job-1&token=token"
    );
}

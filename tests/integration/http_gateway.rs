//! Integration tests for the HTTP gateway against an in-process task
//! service bound to an OS-assigned port.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use taskdash::engine::{EngineConfig, Intent, spawn_engine};
use taskdash::gateway::http::{ApiConfig, HttpGateway};
use taskdash::gateway::{GatewayError, TaskGateway};
use taskdash::lifecycle::{OperationKind, Phase};
use taskdash_proto::task::{Category, Priority, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};
use taskdash_server::api::{self, ApiState};
use taskdash_server::store::TaskStore;

const TOKEN: &str = "test-token";

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Starts a service requiring [`TOKEN`] and returns its API base URL.
async fn start_service(tasks: Vec<Task>) -> (String, tokio::task::JoinHandle<()>) {
    let state = Arc::new(ApiState::with_store(
        TaskStore::with_tasks(tasks),
        Some(TOKEN.to_string()),
    ));
    let (addr, handle) = api::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start task service");
    (format!("http://{addr}/api"), handle)
}

fn gateway(url: &str, token: Option<&str>) -> HttpGateway {
    HttpGateway::new(&ApiConfig {
        url: url.to_string(),
        token: token.map(str::to_string),
        request_timeout: Duration::from_secs(5),
    })
    .expect("valid gateway config")
}

// ---------------------------------------------------------------------------
// Request mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_fetch_update_delete_round_trip() {
    let (url, server) = start_service(vec![]).await;
    let gw = gateway(&url, Some(TOKEN));

    assert!(gw.fetch_all().await.unwrap().is_empty());

    let mut draft = TaskDraft::new("Prepare demo");
    draft.priority = Priority::High;
    draft.category = Category::Work;
    let created = gw.create(&draft).await.unwrap();
    assert!(!created.id.as_str().is_empty());
    assert_eq!(created.status, Some(TaskStatus::Todo));
    assert_eq!(created.priority, Some(Priority::High));

    let updated = gw
        .update(&created.id, &TaskPatch::status(TaskStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.status, Some(TaskStatus::InProgress));
    assert_eq!(updated.title, "Prepare demo");

    assert_eq!(gw.fetch_all().await.unwrap(), vec![updated]);

    assert_eq!(gw.delete(&created.id).await.unwrap(), created.id);
    assert!(gw.fetch_all().await.unwrap().is_empty());

    server.abort();
}

#[tokio::test]
async fn fetch_keeps_service_order() {
    let (url, server) = start_service(vec![
        Task::new("b", "second"),
        Task::new("a", "first"),
        Task::new("c", "third"),
    ])
    .await;
    let tasks = gateway(&url, Some(TOKEN)).fetch_all().await.unwrap();
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
    server.abort();
}

#[tokio::test]
async fn clearing_due_date_sends_null() {
    let due = chrono::Utc::now();
    let (url, server) = start_service(vec![Task::new("t", "Dated").with_due_date(due)]).await;
    let gw = gateway(&url, Some(TOKEN));

    let patch = TaskPatch {
        due_date: Some(None),
        ..TaskPatch::default()
    };
    let updated = gw.update(&TaskId::from("t"), &patch).await.unwrap();
    assert_eq!(updated.due_date, None);
    server.abort();
}

// ---------------------------------------------------------------------------
// Failure mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (url, server) = start_service(vec![]).await;

    let err = gateway(&url, None).fetch_all().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.message(), "Unauthorized");

    let err = gateway(&url, Some("wrong")).fetch_all().await.unwrap_err();
    assert_eq!(err.message(), "Unauthorized");
    server.abort();
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let (url, server) = start_service(vec![]).await;
    let gw = gateway(&url, Some(TOKEN));

    let err = gw
        .update(&TaskId::from("missing"), &TaskPatch::status(TaskStatus::Done))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Remote { status: 404, .. }));
    assert_eq!(err.message(), "Task not found");

    let err = gw.delete(&TaskId::from("missing")).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    server.abort();
}

#[tokio::test]
async fn empty_title_is_bad_request() {
    let (url, server) = start_service(vec![]).await;
    let err = gateway(&url, Some(TOKEN))
        .create(&TaskDraft::new(""))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.message(), "task title cannot be empty");
    server.abort();
}

#[tokio::test]
async fn unreachable_service_is_network_error() {
    let (url, server) = start_service(vec![]).await;
    server.abort();
    let _ = server.await;

    let err = gateway(&url, Some(TOKEN)).fetch_all().await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Engine over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn engine_syncs_board_with_service() {
    let (url, server) = start_service(vec![
        Task::new("1", "Design homepage").with_priority(Priority::High),
        Task::new("2", "Buy groceries").with_status(TaskStatus::Done),
    ])
    .await;
    let (engine, task) = spawn_engine(gateway(&url, Some(TOKEN)), &EngineConfig::default());
    let mut events = engine.lifecycle();

    engine.dispatch(Intent::FetchAll).unwrap();
    engine
        .dispatch(Intent::Create(TaskDraft::new("Write docs")))
        .unwrap();

    let mut fulfilled = Vec::new();
    while fulfilled.len() < 2 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(event.phase, Phase::Rejected);
        if event.phase == Phase::Fulfilled {
            fulfilled.push(event.kind);
        }
    }
    assert!(fulfilled.contains(&OperationKind::FetchAll));
    assert!(fulfilled.contains(&OperationKind::Create));

    engine.dispatch(Intent::Shutdown).unwrap();
    task.await.unwrap();

    // The create may have been confirmed before or after the fetch landed;
    // either way the service holds all three tasks.
    let snapshot = engine.snapshot();
    assert!(snapshot.error.is_none());
    assert!(!snapshot.is_loading);
    let listed = gateway(&url, Some(TOKEN)).fetch_all().await.unwrap();
    assert_eq!(listed.len(), 3);
    assert!(snapshot.filtered_tasks.iter().all(|t| listed.contains(t)));
    server.abort();
}

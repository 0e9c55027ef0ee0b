//! Integration tests for the task engine.
//!
//! Drives the engine through its handle, over the in-memory gateway and
//! over a scripted gateway whose responses the test releases one by one to
//! control completion order.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::similar_names,
    clippy::missing_panics_doc
)]

use std::time::Duration;

use taskdash::engine::{EngineConfig, EngineError, EngineHandle, Intent, Snapshot, spawn_engine};
use taskdash::gateway::memory::InMemoryGateway;
use taskdash::gateway::{GatewayError, GatewayKind, TaskGateway};
use taskdash::lifecycle::{LifecycleEvent, OperationKind, Phase};
use taskdash::tasks::{FilterPatch, FilterValue};
use taskdash_proto::task::{Category, Priority, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};
use tokio::sync::{broadcast, mpsc, oneshot};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

const WAIT: Duration = Duration::from_secs(2);

fn ids(snapshot: &Snapshot) -> Vec<&str> {
    snapshot.filtered_tasks.iter().map(|t| t.id.as_str()).collect()
}

/// The two-task board used by most scenarios.
fn board() -> Vec<Task> {
    vec![
        Task::new("1", "Design homepage")
            .with_priority(Priority::High)
            .with_category(Category::Work),
        Task::new("2", "Buy groceries")
            .with_status(TaskStatus::Done)
            .with_priority(Priority::Low)
            .with_category(Category::Personal),
    ]
}

/// Waits until a published snapshot satisfies `pred`.
async fn wait_for(handle: &EngineHandle, pred: impl FnMut(&Snapshot) -> bool) -> Snapshot {
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for snapshot")
        .expect("engine stopped")
        .clone();
    snapshot
}

/// Receives the next lifecycle event.
async fn next_event(events: &mut broadcast::Receiver<LifecycleEvent>) -> LifecycleEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for lifecycle event")
        .expect("lifecycle channel closed")
}

/// Waits for the next operation of `kind` to start and returns its
/// terminal phase.
async fn settled(events: &mut broadcast::Receiver<LifecycleEvent>, kind: OperationKind) -> Phase {
    let pending = loop {
        let event = next_event(events).await;
        if event.kind == kind && event.phase == Phase::Pending {
            break event;
        }
    };
    loop {
        let event = next_event(events).await;
        if event.id == pending.id {
            return event.phase;
        }
    }
}

async fn seeded_engine(tasks: Vec<Task>) -> EngineHandle {
    let (handle, _task) = spawn_engine(InMemoryGateway::with_tasks(tasks), &EngineConfig::default());
    let mut events = handle.lifecycle();
    handle.dispatch(Intent::FetchAll).unwrap();
    assert_eq!(settled(&mut events, OperationKind::FetchAll).await, Phase::Fulfilled);
    handle
}

// ---------------------------------------------------------------------------
// Scripted gateway
// ---------------------------------------------------------------------------

/// A gateway call waiting for the test to answer it.
struct Call {
    label: String,
    reply: oneshot::Sender<Reply>,
}

enum Reply {
    Tasks(Vec<Task>),
    Task(Task),
    Deleted,
    Fail(GatewayError),
}

/// Gateway that parks every call until the test sends its reply.
struct ScriptedGateway {
    calls: mpsc::UnboundedSender<Call>,
}

impl ScriptedGateway {
    fn new() -> (Self, mpsc::UnboundedReceiver<Call>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { calls: tx }, rx)
    }

    async fn call(&self, label: String) -> Result<Reply, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.calls
            .send(Call { label, reply: tx })
            .map_err(|_| GatewayError::Network("test finished".to_string()))?;
        match rx.await {
            Ok(Reply::Fail(err)) => Err(err),
            Ok(reply) => Ok(reply),
            Err(_) => Err(GatewayError::Network("reply dropped".to_string())),
        }
    }
}

fn unexpected() -> GatewayError {
    GatewayError::Network("unexpected reply".to_string())
}

impl TaskGateway for ScriptedGateway {
    async fn fetch_all(&self) -> Result<Vec<Task>, GatewayError> {
        match self.call("fetch_all".to_string()).await? {
            Reply::Tasks(tasks) => Ok(tasks),
            _ => Err(unexpected()),
        }
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, GatewayError> {
        match self.call(format!("create {}", draft.title)).await? {
            Reply::Task(task) => Ok(task),
            _ => Err(unexpected()),
        }
    }

    async fn update(&self, id: &TaskId, _patch: &TaskPatch) -> Result<Task, GatewayError> {
        match self.call(format!("update {id}")).await? {
            Reply::Task(task) => Ok(task),
            _ => Err(unexpected()),
        }
    }

    async fn delete(&self, id: &TaskId) -> Result<TaskId, GatewayError> {
        match self.call(format!("delete {id}")).await? {
            Reply::Deleted => Ok(id.clone()),
            _ => Err(unexpected()),
        }
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::Memory
    }
}

async fn next_call(calls: &mut mpsc::UnboundedReceiver<Call>) -> Call {
    tokio::time::timeout(WAIT, calls.recv())
        .await
        .expect("timed out waiting for gateway call")
        .expect("gateway dropped")
}

async fn scripted_engine_with(
    tasks: Vec<Task>,
) -> (EngineHandle, mpsc::UnboundedReceiver<Call>) {
    let (gateway, mut calls) = ScriptedGateway::new();
    let (handle, _task) = spawn_engine(gateway, &EngineConfig::default());
    handle.dispatch(Intent::FetchAll).unwrap();
    let fetch = next_call(&mut calls).await;
    assert_eq!(fetch.label, "fetch_all");
    let expected = tasks.len();
    fetch.reply.send(Reply::Tasks(tasks)).ok().unwrap();
    wait_for(&handle, |s| {
        s.filtered_tasks.len() == expected && !s.is_loading && s.in_flight == 0
    })
    .await;
    (handle, calls)
}

// ---------------------------------------------------------------------------
// Board scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_filter_shows_matching_tasks_and_stats() {
    let handle = seeded_engine(board()).await;

    handle
        .dispatch(Intent::SetFilter(
            FilterPatch::default().with_status(FilterValue::Only(TaskStatus::Todo)),
        ))
        .unwrap();

    let snapshot = wait_for(&handle, |s| s.filters.status != FilterValue::All).await;
    assert_eq!(ids(&snapshot), vec!["1"]);
    assert_eq!(snapshot.stats.total, 1);
    assert_eq!(snapshot.stats.completed, 0);
}

#[tokio::test]
async fn created_task_appears_after_clearing_filter() {
    let (handle, mut calls) = scripted_engine_with(board()).await;

    handle
        .dispatch(Intent::SetFilter(
            FilterPatch::default().with_status(FilterValue::Only(TaskStatus::Todo)),
        ))
        .unwrap();
    handle.dispatch(Intent::Create(TaskDraft::new("Write docs"))).unwrap();
    let create = next_call(&mut calls).await;
    assert_eq!(create.label, "create Write docs");
    create.reply.send(Reply::Task(Task::new("3", "Write docs"))).ok().unwrap();

    let snapshot = wait_for(&handle, |s| s.filtered_tasks.len() == 2 && s.in_flight == 0).await;
    assert_eq!(ids(&snapshot), vec!["1", "3"]);

    handle.dispatch(Intent::ClearFilter).unwrap();
    let snapshot = wait_for(&handle, |s| s.filters.status == FilterValue::All).await;
    assert_eq!(ids(&snapshot), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn unauthorized_fetch_keeps_collection() {
    let gateway = InMemoryGateway::with_tasks(board());
    gateway.fail_next(GatewayError::remote(401, "Unauthorized"));
    let (handle, _task) = spawn_engine(gateway, &EngineConfig::default());
    let mut events = handle.lifecycle();

    handle.dispatch(Intent::FetchAll).unwrap();
    assert_eq!(settled(&mut events, OperationKind::FetchAll).await, Phase::Rejected);

    let snapshot = handle.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.error.as_deref(), Some("Unauthorized"));
    assert!(snapshot.filtered_tasks.is_empty());

    // A later successful fetch clears the error.
    handle.dispatch(Intent::FetchAll).unwrap();
    assert_eq!(settled(&mut events, OperationKind::FetchAll).await, Phase::Fulfilled);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.error, None);
    assert_eq!(ids(&snapshot), vec!["1", "2"]);
}

#[tokio::test]
async fn rejected_refetch_leaves_loaded_tasks() {
    let (handle, mut calls) = scripted_engine_with(board()).await;

    handle.dispatch(Intent::FetchAll).unwrap();
    let fetch = next_call(&mut calls).await;
    wait_for(&handle, |s| s.is_loading).await;
    fetch
        .reply
        .send(Reply::Fail(GatewayError::remote(401, "Unauthorized")))
        .ok()
        .unwrap();

    let snapshot = wait_for(&handle, |s| s.error.is_some()).await;
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.error.as_deref(), Some("Unauthorized"));
    assert_eq!(ids(&snapshot), vec!["1", "2"]);
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_change_moves_task_between_columns() {
    let handle = seeded_engine(board()).await;
    let mut events = handle.lifecycle();

    handle
        .dispatch(Intent::Update {
            id: TaskId::from("1"),
            patch: TaskPatch::status(TaskStatus::InProgress),
        })
        .unwrap();
    assert_eq!(settled(&mut events, OperationKind::Update).await, Phase::Fulfilled);

    let snapshot = handle.snapshot();
    assert!(snapshot.column(TaskStatus::Todo).is_empty());
    assert_eq!(snapshot.column(TaskStatus::InProgress)[0].id.as_str(), "1");
    assert_eq!(snapshot.stats.in_progress, 1);
    assert_eq!(ids(&snapshot), vec!["1", "2"]);
}

#[tokio::test]
async fn delete_of_missing_task_records_error() {
    let handle = seeded_engine(board()).await;
    let mut events = handle.lifecycle();

    handle.dispatch(Intent::Delete(TaskId::from("404"))).unwrap();
    assert_eq!(settled(&mut events, OperationKind::Delete).await, Phase::Rejected);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("Task not found"));
    assert_eq!(ids(&snapshot), vec!["1", "2"]);
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn mutations_do_not_raise_loading() {
    let (handle, mut calls) = scripted_engine_with(board()).await;

    handle.dispatch(Intent::Delete(TaskId::from("2"))).unwrap();
    let delete = next_call(&mut calls).await;
    let snapshot = wait_for(&handle, |s| s.in_flight == 1).await;
    assert!(!snapshot.is_loading);

    delete.reply.send(Reply::Deleted).ok().unwrap();
    let snapshot = wait_for(&handle, |s| s.in_flight == 0).await;
    assert_eq!(ids(&snapshot), vec!["1"]);
}

#[tokio::test]
async fn confirmations_apply_in_arrival_order() {
    let (handle, mut calls) = scripted_engine_with(board()).await;

    handle
        .dispatch(Intent::Update {
            id: TaskId::from("1"),
            patch: TaskPatch::status(TaskStatus::InProgress),
        })
        .unwrap();
    let first = next_call(&mut calls).await;
    handle
        .dispatch(Intent::Update {
            id: TaskId::from("1"),
            patch: TaskPatch::status(TaskStatus::Done),
        })
        .unwrap();
    let second = next_call(&mut calls).await;

    // The later request is confirmed first; the earlier confirmation lands
    // last and wins.
    second
        .reply
        .send(Reply::Task(Task::new("1", "Design homepage").with_status(TaskStatus::Done)))
        .ok()
        .unwrap();
    wait_for(&handle, |s| s.in_flight == 1).await;
    first
        .reply
        .send(Reply::Task(
            Task::new("1", "Design homepage").with_status(TaskStatus::InProgress),
        ))
        .ok()
        .unwrap();

    let snapshot = wait_for(&handle, |s| s.in_flight == 0).await;
    assert_eq!(snapshot.filtered_tasks[0].status, Some(TaskStatus::InProgress));
    assert_eq!(ids(&snapshot), vec!["1", "2"]);
}

#[tokio::test]
async fn completion_uses_filter_current_at_arrival() {
    let (handle, mut calls) = scripted_engine_with(board()).await;

    handle.dispatch(Intent::Create(TaskDraft::new("Plan sprint"))).unwrap();
    let create = next_call(&mut calls).await;

    handle
        .dispatch(Intent::SetFilter(
            FilterPatch::default().with_priority(FilterValue::Only(Priority::Low)),
        ))
        .unwrap();
    wait_for(&handle, |s| s.filters.priority != FilterValue::All).await;

    create
        .reply
        .send(Reply::Task(Task::new("3", "Plan sprint").with_priority(Priority::High)))
        .ok()
        .unwrap();
    let snapshot = wait_for(&handle, |s| s.in_flight == 0).await;
    assert_eq!(ids(&snapshot), vec!["2"]);

    handle.dispatch(Intent::ClearFilter).unwrap();
    let snapshot = wait_for(&handle, |s| s.filters.priority == FilterValue::All).await;
    assert_eq!(ids(&snapshot), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn concurrent_fetches_are_not_merged() {
    let (handle, mut calls) = scripted_engine_with(vec![]).await;

    handle.dispatch(Intent::FetchAll).unwrap();
    handle.dispatch(Intent::FetchAll).unwrap();
    let first = next_call(&mut calls).await;
    let second = next_call(&mut calls).await;
    assert_eq!(first.label, "fetch_all");
    assert_eq!(second.label, "fetch_all");

    // The first fetch to settle clears the loading flag even though the
    // other one is still outstanding.
    second.reply.send(Reply::Tasks(board())).ok().unwrap();
    let snapshot = wait_for(&handle, |s| s.in_flight == 1).await;
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.filtered_tasks.len(), 2);

    first.reply.send(Reply::Tasks(vec![Task::new("9", "Late")])).ok().unwrap();
    let snapshot = wait_for(&handle, |s| s.in_flight == 0).await;
    assert_eq!(ids(&snapshot), vec!["9"]);
}

// ---------------------------------------------------------------------------
// Lifecycle and handle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_operation_gets_one_pending_and_one_terminal_event() {
    let handle = seeded_engine(board()).await;
    let mut events = handle.lifecycle();

    handle.dispatch(Intent::Create(TaskDraft::new("A"))).unwrap();
    handle.dispatch(Intent::Create(TaskDraft::new(""))).unwrap();
    handle.dispatch(Intent::Delete(TaskId::from("2"))).unwrap();

    let mut seen = Vec::new();
    while seen.len() < 6 {
        seen.push(next_event(&mut events).await);
    }

    for event in seen.iter().filter(|e| e.phase == Phase::Pending) {
        let terminals: Vec<_> = seen
            .iter()
            .filter(|e| e.id == event.id && e.phase.is_terminal())
            .collect();
        assert_eq!(terminals.len(), 1, "operation {} settled {} times", event.id, terminals.len());
        let pending_pos = seen.iter().position(|e| e == event).unwrap();
        let terminal_pos = seen.iter().position(|e| e == terminals[0]).unwrap();
        assert!(pending_pos < terminal_pos);
    }
    assert_eq!(seen.iter().filter(|e| e.phase == Phase::Rejected).count(), 1);
}

#[tokio::test]
async fn revisions_increase_across_snapshots() {
    let handle = seeded_engine(board()).await;
    let before = handle.snapshot().revision;

    handle.dispatch(Intent::ClearFilter).unwrap();
    let after = wait_for(&handle, |s| s.revision > before).await;
    assert!(after.revision > before);
}

#[tokio::test]
async fn full_queue_reports_busy() {
    let (gateway, _calls) = ScriptedGateway::new();
    let config = EngineConfig {
        intent_capacity: 1,
        ..EngineConfig::default()
    };
    let (handle, _task) = spawn_engine(gateway, &config);

    let mut results = Vec::new();
    for _ in 0..64 {
        results.push(handle.dispatch(Intent::ClearFilter));
    }
    assert!(results.contains(&Err(EngineError::Busy)));
}

#[tokio::test]
async fn dispatch_after_shutdown_is_closed() {
    let (handle, task) = spawn_engine(InMemoryGateway::new(), &EngineConfig::default());
    handle.dispatch(Intent::Shutdown).unwrap();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(handle.dispatch(Intent::FetchAll), Err(EngineError::Closed));
    assert_eq!(handle.send(Intent::FetchAll).await, Err(EngineError::Closed));
}

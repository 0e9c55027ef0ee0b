//! Task state engine.
//!
//! A single background task owns the [`TaskState`] and serializes every
//! transition. Presentation talks to it through an [`EngineHandle`]:
//!
//! ```text
//! presentation ─── Intent ──────────→ engine task ──→ spawned gateway calls
//!              ←── Snapshot (watch) ─     ↑                    │
//!              ←── LifecycleEvent ───     └──── completions ───┘
//! ```
//!
//! Each intent or completion is fully applied (store update, view
//! recomputation, snapshot publication) before the next one is taken.
//! Completions are applied in arrival order, so when two updates race the
//! later confirmation wins.

pub mod snapshot;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use taskdash_proto::task::{TaskDraft, TaskId, TaskPatch};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

pub use snapshot::Snapshot;
pub use state::{Confirmation, TaskState};

use crate::gateway::{GatewayError, TaskGateway};
use crate::lifecycle::{LifecycleEvent, OperationId, OperationKind};
use crate::tasks::FilterPatch;

/// Default capacity of the intent queue.
pub const DEFAULT_INTENT_CAPACITY: usize = 256;

/// Default number of lifecycle events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Requests from presentation to the engine.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Reload the whole collection from the service.
    FetchAll,
    Create(TaskDraft),
    Update { id: TaskId, patch: TaskPatch },
    Delete(TaskId),
    /// Merge the given fields into the filter predicate.
    SetFilter(FilterPatch),
    ClearFilter,
    /// Stop accepting intents and end the engine task.
    Shutdown,
}

/// Errors returned when handing an intent to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine task has stopped.
    #[error("engine has shut down")]
    Closed,
    /// The intent queue is full.
    #[error("engine intent queue is full")]
    Busy,
}

/// Sizing for the engine's channels.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub intent_capacity: usize,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intent_capacity: DEFAULT_INTENT_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Cloneable handle for sending intents and observing state.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<Snapshot>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl EngineHandle {
    /// Queues an intent without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] if the queue is full, or
    /// [`EngineError::Closed`] if the engine has stopped.
    pub fn dispatch(&self, intent: Intent) -> Result<(), EngineError> {
        self.intents.try_send(intent).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EngineError::Busy,
            mpsc::error::TrySendError::Closed(_) => EngineError::Closed,
        })
    }

    /// Queues an intent, waiting for room in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] if the engine has stopped.
    pub async fn send(&self, intent: Intent) -> Result<(), EngineError> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| EngineError::Closed)
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// A receiver for lifecycle events emitted from now on.
    #[must_use]
    pub fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// `true` once the engine task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.intents.is_closed()
    }
}

/// Result of one gateway call, routed back to the engine task.
#[derive(Debug)]
struct Completion {
    id: OperationId,
    result: Result<Confirmation, GatewayError>,
}

/// Spawns the engine task over `gateway`.
///
/// Returns the handle used by presentation and the task's join handle. The
/// task ends on [`Intent::Shutdown`] or when every handle has been dropped.
pub fn spawn_engine<G>(gateway: G, config: &EngineConfig) -> (EngineHandle, JoinHandle<()>)
where
    G: TaskGateway + 'static,
{
    let (intent_tx, intent_rx) = mpsc::channel(config.intent_capacity.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
    let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    tracing::info!(gateway = %gateway.kind(), "starting task engine");

    let engine = Engine {
        gateway: Arc::new(gateway),
        state: TaskState::new(),
        snapshots: snapshot_tx,
        events: event_tx.clone(),
        completions: completion_tx,
    };
    let task = tokio::spawn(engine.run(intent_rx, completion_rx));

    let handle = EngineHandle {
        intents: intent_tx,
        snapshots: snapshot_rx,
        events: event_tx,
    };
    (handle, task)
}

struct Engine<G> {
    gateway: Arc<G>,
    state: TaskState,
    snapshots: watch::Sender<Snapshot>,
    events: broadcast::Sender<LifecycleEvent>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<G: TaskGateway + 'static> Engine<G> {
    async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        self.publish();
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
                Some(done) = completions.recv() => self.handle_completion(done),
            }
        }
        tracing::info!(
            in_flight = self.state.tracker().in_flight(),
            "task engine stopped"
        );
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::FetchAll => {
                let gateway = Arc::clone(&self.gateway);
                self.launch(OperationKind::FetchAll, async move {
                    gateway.fetch_all().await.map(Confirmation::Fetched)
                });
            }
            Intent::Create(draft) => {
                let gateway = Arc::clone(&self.gateway);
                self.launch(OperationKind::Create, async move {
                    gateway.create(&draft).await.map(Confirmation::Created)
                });
            }
            Intent::Update { id, patch } => {
                let gateway = Arc::clone(&self.gateway);
                self.launch(OperationKind::Update, async move {
                    gateway.update(&id, &patch).await.map(Confirmation::Updated)
                });
            }
            Intent::Delete(id) => {
                let gateway = Arc::clone(&self.gateway);
                self.launch(OperationKind::Delete, async move {
                    gateway.delete(&id).await.map(Confirmation::Deleted)
                });
            }
            Intent::SetFilter(patch) => {
                self.state.set_filter(&patch);
                self.publish();
            }
            Intent::ClearFilter => {
                self.state.clear_filter();
                self.publish();
            }
            // Handled by the run loop.
            Intent::Shutdown => {}
        }
    }

    /// Marks an operation pending and runs its gateway call in the
    /// background, reporting the result back as a [`Completion`].
    fn launch<F>(&mut self, kind: OperationKind, call: F)
    where
        F: Future<Output = Result<Confirmation, GatewayError>> + Send + 'static,
    {
        let event = self.state.begin(kind);
        self.publish();
        self.emit(event);

        let completions = self.completions.clone();
        let id = event.id;
        tokio::spawn(async move {
            let result = call.await;
            // The engine may have stopped meanwhile; the result is dropped then.
            let _ = completions.send(Completion { id, result });
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        match self.state.settle(done.id, done.result) {
            Ok(event) => {
                self.publish();
                self.emit(event);
            }
            Err(err) => tracing::warn!(error = %err, "dropping completion"),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.snapshot(Utc::now()));
    }

    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

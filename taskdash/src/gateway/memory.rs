//! In-memory gateway for demo mode and testing.
//!
//! Keeps the task list in process and applies drafts and patches with the
//! same rules as the task service: ids are assigned on create, status
//! starts as `todo`, unknown ids answer `404 Task not found`, and invalid
//! titles answer `400`. Failures can be scripted with
//! [`InMemoryGateway::fail_next`].

use std::collections::VecDeque;

use parking_lot::Mutex;
use taskdash_proto::task::{Task, TaskDraft, TaskId, TaskPatch};

use super::{GatewayError, GatewayKind, TaskGateway};

/// Message the service uses for unknown task ids.
pub const NOT_FOUND_MESSAGE: &str = "Task not found";

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    next_id: u64,
    failures: VecDeque<GatewayError>,
    calls: usize,
}

impl MemoryState {
    /// Next `mem-N` id not already held by a task, seeded ones included.
    fn fresh_id(&mut self) -> TaskId {
        loop {
            self.next_id += 1;
            let id = TaskId::new(format!("mem-{}", self.next_id));
            if !self.tasks.iter().any(|t| t.id == id) {
                return id;
            }
        }
    }
}

/// Gateway backed by a task list held in process.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
}

impl InMemoryGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway pre-populated with `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                tasks,
                ..MemoryState::default()
            }),
        }
    }

    /// Makes the next call fail with `error` instead of touching the list.
    ///
    /// Queued failures are consumed in order, one per call.
    pub fn fail_next(&self, error: GatewayError) {
        self.state.lock().failures.push_back(error);
    }

    /// Current contents of the task list.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Number of calls received so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    fn with_state<R>(
        &self,
        op: impl FnOnce(&mut MemoryState) -> Result<R, GatewayError>,
    ) -> Result<R, GatewayError> {
        let mut state = self.state.lock();
        state.calls += 1;
        if let Some(error) = state.failures.pop_front() {
            tracing::debug!(error = %error, "memory gateway returning scripted failure");
            return Err(error);
        }
        op(&mut state)
    }
}

fn bad_request(err: &taskdash_proto::task::ValidationError) -> GatewayError {
    GatewayError::remote(400, err.to_string())
}

impl TaskGateway for InMemoryGateway {
    async fn fetch_all(&self) -> Result<Vec<Task>, GatewayError> {
        self.with_state(|state| Ok(state.tasks.clone()))
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, GatewayError> {
        self.with_state(|state| {
            draft.validate().map_err(|e| bad_request(&e))?;
            let id = state.fresh_id();
            let task = Task::from_draft(id, draft.clone());
            state.tasks.push(task.clone());
            Ok(task)
        })
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.with_state(|state| {
            patch.validate().map_err(|e| bad_request(&e))?;
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t.id == *id)
                .ok_or_else(|| GatewayError::remote(404, NOT_FOUND_MESSAGE))?;
            patch.apply_to(task);
            Ok(task.clone())
        })
    }

    async fn delete(&self, id: &TaskId) -> Result<TaskId, GatewayError> {
        self.with_state(|state| {
            let pos = state
                .tasks
                .iter()
                .position(|t| t.id == *id)
                .ok_or_else(|| GatewayError::remote(404, NOT_FOUND_MESSAGE))?;
            state.tasks.remove(pos);
            Ok(id.clone())
        })
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::Memory
    }
}

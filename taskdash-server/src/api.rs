//! HTTP API of the reference task service.
//!
//! | route | handler |
//! |---|---|
//! | `GET /api/tasks` | list every task |
//! | `POST /api/tasks` | create from a `TaskDraft` body |
//! | `PUT`/`PATCH /api/tasks/{id}` | apply a `TaskPatch` body |
//! | `DELETE /api/tasks/{id}` | remove the task, `204 No Content` |
//!
//! When a token is configured every route requires
//! `Authorization: Bearer <token>`. Failures carry a JSON body
//! `{"message": "..."}`.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use taskdash_proto::task::{ErrorBody, Task, TaskDraft, TaskId, TaskPatch};

use crate::store::{StoreError, TaskStore};

/// Message returned when the bearer token is missing or wrong.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Shared service state.
#[derive(Debug, Default)]
pub struct ApiState {
    /// Task storage.
    pub store: TaskStore,
    token: Option<String>,
}

impl ApiState {
    /// Creates state with an empty store. `token` enables bearer checks.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self::with_store(TaskStore::new(), token)
    }

    #[must_use]
    pub const fn with_store(store: TaskStore, token: Option<String>) -> Self {
        Self { store, token }
    }

    fn authorizes(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };
        bearer_token(headers) == Some(expected.as_str())
    }
}

/// Extracts the credential from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Failures mapped onto HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// Builds the service router over `state`.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            put(update_task)
                .patch(update_task)
                .delete(delete_task),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_token,
        ))
        .with_state(state)
}

async fn require_token(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.authorizes(request.headers()) {
        tracing::debug!(path = %request.uri().path(), "rejecting request without valid token");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

async fn list_tasks(State(state): State<Arc<ApiState>>) -> Json<Vec<Task>> {
    Json(state.store.list().await)
}

async fn create_task(
    State(state): State<Arc<ApiState>>,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.store.create(draft).await?;
    tracing::info!(task = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let task = state.store.update(&TaskId::new(id), &patch).await?;
    tracing::info!(task = %task.id, "task updated");
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state.store.delete(&TaskId::new(id)).await?;
    tracing::info!(task = %removed.id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Starts the service with an empty store and no token on the given address.
///
/// Binds to `addr` (use `127.0.0.1:0` for an OS-assigned port in tests) and
/// returns the bound address along with the server task's handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ApiState::default())).await
}

/// Starts the service with pre-configured [`ApiState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ApiState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "task service error");
        }
    });

    Ok((bound_addr, handle))
}

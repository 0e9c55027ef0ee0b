//! Remote task gateway abstraction.
//!
//! Defines the [`TaskGateway`] trait through which the engine reaches the
//! task service. Concrete implementations include:
//! - [`http::HttpGateway`] -- JSON over HTTP with a bearer credential
//! - [`memory::InMemoryGateway`] -- in-process store for demo mode and tests
//!
//! Every operation is a single attempt with a single result. Gateways never
//! retry or cache; failures are returned verbatim to the caller.

pub mod http;
pub mod memory;

use std::fmt;
use std::future::Future;

use taskdash_proto::codec::CodecError;
use taskdash_proto::task::{Task, TaskDraft, TaskId, TaskPatch};

/// Describes which kind of gateway is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    /// Remote task service over HTTP.
    Http,
    /// In-process task list.
    Memory,
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Errors surfaced by a gateway call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Message taken from the service's error body.
        message: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// A request or response body could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The gateway could not be constructed from its configuration.
    #[error("invalid gateway configuration: {0}")]
    Setup(String),
}

impl GatewayError {
    /// Convenience constructor for a service-side failure.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// The text recorded as the latest error when an operation is rejected.
    ///
    /// For service failures this is the server's message verbatim.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status of a service failure, if there was a response at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Async request/response mapping onto the task service.
///
/// Implementations carry no business logic: each method issues exactly one
/// call and returns the decoded payload or the failure.
pub trait TaskGateway: Send + Sync {
    /// Fetch every task visible to the current credential.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Task>, GatewayError>> + Send;

    /// Create a task; the service assigns its id and returns the full record.
    fn create(&self, draft: &TaskDraft) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Apply a partial update and return the full updated record.
    fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Delete a task and return the id that was removed.
    fn delete(&self, id: &TaskId) -> impl Future<Output = Result<TaskId, GatewayError>> + Send;

    /// Return the type of this gateway.
    fn kind(&self) -> GatewayKind;
}

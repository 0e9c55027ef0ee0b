//! HTTP gateway for the remote task service.
//!
//! Maps each gateway operation onto one JSON request against the service's
//! REST endpoints:
//!
//! | operation | request |
//! |---|---|
//! | fetch all | `GET {base}/tasks` |
//! | create | `POST {base}/tasks` |
//! | update | `PUT {base}/tasks/{id}` |
//! | delete | `DELETE {base}/tasks/{id}` |
//!
//! A configured token is sent as `Authorization: Bearer <token>` on every
//! request. Non-success responses become [`GatewayError::Remote`] carrying
//! the service's `message`.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use taskdash_proto::codec;
use taskdash_proto::task::{Task, TaskDraft, TaskId, TaskPatch};
use url::Url;

use super::{GatewayError, GatewayKind, TaskGateway};

/// Default base URL of the task service API.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; task endpoints live under `{url}/tasks`.
    pub url: String,
    /// Bearer credential, if any.
    pub token: Option<String>,
    /// Timeout applied to each request.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Gateway that talks JSON over HTTP to the task service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpGateway {
    /// Builds a gateway from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Setup`] if the base URL does not parse, cannot
    /// carry path segments, or the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| GatewayError::Setup(format!("invalid API url '{}': {e}", config.url)))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::Setup(format!(
                "API url '{}' cannot carry a path",
                config.url
            )));
        }
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Setup(e.to_string()))?;

        tracing::debug!(base = %base, auth = config.token.is_some(), "HTTP gateway ready");
        Ok(Self {
            client,
            base,
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, id: Option<&TaskId>) -> Result<Url, GatewayError> {
        let mut url = self
            .base
            .join("tasks")
            .map_err(|e| GatewayError::Setup(e.to_string()))?;
        if let Some(id) = id {
            let shown = url.to_string();
            url.path_segments_mut()
                .map_err(|()| GatewayError::Setup(format!("cannot append id to '{shown}'")))?
                .push(id.as_str());
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and returns the body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let message = codec::error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        tracing::debug!(status = status.as_u16(), message = %message, "task service returned failure");
        Err(GatewayError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    fn with_json(request: RequestBuilder, body: Vec<u8>) -> RequestBuilder {
        request.header(CONTENT_TYPE, "application/json").body(body)
    }
}

impl TaskGateway for HttpGateway {
    async fn fetch_all(&self) -> Result<Vec<Task>, GatewayError> {
        let url = self.endpoint(None)?;
        let body = self.execute(self.request(Method::GET, url)).await?;
        Ok(codec::decode(&body)?)
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, GatewayError> {
        let url = self.endpoint(None)?;
        let payload = codec::encode(draft)?;
        let body = self
            .execute(Self::with_json(self.request(Method::POST, url), payload))
            .await?;
        Ok(codec::decode(&body)?)
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        let url = self.endpoint(Some(id))?;
        let payload = codec::encode(patch)?;
        let body = self
            .execute(Self::with_json(self.request(Method::PUT, url), payload))
            .await?;
        Ok(codec::decode(&body)?)
    }

    async fn delete(&self, id: &TaskId) -> Result<TaskId, GatewayError> {
        let url = self.endpoint(Some(id))?;
        // The service's confirmation body is not needed; the id is echoed back.
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(id.clone())
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::Http
    }
}

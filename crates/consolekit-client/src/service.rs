use crate::config::ServiceConfig;
use async_trait::async_trait;
use consolekit_core::{ConsoleError, ConsoleResult, ContinueRequest, StartRequest, StartResponse};
use reqwest::Url;
use tracing::debug;

/// Request/response side of the task service.
///
/// Implementations only report success or failure; everything the session
/// produces afterwards arrives on the event channel.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Starts a session and returns its id.
    async fn start_session(&self, request: &StartRequest) -> ConsoleResult<StartResponse>;

    /// Sends a follow-up message to a running session.
    async fn continue_session(&self, session_id: &str, request: &ContinueRequest) -> ConsoleResult<()>;

    /// Stops a session.
    async fn stop_session(&self, session_id: &str) -> ConsoleResult<()>;
}

/// [`TaskService`] over the console HTTP API.
pub struct HttpTaskService {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTaskService {
    /// Creates a client for the given base URL.
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Creates a client from configuration, applying the request timeout.
    pub fn from_config(config: &ServiceConfig) -> ConsoleResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConsoleError::Http(e.to_string()))?;
        Ok(Self::new(config.base_url.clone(), http))
    }

    /// `{base}/api/console/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> ConsoleResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::Config(format!("invalid base_url '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ConsoleError::Config(format!("base_url '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "console"])
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> ConsoleResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(ConsoleError::Service {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn start_session(&self, request: &StartRequest) -> ConsoleResult<StartResponse> {
        let url = self.url(&["start"])?;
        debug!(url = %url, auto_approve = request.auto_approve, "Starting console session");

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ConsoleError::Http(e.to_string()))?;
        let response = Self::check(response).await?;

        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| ConsoleError::Http(format!("invalid start response: {e}")))?;
        debug!(session_id = %body.session_id, "Start request accepted");
        Ok(body)
    }

    async fn continue_session(&self, session_id: &str, request: &ContinueRequest) -> ConsoleResult<()> {
        let url = self.url(&[session_id, "message"])?;
        debug!(session_id = %session_id, "Continuing console session");

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ConsoleError::Http(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn stop_session(&self, session_id: &str) -> ConsoleResult<()> {
        let url = self.url(&[session_id, "stop"])?;
        debug!(session_id = %session_id, "Stopping console session");

        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| ConsoleError::Http(e.to_string()))?;
        Self::check(response).await?;
        debug!(session_id = %session_id, "Stop request accepted");
        Ok(())
    }
}

use consolekit_core::{ConsoleError, ConsoleResult, ExecutionMode};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level console configuration, usually read from `consolekit.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Where the task service lives.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Defaults for new sessions.
    #[serde(default)]
    pub session: SessionConfig,
    /// Capacity of the update broadcast buffer.
    #[serde(default = "default_update_capacity")]
    pub update_capacity: usize,
}

/// Task service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the HTTP API, e.g. `http://127.0.0.1:8000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Event channel URL. Derived from `base_url` when unset.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Per-request timeout for lifecycle requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Options applied to sessions started from this console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Let the service run tools without confirmation.
    #[serde(default = "default_auto_approve")]
    pub auto_approve: bool,
    /// Prefix applied to the initial prompt.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Working directory handed to the service.
    #[serde(default)]
    pub project_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_approve: default_auto_approve(),
            execution_mode: ExecutionMode::default(),
            project_path: None,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_auto_approve() -> bool {
    true
}
fn default_update_capacity() -> usize {
    256
}

impl ConsoleConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> ConsoleResult<Self> {
        toml::from_str(s).map_err(|e| ConsoleError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub async fn load(path: &Path) -> ConsoleResult<Self> {
        let data = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConsoleError::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&data)
    }
}

impl ServiceConfig {
    /// Lifecycle request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The event channel URL: the explicit one, or `base_url` with its scheme
    /// switched to `ws`/`wss` and path `/ws`.
    pub fn ws_url(&self) -> ConsoleResult<String> {
        if let Some(url) = &self.ws_url {
            return Ok(url.clone());
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::Config(format!("invalid base_url '{}': {e}", self.base_url)))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ConsoleError::Config(format!(
                    "cannot derive event channel URL from scheme '{other}'"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| ConsoleError::Config(format!("cannot switch scheme to {scheme}")))?;
        url.set_path("/ws");
        url.set_query(None);
        Ok(url.to_string())
    }
}

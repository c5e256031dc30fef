//! HTTP client for an a2a-gate executor

use a2a_gate::envelope::RpcRequest;
use a2a_gate::extension::{EXTENSIONS_HEADER, EXTENSION_URI};
use a2a_gate::models::AgentCard;
use a2a_gate::routes::{AGENT_CARD_PATH, EXECUTE_PATH};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Executor request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Executor returned status {0}")]
    Status(StatusCode),
}

/// What came back from a delegation attempt
#[derive(Debug)]
pub struct DelegateOutcome {
    pub status: StatusCode,
    /// True when the executor echoed the extension in its response header
    pub activated: bool,
    pub body: Value,
}

impl DelegateOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.body.get("result").is_some()
    }
}

/// Client for one executor agent
pub struct ExecutorClient {
    client: Client,
    base_url: String,
}

impl ExecutorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the executor's discovery card
    pub async fn fetch_card(&self) -> Result<AgentCard, ClientError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, AGENT_CARD_PATH))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }

        Ok(response.json().await?)
    }

    /// Send a `task/execute` request with the extension activated.
    ///
    /// JSON-RPC errors are returned as an outcome, not as `Err`.
    pub async fn delegate(&self, request: &RpcRequest) -> Result<DelegateOutcome, ClientError> {
        tracing::debug!("Delegating request {} to {}", request.id, self.base_url);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, EXECUTE_PATH))
            .header(EXTENSIONS_HEADER, EXTENSION_URI)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let activated = response
            .headers()
            .get(EXTENSIONS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| a2a_gate::extension::requested_extensions(v).contains(EXTENSION_URI))
            .unwrap_or(false);

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Ok(DelegateOutcome {
            status,
            activated,
            body,
        })
    }
}

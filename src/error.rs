//! Error types for the delegation gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::envelope::{RpcError, RpcErrorResponse};

/// JSON-RPC: invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC: the JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC: the method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC: invalid method parameters. Every delegation failure uses it.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC: internal error.
pub const INTERNAL_ERROR: i64 = -32603;

pub const DEFAULT_REQUESTER_DENIAL: &str = "Requester not allowed to perform this action";
pub const DEFAULT_EXECUTOR_DENIAL: &str = "Executor not allowed to perform this action";
pub const EXECUTOR_MINT_FAILURE: &str = "Failed to mint one-shot credential for the executor agent";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Extension not activated: {0}")]
    Activation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Missing required extension metadata: {0}")]
    Validation(String),

    #[error("Malformed extension metadata: {0}")]
    MalformedMetadata(String),

    #[error("Requester denied: {0}")]
    RequesterDenied(String),

    #[error("Executor denied: {0}")]
    ExecutorDenied(String),

    #[error("Credential mint failed: {0}")]
    MintFailed(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status used when this error terminates a request
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Activation(_) => StatusCode::PRECONDITION_FAILED,
            AppError::Parse(_)
            | AppError::InvalidRequest(_)
            | AppError::MethodNotFound(_)
            | AppError::Validation(_)
            | AppError::MalformedMetadata(_) => StatusCode::BAD_REQUEST,
            // Protocol-level outcomes travel as well-formed JSON-RPC errors
            AppError::RequesterDenied(_)
            | AppError::ExecutorDenied(_)
            | AppError::MintFailed(_)
            | AppError::Provider(_) => StatusCode::OK,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON-RPC error code
    pub fn code(&self) -> i64 {
        match self {
            AppError::Parse(_) => PARSE_ERROR,
            AppError::Activation(_) | AppError::InvalidRequest(_) => INVALID_REQUEST,
            AppError::MethodNotFound(_) => METHOD_NOT_FOUND,
            AppError::Validation(_)
            | AppError::MalformedMetadata(_)
            | AppError::RequesterDenied(_)
            | AppError::ExecutorDenied(_)
            | AppError::MintFailed(_)
            | AppError::Provider(_) => INVALID_PARAMS,
            AppError::Config(_) | AppError::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Short JSON-RPC error message
    pub fn message(&self) -> &'static str {
        match self {
            AppError::Activation(_) => "Extension not activated",
            AppError::Parse(_) => "Parse error",
            AppError::InvalidRequest(_) => "Invalid A2A request",
            AppError::MethodNotFound(_) => "Method not found",
            AppError::Validation(_) => "Missing required extension metadata",
            AppError::MalformedMetadata(_) => "Malformed extension metadata",
            AppError::RequesterDenied(_) | AppError::MintFailed(_) => "Extension activation failed",
            AppError::ExecutorDenied(_) => "Denied by policy",
            AppError::Provider(_) => "Policy provider unavailable",
            AppError::Config(_) | AppError::Internal(_) => "Internal error",
        }
    }

    /// Human-readable reason placed in `error.data.reason`
    pub fn reason(&self) -> String {
        match self {
            AppError::Activation(r)
            | AppError::Parse(r)
            | AppError::InvalidRequest(r)
            | AppError::MethodNotFound(r)
            | AppError::Validation(r)
            | AppError::MalformedMetadata(r)
            | AppError::RequesterDenied(r)
            | AppError::ExecutorDenied(r)
            | AppError::MintFailed(r)
            | AppError::Provider(r) => r.clone(),
            // Internal details stay in the logs
            AppError::Config(_) | AppError::Internal(_) => "internal error".to_string(),
        }
    }

    /// Build a provider error from a transport failure
    pub fn from_transport(operation: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Provider(format!("{} timed out", operation))
        } else if err.is_connect() {
            AppError::Provider(format!("{}: provider unreachable", operation))
        } else if err.is_decode() {
            AppError::Provider(format!("{}: malformed provider response", operation))
        } else if let Some(status) = err.status() {
            AppError::Provider(format!("{} failed with status {}", operation, status))
        } else {
            AppError::Provider(format!("{}: transport error", operation))
        }
    }
}

/// An error bound to the correlation id of the request it terminates
#[derive(Debug)]
pub struct RpcFailure {
    pub id: Option<String>,
    pub error: AppError,
}

impl RpcFailure {
    pub fn new(id: Option<String>, error: AppError) -> Self {
        Self { id, error }
    }

    pub fn body(&self) -> RpcErrorResponse {
        RpcErrorResponse::new(
            self.id.clone(),
            RpcError::new(self.error.code(), self.error.message(), self.error.reason()),
        )
    }
}

impl IntoResponse for RpcFailure {
    fn into_response(self) -> Response {
        match &self.error {
            AppError::Config(e) | AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
            }
            AppError::Provider(e) => {
                tracing::error!("Provider error: {}", e);
            }
            AppError::RequesterDenied(_) | AppError::ExecutorDenied(_) | AppError::MintFailed(_) => {
                tracing::warn!(id = ?self.id, "Delegation refused: {}", self.error);
            }
            _ => {
                tracing::debug!(id = ?self.id, "Request rejected: {}", self.error);
            }
        }

        (self.error.status(), Json(self.body())).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        RpcFailure::new(None, self).into_response()
    }
}

impl From<AppError> for RpcFailure {
    fn from(error: AppError) -> Self {
        RpcFailure::new(None, error)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

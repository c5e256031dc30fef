//! JSON-RPC envelope for `task/execute` delegation requests
//!
//! Parsing happens in two stages. [`parse_request`] checks the JSON-RPC shape
//! and [`validate`] checks the extension metadata. Both run before any call to
//! the policy provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result, RpcFailure};
use crate::extension::{
    ACTION_FIELD, AGENT_DID_FIELD, AUTH_TOKEN_FIELD, CONTEXT_FIELD, RESOURCE_FIELD,
};
use crate::models::{AuthorizationContext, OneShotCredential};

pub const JSONRPC_VERSION: &str = "2.0";
pub const TASK_EXECUTE: &str = "task/execute";

const DEFAULT_TASK: &str = "summarize";
const DEFAULT_INPUT_REF: &str = "doc://unknown";

/// Inbound JSON-RPC request, structurally valid but not yet validated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: TaskParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParams {
    pub message: TaskMessage,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// What the requester wants done. `inputRef` is a reference, never content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(rename = "inputRef", default, skip_serializing_if = "Option::is_none")]
    pub input_ref: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskMessage {
    pub fn new(task: impl Into<String>, input_ref: impl Into<String>) -> Self {
        Self {
            task: Some(task.into()),
            input_ref: Some(input_ref.into()),
            extra: Map::new(),
        }
    }

    pub fn task(&self) -> &str {
        self.task.as_deref().unwrap_or(DEFAULT_TASK)
    }

    pub fn input_ref(&self) -> &str {
        self.input_ref.as_deref().unwrap_or(DEFAULT_INPUT_REF)
    }
}

/// Extension metadata as sent by a requester
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMetadata {
    pub action: String,
    pub resource: String,
    pub context: AuthorizationContext,
    pub auth_token: String,
    pub agent_did: String,
}

impl RpcRequest {
    /// Build a `task/execute` request carrying the given metadata
    pub fn task_execute(
        id: impl Into<String>,
        message: TaskMessage,
        metadata: &OutboundMetadata,
    ) -> serde_json::Result<Self> {
        let metadata = match serde_json::to_value(metadata)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: TASK_EXECUTE.to_string(),
            params: TaskParams { message, metadata },
        })
    }
}

/// Validated extension metadata
#[derive(Debug)]
pub struct DelegationMetadata {
    pub action: String,
    pub resource: String,
    pub context: AuthorizationContext,
    pub requester_token: OneShotCredential,
    pub requester_did: String,
}

/// A fully validated delegation request
#[derive(Debug)]
pub struct DelegationEnvelope {
    pub id: String,
    pub method: String,
    pub message: TaskMessage,
    pub metadata: DelegationMetadata,
}

/// Parse the body into a JSON-RPC request.
///
/// The correlation id is attached to the failure whenever it can be read.
pub fn parse_request(body: &[u8]) -> std::result::Result<RpcRequest, RpcFailure> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| RpcFailure::new(None, AppError::Parse(e.to_string())))?;

    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let request: RpcRequest = serde_json::from_value(value)
        .map_err(|e| RpcFailure::new(id.clone(), AppError::InvalidRequest(e.to_string())))?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(RpcFailure::new(
            id,
            AppError::InvalidRequest(format!("unsupported jsonrpc version {}", request.jsonrpc)),
        ));
    }

    if request.method != TASK_EXECUTE {
        return Err(RpcFailure::new(
            id,
            AppError::MethodNotFound(request.method.clone()),
        ));
    }

    Ok(request)
}

/// Check the extension metadata and turn the request into an envelope.
///
/// Every problem is collected before reporting. Only missing keys give
/// [`AppError::Validation`]; any ill-typed value gives
/// [`AppError::MalformedMetadata`] listing both kinds.
pub fn validate(request: RpcRequest) -> Result<DelegationEnvelope> {
    let RpcRequest {
        id, method, params, ..
    } = request;
    let mut check = MetadataCheck::new(&params.metadata);

    let action = check.string(ACTION_FIELD);
    let resource = check.string(RESOURCE_FIELD);
    let context = check.context();
    let token = check.string(AUTH_TOKEN_FIELD);
    let did = check.string(AGENT_DID_FIELD);
    check.finish()?;

    match (action, resource, context, token, did) {
        (Some(action), Some(resource), Some(context), Some(token), Some(did)) => {
            Ok(DelegationEnvelope {
                id,
                method,
                message: params.message,
                metadata: DelegationMetadata {
                    action,
                    resource,
                    context,
                    requester_token: OneShotCredential::new(token),
                    requester_did: did,
                },
            })
        }
        _ => Err(AppError::Internal(
            "metadata check passed with a field unset".to_string(),
        )),
    }
}

struct MetadataCheck<'a> {
    md: &'a Map<String, Value>,
    missing: Vec<&'static str>,
    malformed: Vec<String>,
}

impl<'a> MetadataCheck<'a> {
    fn new(md: &'a Map<String, Value>) -> Self {
        Self {
            md,
            missing: Vec::new(),
            malformed: Vec::new(),
        }
    }

    /// Absent, null and empty strings all count as missing
    fn string(&mut self, key: &'static str) -> Option<String> {
        match self.md.get(key) {
            None | Some(Value::Null) => {
                self.missing.push(key);
                None
            }
            Some(Value::String(s)) if s.is_empty() => {
                self.missing.push(key);
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.malformed.push(format!("{} must be a string", key));
                None
            }
        }
    }

    fn context(&mut self) -> Option<AuthorizationContext> {
        match self.md.get(CONTEXT_FIELD) {
            None | Some(Value::Null) => {
                self.missing.push(CONTEXT_FIELD);
                None
            }
            Some(Value::Object(map)) if map.is_empty() => {
                self.missing.push(CONTEXT_FIELD);
                None
            }
            Some(value @ Value::Object(_)) => match serde_json::from_value(value.clone()) {
                Ok(context) => Some(context),
                Err(e) => {
                    self.malformed.push(format!("{} is malformed: {}", CONTEXT_FIELD, e));
                    None
                }
            },
            Some(_) => {
                self.malformed
                    .push(format!("{} must be an object", CONTEXT_FIELD));
                None
            }
        }
    }

    fn finish(self) -> Result<()> {
        if !self.malformed.is_empty() {
            let mut problems = Vec::new();
            if !self.missing.is_empty() {
                problems.push(format!("missing {}", self.missing.join(", ")));
            }
            problems.extend(self.malformed);
            return Err(AppError::MalformedMetadata(problems.join("; ")));
        }
        if !self.missing.is_empty() {
            return Err(AppError::Validation(self.missing.join(", ")));
        }
        Ok(())
    }
}

/// Successful JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: String,
    pub result: TaskResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub result: String,
}

impl RpcResponse {
    pub fn new(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: TaskResult {
                result: result.into(),
            },
        }
    }
}

/// JSON-RPC error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorResponse {
    pub jsonrpc: String,
    pub id: Option<String>,
    pub error: RpcError,
}

impl RpcErrorResponse {
    pub fn new(id: Option<String>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: ErrorData,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: ErrorData {
                reason: reason.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub reason: String,
}

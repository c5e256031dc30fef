//! Shared test helpers: a recording provider and request builders

#![allow(dead_code)]

use a2a_gate::bootstrap::BootContext;
use a2a_gate::error::{AppError, Result};
use a2a_gate::extension::{EXTENSIONS_HEADER, EXTENSION_URI};
use a2a_gate::models::{
    AgentIdentity, CredentialMaterial, OneShotCredential, PolicyArtifact, PolicyDecision,
    Registration,
};
use a2a_gate::provider::{DecisionRequest, MintRequest, PolicyProvider, PublishRequest};
use a2a_gate::{routes, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const EXECUTOR_NAME: &str = "a2asummarizer";
pub const EXECUTOR_DID: &str = "did:web:agents.example.com:a2asummarizer";
pub const REQUESTER_DID: &str = "did:web:agents.example.com:a2atriage";
pub const REQUESTER_TOKEN: &str = "tok_requester_one_shot";
pub const POLICY_ID: &str = "pol_llm_guard";
pub const AUDIENCE: &str = "https://api.example.com";

/// A provider call as observed by the fake
#[derive(Debug, Clone)]
pub enum Call {
    Register {
        name: String,
    },
    Mint {
        did: String,
        audience: String,
        action: Option<String>,
        resource: Option<String>,
        token: String,
    },
    Decision {
        did: String,
        policy_id: String,
        token: String,
        action: String,
        resource: String,
        context: Value,
    },
    Publish {
        kind: String,
        name: String,
        version: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintBehavior {
    Issue,
    Withhold,
    Fail,
}

/// Scripted provider that records every call
pub struct FakeProvider {
    calls: Mutex<Vec<Call>>,
    requester: PolicyDecision,
    executor: PolicyDecision,
    mint: MintBehavior,
    decisions_fail: bool,
    already_registered: bool,
    mint_counter: Mutex<u32>,
}

impl FakeProvider {
    pub fn allowing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            requester: PolicyDecision::allow(),
            executor: PolicyDecision::allow(),
            mint: MintBehavior::Issue,
            decisions_fail: false,
            already_registered: false,
            mint_counter: Mutex::new(0),
        }
    }

    pub fn deny_requester(mut self, reason: Option<&str>) -> Self {
        self.requester = PolicyDecision::deny(reason);
        self
    }

    pub fn deny_executor(mut self, reason: Option<&str>) -> Self {
        self.executor = PolicyDecision::deny(reason);
        self
    }

    pub fn mint(mut self, behavior: MintBehavior) -> Self {
        self.mint = behavior;
        self
    }

    pub fn failing_decisions(mut self) -> Self {
        self.decisions_fail = true;
        self
    }

    pub fn already_registered(mut self) -> Self {
        self.already_registered = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mint_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Mint { .. }))
            .collect()
    }

    /// Decision calls for the given protocol role
    pub fn decisions_for(&self, role: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| match c {
                Call::Decision { context, .. } => context["role"] == role,
                _ => false,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PolicyProvider for FakeProvider {
    async fn register_or_fetch_identity(
        &self,
        name: &str,
        capabilities: &[String],
    ) -> Result<Registration> {
        self.record(Call::Register {
            name: name.to_string(),
        });
        let identity = AgentIdentity {
            did: format!("did:web:agents.example.com:{}", name),
            name: name.to_string(),
            capabilities: capabilities.to_vec(),
            vc: CredentialMaterial::new("vc-long-lived"),
        };
        if self.already_registered {
            Ok(Registration::Existing(identity))
        } else {
            Ok(Registration::Created(identity))
        }
    }

    async fn mint_credential(&self, request: MintRequest<'_>) -> Result<Option<OneShotCredential>> {
        let token = {
            let mut counter = self.mint_counter.lock().unwrap();
            *counter += 1;
            format!("tok_executor_{}_{}", *counter, uuid::Uuid::new_v4())
        };
        self.record(Call::Mint {
            did: request.identity.did.clone(),
            audience: request.audience.to_string(),
            action: request.action.map(str::to_string),
            resource: request.resource.map(str::to_string),
            token: token.clone(),
        });
        match self.mint {
            MintBehavior::Issue => Ok(Some(OneShotCredential::new(token))),
            MintBehavior::Withhold => Ok(None),
            MintBehavior::Fail => Err(AppError::Provider("credential mint timed out".into())),
        }
    }

    async fn evaluate_policy(&self, request: DecisionRequest<'_>) -> Result<PolicyDecision> {
        let context = serde_json::to_value(&request.context).unwrap();
        let role = context["role"].as_str().unwrap_or_default().to_string();
        self.record(Call::Decision {
            did: request.agent_did.to_string(),
            policy_id: request.policy_id.to_string(),
            token: request.credential.into_token(),
            action: request.action.to_string(),
            resource: request.resource.to_string(),
            context,
        });
        if self.decisions_fail {
            return Err(AppError::Provider("policy decision timed out".into()));
        }
        match role.as_str() {
            "requester" => Ok(self.requester.clone()),
            "executor" => Ok(self.executor.clone()),
            other => panic!("decision without protocol role: {:?}", other),
        }
    }

    async fn publish_policy(&self, request: PublishRequest<'_>) -> Result<PolicyArtifact> {
        self.record(Call::Publish {
            kind: request.kind.to_string(),
            name: request.name.to_string(),
            version: request.version.to_string(),
        });
        Ok(PolicyArtifact {
            policy_id: POLICY_ID.to_string(),
            name: request.name.to_string(),
            version: request.version.to_string(),
        })
    }
}

pub fn boot_context() -> BootContext {
    BootContext {
        identity: AgentIdentity {
            did: EXECUTOR_DID.to_string(),
            name: EXECUTOR_NAME.to_string(),
            capabilities: vec!["openai_infer".to_string()],
            vc: CredentialMaterial::new("vc-executor"),
        },
        policy: PolicyArtifact {
            policy_id: POLICY_ID.to_string(),
            name: "llm_guard_v1".to_string(),
            version: "1.0".to_string(),
        },
        audience: AUDIENCE.to_string(),
    }
}

pub fn app(provider: Arc<FakeProvider>) -> Router {
    routes::router(AppState::new(provider, boot_context()))
}

/// The demo request a requester agent sends
pub fn delegation_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": "1",
        "method": "task/execute",
        "params": {
            "message": {"task": "summarize", "inputRef": "doc://case-123"},
            "metadata": {
                "action": "infer",
                "resource": "llm://responses",
                "context": {
                    "purpose": "assistant",
                    "data_classification": "internal",
                    "region": "US",
                    "model": "gemini-1.5-pro",
                    "estimated_cost_cents": 15,
                    "daily_budget_remaining_cents": 500,
                    "pii_detected": false,
                    "request_id": "rq_demo_001",
                    "expires_at": "2025-12-31T00:00:00Z"
                },
                "auth_token": REQUESTER_TOKEN,
                "agent_did": REQUESTER_DID
            }
        }
    })
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// POST raw bytes to the execute path, optionally with the activation header
pub async fn post_raw(app: Router, body: impl Into<Body>, extensions: Option<&str>) -> TestResponse {
    let mut builder = axum::http::Request::builder()
        .method("POST")
        .uri(routes::EXECUTE_PATH)
        .header("content-type", "application/json");
    if let Some(value) = extensions {
        builder = builder.header(EXTENSIONS_HEADER, value);
    }

    let response = app
        .oneshot(builder.body(body.into()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        body,
    }
}

/// POST a JSON body with the activation header set
pub async fn post_activated(app: Router, body: &Value) -> TestResponse {
    post_raw(app, body.to_string(), Some(EXTENSION_URI)).await
}

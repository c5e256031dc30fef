//! Data models for identities, credentials, decisions and discovery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Long-lived credential material (the verifiable credential) of an agent.
///
/// Only ever sent to the provider when minting; `Debug` never shows it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialMaterial(String);

impl CredentialMaterial {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// A registered agent identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub did: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub vc: CredentialMaterial,
}

/// Outcome of registering an identity at startup
#[derive(Debug, Clone)]
pub enum Registration {
    /// A fresh identity was created
    Created(AgentIdentity),
    /// The name was already taken; the existing record was fetched
    Existing(AgentIdentity),
}

impl Registration {
    pub fn identity(&self) -> &AgentIdentity {
        match self {
            Registration::Created(identity) | Registration::Existing(identity) => identity,
        }
    }

    pub fn into_identity(self) -> AgentIdentity {
        match self {
            Registration::Created(identity) | Registration::Existing(identity) => identity,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

/// Single-use bearer credential, good for exactly one decision call.
///
/// Deliberately not `Clone`: evaluating a decision consumes it.
pub struct OneShotCredential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl OneShotCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn expose(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn into_token(self) -> String {
        self.token
    }
}

impl fmt::Debug for OneShotCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl fmt::Display for OneShotCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Which side of the delegation a decision is evaluated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Requester,
    Executor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::Executor => "executor",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requester" => Ok(Role::Requester),
            "executor" => Ok(Role::Executor),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

const ROLE_KEY: &str = "role";
const REQUESTER_DID_KEY: &str = "requester_agent_did";

/// Caller-supplied attributes handed to the policy engine.
///
/// Well-known attributes are typed; anything else lands in `extra`.
/// `role` and `requester_agent_did` are owned by the protocol and can only
/// be set through [`AuthorizationContext::for_requester`] and
/// [`AuthorizationContext::for_executor`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost_cents: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_budget_remaining_cents: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    requester_agent_did: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthorizationContext {
    /// True when the caller supplied no attributes at all
    pub fn is_empty(&self) -> bool {
        self.purpose.is_none()
            && self.data_classification.is_none()
            && self.region.is_none()
            && self.model.is_none()
            && self.estimated_cost_cents.is_none()
            && self.daily_budget_remaining_cents.is_none()
            && self.pii_detected.is_none()
            && self.request_id.is_none()
            && self.expires_at.is_none()
            && self.extra.is_empty()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn requester_agent_did(&self) -> Option<&str> {
        self.requester_agent_did.as_deref()
    }

    /// Context for evaluating the requester's right to delegate
    pub fn for_requester(&self) -> Self {
        let mut ctx = self.without_protocol_keys();
        ctx.role = Some(Role::Requester);
        ctx
    }

    /// Context for evaluating the executor's right to execute, linked back to
    /// the requester for audit
    pub fn for_executor(&self, requester_did: &str) -> Self {
        let mut ctx = self.without_protocol_keys();
        ctx.role = Some(Role::Executor);
        ctx.requester_agent_did = Some(requester_did.to_string());
        ctx
    }

    fn without_protocol_keys(&self) -> Self {
        let mut ctx = self.clone();
        ctx.extra.remove(ROLE_KEY);
        ctx.extra.remove(REQUESTER_DID_KEY);
        ctx.role = None;
        ctx.requester_agent_did = None;
        ctx
    }
}

/// Allow/deny outcome from the policy engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
        }
    }

    pub fn deny(reason: Option<&str>) -> Self {
        Self {
            allow: false,
            reason: reason.map(str::to_string),
        }
    }

    /// The provider's reason, or `default` when it gave none.
    ///
    /// Empty and whitespace-only reasons count as none.
    pub fn reason_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.reason.as_deref() {
            Some(reason) if !reason.trim().is_empty() => reason,
            _ => default,
        }
    }
}

/// A published policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyArtifact {
    pub policy_id: String,
    pub name: String,
    pub version: String,
}

/// Static discovery descriptor served at `/agent-card`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub capabilities: CardCapabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardCapabilities {
    pub extensions: Vec<ExtensionDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    pub uri: String,
    pub description: String,
    pub required: bool,
    pub params: ExtensionParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionParams {
    pub policy: String,
    pub audience: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credential_material_redacted() {
        let vc = CredentialMaterial::new("vc-secret");
        assert_eq!(format!("{:?}", vc), "[REDACTED]");
        assert_eq!(vc.expose(), "vc-secret");
    }

    #[test]
    fn test_identity_debug_hides_vc() {
        let identity: AgentIdentity = serde_json::from_value(json!({
            "did": "did:web:agents.example.com:summarizer",
            "name": "summarizer",
            "capabilities": ["openai_infer"],
            "vc": "eyJhbGciOi.secret"
        }))
        .unwrap();
        let debug = format!("{:?}", identity);
        assert!(debug.contains("summarizer"));
        assert!(!debug.contains("eyJhbGciOi.secret"));
    }

    #[test]
    fn test_one_shot_credential_redacted() {
        let cred = OneShotCredential::new("tok_abc");
        assert!(!format!("{:?}", cred).contains("tok_abc"));
        assert_eq!(format!("{}", cred), "[REDACTED]");
        assert_eq!(cred.expose(), "tok_abc");
        assert_eq!(cred.into_token(), "tok_abc");
    }

    #[test]
    fn test_registration_accessors() {
        let identity = AgentIdentity {
            did: "did:x".into(),
            name: "x".into(),
            capabilities: vec![],
            vc: CredentialMaterial::new("vc"),
        };
        let created = Registration::Created(identity.clone());
        assert!(created.is_created());
        let existing = Registration::Existing(identity);
        assert!(!existing.is_created());
        assert_eq!(existing.identity().did, "did:x");
        assert_eq!(existing.into_identity().name, "x");
    }

    #[test]
    fn test_role_round_trip_str() {
        assert_eq!(Role::Requester.as_str(), "requester");
        assert_eq!("executor".parse::<Role>().unwrap(), Role::Executor);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_context_keeps_unknown_attributes() {
        let ctx: AuthorizationContext = serde_json::from_value(json!({
            "model": "gemini-1.5-pro",
            "estimated_cost_cents": 15,
            "tenant": "acme"
        }))
        .unwrap();
        assert_eq!(ctx.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(ctx.extra["tenant"], "acme");

        let out = serde_json::to_value(&ctx).unwrap();
        assert_eq!(out["estimated_cost_cents"], 15);
        assert_eq!(out["tenant"], "acme");
        assert!(out.get("role").is_none());
    }

    #[test]
    fn test_context_rejects_ill_typed_well_known_attribute() {
        let result: Result<AuthorizationContext, _> =
            serde_json::from_value(json!({"pii_detected": "nope"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_context_is_empty() {
        assert!(AuthorizationContext::default().is_empty());
        let ctx: AuthorizationContext = serde_json::from_value(json!({"x": 1})).unwrap();
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_for_requester_injects_role() {
        let ctx: AuthorizationContext =
            serde_json::from_value(json!({"region": "US"})).unwrap();
        let out = serde_json::to_value(ctx.for_requester()).unwrap();
        assert_eq!(out["role"], "requester");
        assert_eq!(out["region"], "US");
        assert!(out.get("requester_agent_did").is_none());
    }

    #[test]
    fn test_for_executor_injects_role_and_back_reference() {
        let ctx: AuthorizationContext =
            serde_json::from_value(json!({"region": "US"})).unwrap();
        let scoped = ctx.for_executor("did:web:agents.example.com:triage");
        assert_eq!(scoped.role(), Some(Role::Executor));
        let out = serde_json::to_value(scoped).unwrap();
        assert_eq!(out["role"], "executor");
        assert_eq!(out["requester_agent_did"], "did:web:agents.example.com:triage");
    }

    #[test]
    fn test_caller_cannot_spoof_protocol_keys() {
        let ctx: AuthorizationContext = serde_json::from_value(json!({
            "role": "executor",
            "requester_agent_did": "did:forged"
        }))
        .unwrap();

        let requester = serde_json::to_value(ctx.for_requester()).unwrap();
        assert_eq!(requester["role"], "requester");
        assert!(requester.get("requester_agent_did").is_none());

        let executor = serde_json::to_value(ctx.for_executor("did:real")).unwrap();
        assert_eq!(executor["requester_agent_did"], "did:real");
    }

    #[test]
    fn test_reason_or_default() {
        let decision = PolicyDecision::deny(Some("budget exceeded"));
        assert_eq!(decision.reason_or("default"), "budget exceeded");

        assert_eq!(PolicyDecision::deny(None).reason_or("default"), "default");
        assert_eq!(PolicyDecision::deny(Some("")).reason_or("default"), "default");
        assert_eq!(PolicyDecision::deny(Some("  ")).reason_or("default"), "default");
    }

    #[test]
    fn test_policy_decision_deserialization() {
        let decision: PolicyDecision = serde_json::from_str(r#"{"allow": true}"#).unwrap();
        assert_eq!(decision, PolicyDecision::allow());
    }
}

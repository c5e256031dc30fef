//! HTTP client for the identity & policy provider

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{DecisionRequest, MintRequest, PolicyProvider, PublishRequest};
use crate::error::{AppError, Result};
use crate::models::{
    AgentIdentity, AuthorizationContext, OneShotCredential, PolicyArtifact, PolicyDecision,
    Registration,
};

const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_DID_PREFIX: &str = "did:web:agents.example.com";

/// Provider client over HTTP
pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: String,
    did_prefix: String,
}

impl HttpProvider {
    /// Create a client whose every call is bounded by `timeout`
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            did_prefix: DEFAULT_DID_PREFIX.to_string(),
        })
    }

    /// Prefix used to derive a well-known DID from an agent name
    pub fn with_did_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.did_prefix = prefix.into();
        self
    }

    /// The deterministic DID under which `name` is registered
    pub fn did_for(&self, name: &str) -> String {
        format!("{}:{}", self.did_prefix, name)
    }

    /// Register a new agent identity
    pub async fn register_agent(&self, name: &str, capabilities: &[String]) -> Result<AgentIdentity> {
        let response = self
            .client
            .post(format!("{}/agents", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&RegisterAgentBody {
                agent_name: name,
                capabilities,
            })
            .send()
            .await
            .map_err(|e| AppError::from_transport("agent registration", e))?;

        let response = check_status(response, "agent registration")?;
        response
            .json()
            .await
            .map_err(|e| AppError::from_transport("agent registration", e))
    }

    /// Fetch an existing agent identity by DID
    pub async fn get_agent(&self, did: &str) -> Result<AgentIdentity> {
        let response = self
            .client
            .get(format!("{}/agents/{}", self.base_url, did))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::from_transport("agent lookup", e))?;

        let response = check_status(response, "agent lookup")?;
        response
            .json()
            .await
            .map_err(|e| AppError::from_transport("agent lookup", e))
    }
}

#[async_trait]
impl PolicyProvider for HttpProvider {
    async fn register_or_fetch_identity(
        &self,
        name: &str,
        capabilities: &[String],
    ) -> Result<Registration> {
        match self.register_agent(name, capabilities).await {
            Ok(identity) => Ok(Registration::Created(identity)),
            Err(register_err) => {
                let did = self.did_for(name);
                tracing::warn!(
                    "Registration of {} failed ({}), fetching existing identity {}",
                    name,
                    register_err,
                    did
                );
                match self.get_agent(&did).await {
                    Ok(identity) => Ok(Registration::Existing(identity)),
                    Err(fetch_err) => Err(AppError::Provider(format!(
                        "could not register or fetch {}: {}; {}",
                        name, register_err, fetch_err
                    ))),
                }
            }
        }
    }

    async fn mint_credential(&self, request: MintRequest<'_>) -> Result<Option<OneShotCredential>> {
        let response = self
            .client
            .post(format!("{}/auth/token", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&TokenBody {
                agent_did: &request.identity.did,
                vc: request.identity.vc.expose(),
                audience: request.audience,
                action: request.action,
                resource: request.resource,
            })
            .send()
            .await
            .map_err(|e| AppError::from_transport("credential mint", e))?;

        let response = check_status(response, "credential mint")?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::from_transport("credential mint", e))?;

        token.into_credential()
    }

    async fn evaluate_policy(&self, request: DecisionRequest<'_>) -> Result<PolicyDecision> {
        let DecisionRequest {
            agent_did,
            policy_id,
            credential,
            action,
            resource,
            context,
        } = request;

        let response = self
            .client
            .post(format!("{}/policies/decision", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&DecisionBody {
                agent_did,
                policy_id,
                token: credential.expose(),
                action,
                resource,
                context: &context,
            })
            .send()
            .await
            .map_err(|e| AppError::from_transport("policy decision", e))?;

        let response = check_status(response, "policy decision")?;
        response
            .json()
            .await
            .map_err(|e| AppError::from_transport("policy decision", e))
    }

    async fn publish_policy(&self, request: PublishRequest<'_>) -> Result<PolicyArtifact> {
        let response = self
            .client
            .post(format!("{}/policies", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&PublishBody {
                config_type: request.kind,
                policy_content: request.content,
                metadata: PolicyMetadata {
                    name: request.name,
                    version: request.version,
                },
            })
            .send()
            .await
            .map_err(|e| AppError::from_transport("policy publish", e))?;

        let response = check_status(response, "policy publish")?;
        let published: PublishResponse = response
            .json()
            .await
            .map_err(|e| AppError::from_transport("policy publish", e))?;

        Ok(PolicyArtifact {
            policy_id: published.policy_id,
            name: request.name.to_string(),
            version: request.version.to_string(),
        })
    }
}

/// Turn a non-success status into a provider error.
///
/// The response body is not echoed: it may quote the submitted token.
fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AppError::Provider(format!(
            "{} failed with status {}",
            operation, status
        )))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct RegisterAgentBody<'a> {
    agent_name: &'a str,
    capabilities: &'a [String],
}

#[derive(Serialize)]
struct TokenBody<'a> {
    agent_did: &'a str,
    vc: &'a str,
    audience: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// `Ok(None)` when no token was issued; an out-of-range expiry is malformed
    fn into_credential(self) -> Result<Option<OneShotCredential>> {
        let Some(token) = self.access_token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let credential = OneShotCredential::new(token);
        let Some(secs) = self.expires_in else {
            return Ok(Some(credential));
        };

        let expires_at = chrono::Duration::try_seconds(secs)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::Provider("credential mint: malformed provider response".to_string())
            })?;
        Ok(Some(credential.with_expiry(expires_at)))
    }
}

#[derive(Serialize)]
struct DecisionBody<'a> {
    agent_did: &'a str,
    policy_id: &'a str,
    token: &'a str,
    action: &'a str,
    resource: &'a str,
    context: &'a AuthorizationContext,
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    config_type: &'a str,
    policy_content: &'a str,
    metadata: PolicyMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct PolicyMetadata<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "policyId")]
    policy_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let provider =
            HttpProvider::new("http://localhost:9000/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(provider.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_did_for_uses_prefix() {
        let provider = HttpProvider::new("http://localhost", "key", Duration::from_secs(5))
            .unwrap()
            .with_did_prefix("did:web:agents.identitymachines.com");
        assert_eq!(
            provider.did_for("a2asummarizer"),
            "did:web:agents.identitymachines.com:a2asummarizer"
        );
    }

    #[test]
    fn test_token_response_without_token() {
        let token: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(token.into_credential().unwrap().is_none());

        let token: TokenResponse = serde_json::from_str(r#"{"access_token": ""}"#).unwrap();
        assert!(token.into_credential().unwrap().is_none());
    }

    #[test]
    fn test_token_response_with_expiry() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "tok", "expires_in": 60}"#).unwrap();
        let credential = token.into_credential().unwrap().unwrap();
        assert_eq!(credential.expose(), "tok");
        assert!(credential.expires_at().unwrap() > Utc::now());
    }

    #[test]
    fn test_token_response_with_out_of_range_expiry() {
        for secs in [i64::MAX, i64::MIN] {
            let token = TokenResponse {
                access_token: Some("tok".to_string()),
                expires_in: Some(secs),
            };
            let err = token.into_credential().unwrap_err();
            assert!(matches!(err, AppError::Provider(_)));
        }
    }

    #[test]
    fn test_token_body_omits_unscoped_fields() {
        let body = TokenBody {
            agent_did: "did:x",
            vc: "vc",
            audience: "aud",
            action: None,
            resource: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("action").is_none());
        assert!(json.get("resource").is_none());
    }

    #[test]
    fn test_publish_response_deserialization() {
        let published: PublishResponse =
            serde_json::from_str(r#"{"policyId": "pol_123"}"#).unwrap();
        assert_eq!(published.policy_id, "pol_123");
    }
}

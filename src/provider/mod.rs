//! Identity & policy provider
//!
//! The provider issues one-shot credentials, evaluates policy decisions and
//! stores policy documents. [`PolicyProvider`] is the seam; [`HttpProvider`]
//! talks to a real deployment.

mod http;

pub use http::HttpProvider;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AgentIdentity, AuthorizationContext, OneShotCredential, PolicyArtifact, PolicyDecision,
    Registration,
};

/// Parameters for minting a one-shot credential
#[derive(Debug, Clone, Copy)]
pub struct MintRequest<'a> {
    pub identity: &'a AgentIdentity,
    pub audience: &'a str,
    pub action: Option<&'a str>,
    pub resource: Option<&'a str>,
}

/// Parameters for a single policy decision. Consumes the credential.
#[derive(Debug)]
pub struct DecisionRequest<'a> {
    pub agent_did: &'a str,
    pub policy_id: &'a str,
    pub credential: OneShotCredential,
    pub action: &'a str,
    pub resource: &'a str,
    pub context: AuthorizationContext,
}

/// Parameters for publishing a policy document
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub kind: &'a str,
    pub content: &'a str,
    pub name: &'a str,
    pub version: &'a str,
}

#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// Register `name`, or fetch the existing identity if it is taken
    async fn register_or_fetch_identity(
        &self,
        name: &str,
        capabilities: &[String],
    ) -> Result<Registration>;

    /// Mint a fresh one-shot credential; `None` when the provider issued none
    async fn mint_credential(&self, request: MintRequest<'_>) -> Result<Option<OneShotCredential>>;

    /// Evaluate one policy decision
    async fn evaluate_policy(&self, request: DecisionRequest<'_>) -> Result<PolicyDecision>;

    /// Publish (or overwrite) a policy document
    async fn publish_policy(&self, request: PublishRequest<'_>) -> Result<PolicyArtifact>;
}

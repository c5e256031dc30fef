//! Startup bootstrap: register the executor identity and publish its policy
//!
//! Runs once, before the listener is bound. The resulting [`BootContext`] is
//! immutable and shared by every request.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{AgentIdentity, PolicyArtifact, Registration};
use crate::provider::{PolicyProvider, PublishRequest};

/// Policy engine the published document is written for
pub const POLICY_KIND: &str = "opa";

/// Everything a request needs from startup
#[derive(Debug, Clone)]
pub struct BootContext {
    pub identity: AgentIdentity,
    pub policy: PolicyArtifact,
    pub audience: String,
}

/// Inputs to [`bootstrap`]
#[derive(Debug, Clone)]
pub struct BootSettings {
    pub agent_name: String,
    pub capabilities: Vec<String>,
    pub audience: String,
    pub policy_path: PathBuf,
    pub policy_name: String,
    pub policy_version: String,
}

impl From<&Config> for BootSettings {
    fn from(config: &Config) -> Self {
        Self {
            agent_name: config.agent_name.clone(),
            capabilities: config.capabilities.clone(),
            audience: config.audience.clone(),
            policy_path: config.policy_path.clone(),
            policy_name: config.policy_name.clone(),
            policy_version: config.policy_version.clone(),
        }
    }
}

pub async fn bootstrap(provider: &dyn PolicyProvider, settings: &BootSettings) -> Result<BootContext> {
    let identity = register_identity(provider, &settings.agent_name, &settings.capabilities).await?;

    let content = tokio::fs::read_to_string(&settings.policy_path)
        .await
        .map_err(|e| {
            AppError::Config(format!(
                "Failed to read policy {}: {}",
                settings.policy_path.display(),
                e
            ))
        })?;

    let policy = publish_policy(
        provider,
        &content,
        &settings.policy_name,
        &settings.policy_version,
    )
    .await?;

    Ok(BootContext {
        identity,
        policy,
        audience: settings.audience.clone(),
    })
}

/// Register under `name`, falling back to the existing identity
pub async fn register_identity(
    provider: &dyn PolicyProvider,
    name: &str,
    capabilities: &[String],
) -> Result<AgentIdentity> {
    let registration = provider.register_or_fetch_identity(name, capabilities).await?;
    match &registration {
        Registration::Created(identity) => {
            tracing::info!("Registered agent {} as {}", identity.name, identity.did);
        }
        Registration::Existing(identity) => {
            tracing::info!("Using existing agent {} ({})", identity.name, identity.did);
        }
    }
    Ok(registration.into_identity())
}

/// Publish the policy document; republishing overwrites the previous version
pub async fn publish_policy(
    provider: &dyn PolicyProvider,
    content: &str,
    name: &str,
    version: &str,
) -> Result<PolicyArtifact> {
    if content.trim().is_empty() {
        return Err(AppError::Config(format!("Policy {} is empty", name)));
    }

    let artifact = provider
        .publish_policy(PublishRequest {
            kind: POLICY_KIND,
            content,
            name,
            version,
        })
        .await?;

    tracing::info!(
        "Published policy {} v{} as {}",
        artifact.name,
        artifact.version,
        artifact.policy_id
    );
    Ok(artifact)
}

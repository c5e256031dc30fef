//! Executor configuration, from flags or environment

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Parser)]
#[command(name = "a2a-gate")]
#[command(about = "Policy-gated A2A executor agent")]
#[command(version)]
pub struct Config {
    /// Base URL of the identity & policy provider
    #[arg(long, env = "PROVIDER_URL", default_value = "http://localhost:8080")]
    pub provider_url: String,

    /// API key for the provider
    #[arg(long, env = "PROVIDER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Audience one-shot credentials are minted for
    #[arg(long, env = "PROVIDER_AUDIENCE", default_value = "https://api.example.com")]
    pub audience: String,

    /// Prefix of the well-known DID derived from an agent name
    #[arg(long, env = "DID_PREFIX", default_value = "did:web:agents.example.com")]
    pub did_prefix: String,

    /// Name this executor registers under
    #[arg(long, env = "AGENT_NAME", default_value = "a2asummarizer")]
    pub agent_name: String,

    /// Capabilities requested at registration (comma separated)
    #[arg(
        long,
        env = "AGENT_CAPABILITIES",
        value_delimiter = ',',
        default_value = "openai_infer"
    )]
    pub capabilities: Vec<String>,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// Policy document published at startup
    #[arg(long, env = "POLICY_PATH", default_value = "policies/llm_guard.rego")]
    pub policy_path: PathBuf,

    #[arg(long, env = "POLICY_NAME", default_value = "llm_guard_v1")]
    pub policy_name: String,

    #[arg(long, env = "POLICY_VERSION", default_value = "1.0")]
    pub policy_version: String,

    /// Upper bound on every provider call
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = 30)]
    pub provider_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider_url", &self.provider_url)
            .field("api_key", &"[REDACTED]")
            .field("audience", &self.audience)
            .field("did_prefix", &self.did_prefix)
            .field("agent_name", &self.agent_name)
            .field("capabilities", &self.capabilities)
            .field("bind_addr", &self.bind_addr())
            .field("policy_path", &self.policy_path)
            .field("policy_name", &self.policy_name)
            .field("policy_version", &self.policy_version)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

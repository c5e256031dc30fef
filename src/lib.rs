//! a2a-gate - policy-gated agent-to-agent delegation
//!
//! An executor agent accepts `task/execute` requests from requester agents.
//! Both the requester and the executor are evaluated by an external policy
//! provider before anything is executed.

pub mod bootstrap;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extension;
pub mod flow;
pub mod models;
pub mod provider;
pub mod routes;

use std::sync::Arc;

use crate::bootstrap::BootContext;
use crate::models::AgentCard;
use crate::provider::PolicyProvider;

/// Application state shared across handlers.
///
/// Only constructible from a completed [`BootContext`], so no handler can run
/// before bootstrap has finished.
pub struct AppState {
    pub provider: Arc<dyn PolicyProvider>,
    pub boot: BootContext,
    pub card: AgentCard,
}

impl AppState {
    pub fn new(provider: Arc<dyn PolicyProvider>, boot: BootContext) -> Arc<Self> {
        let card = extension::agent_card(&boot.identity.name, &boot.policy.name, &boot.audience);
        Arc::new(Self {
            provider,
            boot,
            card,
        })
    }
}

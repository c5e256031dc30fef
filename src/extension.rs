//! A2A extension activation
//!
//! A caller opts into policy-gated delegation by listing the extension URI in
//! the `X-A2A-Extensions` header. Without it the executor refuses the request
//! before looking at the body.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::{AgentCard, CardCapabilities, ExtensionDescriptor, ExtensionParams};

/// Identifier of the policy-gated delegation extension
pub const EXTENSION_URI: &str = "urn:a2a:ext:policy-gated-delegation:v1";

/// Capability-list header, sent by callers and echoed on activation
pub const EXTENSIONS_HEADER: &str = "x-a2a-extensions";

/// Namespaced metadata keys carried in `params.metadata`
pub const ACTION_FIELD: &str = "action";
pub const RESOURCE_FIELD: &str = "resource";
pub const CONTEXT_FIELD: &str = "context";
pub const AUTH_TOKEN_FIELD: &str = "auth_token";
pub const AGENT_DID_FIELD: &str = "agent_did";

/// Parse a capability-list header value into a set of extension identifiers
pub fn requested_extensions(header: &str) -> HashSet<&str> {
    header
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reject unless the caller advertised [`EXTENSION_URI`]
pub fn check_activation(header: Option<&str>) -> Result<()> {
    let requested = header.map(requested_extensions).unwrap_or_default();
    if requested.contains(EXTENSION_URI) {
        Ok(())
    } else {
        Err(AppError::Activation(format!(
            "caller did not request extension {}",
            EXTENSION_URI
        )))
    }
}

/// Build the discovery card advertised by the executor
pub fn agent_card(agent_name: &str, policy_name: &str, audience: &str) -> AgentCard {
    AgentCard {
        name: agent_name.to_string(),
        capabilities: CardCapabilities {
            extensions: vec![ExtensionDescriptor {
                uri: EXTENSION_URI.to_string(),
                description: "Policy-gated LLM calls (one-shot token + decision)".to_string(),
                required: false,
                params: ExtensionParams {
                    policy: policy_name.to_string(),
                    audience: audience.to_string(),
                },
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_extensions_trims_and_dedups() {
        let set = requested_extensions(" a , b,,a ,  ");
        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(set.contains("b"));
    }

    #[test]
    fn test_activation_accepts_exact_uri() {
        assert!(check_activation(Some(EXTENSION_URI)).is_ok());
    }

    #[test]
    fn test_activation_accepts_uri_among_others() {
        let header = format!("urn:other:ext, {} ,urn:third", EXTENSION_URI);
        assert!(check_activation(Some(&header)).is_ok());
    }

    #[test]
    fn test_activation_rejects_missing_header() {
        let err = check_activation(None).unwrap_err();
        assert!(matches!(err, AppError::Activation(_)));
    }

    #[test]
    fn test_activation_rejects_empty_header() {
        assert!(check_activation(Some("")).is_err());
        assert!(check_activation(Some(" , ,")).is_err());
    }

    #[test]
    fn test_activation_rejects_prefix_match() {
        let header = format!("{}-beta", EXTENSION_URI);
        assert!(check_activation(Some(&header)).is_err());
    }

    #[test]
    fn test_agent_card_shape() {
        let card = agent_card("a2asummarizer", "llm_guard_v1", "https://api.example.com");
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["name"], "a2asummarizer");
        let ext = &json["capabilities"]["extensions"][0];
        assert_eq!(ext["uri"], EXTENSION_URI);
        assert_eq!(ext["required"], false);
        assert_eq!(ext["params"]["policy"], "llm_guard_v1");
        assert_eq!(ext["params"]["audience"], "https://api.example.com");
    }
}

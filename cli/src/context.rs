//! Authorization context sent along with a delegation

use a2a_gate::models::AuthorizationContext;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::Number;

/// How long a delegation request stays valid
const REQUEST_TTL_MINUTES: i64 = 5;

/// Attributes the requester asserts about the call it wants made
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub purpose: String,
    pub data_classification: String,
    pub region: String,
    pub model: String,
    pub estimated_cost_cents: u64,
    pub daily_budget_remaining_cents: u64,
    pub pii_detected: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            purpose: "assistant".to_string(),
            data_classification: "internal".to_string(),
            region: "US".to_string(),
            model: "gemini-1.5-pro".to_string(),
            estimated_cost_cents: 15,
            daily_budget_remaining_cents: 500,
            pii_detected: false,
        }
    }
}

impl ContextOptions {
    /// Build the context with a fresh request id and a short expiry
    pub fn build(&self) -> AuthorizationContext {
        let mut ctx = AuthorizationContext::default();
        ctx.purpose = Some(self.purpose.clone());
        ctx.data_classification = Some(self.data_classification.clone());
        ctx.region = Some(self.region.clone());
        ctx.model = Some(self.model.clone());
        ctx.estimated_cost_cents = Some(Number::from(self.estimated_cost_cents));
        ctx.daily_budget_remaining_cents = Some(Number::from(self.daily_budget_remaining_cents));
        ctx.pii_detected = Some(self.pii_detected);
        ctx.request_id = Some(format!("rq_{}", uuid::Uuid::new_v4().simple()));
        ctx.expires_at = Some(
            (Utc::now() + Duration::minutes(REQUEST_TTL_MINUTES))
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        ctx
    }
}

//! HTTP routes

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

use crate::error::{AppError, RpcFailure};
use crate::extension::{EXTENSIONS_HEADER, EXTENSION_URI};
use crate::flow::{DelegationFlow, FlowState};
use crate::models::AgentCard;
use crate::AppState;

pub const HEALTH_PATH: &str = "/health";
pub const AGENT_CARD_PATH: &str = "/agent-card";
pub const EXECUTE_PATH: &str = "/agents/summarizer";

/// Largest request body accepted on the execute path
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(AGENT_CARD_PATH, get(agent_card))
        .route(EXECUTE_PATH, post(execute))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn agent_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

/// `task/execute` entry point.
///
/// Takes the raw body so the activation header is checked before any byte of
/// the body is read.
async fn execute(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Body) -> Response {
    match run_flow(&state, &headers, body).await {
        Ok(response) => response,
        Err(failure) => failure.into_response(),
    }
}

/// Repeated capability-list lines are one comma-joined list
fn extensions_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(EXTENSIONS_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

async fn run_flow(state: &AppState, headers: &HeaderMap, body: Body) -> Result<Response, RpcFailure> {
    let mut flow = DelegationFlow::new(state);

    let header = extensions_header(headers);
    flow.activate(header.as_deref())?;

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return Err(flow.fail(
                FlowState::ParseFailed,
                AppError::Parse(format!("Failed to read body: {}", e)),
            ))
        }
    };

    let request = flow.parse(&bytes)?;
    let envelope = flow.validate(request)?;
    let result = flow.authorize_and_execute(envelope).await?;

    let mut response = Json(result).into_response();
    response.headers_mut().insert(
        EXTENSIONS_HEADER,
        HeaderValue::from_static(EXTENSION_URI),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions_header_joins_repeated_lines() {
        let mut headers = HeaderMap::new();
        headers.append(EXTENSIONS_HEADER, HeaderValue::from_static("urn:other:ext"));
        headers.append(EXTENSIONS_HEADER, HeaderValue::from_static(EXTENSION_URI));

        let joined = extensions_header(&headers).unwrap();
        assert_eq!(joined, format!("urn:other:ext,{}", EXTENSION_URI));
    }

    #[test]
    fn test_extensions_header_absent() {
        assert!(extensions_header(&HeaderMap::new()).is_none());
    }
}

//! Delegation authorization flow
//!
//! One flow per inbound request. The flow walks a fixed sequence of states:
//!
//! ```text
//! RECEIVED -> ACTIVATION_CHECKED -> PARSED -> METADATA_VALIDATED
//!   -> REQUESTER_AUTHORIZED -> EXECUTOR_CREDENTIAL_MINTED
//!   -> EXECUTOR_AUTHORIZED -> EXECUTED
//! ```
//!
//! Each step may instead end in its terminal failure state. The requester's
//! credential only proves the right to delegate; the executor always mints
//! its own credential and is evaluated separately, so nothing runs unless
//! both decisions allow it.

use uuid::Uuid;

use crate::envelope::{self, DelegationEnvelope, RpcRequest, RpcResponse, TaskMessage};
use crate::error::{
    AppError, RpcFailure, DEFAULT_EXECUTOR_DENIAL, DEFAULT_REQUESTER_DENIAL, EXECUTOR_MINT_FAILURE,
};
use crate::extension;
use crate::models::{AuthorizationContext, OneShotCredential};
use crate::provider::{DecisionRequest, MintRequest};
use crate::AppState;

/// Where a request is in the delegation flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Received,
    ActivationChecked,
    Parsed,
    MetadataValidated,
    RequesterAuthorized,
    ExecutorCredentialMinted,
    ExecutorAuthorized,
    Executed,
    ActivationRejected,
    ParseFailed,
    MetadataInvalid,
    RequesterDenied,
    MintFailed,
    ExecutorDenied,
    /// A provider call failed in transport or timed out
    ProviderFailed,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Received => "received",
            FlowState::ActivationChecked => "activation_checked",
            FlowState::Parsed => "parsed",
            FlowState::MetadataValidated => "metadata_validated",
            FlowState::RequesterAuthorized => "requester_authorized",
            FlowState::ExecutorCredentialMinted => "executor_credential_minted",
            FlowState::ExecutorAuthorized => "executor_authorized",
            FlowState::Executed => "executed",
            FlowState::ActivationRejected => "activation_rejected",
            FlowState::ParseFailed => "parse_failed",
            FlowState::MetadataInvalid => "metadata_invalid",
            FlowState::RequesterDenied => "requester_denied",
            FlowState::MintFailed => "mint_failed",
            FlowState::ExecutorDenied => "executor_denied",
            FlowState::ProviderFailed => "provider_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Executed
                | FlowState::ActivationRejected
                | FlowState::ParseFailed
                | FlowState::MetadataInvalid
                | FlowState::RequesterDenied
                | FlowState::MintFailed
                | FlowState::ExecutorDenied
                | FlowState::ProviderFailed
        )
    }

    pub fn can_transition_to(&self, next: FlowState) -> bool {
        use FlowState::*;
        matches!(
            (self, next),
            (Received, ActivationChecked | ActivationRejected)
                | (ActivationChecked, Parsed | ParseFailed)
                | (Parsed, MetadataValidated | MetadataInvalid)
                | (MetadataValidated, RequesterAuthorized | RequesterDenied | ProviderFailed)
                | (RequesterAuthorized, ExecutorCredentialMinted | MintFailed | ProviderFailed)
                | (ExecutorCredentialMinted, ExecutorAuthorized | ExecutorDenied | ProviderFailed)
                | (ExecutorAuthorized, Executed)
        )
    }
}

/// Drives a single request through the flow
pub struct DelegationFlow<'a> {
    state: &'a AppState,
    trace_id: Uuid,
    current: FlowState,
    history: Vec<FlowState>,
    correlation_id: Option<String>,
}

impl<'a> DelegationFlow<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            trace_id: Uuid::new_v4(),
            current: FlowState::Received,
            history: vec![FlowState::Received],
            correlation_id: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.current
    }

    pub fn history(&self) -> &[FlowState] {
        &self.history
    }

    fn transition(&mut self, next: FlowState) -> Result<(), RpcFailure> {
        if !self.current.can_transition_to(next) {
            return Err(RpcFailure::new(
                self.correlation_id.clone(),
                AppError::Internal(format!(
                    "illegal flow transition {} -> {}",
                    self.current.as_str(),
                    next.as_str()
                )),
            ));
        }
        tracing::debug!(
            trace_id = %self.trace_id,
            id = ?self.correlation_id,
            "flow {} -> {}",
            self.current.as_str(),
            next.as_str()
        );
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Move into a terminal failure state and build the failure to return
    pub fn fail(&mut self, next: FlowState, error: AppError) -> RpcFailure {
        if let Err(illegal) = self.transition(next) {
            return illegal;
        }
        RpcFailure::new(self.correlation_id.clone(), error)
    }

    /// Gate on the capability-list header. The body is untouched.
    pub fn activate(&mut self, header: Option<&str>) -> Result<(), RpcFailure> {
        match extension::check_activation(header) {
            Ok(()) => self.transition(FlowState::ActivationChecked),
            Err(e) => Err(self.fail(FlowState::ActivationRejected, e)),
        }
    }

    pub fn parse(&mut self, body: &[u8]) -> Result<RpcRequest, RpcFailure> {
        match envelope::parse_request(body) {
            Ok(request) => {
                self.correlation_id = Some(request.id.clone());
                self.transition(FlowState::Parsed)?;
                Ok(request)
            }
            Err(failure) => {
                self.correlation_id = failure.id.clone();
                Err(self.fail(FlowState::ParseFailed, failure.error))
            }
        }
    }

    pub fn validate(&mut self, request: RpcRequest) -> Result<DelegationEnvelope, RpcFailure> {
        match envelope::validate(request) {
            Ok(envelope) => {
                self.transition(FlowState::MetadataValidated)?;
                Ok(envelope)
            }
            Err(e) => Err(self.fail(FlowState::MetadataInvalid, e)),
        }
    }

    /// Run both decisions and, if both allow, execute the task
    pub async fn authorize_and_execute(
        &mut self,
        envelope: DelegationEnvelope,
    ) -> Result<RpcResponse, RpcFailure> {
        let DelegationEnvelope {
            id,
            message,
            metadata,
            ..
        } = envelope;

        self.authorize_requester(
            metadata.requester_token,
            &metadata.requester_did,
            &metadata.action,
            &metadata.resource,
            &metadata.context,
        )
        .await?;

        let credential = self
            .mint_executor_credential(&metadata.action, &metadata.resource)
            .await?;

        self.authorize_executor(
            credential,
            &metadata.requester_did,
            &metadata.action,
            &metadata.resource,
            &metadata.context,
        )
        .await?;

        let result = self.execute(&message, &metadata.context)?;
        Ok(RpcResponse::new(id, result))
    }

    async fn authorize_requester(
        &mut self,
        credential: OneShotCredential,
        requester_did: &str,
        action: &str,
        resource: &str,
        context: &AuthorizationContext,
    ) -> Result<(), RpcFailure> {
        let decision = self
            .state
            .provider
            .evaluate_policy(DecisionRequest {
                agent_did: requester_did,
                policy_id: &self.state.boot.policy.policy_id,
                credential,
                action,
                resource,
                context: context.for_requester(),
            })
            .await;

        match decision {
            Ok(decision) if decision.allow => self.transition(FlowState::RequesterAuthorized),
            Ok(decision) => {
                let reason = decision.reason_or(DEFAULT_REQUESTER_DENIAL).to_string();
                tracing::warn!(
                    trace_id = %self.trace_id,
                    requester = requester_did,
                    action,
                    resource,
                    "Requester denied: {}",
                    reason
                );
                Err(self.fail(FlowState::RequesterDenied, AppError::RequesterDenied(reason)))
            }
            Err(e) => Err(self.fail(FlowState::ProviderFailed, e)),
        }
    }

    async fn mint_executor_credential(
        &mut self,
        action: &str,
        resource: &str,
    ) -> Result<OneShotCredential, RpcFailure> {
        let boot = &self.state.boot;
        let minted = self
            .state
            .provider
            .mint_credential(MintRequest {
                identity: &boot.identity,
                audience: &boot.audience,
                action: Some(action),
                resource: Some(resource),
            })
            .await;

        match minted {
            Ok(Some(credential)) => {
                self.transition(FlowState::ExecutorCredentialMinted)?;
                Ok(credential)
            }
            Ok(None) => Err(self.fail(
                FlowState::MintFailed,
                AppError::MintFailed(EXECUTOR_MINT_FAILURE.to_string()),
            )),
            Err(e) => Err(self.fail(FlowState::ProviderFailed, e)),
        }
    }

    async fn authorize_executor(
        &mut self,
        credential: OneShotCredential,
        requester_did: &str,
        action: &str,
        resource: &str,
        context: &AuthorizationContext,
    ) -> Result<(), RpcFailure> {
        let boot = &self.state.boot;
        let decision = self
            .state
            .provider
            .evaluate_policy(DecisionRequest {
                agent_did: &boot.identity.did,
                policy_id: &boot.policy.policy_id,
                credential,
                action,
                resource,
                context: context.for_executor(requester_did),
            })
            .await;

        match decision {
            Ok(decision) if decision.allow => self.transition(FlowState::ExecutorAuthorized),
            Ok(decision) => {
                let reason = decision.reason_or(DEFAULT_EXECUTOR_DENIAL).to_string();
                tracing::warn!(
                    trace_id = %self.trace_id,
                    requester = requester_did,
                    action,
                    resource,
                    "Executor denied: {}",
                    reason
                );
                Err(self.fail(FlowState::ExecutorDenied, AppError::ExecutorDenied(reason)))
            }
            Err(e) => Err(self.fail(FlowState::ProviderFailed, e)),
        }
    }

    fn execute(
        &mut self,
        message: &TaskMessage,
        context: &AuthorizationContext,
    ) -> Result<String, RpcFailure> {
        self.transition(FlowState::Executed)?;
        let result = demo_result(message, &self.state.boot.identity.name, context);
        tracing::info!(
            trace_id = %self.trace_id,
            id = ?self.correlation_id,
            task = message.task(),
            "Delegated task executed"
        );
        Ok(result)
    }
}

/// Stand-in for the executor's real work
pub fn demo_result(message: &TaskMessage, executor_name: &str, context: &AuthorizationContext) -> String {
    format!(
        "[Demo] {} task succeeded OK for {}, ran by {} using model={}",
        message.task(),
        message.input_ref(),
        executor_name,
        context.model.as_deref().unwrap_or("unspecified")
    )
}

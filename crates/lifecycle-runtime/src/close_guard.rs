//! Close guard: reverts issue closes that violate the linked-pull-request policy.
//!
//! One event runs strictly in sequence: policy check, linked-pull-request
//! check, operate-log fetch, prior-state extraction, state-id resolution,
//! revert, and finally the actor notification. Every remote call is attempted
//! at most once. Only transport failures (no HTTP response at all) are returned
//! to the caller. A status or body the platform rejected ends handling with
//! [`CloseGuardOutcome::CollaboratorRejected`], and the remaining soft failures
//! end with their own logged outcome.

use std::sync::Arc;

use async_trait::async_trait;
use lifecycle_core::issue_comment::{render_linked_pull_request_required_comment, CLOSE_ACTION};
use lifecycle_core::issue_event::IssueEvent;
use lifecycle_core::operate_log::{prior_state, OperateLog};
use lifecycle_core::policy_config::LifecycleConfig;

use crate::error::LifecycleError;

pub const LIST_PULL_REQUESTS_OPERATION: &str = "list issue pull requests";
pub const LIST_OPERATE_LOGS_OPERATION: &str = "list issue operate logs";
pub const UPDATE_ISSUE_STATE_OPERATION: &str = "update issue state";
pub const CREATE_COMMENT_OPERATION: &str = "create issue comment";

#[async_trait]
/// Trait contract for the repository-level issue calls the close guard depends on.
pub trait IssueCollaborator: Send + Sync {
    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: &str,
        body: &str,
    ) -> Result<(), LifecycleError>;

    async fn has_linked_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        number: &str,
    ) -> Result<bool, LifecycleError>;

    async fn get_issue_operate_logs(
        &self,
        owner: &str,
        repo: &str,
        number: &str,
    ) -> Result<Vec<OperateLog>, LifecycleError>;
}

#[async_trait]
/// Trait contract for the enterprise workflow-state calls.
pub trait WorkflowStateApi: Send + Sync {
    /// Platform id of the workflow state titled `state_name`; `None` covers every lookup failure.
    async fn resolve_state_id(&self, state_name: &str) -> Option<u64>;

    /// `Ok(false)` when the platform answered with anything but 200.
    async fn revert_issue_state(&self, issue_id: u64, state_id: u64)
        -> Result<bool, LifecycleError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Terminal state reached while handling one issue event.
pub enum CloseGuardOutcome {
    Ignored,
    PolicyNotApplied { reason_code: &'static str },
    HasLinkedPullRequests,
    PriorStateUnavailable { reason: String },
    StateIdNotFound { state_name: String },
    RevertRejected { state_name: String, state_id: u64 },
    Reverted { state_name: String, state_id: u64 },
    /// A collaborator answered with a non-2xx status or an undecodable body.
    CollaboratorRejected {
        operation: &'static str,
        reason_code: &'static str,
    },
}

impl CloseGuardOutcome {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Ignored => "event_ignored",
            Self::PolicyNotApplied { .. } => "policy_not_applied",
            Self::HasLinkedPullRequests => "issue_has_linked_pull_requests",
            Self::PriorStateUnavailable { .. } => "prior_state_unavailable",
            Self::StateIdNotFound { .. } => "state_id_not_found",
            Self::RevertRejected { .. } => "revert_rejected",
            Self::Reverted { .. } => "close_reverted",
            Self::CollaboratorRejected { .. } => "collaborator_rejected",
        }
    }
}

#[derive(Clone)]
/// Stateless per-event handler. Safe to share across concurrently handled events.
pub struct CloseGuard {
    config: Arc<LifecycleConfig>,
    issues: Arc<dyn IssueCollaborator>,
    states: Arc<dyn WorkflowStateApi>,
}

impl CloseGuard {
    pub fn new(
        config: Arc<LifecycleConfig>,
        issues: Arc<dyn IssueCollaborator>,
        states: Arc<dyn WorkflowStateApi>,
    ) -> Self {
        Self {
            config,
            issues,
            states,
        }
    }

    #[tracing::instrument(
        level = "debug",
        skip(self, event),
        fields(org = %event.org, repo = %event.repo, issue_number = %event.issue_number)
    )]
    pub async fn handle_issue_event(
        &self,
        event: &IssueEvent,
    ) -> Result<CloseGuardOutcome, LifecycleError> {
        if !event.is_close_transition() {
            tracing::debug!(
                action = %event.action,
                state = %event.new_state,
                "ignoring issue event"
            );
            return Ok(CloseGuardOutcome::Ignored);
        }

        let decision = self.config.policy_decision(&event.org, &event.repo);
        if !decision.requires_linked_pull_request() {
            tracing::debug!(
                reason_code = decision.reason_code(),
                "linked pull request policy does not apply"
            );
            return Ok(CloseGuardOutcome::PolicyNotApplied {
                reason_code: decision.reason_code(),
            });
        }

        let has_linked_pull_requests = match self
            .issues
            .has_linked_pull_requests(&event.org, &event.repo, &event.issue_number)
            .await
        {
            Ok(has_linked_pull_requests) => has_linked_pull_requests,
            Err(error) => return absorb_protocol_error(LIST_PULL_REQUESTS_OPERATION, error),
        };
        if has_linked_pull_requests {
            return Ok(CloseGuardOutcome::HasLinkedPullRequests);
        }

        let operate_logs = match self
            .issues
            .get_issue_operate_logs(&event.org, &event.repo, &event.issue_number)
            .await
        {
            Ok(operate_logs) => operate_logs,
            Err(error) => return absorb_protocol_error(LIST_OPERATE_LOGS_OPERATION, error),
        };
        let state_name = match prior_state(&operate_logs) {
            Ok(state_name) => state_name,
            Err(error) => {
                tracing::warn!(error = %error, "cannot recover issue state before close");
                return Ok(CloseGuardOutcome::PriorStateUnavailable {
                    reason: error.to_string(),
                });
            }
        };

        let Some(state_id) = self.states.resolve_state_id(&state_name).await else {
            tracing::warn!(state_name = %state_name, "failed to resolve issue state id");
            return Ok(CloseGuardOutcome::StateIdNotFound { state_name });
        };

        let reverted = match self
            .states
            .revert_issue_state(event.issue_id, state_id)
            .await
        {
            Ok(reverted) => reverted,
            Err(error) => return absorb_protocol_error(UPDATE_ISSUE_STATE_OPERATION, error),
        };
        if !reverted {
            tracing::warn!(state_name = %state_name, state_id, "issue state revert was rejected");
            return Ok(CloseGuardOutcome::RevertRejected {
                state_name,
                state_id,
            });
        }

        let comment = render_linked_pull_request_required_comment(&event.actor_login, CLOSE_ACTION);
        if let Err(error) = self
            .issues
            .create_issue_comment(&event.org, &event.repo, &event.issue_number, &comment)
            .await
        {
            tracing::warn!(
                state_name = %state_name,
                state_id,
                "issue close reverted without notice"
            );
            return absorb_protocol_error(CREATE_COMMENT_OPERATION, error);
        }
        tracing::info!(
            state_name = %state_name,
            state_id,
            actor = %event.actor_login,
            "reverted issue close without linked pull requests"
        );
        Ok(CloseGuardOutcome::Reverted {
            state_name,
            state_id,
        })
    }
}

/// Transport errors end handling with `Err`; anything the platform answered is logged and absorbed.
fn absorb_protocol_error(
    operation: &'static str,
    error: LifecycleError,
) -> Result<CloseGuardOutcome, LifecycleError> {
    if error.is_transport() {
        tracing::error!(operation, error = %error, "gitee request failed");
        return Err(error);
    }
    tracing::warn!(
        operation,
        reason_code = error.reason_code(),
        error = %error,
        "gitee rejected request"
    );
    Ok(CloseGuardOutcome::CollaboratorRejected {
        operation,
        reason_code: error.reason_code(),
    })
}

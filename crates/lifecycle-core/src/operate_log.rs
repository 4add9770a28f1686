//! Grammar for Gitee issue operate-log entries.
//!
//! A state-change entry is free text whose last two whitespace-delimited tokens
//! are the state the issue left and the state it entered:
//!
//! ```text
//! content    := prefix* prior-state new-state
//! prefix     := token
//! prior-state, new-state, token := one or more non-whitespace characters
//! ```
//!
//! Whitespace only separates tokens. A run of spaces, or a trailing space left
//! after the new state, never yields an empty state name.
//!
//! Gitee returns the log newest first, so the first entry describes the close
//! that triggered the webhook.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `OperateLogUser` used across lifecycle components.
pub struct OperateLogUser {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// One operate-log record as returned by the Gitee issue operate-log endpoint.
pub struct OperateLog {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub user: Option<OperateLogUser>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `StateTransition` used across lifecycle components.
pub struct StateTransition {
    pub prior_state: String,
    pub new_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `OperateLogError` values.
pub enum OperateLogError {
    #[error("operate log is empty")]
    EmptyLog,
    #[error("operate log entry has no prior state token: '{content}'")]
    MissingPriorState { content: String },
}

/// Parse the trailing `prior-state new-state` pair out of one entry's content.
pub fn parse_state_transition(content: &str) -> Result<StateTransition, OperateLogError> {
    let mut tokens = content.split_whitespace().rev();
    match (tokens.next(), tokens.next()) {
        (Some(new_state), Some(prior_state)) => Ok(StateTransition {
            prior_state: prior_state.to_string(),
            new_state: new_state.to_string(),
        }),
        _ => Err(OperateLogError::MissingPriorState {
            content: content.to_string(),
        }),
    }
}

/// Recover the state an issue held immediately before the most recent logged transition.
pub fn prior_state(logs: &[OperateLog]) -> Result<String, OperateLogError> {
    let latest = logs.first().ok_or(OperateLogError::EmptyLog)?;
    parse_state_transition(&latest.content).map(|transition| transition.prior_state)
}

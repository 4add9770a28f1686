use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STATE_CHANGE_ACTION: &str = "state_change";
pub const CLOSED_STATE: &str = "closed";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
/// Public struct `GiteeUser` used across lifecycle components.
pub struct GiteeUser {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
/// Issue fields carried by a Gitee issue hook.
pub struct GiteeHookIssue {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
/// Repository fields carried by a Gitee issue hook.
pub struct GiteeHookRepository {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
/// Raw `Issue Hook` webhook payload. Only the fields the lifecycle bot reads are modeled.
pub struct GiteeIssueHookPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub issue: Option<GiteeHookIssue>,
    #[serde(default)]
    pub repository: Option<GiteeHookRepository>,
    #[serde(default)]
    pub user: Option<GiteeUser>,
    #[serde(default)]
    pub sender: Option<GiteeUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `IssueHookError` values.
pub enum IssueHookError {
    #[error("invalid issue hook json: {0}")]
    Json(String),
    #[error("issue hook is missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Issue state-change event as consumed by the close guard.
pub struct IssueEvent {
    pub org: String,
    pub repo: String,
    pub issue_number: String,
    pub issue_id: u64,
    pub actor_login: String,
    pub action: String,
    pub new_state: String,
}

impl IssueEvent {
    /// Return true only for the `state_change` → `closed` transition.
    pub fn is_close_transition(&self) -> bool {
        self.action == STATE_CHANGE_ACTION && self.new_state == CLOSED_STATE
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

impl TryFrom<GiteeIssueHookPayload> for IssueEvent {
    type Error = IssueHookError;

    fn try_from(payload: GiteeIssueHookPayload) -> Result<Self, Self::Error> {
        let issue = payload
            .issue
            .ok_or(IssueHookError::MissingField("issue"))?;
        let repository = payload
            .repository
            .ok_or(IssueHookError::MissingField("repository"))?;

        let full_name_parts = repository
            .full_name
            .as_deref()
            .and_then(crate::policy_config::split_org_repo);
        let org = non_blank(repository.namespace.as_deref())
            .or_else(|| full_name_parts.and_then(|(org, _)| non_blank(Some(org))))
            .ok_or(IssueHookError::MissingField("repository.namespace"))?;
        let repo = non_blank(repository.path.as_deref())
            .or_else(|| full_name_parts.and_then(|(_, repo)| non_blank(Some(repo))))
            .ok_or(IssueHookError::MissingField("repository.path"))?;

        let issue_id = issue.id.ok_or(IssueHookError::MissingField("issue.id"))?;
        let issue_number = non_blank(issue.number.as_deref())
            .ok_or(IssueHookError::MissingField("issue.number"))?;
        let actor_login = non_blank(payload.user.as_ref().map(|user| user.login.as_str()))
            .or_else(|| non_blank(payload.sender.as_ref().map(|user| user.login.as_str())))
            .ok_or(IssueHookError::MissingField("user.login"))?;

        Ok(Self {
            org,
            repo,
            issue_number,
            issue_id,
            actor_login,
            action: payload.action.unwrap_or_default(),
            new_state: payload.state.or(issue.state).unwrap_or_default(),
        })
    }
}

/// Decode a raw `Issue Hook` body into an [`IssueEvent`].
pub fn parse_issue_hook(raw: &[u8]) -> Result<IssueEvent, IssueHookError> {
    let payload: GiteeIssueHookPayload =
        serde_json::from_slice(raw).map_err(|error| IssueHookError::Json(error.to_string()))?;
    IssueEvent::try_from(payload)
}

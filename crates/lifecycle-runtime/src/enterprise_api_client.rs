use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::close_guard::{WorkflowStateApi, UPDATE_ISSUE_STATE_OPERATION};
use crate::error::LifecycleError;
use crate::gitee_api_client::{build_http_client, decode_json, require_setting, send_request};

pub const DEFAULT_ENTERPRISE_API_BASE: &str = "https://api.gitee.com/enterprises";

#[derive(Debug, Clone)]
/// Connection settings for the Gitee enterprise API that owns the workflow-state catalog.
pub struct EnterpriseApiConfig {
    pub api_base: String,
    pub enterprise_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// One configured workflow state of the enterprise.
pub struct IssueStateRecord {
    pub id: u64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct IssueStateCatalog {
    data: Vec<IssueStateRecord>,
}

#[derive(Clone)]
/// Enterprise API client: resolves workflow-state names and sets an issue's state.
pub struct EnterpriseApiClient {
    http: reqwest::Client,
    enterprise_base: String,
    access_token: String,
}

/// First record whose title equals `state_name` exactly. Duplicate titles resolve to the first.
pub fn find_state_id(states: &[IssueStateRecord], state_name: &str) -> Option<u64> {
    states
        .iter()
        .find(|state| state.title == state_name)
        .map(|state| state.id)
}

impl EnterpriseApiClient {
    pub fn new(config: EnterpriseApiConfig) -> Result<Self, LifecycleError> {
        let api_base = require_setting("gitee enterprise api base", &config.api_base)?;
        let enterprise_id = require_setting("gitee enterprise id", &config.enterprise_id)?;
        let access_token =
            require_setting("gitee enterprise access token", &config.access_token)?;
        Ok(Self {
            http: build_http_client()?,
            enterprise_base: format!("{}/{enterprise_id}", api_base.trim_end_matches('/')),
            access_token,
        })
    }

    /// Fetch the full workflow-state catalog. Not cached: every call hits the platform.
    pub async fn list_issue_states(&self) -> Result<Vec<IssueStateRecord>, LifecycleError> {
        let operation = "list issue states";
        let response = send_request(
            operation,
            self.http
                .get(format!("{}/issue_states", self.enterprise_base))
                .query(&[("access_token", self.access_token.as_str())]),
        )
        .await?;
        let catalog: IssueStateCatalog = decode_json(operation, response).await?;
        Ok(catalog.data)
    }
}

#[async_trait]
impl WorkflowStateApi for EnterpriseApiClient {
    async fn resolve_state_id(&self, state_name: &str) -> Option<u64> {
        let states = match self.list_issue_states().await {
            Ok(states) => states,
            Err(error) => {
                tracing::warn!(
                    state_name,
                    reason_code = error.reason_code(),
                    error = %error,
                    "failed to fetch enterprise issue states"
                );
                return None;
            }
        };
        let resolved = find_state_id(&states, state_name);
        if resolved.is_none() {
            tracing::warn!(
                state_name,
                catalog_size = states.len(),
                "no enterprise issue state matches name"
            );
        }
        resolved
    }

    async fn revert_issue_state(
        &self,
        issue_id: u64,
        state_id: u64,
    ) -> Result<bool, LifecycleError> {
        let payload = json!({
            "access_token": self.access_token,
            "issue_state_id": state_id,
        });
        let response = send_request(
            UPDATE_ISSUE_STATE_OPERATION,
            self.http
                .put(format!("{}/issues/{issue_id}", self.enterprise_base))
                .json(&payload),
        )
        .await?;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(
                issue_id,
                state_id,
                status = status.as_u16(),
                "unexpected response when reverting issue state"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

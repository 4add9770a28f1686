use async_trait::async_trait;
use lifecycle_core::issue_comment::truncate_for_error;
use lifecycle_core::operate_log::OperateLog;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::close_guard::{
    IssueCollaborator, CREATE_COMMENT_OPERATION, LIST_OPERATE_LOGS_OPERATION,
    LIST_PULL_REQUESTS_OPERATION,
};
use crate::error::LifecycleError;

pub const DEFAULT_GITEE_API_BASE: &str = "https://gitee.com/api/v5";
const ERROR_BODY_MAX_CHARS: usize = 800;

#[derive(Debug, Clone)]
/// Connection settings for the Gitee v5 repository API.
pub struct GiteeApiConfig {
    pub api_base: String,
    pub access_token: String,
}

#[derive(Clone)]
/// Gitee v5 client backing the close guard's comment, linked-pull-request, and operate-log calls.
pub struct GiteeApiClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, LifecycleError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static("lifecycle-bot"),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|error| {
            LifecycleError::InvalidConfig(format!("failed to create gitee api client: {error}"))
        })
}

pub(crate) fn require_setting(name: &str, value: &str) -> Result<String, LifecycleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::InvalidConfig(format!(
            "{name} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Send one request. Connection failures become [`LifecycleError::Transport`]; no retry.
pub(crate) async fn send_request(
    operation: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, LifecycleError> {
    request
        .send()
        .await
        .map_err(|source| LifecycleError::Transport { operation, source })
}

/// Decode a successful JSON response, classifying non-2xx statuses and bad bodies.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, LifecycleError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LifecycleError::HttpStatus {
            operation,
            status: status.as_u16(),
            body: truncate_for_error(&body, ERROR_BODY_MAX_CHARS),
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|source| LifecycleError::Transport { operation, source })?;
    serde_json::from_slice(&bytes).map_err(|error| LifecycleError::InvalidResponse {
        operation,
        message: error.to_string(),
    })
}

impl GiteeApiClient {
    pub fn new(config: GiteeApiConfig) -> Result<Self, LifecycleError> {
        let api_base = require_setting("gitee api base", &config.api_base)?;
        let access_token = require_setting("gitee access token", &config.access_token)?;
        Ok(Self {
            http: build_http_client()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, LifecycleError> {
        let response = send_request(operation, request).await?;
        decode_json(operation, response).await
    }
}

#[async_trait]
impl IssueCollaborator for GiteeApiClient {
    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: &str,
        body: &str,
    ) -> Result<(), LifecycleError> {
        let payload = json!({ "access_token": self.access_token, "body": body });
        let _created: Value = self
            .request_json(
                CREATE_COMMENT_OPERATION,
                self.http
                    .post(format!(
                        "{}/repos/{owner}/{repo}/issues/{number}/comments",
                        self.api_base
                    ))
                    .json(&payload),
            )
            .await?;
        Ok(())
    }

    async fn has_linked_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        number: &str,
    ) -> Result<bool, LifecycleError> {
        let pulls: Vec<Value> = self
            .request_json(
                LIST_PULL_REQUESTS_OPERATION,
                self.http
                    .get(format!(
                        "{}/repos/{owner}/{repo}/issues/{number}/pull_requests",
                        self.api_base
                    ))
                    .query(&[("access_token", self.access_token.as_str())]),
            )
            .await?;
        Ok(!pulls.is_empty())
    }

    async fn get_issue_operate_logs(
        &self,
        owner: &str,
        repo: &str,
        number: &str,
    ) -> Result<Vec<OperateLog>, LifecycleError> {
        self.request_json(
            LIST_OPERATE_LOGS_OPERATION,
            self.http
                .get(format!(
                    "{}/repos/{owner}/issues/{number}/operate_logs",
                    self.api_base
                ))
                .query(&[
                    ("access_token", self.access_token.as_str()),
                    ("repo", repo),
                    ("sort", "desc"),
                ]),
        )
        .await
    }
}

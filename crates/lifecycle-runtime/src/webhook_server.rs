//! Gitee webhook endpoint feeding issue hooks into the close guard.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use hmac::{Hmac, Mac};
use lifecycle_core::issue_event::parse_issue_hook;
use serde_json::json;
use sha2::Sha256;
use tokio::net::TcpListener;

use crate::close_guard::CloseGuard;

const HEALTH_ENDPOINT: &str = "/healthz";
const GITEE_HOOK_ENDPOINT: &str = "/gitee-hook";
const HEADER_GITEE_EVENT: &str = "x-gitee-event";
const HEADER_GITEE_TOKEN: &str = "x-gitee-token";
const HEADER_GITEE_TIMESTAMP: &str = "x-gitee-timestamp";
const ISSUE_HOOK_EVENT: &str = "Issue Hook";

#[derive(Debug, Clone)]
/// Public struct `WebhookServerConfig` used across lifecycle components.
pub struct WebhookServerConfig {
    pub bind: String,
    pub webhook_secret: Option<String>,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8888".to_string(),
            webhook_secret: None,
        }
    }
}

#[derive(Clone)]
struct WebhookState {
    guard: CloseGuard,
    webhook_secret: Option<String>,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn webhook_hmac(secret: &str) -> Result<Hmac<Sha256>> {
    Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .context("failed to initialize webhook signature hmac")
}

/// Gitee signature: base64(HMAC-SHA256(secret, "{timestamp}\n{secret}")).
pub fn gitee_webhook_signature(secret: &str, timestamp: &str) -> Result<String> {
    let mut mac = webhook_hmac(secret)?;
    mac.update(format!("{timestamp}\n{secret}").as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn verify_gitee_signature(token: &str, timestamp: &str, secret: &str) -> Result<bool> {
    let Ok(signature_bytes) = base64::engine::general_purpose::STANDARD.decode(token) else {
        return Ok(false);
    };
    let mut mac = webhook_hmac(secret)?;
    mac.update(format!("{timestamp}\n{secret}").as_bytes());
    Ok(mac.verify_slice(&signature_bytes).is_ok())
}

// Both sides are reduced to fixed-size tags so the comparison runs in constant time.
fn verify_gitee_password(token: &str, secret: &str) -> Result<bool> {
    let mut expected = webhook_hmac(secret)?;
    expected.update(secret.as_bytes());
    let expected = expected.finalize().into_bytes();
    let mut mac = webhook_hmac(secret)?;
    mac.update(token.as_bytes());
    Ok(mac.verify_slice(&expected).is_ok())
}

/// Accept either the plain webhook password or, when a timestamp is sent, the signed token.
pub fn verify_gitee_webhook_token(headers: &HeaderMap, secret: &str) -> Result<bool> {
    let Some(token) = header_value(headers, HEADER_GITEE_TOKEN) else {
        return Ok(false);
    };
    if let Some(timestamp) = header_value(headers, HEADER_GITEE_TIMESTAMP) {
        if verify_gitee_signature(token, timestamp, secret)? {
            return Ok(true);
        }
    }
    verify_gitee_password(token, secret)
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        })),
    )
        .into_response()
}

pub fn build_webhook_router(guard: CloseGuard, webhook_secret: Option<String>) -> Router {
    let state = Arc::new(WebhookState {
        guard,
        webhook_secret: webhook_secret.filter(|secret| !secret.trim().is_empty()),
    });
    Router::new()
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(GITEE_HOOK_ENDPOINT, post(handle_gitee_hook))
        .with_state(state)
}

async fn handle_health() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response()
}

async fn handle_gitee_hook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.webhook_secret.as_deref() {
        match verify_gitee_webhook_token(&headers, secret) {
            Ok(true) => {}
            Ok(false) => {
                return error_response(
                    StatusCode::UNAUTHORIZED,
                    "webhook_token_invalid",
                    "missing or invalid x-gitee-token".to_string(),
                );
            }
            Err(error) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "webhook_token_check_failed",
                    format!("{error:#}"),
                );
            }
        }
    }

    let event_kind = header_value(&headers, HEADER_GITEE_EVENT).unwrap_or_default();
    if event_kind != ISSUE_HOOK_EVENT {
        tracing::debug!(event_kind, "ignoring non-issue webhook");
        return (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response();
    }

    let event = match parse_issue_hook(&body) {
        Ok(event) => event,
        Err(error) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "issue_hook_invalid",
                error.to_string(),
            );
        }
    };

    match state.guard.handle_issue_event(&event).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "status": "handled",
                "outcome": outcome.reason_code(),
            })),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(
                org = %event.org,
                repo = %event.repo,
                issue_number = %event.issue_number,
                error = %error,
                "issue hook handling failed"
            );
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error.reason_code(),
                error.to_string(),
            )
        }
    }
}

/// Serve the webhook endpoint until Ctrl-C.
pub async fn run_webhook_server(config: WebhookServerConfig, guard: CloseGuard) -> Result<()> {
    let bind_addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid --bind '{}': expected host:port", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind webhook server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook server listen address")?;
    tracing::info!(addr = %local_addr, "lifecycle webhook server listening");

    let app = build_webhook_router(guard, config.webhook_secret);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("webhook server exited unexpectedly")?;
    Ok(())
}

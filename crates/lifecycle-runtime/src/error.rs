use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `LifecycleError` values.
pub enum LifecycleError {
    #[error("gitee api {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("gitee api {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to decode gitee {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
    #[error("invalid gitee client configuration: {0}")]
    InvalidConfig(String),
}

impl LifecycleError {
    /// Network or connection failure, as opposed to a response the platform rejected.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "gitee_transport_error",
            Self::HttpStatus { .. } => "gitee_unexpected_status",
            Self::InvalidResponse { .. } => "gitee_invalid_response",
            Self::InvalidConfig(_) => "gitee_invalid_config",
        }
    }
}

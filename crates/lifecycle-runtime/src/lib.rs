//! Runtime for the Gitee lifecycle bot: API clients, the close guard that
//! reverts policy-violating issue closes, and the webhook server feeding it.

pub mod close_guard;
pub mod enterprise_api_client;
pub mod error;
pub mod gitee_api_client;
pub mod webhook_server;

pub use close_guard::{CloseGuard, CloseGuardOutcome, IssueCollaborator, WorkflowStateApi};
pub use enterprise_api_client::{EnterpriseApiClient, EnterpriseApiConfig};
pub use error::LifecycleError;
pub use gitee_api_client::{GiteeApiClient, GiteeApiConfig};
pub use webhook_server::{build_webhook_router, run_webhook_server, WebhookServerConfig};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lifecycle_runtime::enterprise_api_client::DEFAULT_ENTERPRISE_API_BASE;
use lifecycle_runtime::gitee_api_client::DEFAULT_GITEE_API_BASE;

#[derive(Debug, Parser)]
#[command(
    name = "lifecycle-bot",
    about = "Reverts Gitee issue closes that lack linked pull requests",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long = "config",
        env = "LIFECYCLE_CONFIG",
        global = true,
        help = "Path to the policy file (.json or .toml)"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Validate the policy file and print the decision for optional repos.
    CheckConfig {
        #[arg(long = "repo", help = "org/repo to evaluate; repeatable")]
        repos: Vec<String>,
    },
    /// Handle one stored issue-hook payload and exit.
    HandleEvent {
        #[arg(long = "event-file", help = "Path to a Gitee issue-hook JSON payload")]
        event_file: PathBuf,

        #[command(flatten)]
        gitee: GiteeArgs,
    },
    /// Serve the Gitee webhook endpoint until interrupted.
    Serve {
        #[arg(long, env = "LIFECYCLE_BIND", default_value = "127.0.0.1:8888")]
        bind: String,

        #[arg(
            long = "webhook-secret",
            env = "LIFECYCLE_WEBHOOK_SECRET",
            hide_env_values = true,
            help = "Expected x-gitee-token password or signing secret"
        )]
        webhook_secret: Option<String>,

        #[command(flatten)]
        gitee: GiteeArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub(crate) struct GiteeArgs {
    #[arg(
        long = "api-base",
        env = "LIFECYCLE_GITEE_API_BASE",
        default_value = DEFAULT_GITEE_API_BASE
    )]
    pub api_base: String,

    #[arg(
        long = "enterprise-api-base",
        env = "LIFECYCLE_GITEE_ENTERPRISE_API_BASE",
        default_value = DEFAULT_ENTERPRISE_API_BASE
    )]
    pub enterprise_api_base: String,

    #[arg(
        long = "access-token",
        env = "LIFECYCLE_GITEE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Gitee v5 token used for comments, linked pull requests, and operate logs"
    )]
    pub access_token: String,

    #[arg(long = "enterprise-id", env = "LIFECYCLE_GITEE_ENTERPRISE_ID")]
    pub enterprise_id: String,

    #[arg(
        long = "enterprise-access-token",
        env = "LIFECYCLE_GITEE_ENTERPRISE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Gitee enterprise token used for issue states and issue updates"
    )]
    pub enterprise_access_token: String,
}

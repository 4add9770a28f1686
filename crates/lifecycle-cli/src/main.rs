mod cli_args;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use lifecycle_core::issue_event::parse_issue_hook;
use lifecycle_core::policy_config::{split_org_repo, LifecycleConfig};
use lifecycle_runtime::{
    run_webhook_server, CloseGuard, EnterpriseApiClient, EnterpriseApiConfig, GiteeApiClient,
    GiteeApiConfig, WebhookServerConfig,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::{Cli, CliCommand, GiteeArgs};

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_policy(path: Option<&Path>) -> Result<LifecycleConfig> {
    let path = path.ok_or_else(|| anyhow!("--config (or LIFECYCLE_CONFIG) must be provided"))?;
    LifecycleConfig::load(path)
}

fn build_close_guard(config: LifecycleConfig, gitee: GiteeArgs) -> Result<CloseGuard> {
    let issues = GiteeApiClient::new(GiteeApiConfig {
        api_base: gitee.api_base,
        access_token: gitee.access_token,
    })
    .context("failed to construct gitee api client")?;
    let states = EnterpriseApiClient::new(EnterpriseApiConfig {
        api_base: gitee.enterprise_api_base,
        enterprise_id: gitee.enterprise_id,
        access_token: gitee.enterprise_access_token,
    })
    .context("failed to construct gitee enterprise api client")?;
    Ok(CloseGuard::new(
        Arc::new(config),
        Arc::new(issues),
        Arc::new(states),
    ))
}

fn render_policy_report(config: &LifecycleConfig, repos: &[String]) -> Result<String> {
    let mut lines = vec![format!("config_items: {}", config.config_items.len())];
    for (index, item) in config.config_items.iter().enumerate() {
        lines.push(format!(
            "[{index}] repos={} excluded_repos={} need_issue_has_link_pull_requests={}",
            item.repo_filter.repos.join(","),
            item.repo_filter.excluded_repos.join(","),
            item.need_issue_has_link_pull_requests
        ));
    }
    for repo_arg in repos {
        let Some((org, repo)) = split_org_repo(repo_arg.trim()) else {
            bail!("invalid --repo '{repo_arg}': expected org/repo");
        };
        let decision = config.policy_decision(org, repo);
        let matched_item = config
            .config_for(org, repo)
            .map(|(index, _)| index.to_string())
            .unwrap_or_else(|| "none".to_string());
        lines.push(format!(
            "{org}/{repo}: enforced={} reason_code={} matching_item={matched_item}",
            decision.requires_linked_pull_request(),
            decision.reason_code()
        ));
    }
    Ok(lines.join("\n"))
}

async fn handle_event_file(guard: &CloseGuard, event_file: &Path) -> Result<String> {
    let raw = std::fs::read(event_file)
        .with_context(|| format!("failed to read event file '{}'", event_file.display()))?;
    let event = parse_issue_hook(&raw)
        .with_context(|| format!("invalid issue hook '{}'", event_file.display()))?;
    let outcome = guard
        .handle_issue_event(&event)
        .await
        .with_context(|| {
            format!(
                "failed to handle issue {} in {}/{}",
                event.issue_number, event.org, event.repo
            )
        })?;
    Ok(outcome.reason_code().to_string())
}

async fn run_cli(cli: Cli) -> Result<()> {
    let config = load_policy(cli.config.as_deref())?;
    match cli.command {
        CliCommand::CheckConfig { repos } => {
            println!("{}", render_policy_report(&config, &repos)?);
        }
        CliCommand::HandleEvent { event_file, gitee } => {
            let guard = build_close_guard(config, gitee)?;
            println!("{}", handle_event_file(&guard, &event_file).await?);
        }
        CliCommand::Serve {
            bind,
            webhook_secret,
            gitee,
        } => {
            let guard = build_close_guard(config, gitee)?;
            run_webhook_server(
                WebhookServerConfig {
                    bind,
                    webhook_secret,
                },
                guard,
            )
            .await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run_cli(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lifecycle_core::policy_config::{BotConfig, LifecycleConfig, RepoFilter};
    use tempfile::tempdir;

    use super::{handle_event_file, load_policy, render_policy_report};
    use lifecycle_runtime::close_guard::{CloseGuard, IssueCollaborator, WorkflowStateApi};
    use lifecycle_runtime::LifecycleError;

    struct UnreachableApi;

    #[async_trait::async_trait]
    impl IssueCollaborator for UnreachableApi {
        async fn create_issue_comment(
            &self,
            _owner: &str,
            _repo: &str,
            _number: &str,
            _body: &str,
        ) -> Result<(), LifecycleError> {
            Err(LifecycleError::InvalidConfig("unreachable".to_string()))
        }

        async fn has_linked_pull_requests(
            &self,
            _owner: &str,
            _repo: &str,
            _number: &str,
        ) -> Result<bool, LifecycleError> {
            Err(LifecycleError::InvalidConfig("unreachable".to_string()))
        }

        async fn get_issue_operate_logs(
            &self,
            _owner: &str,
            _repo: &str,
            _number: &str,
        ) -> Result<Vec<lifecycle_core::operate_log::OperateLog>, LifecycleError> {
            Err(LifecycleError::InvalidConfig("unreachable".to_string()))
        }
    }

    #[async_trait::async_trait]
    impl WorkflowStateApi for UnreachableApi {
        async fn resolve_state_id(&self, _state_name: &str) -> Option<u64> {
            None
        }

        async fn revert_issue_state(
            &self,
            _issue_id: u64,
            _state_id: u64,
        ) -> Result<bool, LifecycleError> {
            Err(LifecycleError::InvalidConfig("unreachable".to_string()))
        }
    }

    fn org_wide_config() -> LifecycleConfig {
        LifecycleConfig {
            config_items: vec![BotConfig {
                repo_filter: RepoFilter {
                    repos: vec!["org".to_string()],
                    excluded_repos: vec!["org/legacy".to_string()],
                },
                need_issue_has_link_pull_requests: true,
            }],
        }
    }

    #[test]
    fn unit_render_policy_report_lists_items_and_repo_decisions() {
        let report = render_policy_report(
            &org_wide_config(),
            &["org/service".to_string(), "org/legacy".to_string()],
        )
        .expect("report");
        assert!(report.contains("config_items: 1"));
        assert!(report.contains(
            "org/service: enforced=true reason_code=policy_org_wide matching_item=0"
        ));
        assert!(report.contains(
            "org/legacy: enforced=false reason_code=policy_repo_excluded matching_item=none"
        ));
    }

    #[test]
    fn regression_render_policy_report_rejects_malformed_repo() {
        let error = render_policy_report(&org_wide_config(), &["org".to_string()])
            .expect_err("malformed repo");
        assert!(error.to_string().contains("expected org/repo"));
    }

    #[test]
    fn regression_load_policy_requires_config_path() {
        let error = load_policy(None).expect_err("missing path");
        assert!(error.to_string().contains("--config"));
    }

    #[tokio::test]
    async fn functional_handle_event_file_reports_outcome_code() {
        let temp = tempdir().expect("tempdir");
        let event_file = temp.path().join("hook.json");
        std::fs::write(
            &event_file,
            r#"{"action":"state_change","state":"open","issue":{"id":1,"number":"I1"},"repository":{"namespace":"org","path":"service"},"user":{"login":"alice"}}"#,
        )
        .expect("write hook");
        let api = Arc::new(UnreachableApi);
        let guard = CloseGuard::new(Arc::new(org_wide_config()), api.clone(), api);

        let outcome = handle_event_file(&guard, &event_file).await.expect("handled");
        assert_eq!(outcome, "event_ignored");
    }
}

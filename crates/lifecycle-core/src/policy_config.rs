use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Repository scope of one policy item: `org` or `org/repo` entries plus exclusions.
pub struct RepoFilter {
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_repos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `RepoFilterError` values.
pub enum RepoFilterError {
    #[error("missing repos")]
    MissingRepos,
    #[error("invalid repo entry '{0}': expected 'org' or 'org/repo'")]
    InvalidRepo(String),
    #[error("invalid excluded repo '{0}': expected 'org/repo'")]
    InvalidExcludedRepo(String),
    #[error("excluded repo '{0}' is also listed in repos")]
    ExcludedRepoAlsoIncluded(String),
    #[error("the org of excluded repo '{0}' is not listed in repos")]
    ExcludedRepoOrgNotIncluded(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config_items[{index}]: {source}")]
/// Validation failure for one policy item, tagged with its position.
pub struct ConfigItemError {
    pub index: usize,
    #[source]
    pub source: RepoFilterError,
}

/// Split an `org/repo` entry into its two non-empty segments.
pub fn split_org_repo(raw: &str) -> Option<(&str, &str)> {
    let (org, repo) = raw.split_once('/')?;
    if org.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((org, repo))
}

fn is_valid_repo_entry(raw: &str) -> bool {
    if raw.contains('/') {
        return split_org_repo(raw).is_some();
    }
    !raw.is_empty() && !raw.chars().any(char::is_whitespace)
}

fn normalize_entries(entries: &mut Vec<String>) {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(entries.len());
    for entry in entries.drain(..) {
        let trimmed = entry.trim().to_string();
        if seen.insert(trimmed.clone()) {
            normalized.push(trimmed);
        }
    }
    *entries = normalized;
}

impl RepoFilter {
    pub fn includes(&self, entry: &str) -> bool {
        self.repos.iter().any(|candidate| candidate == entry)
    }

    pub fn excludes(&self, org_repo: &str) -> bool {
        self.excluded_repos.iter().any(|candidate| candidate == org_repo)
    }

    /// Return true when the filter covers `org/repo`, either directly or through an org entry.
    pub fn can_apply(&self, org: &str, org_repo: &str) -> bool {
        self.includes(org_repo) || (self.includes(org) && !self.excludes(org_repo))
    }

    pub fn set_default(&mut self) {
        normalize_entries(&mut self.repos);
        normalize_entries(&mut self.excluded_repos);
    }

    pub fn validate(&self) -> Result<(), RepoFilterError> {
        if self.repos.is_empty() {
            return Err(RepoFilterError::MissingRepos);
        }
        if let Some(invalid) = self.repos.iter().find(|entry| !is_valid_repo_entry(entry)) {
            return Err(RepoFilterError::InvalidRepo(invalid.clone()));
        }
        for excluded in &self.excluded_repos {
            let Some((org, _)) = split_org_repo(excluded) else {
                return Err(RepoFilterError::InvalidExcludedRepo(excluded.clone()));
            };
            if self.includes(excluded) {
                return Err(RepoFilterError::ExcludedRepoAlsoIncluded(excluded.clone()));
            }
            if !self.includes(org) {
                return Err(RepoFilterError::ExcludedRepoOrgNotIncluded(
                    excluded.clone(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// One policy item: a repository scope and the linked-pull-request requirement.
pub struct BotConfig {
    #[serde(flatten)]
    pub repo_filter: RepoFilter,
    #[serde(default)]
    pub need_issue_has_link_pull_requests: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of evaluating the policy for one `org/repo` pair.
pub enum PolicyDecision {
    NoRules,
    RepoListed { required: bool },
    OrgWide { required: bool },
    RepoExcluded,
    OutsideScope,
}

impl PolicyDecision {
    pub fn requires_linked_pull_request(self) -> bool {
        match self {
            Self::RepoListed { required } | Self::OrgWide { required } => required,
            Self::NoRules | Self::RepoExcluded | Self::OutsideScope => false,
        }
    }

    pub fn reason_code(self) -> &'static str {
        match self {
            Self::NoRules => "policy_no_rules",
            Self::RepoListed { .. } => "policy_repo_listed",
            Self::OrgWide { .. } => "policy_org_wide",
            Self::RepoExcluded => "policy_repo_excluded",
            Self::OutsideScope => "policy_outside_scope",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Ordered list of policy items loaded from the bot configuration file.
pub struct LifecycleConfig {
    #[serde(default)]
    pub config_items: Vec<BotConfig>,
}

impl LifecycleConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut config: Self =
            serde_json::from_str(raw).context("failed to parse lifecycle config as json")?;
        config.set_default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(raw).context("failed to parse lifecycle config as toml")?;
        config.set_default();
        config.validate()?;
        Ok(config)
    }

    /// Load, normalize, and validate a policy file. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lifecycle config '{}'", path.display()))?;
        let is_toml = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            Self::from_toml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        };
        parsed.with_context(|| format!("invalid lifecycle config '{}'", path.display()))
    }

    pub fn set_default(&mut self) {
        for item in &mut self.config_items {
            item.repo_filter.set_default();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigItemError> {
        for (index, item) in self.config_items.iter().enumerate() {
            item.repo_filter
                .validate()
                .map_err(|source| ConfigItemError { index, source })?;
        }
        Ok(())
    }

    /// Evaluate the linked-pull-request rule for `org/repo`.
    ///
    /// Only the first configured item is consulted: an exact `org/repo` entry
    /// returns its flag, an `org` entry returns its flag unless the repo is
    /// excluded, and anything else ends evaluation with no enforcement. Later
    /// items never widen the decision.
    pub fn policy_decision(&self, org: &str, repo: &str) -> PolicyDecision {
        let Some(item) = self.config_items.first() else {
            return PolicyDecision::NoRules;
        };
        let org_repo = format!("{org}/{repo}");
        let filter = &item.repo_filter;
        let required = item.need_issue_has_link_pull_requests;
        if filter.includes(&org_repo) {
            return PolicyDecision::RepoListed { required };
        }
        if !filter.includes(org) {
            return PolicyDecision::OutsideScope;
        }
        if filter.excludes(&org_repo) {
            return PolicyDecision::RepoExcluded;
        }
        PolicyDecision::OrgWide { required }
    }

    pub fn need_link_pull_requests(&self, org: &str, repo: &str) -> bool {
        self.policy_decision(org, repo)
            .requires_linked_pull_request()
    }

    /// Return the first item, with its index, whose repository filter covers `org/repo`.
    pub fn config_for(&self, org: &str, repo: &str) -> Option<(usize, &BotConfig)> {
        let org_repo = format!("{org}/{repo}");
        self.config_items
            .iter()
            .enumerate()
            .find(|(_, item)| item.repo_filter.can_apply(org, &org_repo))
    }
}

//! Review platform gateway.
//!
//! [`ReviewPlatform`] covers pull request creation, inspection, merging and
//! check listing. [`GhCli`] implements it with the GitHub `gh` CLI.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::model::{MergeMethod, PrState, PullRequest};
use crate::status::{CheckSource, RawCheck};

/// Fields requested from `gh` for a pull request.
const PR_JSON_FIELDS: &str = "number,url,headRefName,headRefOid,state,mergeable,mergedAt";

/// Pull request operations used by a release run.
#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    /// Opens a PR from `head_branch` into `base_branch`.
    async fn create_pull_request(
        &self,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest>;

    /// Fetches the current state of a PR.
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest>;

    /// Lists the checks attached to a PR's head commit.
    async fn list_check_runs(&self, number: u64) -> Result<CheckSource>;

    /// Merges a PR with administrator override, deleting its branch.
    async fn merge_pull_request(&self, number: u64, method: MergeMethod) -> Result<()>;

    /// Finds an open PR whose head branch is `head_branch`.
    async fn find_open_pr_by_head_branch(&self, head_branch: &str) -> Result<Option<PullRequest>>;
}

/// Extracts the PR number from a URL containing `/pull/<digits>`.
pub fn extract_pr_number(text: &str) -> Option<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"/pull/(\d+)").expect("valid regex"));
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts `owner/name` from an HTTPS or SSH GitHub remote URL.
pub fn parse_repo_slug(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let path = if let Some((_, rest)) = trimmed.split_once("://") {
        rest.split_once('/')?.1
    } else if let Some((_, rest)) = trimmed.split_once(':') {
        rest
    } else {
        return None;
    };

    let mut parts = path.rsplitn(3, '/');
    let name = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{}/{}", owner, name))
}

/// Pull request JSON as returned by `gh pr view/list --json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    url: String,
    #[serde(default)]
    head_ref_name: String,
    #[serde(default)]
    head_ref_oid: String,
    state: String,
    #[serde(default)]
    mergeable: Option<String>,
    #[serde(default)]
    merged_at: Option<String>,
}

impl From<GhPullRequest> for PullRequest {
    fn from(gh: GhPullRequest) -> Self {
        let state = match gh.state.to_ascii_uppercase().as_str() {
            "MERGED" => PrState::Merged,
            "CLOSED" => PrState::Closed,
            _ => PrState::Open,
        };
        let mergeable = match gh.mergeable.as_deref() {
            Some("MERGEABLE") => Some(true),
            Some("CONFLICTING") => Some(false),
            _ => None,
        };
        let merged = Some(gh.merged_at.as_deref().is_some_and(|s| !s.is_empty()));

        PullRequest {
            number: gh.number,
            url: gh.url,
            head_branch: gh.head_ref_name,
            head_sha: gh.head_ref_oid,
            state,
            mergeable,
            merged,
        }
        .normalized()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhCheckRollup {
    #[serde(default)]
    status_check_rollup: Vec<RawCheck>,
}

/// [`ReviewPlatform`] backed by the `gh` command.
#[derive(Debug, Clone)]
pub struct GhCli {
    /// Repository as `owner/name`.
    repo: String,
    /// Path to the gh binary.
    cli_path: String,
}

impl GhCli {
    /// Creates a gateway for `repo` (`owner/name`).
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            cli_path: "gh".to_string(),
        }
    }

    /// Sets a custom gh binary.
    pub fn with_cli_path(mut self, cli_path: impl Into<String>) -> Self {
        self.cli_path = cli_path.into();
        self
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output> {
        tracing::debug!(repo = %self.repo, args = ?args, "running gh");
        Command::new(&self.cli_path)
            .args(args)
            .args(["--repo", self.repo.as_str()])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::GitHub(format!("failed to run gh: {}", e)))
    }

    /// Runs gh and returns stdout, failing on a non-zero exit.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(Error::GitHub(format!(
                "gh {} failed: {}",
                args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Reads `gh pr checks` text output.
    ///
    /// gh exits non-zero while checks are pending or failing, so stdout is
    /// used whenever it has content.
    async fn tabular_checks(&self, number: u64) -> Result<String> {
        let number = number.to_string();
        let output = self.output(&["pr", "checks", &number]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() && !output.status.success() {
            return Err(Error::GitHub(format!(
                "gh pr checks failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl ReviewPlatform for GhCli {
    async fn create_pull_request(
        &self,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let stdout = self
            .run(&[
                "pr",
                "create",
                "--head",
                head_branch,
                "--base",
                base_branch,
                "--title",
                title,
                "--body",
                body,
            ])
            .await?;

        let url = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string();
        let number = extract_pr_number(&url).ok_or_else(|| Error::InvalidPrResponse(stdout.clone()))?;

        tracing::info!(pr = number, url = %url, "created pull request");

        Ok(PullRequest {
            number,
            url,
            head_branch: head_branch.to_string(),
            head_sha: String::new(),
            state: PrState::Open,
            mergeable: None,
            merged: Some(false),
        })
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        let number = number.to_string();
        let stdout = self
            .run(&["pr", "view", &number, "--json", PR_JSON_FIELDS])
            .await?;
        let gh: GhPullRequest = serde_json::from_str(&stdout)
            .map_err(|e| Error::GitHub(format!("failed to parse gh output: {}", e)))?;
        Ok(gh.into())
    }

    async fn list_check_runs(&self, number: u64) -> Result<CheckSource> {
        let number_arg = number.to_string();
        let structured = self
            .run(&["pr", "view", &number_arg, "--json", "statusCheckRollup"])
            .await
            .and_then(|stdout| {
                serde_json::from_str::<GhCheckRollup>(&stdout)
                    .map_err(|e| Error::GitHub(format!("failed to parse check rollup: {}", e)))
            });

        match structured {
            Ok(rollup) => Ok(CheckSource::Structured(rollup.status_check_rollup)),
            Err(e) => {
                tracing::debug!(pr = number, error = %e, "structured checks unavailable, falling back to text");
                Ok(CheckSource::Tabular(self.tabular_checks(number).await?))
            }
        }
    }

    async fn merge_pull_request(&self, number: u64, method: MergeMethod) -> Result<()> {
        let number_arg = number.to_string();
        self.run(&[
            "pr",
            "merge",
            &number_arg,
            method.as_flag(),
            "--admin",
            "--delete-branch",
        ])
        .await?;

        tracing::info!(pr = number, method = ?method, "merged pull request");
        Ok(())
    }

    async fn find_open_pr_by_head_branch(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        let stdout = self
            .run(&[
                "pr",
                "list",
                "--head",
                head_branch,
                "--state",
                "open",
                "--limit",
                "1",
                "--json",
                PR_JSON_FIELDS,
            ])
            .await?;
        let prs: Vec<GhPullRequest> = serde_json::from_str(&stdout)
            .map_err(|e| Error::GitHub(format!("failed to parse gh output: {}", e)))?;
        Ok(prs.into_iter().next().map(PullRequest::from))
    }
}

//! Source control gateway.
//!
//! [`SourceControl`] is the set of git operations the release runner needs;
//! [`GitCli`] implements it with the system `git` binary.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Which commits a history query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRange {
    /// Commits reachable from HEAD but not from the given ref.
    Since(String),
    /// The most recent N commits on HEAD.
    Recent(usize),
}

/// Files and line counts changed between two refs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub files: Vec<PathBuf>,
    pub insertions: u64,
    pub deletions: u64,
}

/// Git operations used by a release run.
///
/// All paths are the checkout directory the operation runs in.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Clones `branch` of `url` into `dest` with limited history.
    async fn shallow_clone(&self, url: &str, branch: &str, depth: u32, dest: &Path) -> Result<()>;

    /// Creates `branch` from HEAD and checks it out.
    async fn create_and_checkout(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Stages paths matching `pathspec`.
    async fn stage(&self, repo: &Path, pathspec: &str) -> Result<()>;

    /// Commits the index and returns the new commit id.
    async fn commit(&self, repo: &Path, message: &str) -> Result<String>;

    /// Pushes `branch` to `remote`, setting upstream.
    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<()>;

    /// Returns the commit id of HEAD.
    async fn latest_commit_id(&self, repo: &Path) -> Result<String>;

    /// Tags matching `pattern`, highest version first.
    async fn version_tags(&self, repo: &Path, pattern: &str) -> Result<Vec<String>>;

    /// Human-readable `--stat` output between two refs.
    async fn diff_stat(&self, repo: &Path, from: &str, to: &str) -> Result<String>;

    /// Changed files and line counts between two refs.
    async fn diff_summary(&self, repo: &Path, from: &str, to: &str) -> Result<DiffSummary>;

    /// Commit subjects in `range`, as git orders them.
    async fn log(&self, repo: &Path, range: &LogRange) -> Result<Vec<String>>;

    /// Full unified diff between two refs. Callers cap the length.
    async fn raw_diff(&self, repo: &Path, from: &str, to: &str) -> Result<String>;
}

/// [`SourceControl`] backed by the `git` command.
#[derive(Debug, Clone)]
pub struct GitCli {
    /// Path to the git binary.
    cli_path: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Creates a gateway using the `git` on `PATH`.
    pub fn new() -> Self {
        Self {
            cli_path: "git".to_string(),
        }
    }

    /// Creates a gateway with a custom git binary.
    pub fn with_cli_path(cli_path: impl Into<String>) -> Self {
        Self {
            cli_path: cli_path.into(),
        }
    }

    /// Runs git in `dir` and returns stdout.
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        tracing::debug!(dir = ?dir, args = ?args, "running git");

        let output = Command::new(&self.cli_path)
            .current_dir(dir)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Git(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Git(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn shallow_clone(&self, url: &str, branch: &str, depth: u32, dest: &Path) -> Result<()> {
        let parent = dest
            .parent()
            .ok_or_else(|| Error::Git(format!("invalid clone destination {}", dest.display())))?;
        let dest_str = dest.to_string_lossy().into_owned();
        let depth = depth.to_string();

        self.run(
            parent,
            &[
                "clone",
                "--depth",
                &depth,
                "--branch",
                branch,
                url,
                dest_str.as_str(),
            ],
        )
        .await?;

        tracing::info!(url = %url, branch = %branch, "cloned repository");
        Ok(())
    }

    async fn create_and_checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        self.run(repo, &["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn stage(&self, repo: &Path, pathspec: &str) -> Result<()> {
        self.run(repo, &["add", "--", pathspec]).await?;
        Ok(())
    }

    async fn commit(&self, repo: &Path, message: &str) -> Result<String> {
        self.run(repo, &["commit", "-m", message]).await?;
        self.latest_commit_id(repo).await
    }

    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<()> {
        self.run(repo, &["push", "-u", remote, branch]).await?;
        Ok(())
    }

    async fn latest_commit_id(&self, repo: &Path) -> Result<String> {
        Ok(self.run(repo, &["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    async fn version_tags(&self, repo: &Path, pattern: &str) -> Result<Vec<String>> {
        let output = self
            .run(repo, &["tag", "--list", pattern, "--sort=-v:refname"])
            .await?;
        Ok(non_empty_lines(&output))
    }

    async fn diff_stat(&self, repo: &Path, from: &str, to: &str) -> Result<String> {
        let range = format!("{}..{}", from, to);
        self.run(repo, &["diff", "--stat", &range]).await
    }

    async fn diff_summary(&self, repo: &Path, from: &str, to: &str) -> Result<DiffSummary> {
        let range = format!("{}..{}", from, to);
        let output = self.run(repo, &["diff", "--numstat", &range]).await?;
        Ok(parse_numstat(&output))
    }

    async fn log(&self, repo: &Path, range: &LogRange) -> Result<Vec<String>> {
        let output = match range {
            LogRange::Since(reference) => {
                let range = format!("{}..HEAD", reference);
                self.run(repo, &["log", "--format=%s", &range]).await?
            }
            LogRange::Recent(count) => {
                let count = count.to_string();
                self.run(repo, &["log", "--format=%s", "-n", &count]).await?
            }
        };
        Ok(non_empty_lines(&output))
    }

    async fn raw_diff(&self, repo: &Path, from: &str, to: &str) -> Result<String> {
        let range = format!("{}..{}", from, to);
        self.run(repo, &["diff", &range]).await
    }
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Parses `git diff --numstat` output.
///
/// Binary files report `-` for both counts and contribute zero lines.
pub fn parse_numstat(output: &str) -> DiffSummary {
    let mut summary = DiffSummary::default();

    for line in output.lines().filter(|l| !l.is_empty()) {
        let parts: Vec<&str> = line.splitn(3, '\t').collect();
        if parts.len() < 3 {
            continue;
        }
        summary.insertions += parts[0].parse::<u64>().unwrap_or(0);
        summary.deletions += parts[1].parse::<u64>().unwrap_or(0);
        summary.files.push(PathBuf::from(parts[2]));
    }

    summary
}

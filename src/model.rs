//! Core release data model.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Previous-version sentinel used when no baseline tag exists.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Semantic version bump kind.
///
/// Variant order defines the total order `patch < minor < major`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    #[default]
    Patch,
    Minor,
    Major,
}

impl ReleaseType {
    /// All release types, lowest first.
    pub const ALL: [ReleaseType; 3] = [ReleaseType::Patch, ReleaseType::Minor, ReleaseType::Major];

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Patch => "patch",
            ReleaseType::Minor => "minor",
            ReleaseType::Major => "major",
        }
    }

    /// Combines per-package decisions into the largest bump.
    pub fn combine(types: impl IntoIterator<Item = ReleaseType>) -> Option<ReleaseType> {
        types.into_iter().max()
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patch" => Ok(ReleaseType::Patch),
            "minor" => Ok(ReleaseType::Minor),
            "major" => Ok(ReleaseType::Major),
            other => Err(Error::Config(format!("unknown release type '{}'", other))),
        }
    }
}

/// Change history inspected for a release run.
///
/// Built once per run and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffContext {
    /// Commit subjects in history-query order.
    pub commits: Vec<String>,
    /// Unified diff text, possibly truncated with an explicit marker.
    pub diff: String,
    /// Changed file paths, in the order git reported them.
    pub files: Vec<PathBuf>,
    /// Inserted lines.
    pub insertions: u64,
    /// Deleted lines.
    pub deletions: u64,
    /// Baseline tag name, or [`UNKNOWN_VERSION`].
    pub previous_version: String,
}

impl DiffContext {
    /// Context for a repository with no baseline tag.
    pub fn without_baseline(commits: Vec<String>) -> Self {
        Self {
            commits,
            diff: String::new(),
            files: Vec::new(),
            insertions: 0,
            deletions: 0,
            previous_version: UNKNOWN_VERSION.to_string(),
        }
    }

    /// Returns true when there is nothing to reason about.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Returns true if the context was measured against a baseline tag.
    pub fn has_baseline(&self) -> bool {
        self.previous_version != UNKNOWN_VERSION
    }
}

/// The bump kind and release note chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDecision {
    pub release_type: ReleaseType,
    pub message: String,
}

/// Pull request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    /// Returns true for closed and merged states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PrState::Open)
    }
}

/// A pull request on the review platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub head_branch: String,
    pub head_sha: String,
    pub state: PrState,
    pub mergeable: Option<bool>,
    pub merged: Option<bool>,
}

impl PullRequest {
    /// Enforces that a merged PR is in a terminal state.
    pub fn normalized(mut self) -> Self {
        if self.merged == Some(true) {
            self.state = PrState::Merged;
        } else if self.state == PrState::Merged {
            self.merged = Some(true);
        }
        self
    }
}

/// Merge strategy passed to the review platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Merge,
    #[default]
    Squash,
    Rebase,
}

impl MergeMethod {
    /// Returns the `gh pr merge` flag for this method.
    pub fn as_flag(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "--merge",
            MergeMethod::Squash => "--squash",
            MergeMethod::Rebase => "--rebase",
        }
    }
}

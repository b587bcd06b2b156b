//! Workflow stages, transitions and per-run state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::result::StageTiming;
use crate::error::{Error, Result};
use crate::model::{DiffContext, PullRequest, ReleaseType};
use crate::workarea::WorkArea;

/// One named state of the release workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    AcquireWorkspace,
    IdentifyPackage,
    BuildDiffContext,
    DecideReleaseType,
    DecideMessage,
    CreateBranch,
    WriteChangeset,
    CommitAndPush,
    OpenPullRequest,
    AwaitChangesetChecks,
    MergeChangeset,
    DiscoverVersionPr,
    AwaitVersionChecks,
    MergeVersionPr,
}

impl Stage {
    /// Every stage, in the order the runner executes them.
    pub const ALL: [Stage; 14] = [
        Stage::AcquireWorkspace,
        Stage::IdentifyPackage,
        Stage::BuildDiffContext,
        Stage::DecideReleaseType,
        Stage::DecideMessage,
        Stage::CreateBranch,
        Stage::WriteChangeset,
        Stage::CommitAndPush,
        Stage::OpenPullRequest,
        Stage::AwaitChangesetChecks,
        Stage::MergeChangeset,
        Stage::DiscoverVersionPr,
        Stage::AwaitVersionChecks,
        Stage::MergeVersionPr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::AcquireWorkspace => "acquire-workspace",
            Stage::IdentifyPackage => "identify-package",
            Stage::BuildDiffContext => "build-diff-context",
            Stage::DecideReleaseType => "decide-release-type",
            Stage::DecideMessage => "decide-message",
            Stage::CreateBranch => "create-branch",
            Stage::WriteChangeset => "write-changeset",
            Stage::CommitAndPush => "commit-and-push",
            Stage::OpenPullRequest => "open-pull-request",
            Stage::AwaitChangesetChecks => "await-changeset-checks",
            Stage::MergeChangeset => "merge-changeset",
            Stage::DiscoverVersionPr => "discover-version-pr",
            Stage::AwaitVersionChecks => "await-version-checks",
            Stage::MergeVersionPr => "merge-version-pr",
        }
    }

    /// Progress message shown when the stage starts.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::AcquireWorkspace => "Cloning repository",
            Stage::IdentifyPackage => "Reading package manifest and tags",
            Stage::BuildDiffContext => "Collecting changes",
            Stage::DecideReleaseType => "Choosing release type",
            Stage::DecideMessage => "Writing release message",
            Stage::CreateBranch => "Creating release branch",
            Stage::WriteChangeset => "Writing changeset",
            Stage::CommitAndPush => "Committing and pushing changeset",
            Stage::OpenPullRequest => "Opening changeset pull request",
            Stage::AwaitChangesetChecks => "Waiting for changeset checks",
            Stage::MergeChangeset => "Merging changeset pull request",
            Stage::DiscoverVersionPr => "Waiting for version pull request",
            Stage::AwaitVersionChecks => "Waiting for version checks",
            Stage::MergeVersionPr => "Merging version pull request",
        }
    }

    /// Gate stages ask the operator before running.
    pub fn is_gate(&self) -> bool {
        matches!(
            self,
            Stage::AwaitChangesetChecks
                | Stage::MergeChangeset
                | Stage::DiscoverVersionPr
                | Stage::AwaitVersionChecks
                | Stage::MergeVersionPr
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == wanted)
            .ok_or_else(|| Error::Config(format!("unknown stage '{}'", s)))
    }
}

/// What the runner does after a stage.
#[derive(Debug)]
pub enum Transition {
    /// Move to the next stage.
    Continue,
    /// Stop without error; the operator can resume by hand.
    Paused { reason: String },
    /// Abort the run.
    Fatal(Error),
}

impl Transition {
    pub fn paused(reason: impl Into<String>) -> Self {
        Transition::Paused {
            reason: reason.into(),
        }
    }
}

impl From<Result<()>> for Transition {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Transition::Continue,
            Err(e) => Transition::Fatal(e),
        }
    }
}

/// State accumulated by a run as stages complete.
///
/// Each field is filled in by exactly one stage; later stages read it back
/// through the accessors, which fail if the producing stage has not run.
#[derive(Debug, Default)]
pub struct RunContext {
    pub work_area: Option<WorkArea>,
    pub packages: Vec<String>,
    pub baseline_tag: Option<String>,
    pub diff: Option<DiffContext>,
    pub release_type: Option<ReleaseType>,
    pub message: Option<String>,
    pub branch: Option<String>,
    pub changeset_path: Option<PathBuf>,
    pub commit_id: Option<String>,
    pub changeset_pr: Option<PullRequest>,
    pub version_pr: Option<PullRequest>,
    pub timings: Vec<StageTiming>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkout(&self) -> Result<PathBuf> {
        self.work_area
            .as_ref()
            .map(WorkArea::checkout_dir)
            .ok_or(Error::State("work area"))
    }

    pub fn work_area_path(&self) -> Option<&Path> {
        self.work_area.as_ref().map(WorkArea::path)
    }

    pub fn diff(&self) -> Result<&DiffContext> {
        self.diff.as_ref().ok_or(Error::State("diff context"))
    }

    pub fn release_type(&self) -> Result<ReleaseType> {
        self.release_type.ok_or(Error::State("release type"))
    }

    pub fn message(&self) -> Result<&str> {
        self.message.as_deref().ok_or(Error::State("release message"))
    }

    pub fn branch(&self) -> Result<&str> {
        self.branch.as_deref().ok_or(Error::State("release branch"))
    }

    pub fn changeset_path(&self) -> Result<&Path> {
        self.changeset_path
            .as_deref()
            .ok_or(Error::State("changeset path"))
    }

    pub fn changeset_pr(&self) -> Result<&PullRequest> {
        self.changeset_pr.as_ref().ok_or(Error::State("changeset PR"))
    }

    pub fn version_pr(&self) -> Result<&PullRequest> {
        self.version_pr.as_ref().ok_or(Error::State("version PR"))
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.timings.push(StageTiming {
            stage,
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    /// Removes the work area. Failures are logged, never returned.
    pub fn release_work_area(&mut self) {
        if let Some(mut area) = self.work_area.take() {
            if let Err(e) = area.cleanup() {
                tracing::error!(error = %e, "work area cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stages_are_ordered() {
        let position = |s: Stage| Stage::ALL.iter().position(|x| *x == s).unwrap();
        assert_eq!(position(Stage::AcquireWorkspace), 0);
        assert!(position(Stage::DecideReleaseType) < position(Stage::DecideMessage));
        assert!(position(Stage::CommitAndPush) < position(Stage::OpenPullRequest));
        assert!(position(Stage::MergeChangeset) < position(Stage::DiscoverVersionPr));
        assert_eq!(position(Stage::MergeVersionPr), Stage::ALL.len() - 1);
    }

    #[test]
    fn only_trailing_stages_are_gates() {
        let gates: Vec<Stage> = Stage::ALL.into_iter().filter(Stage::is_gate).collect();
        assert_eq!(gates.len(), 5);
        assert_eq!(gates[0], Stage::AwaitChangesetChecks);
    }

    #[test]
    fn stage_names_parse() {
        for stage in Stage::ALL {
            assert_eq!(stage.name().parse::<Stage>().unwrap(), stage);
        }
        assert_eq!("commit_and_push".parse::<Stage>().unwrap(), Stage::CommitAndPush);
        assert!("deploy".parse::<Stage>().is_err());
    }

    #[test]
    fn stage_serializes_as_name() {
        assert_eq!(
            serde_json::to_string(&Stage::DiscoverVersionPr).unwrap(),
            "\"discover-version-pr\""
        );
    }

    #[test]
    fn transition_from_result() {
        assert!(matches!(Transition::from(Ok(())), Transition::Continue));
        assert!(matches!(
            Transition::from(Err(Error::Git("x".to_string()))),
            Transition::Fatal(Error::Git(_))
        ));
    }

    #[test]
    fn accessors_report_missing_state() {
        let ctx = RunContext::new();
        assert!(matches!(ctx.checkout(), Err(Error::State("work area"))));
        assert!(matches!(ctx.release_type(), Err(Error::State("release type"))));
        assert!(ctx.changeset_pr().is_err());
    }

    #[test]
    fn release_work_area_removes_directory() {
        let root = TempDir::new().unwrap();
        let mut ctx = RunContext::new();
        ctx.work_area = Some(WorkArea::create(root.path()).unwrap());
        let path = ctx.work_area_path().unwrap().to_path_buf();

        ctx.release_work_area();
        assert!(!path.exists());
        assert!(ctx.work_area.is_none());
        ctx.release_work_area();
    }
}

//! release-pilot - changeset-driven package release orchestration
//!
//! This library clones a repository, decides a semantic version bump and a
//! release note, and drives the resulting changeset through pull request
//! review, CI, and the downstream version PR until it is merged.

pub mod changeset;
pub mod config;
pub mod error;
pub mod git;
pub mod model;
pub mod notes;
pub mod output;
pub mod package;
pub mod poll;
pub mod pr;
pub mod release;
pub mod status;
pub mod workarea;

pub use changeset::Changeset;
pub use config::{ReleaseConfig, Validate, ValidationResult, DEFAULT_CONFIG_FILE};
pub use error::{Error, Result};
pub use git::{DiffSummary, GitCli, LogRange, SourceControl};
pub use model::{
    DiffContext, MergeMethod, PrState, PullRequest, ReleaseDecision, ReleaseType, UNKNOWN_VERSION,
};
pub use notes::{CliNoteGenerator, NoteBackend, NoteGenerator};
pub use output::{ConsoleSink, Decision, JsonSink, OutputSink};
pub use package::{ManifestKind, PackageInfo};
pub use poll::{discover_pull_request, poll_until, wait_for_checks, PollConfig, PollTimeout};
pub use pr::{extract_pr_number, parse_repo_slug, GhCli, ReviewPlatform};
pub use release::{ReleaseRequest, ReleaseRunner, RunOutcome, RunReport, Stage, Transition};
pub use status::{normalize, CheckConclusion, CheckRun, CheckSource, CheckStatus, ChecksSummary, RawCheck};
pub use workarea::WorkArea;

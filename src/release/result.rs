//! Outcome and report of a release run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::state::Stage;
use crate::model::{PullRequest, ReleaseType};

/// How a release run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The version PR was merged.
    Released,
    /// The run stopped early at the operator's request.
    Paused { stage: Stage, reason: String },
    /// The run aborted.
    Failed {
        stage: Stage,
        error: String,
        /// Failure came from CI or a polling timeout rather than setup.
        gate: bool,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }
}

/// Time spent in one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Everything a run produced, for display or JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub repo_url: String,
    pub packages: Vec<String>,
    pub previous_version: Option<String>,
    pub release_type: Option<ReleaseType>,
    pub message: Option<String>,
    pub branch: Option<String>,
    pub changeset_path: Option<PathBuf>,
    pub commit_id: Option<String>,
    pub changeset_pr: Option<PullRequest>,
    pub version_pr: Option<PullRequest>,
    pub stages: Vec<StageTiming>,
    pub outcome: RunOutcome,
    pub duration_ms: u64,
}

impl RunReport {
    /// Process exit code: 0 for a release or a pause, 1 for any failure.
    pub fn exit_code(&self) -> i32 {
        if self.outcome.is_success() {
            0
        } else {
            1
        }
    }

    /// One-line human summary of the outcome.
    pub fn summary(&self) -> String {
        match &self.outcome {
            RunOutcome::Released => {
                let pr = self
                    .version_pr
                    .as_ref()
                    .map(|pr| format!(" via {}", pr.url))
                    .unwrap_or_default();
                format!(
                    "released {} {}{}",
                    self.packages.join(", "),
                    self.release_type.map(|t| t.as_str()).unwrap_or("release"),
                    pr
                )
            }
            RunOutcome::Paused { stage, reason } => {
                format!("paused after {}: {} (resume manually)", stage, reason)
            }
            RunOutcome::Failed { stage, error, .. } => {
                format!("failed during {}: {}", stage, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: RunOutcome) -> RunReport {
        RunReport {
            repo_url: "https://github.com/acme/auth".to_string(),
            packages: vec!["@acme/auth".to_string()],
            previous_version: None,
            release_type: Some(ReleaseType::Minor),
            message: Some("Add OAuth support".to_string()),
            branch: None,
            changeset_path: None,
            commit_id: None,
            changeset_pr: None,
            version_pr: None,
            stages: vec![
                StageTiming {
                    stage: Stage::AcquireWorkspace,
                    duration_ms: 1200,
                },
                StageTiming {
                    stage: Stage::IdentifyPackage,
                    duration_ms: 300,
                },
            ],
            outcome,
            duration_ms: 1600,
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(report(RunOutcome::Released).exit_code(), 0);
        assert_eq!(
            report(RunOutcome::Paused {
                stage: Stage::AwaitChangesetChecks,
                reason: "declined".to_string()
            })
            .exit_code(),
            0
        );
        assert_eq!(
            report(RunOutcome::Failed {
                stage: Stage::AwaitChangesetChecks,
                error: "checks failed".to_string(),
                gate: true,
            })
            .exit_code(),
            1
        );
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(report(RunOutcome::Paused {
            stage: Stage::MergeChangeset,
            reason: "declined".to_string(),
        }))
        .unwrap();

        assert_eq!(json["outcome"]["status"], "paused");
        assert_eq!(json["outcome"]["stage"], "merge-changeset");
        assert_eq!(json["release_type"], "minor");
    }

    #[test]
    fn summary_mentions_stage() {
        let summary = report(RunOutcome::Failed {
            stage: Stage::AcquireWorkspace,
            error: "clone failed".to_string(),
            gate: false,
        })
        .summary();
        assert!(summary.contains("acquire-workspace"));
        assert!(summary.contains("clone failed"));
    }
}

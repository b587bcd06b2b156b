//! Check-run status normalization.
//!
//! The review platform reports CI state in two shapes: a structured JSON
//! rollup with uppercase tokens, and the tab-separated text printed by
//! `gh pr checks`. Both are mapped onto the canonical [`CheckRun`] model
//! here. Every function in this module is total.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
}

/// Outcome of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
}

impl CheckConclusion {
    /// Returns true for conclusions that let a release proceed.
    pub fn is_passing(&self) -> bool {
        matches!(self, CheckConclusion::Success | CheckConclusion::Skipped)
    }

    fn as_token(&self) -> &'static str {
        match self {
            CheckConclusion::Success => "SUCCESS",
            CheckConclusion::Failure => "FAILURE",
            CheckConclusion::Neutral => "NEUTRAL",
            CheckConclusion::Cancelled => "CANCELLED",
            CheckConclusion::Skipped => "SKIPPED",
            CheckConclusion::TimedOut => "TIMED_OUT",
            CheckConclusion::ActionRequired => "ACTION_REQUIRED",
        }
    }
}

/// One named CI job at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: CheckStatus,
    /// Set only when `status` is completed, and always set then.
    pub conclusion: Option<CheckConclusion>,
}

impl CheckRun {
    /// Builds a check run, enforcing the status/conclusion invariant.
    pub fn new(
        name: impl Into<String>,
        status: CheckStatus,
        conclusion: Option<CheckConclusion>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            conclusion,
        }
        .canonical()
    }

    /// Returns the canonical form of this value.
    ///
    /// A completed run without a conclusion becomes neutral; a run that is
    /// not completed carries no conclusion.
    pub fn canonical(mut self) -> Self {
        match self.status {
            CheckStatus::Completed => {
                self.conclusion.get_or_insert(CheckConclusion::Neutral);
            }
            CheckStatus::Queued | CheckStatus::InProgress => self.conclusion = None,
        }
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == CheckStatus::Completed
    }
}

/// A check entry as it appears in the structured rollup.
///
/// Check runs carry `name`/`status`/`conclusion`; legacy commit statuses
/// carry `context`/`state` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheck {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl From<&CheckRun> for RawCheck {
    fn from(run: &CheckRun) -> Self {
        let status = match run.status {
            CheckStatus::Queued => "QUEUED",
            CheckStatus::InProgress => "IN_PROGRESS",
            CheckStatus::Completed => "COMPLETED",
        };
        Self {
            name: Some(run.name.clone()),
            status: Some(status.to_string()),
            conclusion: run.conclusion.map(|c| c.as_token().to_string()),
            ..Default::default()
        }
    }
}

/// The shape in which check data was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSource {
    /// Entries from the JSON status rollup.
    Structured(Vec<RawCheck>),
    /// Text output of `gh pr checks`, one check per line.
    Tabular(String),
}

/// Normalizes either check shape into canonical check runs.
pub fn normalize(source: &CheckSource) -> Vec<CheckRun> {
    match source {
        CheckSource::Structured(raw) => raw.iter().filter_map(normalize_structured).collect(),
        CheckSource::Tabular(text) => text.lines().filter_map(parse_tabular_line).collect(),
    }
}

/// Maps an uppercase status token onto [`CheckStatus`].
pub fn normalize_status(token: &str) -> CheckStatus {
    match token.trim().to_ascii_uppercase().as_str() {
        "COMPLETED" => CheckStatus::Completed,
        "IN_PROGRESS" | "PENDING" => CheckStatus::InProgress,
        _ => CheckStatus::Queued,
    }
}

/// Maps an uppercase conclusion token onto [`CheckConclusion`].
pub fn normalize_conclusion(token: Option<&str>) -> Option<CheckConclusion> {
    match token?.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" => Some(CheckConclusion::Success),
        "FAILURE" => Some(CheckConclusion::Failure),
        "NEUTRAL" => Some(CheckConclusion::Neutral),
        "CANCELLED" => Some(CheckConclusion::Cancelled),
        "SKIPPED" => Some(CheckConclusion::Skipped),
        "TIMED_OUT" => Some(CheckConclusion::TimedOut),
        "ACTION_REQUIRED" => Some(CheckConclusion::ActionRequired),
        _ => None,
    }
}

/// Maps a commit-status `state` token onto the canonical pair.
fn normalize_commit_state(token: &str) -> (CheckStatus, Option<CheckConclusion>) {
    match token.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" => (CheckStatus::Completed, Some(CheckConclusion::Success)),
        "FAILURE" | "ERROR" => (CheckStatus::Completed, Some(CheckConclusion::Failure)),
        "PENDING" | "EXPECTED" => (CheckStatus::InProgress, None),
        _ => (CheckStatus::Queued, None),
    }
}

fn normalize_structured(raw: &RawCheck) -> Option<CheckRun> {
    let name = raw
        .name
        .as_deref()
        .or(raw.context.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())?;

    let (status, conclusion) = match (&raw.status, &raw.state) {
        (None, Some(state)) => normalize_commit_state(state),
        (status, _) => (
            normalize_status(status.as_deref().unwrap_or_default()),
            normalize_conclusion(raw.conclusion.as_deref()),
        ),
    };

    Some(CheckRun::new(name, status, conclusion))
}

/// Parses one line of `gh pr checks` output.
///
/// Returns `None` for lines without a name and a tab-separated status word,
/// which covers summary banners and blank lines.
pub fn parse_tabular_line(line: &str) -> Option<CheckRun> {
    let mut fields = line.split('\t');
    let name = fields.next()?.trim();
    let word = fields.next()?.trim().to_ascii_lowercase();

    if name.is_empty() || word.is_empty() {
        return None;
    }
    // Column header row.
    if name.eq_ignore_ascii_case("name") && word == "status" {
        return None;
    }

    let (status, conclusion) = match word.as_str() {
        "pass" | "success" => (CheckStatus::Completed, Some(CheckConclusion::Success)),
        "fail" | "failure" => (CheckStatus::Completed, Some(CheckConclusion::Failure)),
        "pending" | "in_progress" => (CheckStatus::InProgress, None),
        "skipping" | "skipped" => (CheckStatus::Completed, Some(CheckConclusion::Skipped)),
        _ => (CheckStatus::Queued, None),
    };

    Some(CheckRun::new(name, status, conclusion))
}

/// Aggregate view over one check snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksSummary {
    pub runs: Vec<CheckRun>,
}

impl ChecksSummary {
    pub fn new(runs: Vec<CheckRun>) -> Self {
        Self { runs }
    }

    /// True when every run has completed. Vacuously true when empty.
    pub fn all_completed(&self) -> bool {
        self.runs.iter().all(CheckRun::is_completed)
    }

    /// True when every conclusion is success or skipped.
    pub fn is_success(&self) -> bool {
        self.runs
            .iter()
            .all(|r| r.conclusion.is_some_and(|c| c.is_passing()))
    }

    /// Names of completed runs that did not pass.
    pub fn failing(&self) -> Vec<String> {
        self.runs
            .iter()
            .filter(|r| r.is_completed() && !r.conclusion.is_some_and(|c| c.is_passing()))
            .map(|r| r.name.clone())
            .collect()
    }

    /// Names of runs that have not completed.
    pub fn pending(&self) -> Vec<String> {
        self.runs
            .iter()
            .filter(|r| !r.is_completed())
            .map(|r| r.name.clone())
            .collect()
    }

    /// One-line description for logs and timeout diagnostics.
    pub fn describe(&self) -> String {
        let pending = self.pending();
        if self.runs.is_empty() {
            "no checks reported".to_string()
        } else if pending.is_empty() {
            format!("{} checks completed", self.runs.len())
        } else {
            format!(
                "{}/{} pending: {}",
                pending.len(),
                self.runs.len(),
                pending.join(", ")
            )
        }
    }
}

//! Error types for release-pilot.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for release runs.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to create the run's work area.
    #[error("failed to create work area: {0}")]
    WorkAreaCreation(String),

    /// Failed to remove the run's work area.
    #[error("failed to clean up work area at {path}: {reason}")]
    WorkAreaCleanup { path: PathBuf, reason: String },

    /// Git operation failed.
    #[error("git operation failed: {0}")]
    Git(String),

    /// GitHub operation failed.
    #[error("GitHub operation failed: {0}")]
    GitHub(String),

    /// The PR creation response did not identify a pull request.
    #[error("could not parse pull request number from response: {0:?}")]
    InvalidPrResponse(String),

    /// Note generator failed.
    #[error("note generator failed: {0}")]
    Generator(String),

    /// Package manifest could not be read.
    #[error("package manifest error: {0}")]
    Manifest(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Interactive prompt failed.
    #[error("prompt failed: {0}")]
    Prompt(String),

    /// No release message could be obtained.
    #[error("no release message supplied and none could be generated")]
    MissingMessage,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A polling gate did not become satisfied in time.
    #[error("timed out after {}s waiting for {what}{}", waited.as_secs(), last_observed.as_ref().map(|l| format!(" (last observed: {})", l)).unwrap_or_default())]
    Timeout {
        what: String,
        waited: Duration,
        last_observed: Option<String>,
    },

    /// CI checks completed unsuccessfully.
    #[error("checks failed on PR #{pr}: {}", failing.join(", "))]
    ChecksFailed { pr: u64, failing: Vec<String> },

    /// The run was cancelled by the operator.
    #[error("interrupted")]
    Interrupted,

    /// A stage ran before the state it depends on was produced.
    #[error("release state missing: {0}")]
    State(&'static str),
}

impl Error {
    /// Returns true for errors raised by an external gate (CI or polling)
    /// rather than by setup or I/O.
    pub fn is_gate_failure(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::ChecksFailed { .. })
    }
}

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

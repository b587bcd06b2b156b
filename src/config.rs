//! Release configuration and validation.
//!
//! Configuration is read from an optional TOML file. Every field has a
//! default, so an empty file (or no file) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::MergeMethod;
use crate::notes::NoteBackend;
use crate::poll::PollConfig;

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "release-pilot.toml";

/// Repository checkout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Branch releases are cut from and merged into.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Remote the release branch is pushed to.
    #[serde(default = "default_remote")]
    pub remote: String,
    /// History depth for the shallow clone.
    #[serde(default = "default_clone_depth")]
    pub clone_depth: u32,
    /// Glob matching version tags.
    #[serde(default = "default_tag_pattern")]
    pub tag_pattern: String,
    /// Directory work areas are created under. Defaults to the temp dir.
    #[serde(default)]
    pub work_root: Option<PathBuf>,
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_clone_depth() -> u32 {
    100
}

fn default_tag_pattern() -> String {
    "v*".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_branch: default_base_branch(),
            remote: default_remote(),
            clone_depth: default_clone_depth(),
            tag_pattern: default_tag_pattern(),
            work_root: None,
        }
    }
}

impl RepositoryConfig {
    /// Returns the directory work areas are created under.
    pub fn work_root(&self) -> PathBuf {
        self.work_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("release-pilot"))
    }
}

/// Change-history analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum characters of raw diff handed to the note generator.
    #[serde(default = "default_diff_char_budget")]
    pub diff_char_budget: usize,
    /// Commits inspected when there is no baseline tag.
    #[serde(default = "default_fallback_commit_count")]
    pub fallback_commit_count: usize,
}

fn default_diff_char_budget() -> usize {
    10_000
}

fn default_fallback_commit_count() -> usize {
    15
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            diff_char_budget: default_diff_char_budget(),
            fallback_commit_count: default_fallback_commit_count(),
        }
    }
}

/// Changeset record settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesetConfig {
    /// Repository-relative directory changeset records are written to.
    #[serde(default = "default_changeset_dir")]
    pub directory: PathBuf,
    /// Explicit package names. When empty, the manifest name is used.
    #[serde(default)]
    pub packages: Vec<String>,
}

fn default_changeset_dir() -> PathBuf {
    PathBuf::from(".changeset")
}

impl Default for ChangesetConfig {
    fn default() -> Self {
        Self {
            directory: default_changeset_dir(),
            packages: Vec::new(),
        }
    }
}

/// Downstream version-bump automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Prefix of the branch the automation opens its version PR from.
    #[serde(default = "default_version_branch_prefix")]
    pub version_branch_prefix: String,
    /// Merge strategy for both PRs.
    #[serde(default)]
    pub merge_method: MergeMethod,
}

fn default_version_branch_prefix() -> String {
    "changeset-release".to_string()
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            version_branch_prefix: default_version_branch_prefix(),
            merge_method: MergeMethod::default(),
        }
    }
}

impl AutomationConfig {
    /// Head branch of the version PR for `base_branch`.
    pub fn version_branch(&self, base_branch: &str) -> String {
        format!("{}/{}", self.version_branch_prefix, base_branch)
    }
}

/// Timeout and interval for one polling gate, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub interval_secs: u64,
}

impl PollSettings {
    pub fn to_poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.timeout_secs),
            Duration::from_secs(self.interval_secs),
        )
    }
}

/// Settings for the CI checks gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksPollConfig {
    #[serde(default = "default_checks_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_checks_interval")]
    pub interval_secs: u64,
    /// Treat an empty check list as "not registered yet".
    #[serde(default = "default_require_checks")]
    pub require_checks: bool,
}

fn default_checks_timeout() -> u64 {
    1800
}

fn default_checks_interval() -> u64 {
    15
}

fn default_require_checks() -> bool {
    true
}

impl Default for ChecksPollConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_checks_timeout(),
            interval_secs: default_checks_interval(),
            require_checks: default_require_checks(),
        }
    }
}

impl ChecksPollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            timeout_secs: self.timeout_secs,
            interval_secs: self.interval_secs,
        }
    }
}

/// Settings for the version PR discovery gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPollConfig {
    #[serde(default = "default_discovery_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_discovery_interval")]
    pub interval_secs: u64,
}

fn default_discovery_timeout() -> u64 {
    600
}

fn default_discovery_interval() -> u64 {
    10
}

impl Default for DiscoveryPollConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_discovery_timeout(),
            interval_secs: default_discovery_interval(),
        }
    }
}

impl DiscoveryPollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            timeout_secs: self.timeout_secs,
            interval_secs: self.interval_secs,
        }
    }
}

/// Polling gate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default)]
    pub checks: ChecksPollConfig,
    #[serde(default)]
    pub discovery: DiscoveryPollConfig,
}

/// Note generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    #[serde(default)]
    pub backend: NoteBackend,
    /// Model passed to the backend CLI, if any.
    #[serde(default)]
    pub model: Option<String>,
    /// Wall-clock limit for one generator call.
    #[serde(default = "default_notes_timeout")]
    pub timeout_secs: u64,
}

fn default_notes_timeout() -> u64 {
    120
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            backend: NoteBackend::default(),
            model: None,
            timeout_secs: default_notes_timeout(),
        }
    }
}

impl NotesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level release configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub changeset: ChangesetConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub notes: NotesConfig,
}

impl ReleaseConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads configuration from `path`.
    ///
    /// With no explicit path, [`DEFAULT_CONFIG_FILE`] is read if it exists
    /// and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Self::from_toml(&text)
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for ReleaseConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.repository.base_branch.trim().is_empty() {
            result.add_error("repository.base_branch cannot be empty");
        }
        if self.repository.clone_depth == 0 {
            result.add_error("repository.clone_depth must be at least 1");
        }
        if self.automation.version_branch_prefix.trim().is_empty() {
            result.add_error("automation.version_branch_prefix cannot be empty");
        }
        if self.changeset.directory.is_absolute() {
            result.add_error("changeset.directory must be relative to the repository");
        }
        if self.analysis.fallback_commit_count == 0 {
            result.add_warning("analysis.fallback_commit_count = 0 gives the note generator no history");
        }
        if self.analysis.diff_char_budget < 1000 {
            result.add_warning("analysis.diff_char_budget under 1000 characters leaves little context");
        }

        let checks = &self.polling.checks;
        if checks.interval_secs > checks.timeout_secs {
            result.add_error("polling.checks.interval_secs exceeds timeout_secs");
        }
        let discovery = &self.polling.discovery;
        if discovery.interval_secs > discovery.timeout_secs {
            result.add_error("polling.discovery.interval_secs exceeds timeout_secs");
        }
        if checks.interval_secs == 0 || discovery.interval_secs == 0 {
            result.add_warning("a zero polling interval queries the review platform continuously");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_config_has_sensible_defaults() {
        let config = ReleaseConfig::default();

        assert_eq!(config.repository.base_branch, "main");
        assert_eq!(config.repository.remote, "origin");
        assert_eq!(config.analysis.diff_char_budget, 10_000);
        assert_eq!(config.analysis.fallback_commit_count, 15);
        assert_eq!(config.changeset.directory, PathBuf::from(".changeset"));
        assert_eq!(config.automation.version_branch("main"), "changeset-release/main");
        assert_eq!(config.automation.merge_method, MergeMethod::Squash);
        assert_eq!(
            config.polling.checks.settings().to_poll_config(),
            PollConfig::checks()
        );
        assert_eq!(
            config.polling.discovery.settings().to_poll_config(),
            PollConfig::discovery()
        );
        assert!(config.polling.checks.require_checks);
        assert!(config.validate().is_valid());
    }

    #[test]
    fn release_config_deserializes_from_toml() {
        let toml = r#"
            [repository]
            base_branch = "develop"
            tag_pattern = "pkg@*"

            [changeset]
            packages = ["@acme/core", "@acme/cli"]

            [automation]
            merge_method = "rebase"

            [polling.checks]
            timeout_secs = 60
            require_checks = false

            [notes]
            backend = "gemini"
        "#;

        let config = ReleaseConfig::from_toml(toml).unwrap();
        assert_eq!(config.repository.base_branch, "develop");
        assert_eq!(config.repository.tag_pattern, "pkg@*");
        assert_eq!(config.repository.clone_depth, 100);
        assert_eq!(config.changeset.packages.len(), 2);
        assert_eq!(config.automation.merge_method, MergeMethod::Rebase);
        assert_eq!(config.polling.checks.timeout_secs, 60);
        assert_eq!(config.polling.checks.interval_secs, 15);
        assert!(!config.polling.checks.require_checks);
        assert_eq!(config.notes.backend, NoteBackend::Gemini);
    }

    #[test]
    fn empty_toml_is_default() {
        let config = ReleaseConfig::from_toml("").unwrap();
        assert_eq!(config.repository.base_branch, "main");
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ReleaseConfig::from_toml("[repository\nbase_branch = 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[analysis]\nfallback_commit_count = 5\n").unwrap();

        let config = ReleaseConfig::load(Some(&path)).unwrap();
        assert_eq!(config.analysis.fallback_commit_count, 5);
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let err = ReleaseConfig::load(Some(Path::new("/nonexistent/release-pilot.toml")));
        assert!(err.is_err());
    }

    #[test]
    fn validation_rejects_inverted_polling() {
        let mut config = ReleaseConfig::default();
        config.polling.discovery.interval_secs = 900;

        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.into_result().is_err());
    }

    #[test]
    fn validation_rejects_absolute_changeset_dir() {
        let mut config = ReleaseConfig::default();
        config.changeset.directory = PathBuf::from("/tmp/changes");
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn validation_warns_on_zero_interval() {
        let mut config = ReleaseConfig::default();
        config.polling.checks.interval_secs = 0;

        let result = config.validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }
}

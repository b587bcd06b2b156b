//! Note generator backed by an LLM command-line tool.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::model::{DiffContext, ReleaseType};

use super::prompts::{ReleaseTypePromptBuilder, SummaryPromptBuilder};
use super::{NoteBackend, NoteGenerator};

/// Runs `claude` or `gemini` in non-interactive mode and reads its answer.
pub struct CliNoteGenerator {
    backend: NoteBackend,
    /// Path to the CLI binary.
    cli_path: String,
    /// Model to use, if the backend default should be overridden.
    model: Option<String>,
    /// Wall-clock limit for one call.
    timeout: Duration,
}

impl CliNoteGenerator {
    /// Creates a generator using the backend's default command name.
    pub fn new(backend: NoteBackend) -> Self {
        let cli_path = match backend {
            NoteBackend::Claude => "claude",
            NoteBackend::Gemini => "gemini",
        };
        Self {
            backend,
            cli_path: cli_path.to_string(),
            model: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Sets a custom CLI path.
    pub fn with_cli_path(mut self, cli_path: impl Into<String>) -> Self {
        self.cli_path = cli_path.into();
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the command arguments for a one-shot prompt.
    fn build_args(&self, prompt: &str) -> Vec<String> {
        let mut args = match self.backend {
            NoteBackend::Claude => vec![
                "--print".to_string(),
                "--output-format".to_string(),
                "text".to_string(),
            ],
            NoteBackend::Gemini => vec!["--non-interactive".to_string()],
        };

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        match self.backend {
            NoteBackend::Claude => args.push("-p".to_string()),
            NoteBackend::Gemini => args.push("--prompt".to_string()),
        }
        args.push(prompt.to_string());

        args
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        let args = self.build_args(prompt);

        tracing::debug!(cli = %self.cli_path, prompt_chars = prompt.len(), "invoking note generator");

        let child = Command::new(&self.cli_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::Generator(format!(
                    "{} did not answer within {}s",
                    self.cli_path,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Generator(format!("failed to run {}: {}", self.cli_path, e)))?;

        if !output.status.success() {
            return Err(Error::Generator(format!(
                "{} exited with {}: {}",
                self.cli_path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl NoteGenerator for CliNoteGenerator {
    async fn suggest_release_type(&self, context: &DiffContext) -> Result<ReleaseType> {
        if context.is_empty() {
            return Ok(ReleaseType::Patch);
        }
        let answer = self.ask(&ReleaseTypePromptBuilder::new(context).build()).await?;
        parse_release_type(&answer)
    }

    async fn generate_summary(
        &self,
        packages: &[String],
        release_type: ReleaseType,
        context: &DiffContext,
    ) -> Result<String> {
        let prompt = SummaryPromptBuilder::new(packages, release_type, context).build();
        let answer = self.ask(&prompt).await?;
        Ok(strip_markdown(&answer))
    }

    fn name(&self) -> &str {
        match self.backend {
            NoteBackend::Claude => "claude-code",
            NoteBackend::Gemini => "gemini-cli",
        }
    }
}

/// Finds the first release type word in a generator answer.
pub fn parse_release_type(answer: &str) -> Result<ReleaseType> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"(?i)\b(patch|minor|major)\b").expect("valid regex"));

    pattern
        .find(answer)
        .ok_or_else(|| Error::Generator(format!("no release type in answer: {:?}", answer)))?
        .as_str()
        .parse()
}

/// Reduces generator output to plain prose.
pub fn strip_markdown(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with("```"))
        .map(|l| {
            l.trim_start_matches('#')
                .trim_start()
                .trim_start_matches("- ")
                .trim_start_matches("* ")
                .replace("**", "")
                .replace("__", "")
                .replace('`', "")
        })
        .filter(|l| !l.is_empty())
        .collect();

    lines.join(" ").trim().to_string()
}

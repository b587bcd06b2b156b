//! Operator-facing output and confirmation.
//!
//! The runner never prints or prompts directly. It talks to an
//! [`OutputSink`], so the same workflow runs interactively, unattended, or
//! with machine-readable output.

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::error::{Error, Result};
use crate::model::ReleaseType;
use crate::release::RunReport;

/// Operator answer at a confirmation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Decline,
}

/// Capability for reporting progress and asking the operator.
pub trait OutputSink: Send + Sync {
    /// Reports progress.
    fn status(&self, message: &str);

    /// Asks whether to continue.
    fn confirm(&self, prompt: &str) -> Result<Decision>;

    /// Picks the release type, offering `suggested` as the default.
    fn choose_release_type(&self, suggested: ReleaseType) -> Result<ReleaseType>;

    /// Settles the release message. `generated` is `None` when no summary
    /// could be generated; returning `None` means no message is available.
    fn request_message(&self, generated: Option<&str>) -> Result<Option<String>>;

    /// Emits the final report.
    fn emit_result(&self, report: &RunReport) -> Result<()>;
}

fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Prompt(e.to_string())
}

/// Interactive terminal sink.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    /// Skip confirmations and accept suggestions (`--yes`).
    pub assume_yes: bool,
}

impl ConsoleSink {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl OutputSink for ConsoleSink {
    fn status(&self, message: &str) {
        println!("==> {}", message);
    }

    fn confirm(&self, prompt: &str) -> Result<Decision> {
        if self.assume_yes {
            println!("  {} (--yes)", prompt);
            return Ok(Decision::Proceed);
        }

        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(prompt_error)?;

        Ok(if proceed {
            Decision::Proceed
        } else {
            Decision::Decline
        })
    }

    fn choose_release_type(&self, suggested: ReleaseType) -> Result<ReleaseType> {
        if self.assume_yes {
            return Ok(suggested);
        }

        let items: Vec<&str> = ReleaseType::ALL.iter().map(|t| t.as_str()).collect();
        let default = ReleaseType::ALL
            .iter()
            .position(|t| *t == suggested)
            .unwrap_or(0);

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Release type (suggested: {})", suggested))
            .items(&items)
            .default(default)
            .interact()
            .map_err(prompt_error)?;

        Ok(ReleaseType::ALL.get(selection).copied().unwrap_or(suggested))
    }

    fn request_message(&self, generated: Option<&str>) -> Result<Option<String>> {
        if let (true, Some(text)) = (self.assume_yes, generated) {
            return Ok(Some(text.to_string()));
        }

        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme).with_prompt("Release message");
        match generated {
            Some(text) => {
                println!("Generated summary:\n  {}", text);
                input = input.default(text.to_string());
            }
            None => println!("No summary could be generated; please describe the release."),
        }

        let message = input.interact_text().map_err(prompt_error)?;
        let message = message.trim();
        Ok((!message.is_empty()).then(|| message.to_string()))
    }

    fn emit_result(&self, report: &RunReport) -> Result<()> {
        println!();
        println!("{}", report.summary());
        if let Some(pr) = &report.changeset_pr {
            println!("  changeset PR: {}", pr.url);
        }
        if let Some(pr) = &report.version_pr {
            println!("  version PR:   {}", pr.url);
        }
        println!("  took {:.1}s", report.duration_ms as f64 / 1000.0);
        Ok(())
    }
}

/// Unattended sink that prints the report as JSON on stdout.
///
/// Confirmations always proceed and suggestions are accepted. Progress goes
/// to the log so stdout stays machine-readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSink;

impl OutputSink for JsonSink {
    fn status(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn confirm(&self, prompt: &str) -> Result<Decision> {
        tracing::debug!(prompt, "auto-confirmed");
        Ok(Decision::Proceed)
    }

    fn choose_release_type(&self, suggested: ReleaseType) -> Result<ReleaseType> {
        Ok(suggested)
    }

    fn request_message(&self, generated: Option<&str>) -> Result<Option<String>> {
        Ok(generated.map(str::to_string))
    }

    fn emit_result(&self, report: &RunReport) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(report)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sink_never_blocks() {
        let sink = JsonSink;
        assert_eq!(sink.confirm("Merge?").unwrap(), Decision::Proceed);
        assert_eq!(
            sink.choose_release_type(ReleaseType::Minor).unwrap(),
            ReleaseType::Minor
        );
        assert_eq!(
            sink.request_message(Some("Adds OAuth")).unwrap().as_deref(),
            Some("Adds OAuth")
        );
        assert_eq!(sink.request_message(None).unwrap(), None);
    }

    #[test]
    fn console_sink_with_yes_skips_prompts() {
        let sink = ConsoleSink::new(true);
        assert_eq!(sink.confirm("Merge?").unwrap(), Decision::Proceed);
        assert_eq!(
            sink.choose_release_type(ReleaseType::Major).unwrap(),
            ReleaseType::Major
        );
        assert_eq!(
            sink.request_message(Some("Adds OAuth")).unwrap().as_deref(),
            Some("Adds OAuth")
        );
    }
}

//! Release note generation.
//!
//! A [`NoteGenerator`] suggests a release type and drafts a prose summary
//! from a [`DiffContext`]. Generator failures never fail a release: use
//! [`suggest_or_patch`] and [`summarize_or_none`] to get the degraded values.

mod cli;
mod prompts;

pub use cli::{parse_release_type, strip_markdown, CliNoteGenerator};
pub use prompts::{ReleaseTypePromptBuilder, SummaryPromptBuilder};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DiffContext, ReleaseType};

/// LLM command-line backend used for note generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteBackend {
    #[default]
    Claude,
    Gemini,
}

/// Produces release type suggestions and summaries.
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    /// Suggests a release type for the changes in `context`.
    ///
    /// Implementations return `patch` for an empty commit list without
    /// calling out.
    async fn suggest_release_type(&self, context: &DiffContext) -> Result<ReleaseType>;

    /// Drafts a plain-prose release note.
    async fn generate_summary(
        &self,
        packages: &[String],
        release_type: ReleaseType,
        context: &DiffContext,
    ) -> Result<String>;

    /// Returns the name of this generator.
    fn name(&self) -> &str;
}

/// Asks for a release type suggestion, falling back to `patch`.
pub async fn suggest_or_patch(generator: &dyn NoteGenerator, context: &DiffContext) -> ReleaseType {
    if context.is_empty() {
        tracing::info!("no commits to analyse, suggesting patch");
        return ReleaseType::Patch;
    }

    match generator.suggest_release_type(context).await {
        Ok(release_type) => {
            tracing::info!(generator = generator.name(), suggestion = %release_type, "release type suggested");
            release_type
        }
        Err(e) => {
            tracing::warn!(generator = generator.name(), error = %e, "release type suggestion failed, defaulting to patch");
            ReleaseType::Patch
        }
    }
}

/// Asks for a summary, returning `None` if the generator fails or says nothing.
pub async fn summarize_or_none(
    generator: &dyn NoteGenerator,
    packages: &[String],
    release_type: ReleaseType,
    context: &DiffContext,
) -> Option<String> {
    match generator.generate_summary(packages, release_type, context).await {
        Ok(summary) if !summary.trim().is_empty() => Some(summary.trim().to_string()),
        Ok(_) => {
            tracing::warn!(generator = generator.name(), "generator returned an empty summary");
            None
        }
        Err(e) => {
            tracing::warn!(generator = generator.name(), error = %e, "summary generation failed");
            None
        }
    }
}

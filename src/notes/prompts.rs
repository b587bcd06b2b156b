//! Prompt builders for release note generation.

use crate::model::{DiffContext, ReleaseType};

/// Maximum number of changed files listed in a prompt.
const MAX_LISTED_FILES: usize = 50;

fn push_history(prompt: &mut String, context: &DiffContext) {
    prompt.push_str("### Previous Version\n\n");
    prompt.push_str(&context.previous_version);
    if !context.has_baseline() {
        prompt.push_str(" (no release tag; commits below are the most recent on the branch)");
    }
    prompt.push_str("\n\n");

    prompt.push_str(&format!("### Commits ({})\n\n", context.commits.len()));
    for commit in &context.commits {
        prompt.push_str(&format!("- {}\n", commit));
    }
    prompt.push('\n');

    if !context.files.is_empty() {
        prompt.push_str(&format!(
            "### Files Changed ({}, +{}, -{})\n\n",
            context.files.len(),
            context.insertions,
            context.deletions
        ));
        for path in context.files.iter().take(MAX_LISTED_FILES) {
            prompt.push_str(&format!("- {}\n", path.display()));
        }
        if context.files.len() > MAX_LISTED_FILES {
            prompt.push_str(&format!(
                "- ... and {} more\n",
                context.files.len() - MAX_LISTED_FILES
            ));
        }
        prompt.push('\n');
    }

    if !context.diff.is_empty() {
        prompt.push_str("### Diff\n\n```diff\n");
        prompt.push_str(&context.diff);
        prompt.push_str("\n```\n\n");
    }
}

/// Builds the prompt asking for a semantic version bump.
pub struct ReleaseTypePromptBuilder<'a> {
    context: &'a DiffContext,
}

impl<'a> ReleaseTypePromptBuilder<'a> {
    pub fn new(context: &'a DiffContext) -> Self {
        Self { context }
    }

    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Release Type Request\n\n");
        prompt.push_str(
            "Decide the semantic version bump for the changes below. \
             Breaking API changes are major, new backwards-compatible features are minor, \
             and fixes, refactors and internal changes are patch.\n\n",
        );

        push_history(&mut prompt, self.context);

        prompt.push_str("### Output Format\n\n");
        prompt.push_str("Respond with exactly one word: patch, minor or major.\n");

        prompt
    }
}

/// Builds the prompt asking for a prose release note.
pub struct SummaryPromptBuilder<'a> {
    packages: &'a [String],
    release_type: ReleaseType,
    context: &'a DiffContext,
}

impl<'a> SummaryPromptBuilder<'a> {
    pub fn new(packages: &'a [String], release_type: ReleaseType, context: &'a DiffContext) -> Self {
        Self {
            packages,
            release_type,
            context,
        }
    }

    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Release Note Request\n\n");
        prompt.push_str(&format!(
            "Write the changelog entry for a {} release of {}.\n\n",
            self.release_type,
            if self.packages.is_empty() {
                "this package".to_string()
            } else {
                self.packages.join(", ")
            }
        ));

        push_history(&mut prompt, self.context);

        prompt.push_str("### Output Format\n\n");
        prompt.push_str(
            "Respond with one or two plain sentences describing what changed for users. \
             Do not use markdown, headings, bullet points or code formatting.\n",
        );

        prompt
    }
}

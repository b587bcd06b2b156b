//! Diff context construction.

use std::path::Path;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::git::{LogRange, SourceControl};
use crate::model::DiffContext;

const HEAD: &str = "HEAD";

/// Collects the change history since `baseline_tag`.
///
/// Without a baseline only the most recent commits are read and no
/// tag-relative query is issued.
pub async fn build_diff_context(
    scm: &dyn SourceControl,
    checkout: &Path,
    baseline_tag: Option<&str>,
    analysis: &AnalysisConfig,
) -> Result<DiffContext> {
    let Some(tag) = baseline_tag else {
        let commits = scm
            .log(checkout, &LogRange::Recent(analysis.fallback_commit_count))
            .await?;
        tracing::info!(commits = commits.len(), "no baseline tag, using recent commits");
        return Ok(DiffContext::without_baseline(commits));
    };

    let range = LogRange::Since(tag.to_string());
    let (commits, summary, diff) = tokio::try_join!(
        scm.log(checkout, &range),
        scm.diff_summary(checkout, tag, HEAD),
        scm.raw_diff(checkout, tag, HEAD),
    )?;

    tracing::info!(
        tag = %tag,
        commits = commits.len(),
        files = summary.files.len(),
        insertions = summary.insertions,
        deletions = summary.deletions,
        "built diff context"
    );

    Ok(DiffContext {
        commits,
        diff: truncate_diff(diff, analysis.diff_char_budget),
        files: summary.files,
        insertions: summary.insertions,
        deletions: summary.deletions,
        previous_version: tag.to_string(),
    })
}

/// Caps `diff` at `budget` characters, marking any dropped tail.
pub fn truncate_diff(diff: String, budget: usize) -> String {
    let Some((cut, _)) = diff.char_indices().nth(budget) else {
        return diff;
    };

    let dropped = diff[cut..].chars().count();
    let mut truncated = String::with_capacity(cut + 64);
    truncated.push_str(&diff[..cut]);
    if !truncated.ends_with('\n') {
        truncated.push('\n');
    }
    truncated.push_str(&format!("... [diff truncated, {} more characters]\n", dropped));
    truncated
}

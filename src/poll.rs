//! Bounded-time polling of external state.
//!
//! [`poll_until`] is the generic primitive; [`wait_for_checks`] and
//! [`discover_pull_request`] are the two gates the release runner needs.
//! Queries are read-only, so a failed query counts as "not yet observable"
//! and is retried on the next tick.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::model::PullRequest;
use crate::pr::ReviewPlatform;
use crate::status::{normalize, ChecksSummary};

/// Timeout and query interval for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Give up once this much time has elapsed without satisfaction.
    pub timeout: Duration,
    /// Pause between query attempts.
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Defaults for waiting on CI checks: 30 minutes, every 15 seconds.
    pub fn checks() -> Self {
        Self::new(Duration::from_secs(30 * 60), Duration::from_secs(15))
    }

    /// Defaults for discovering the version PR: 10 minutes, every 10 seconds.
    pub fn discovery() -> Self {
        Self::new(Duration::from_secs(10 * 60), Duration::from_secs(10))
    }
}

/// A polling loop ran out of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeout<T> {
    /// Time spent polling.
    pub elapsed: Duration,
    /// Number of query invocations.
    pub attempts: u32,
    /// Most recent observed value, if any query returned one.
    pub last: Option<T>,
}

/// Repeatedly runs `query` until `is_satisfied` accepts its value.
///
/// A query returning `Ok(None)` or `Err(_)` has observed nothing yet. Only one
/// query is in flight at a time and the loop sleeps between attempts. A query
/// still running at the deadline is dropped.
pub async fn poll_until<T, E, F, Fut, S>(
    mut query: F,
    mut is_satisfied: S,
    config: PollConfig,
) -> std::result::Result<T, PollTimeout<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Option<T>, E>>,
    E: Display,
    S: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        attempts += 1;
        let remaining = config.timeout.saturating_sub(start.elapsed());
        match tokio::time::timeout(remaining, query()).await {
            Ok(Ok(Some(value))) => {
                if is_satisfied(&value) {
                    return Ok(value);
                }
                last = Some(value);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, attempt = attempts, "query failed, retrying");
            }
            Err(_) => {
                tracing::debug!(attempt = attempts, "query did not answer before the deadline");
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(PollTimeout {
                elapsed,
                attempts,
                last,
            });
        }
        tokio::time::sleep(config.interval.min(config.timeout - elapsed)).await;
    }
}

/// Final state of a PR's checks once all of them completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksOutcome {
    pub summary: ChecksSummary,
    /// Every conclusion was success or skipped.
    pub success: bool,
}

impl ChecksOutcome {
    pub fn failing(&self) -> Vec<String> {
        self.summary.failing()
    }
}

/// Waits until every check on `pr_number` has completed.
///
/// An empty snapshot means checks have not registered yet, unless
/// `require_checks` is false.
pub async fn wait_for_checks(
    platform: &dyn ReviewPlatform,
    pr_number: u64,
    config: PollConfig,
    require_checks: bool,
) -> Result<ChecksOutcome> {
    tracing::info!(pr = pr_number, timeout_secs = config.timeout.as_secs(), "waiting for checks");

    let summary = poll_until(
        || async move {
            let source = platform.list_check_runs(pr_number).await?;
            let summary = ChecksSummary::new(normalize(&source));
            tracing::debug!(pr = pr_number, state = %summary.describe(), "polled checks");
            Ok::<_, Error>(Some(summary))
        },
        |summary: &ChecksSummary| {
            summary.all_completed() && (!summary.runs.is_empty() || !require_checks)
        },
        config,
    )
    .await
    .map_err(|timeout| Error::Timeout {
        what: format!("checks on PR #{}", pr_number),
        waited: timeout.elapsed,
        last_observed: timeout.last.map(|s| s.describe()),
    })?;

    let success = summary.is_success();
    tracing::info!(pr = pr_number, success, state = %summary.describe(), "checks completed");
    Ok(ChecksOutcome { summary, success })
}

/// Waits for an open PR whose head branch is `head_branch` to appear.
pub async fn discover_pull_request(
    platform: &dyn ReviewPlatform,
    head_branch: &str,
    config: PollConfig,
) -> Result<PullRequest> {
    tracing::info!(branch = %head_branch, timeout_secs = config.timeout.as_secs(), "looking for pull request");

    poll_until(
        || platform.find_open_pr_by_head_branch(head_branch),
        |_: &PullRequest| true,
        config,
    )
    .await
    .map_err(|timeout| Error::Timeout {
        what: format!("a pull request from branch {}", head_branch),
        waited: timeout.elapsed,
        last_observed: None,
    })
}

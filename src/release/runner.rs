//! ReleaseRunner: drives one release through every [`Stage`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use tokio::time::Instant;

use super::context::build_diff_context;
use super::result::{RunOutcome, RunReport};
use super::state::{RunContext, Stage, Transition};
use crate::changeset::Changeset;
use crate::config::ReleaseConfig;
use crate::error::{Error, Result};
use crate::git::SourceControl;
use crate::model::{ReleaseDecision, ReleaseType};
use crate::notes::{suggest_or_patch, summarize_or_none, NoteGenerator};
use crate::output::{Decision, OutputSink};
use crate::package::PackageInfo;
use crate::poll::{discover_pull_request, wait_for_checks};
use crate::pr::ReviewPlatform;
use crate::workarea::WorkArea;

const MAX_TITLE_LEN: usize = 72;

/// What to release and how far to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// Remote repository to clone.
    pub repo_url: String,
    /// Skip type analysis and use this release type.
    pub release_type: Option<ReleaseType>,
    /// Skip summary generation and use this message.
    pub message: Option<String>,
    /// End the run with a pause once this stage completes.
    pub stop_after: Option<Stage>,
}

impl ReleaseRequest {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            release_type: None,
            message: None,
            stop_after: None,
        }
    }

    pub fn with_release_type(mut self, release_type: Option<ReleaseType>) -> Self {
        self.release_type = release_type;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        self
    }

    pub fn with_stop_after(mut self, stage: Option<Stage>) -> Self {
        self.stop_after = stage;
        self
    }
}

/// Release orchestrator.
///
/// Stages run strictly in order with one external call in flight at a time,
/// except for the read-only history queries in
/// [`Stage::BuildDiffContext`]. The work area is removed on every exit path.
pub struct ReleaseRunner {
    config: ReleaseConfig,
    scm: Arc<dyn SourceControl>,
    platform: Arc<dyn ReviewPlatform>,
    notes: Arc<dyn NoteGenerator>,
    sink: Arc<dyn OutputSink>,
}

impl ReleaseRunner {
    pub fn new(
        config: ReleaseConfig,
        scm: Arc<dyn SourceControl>,
        platform: Arc<dyn ReviewPlatform>,
        notes: Arc<dyn NoteGenerator>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            scm,
            platform,
            notes,
            sink,
        }
    }

    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    /// Runs the release and emits the report through the output sink.
    ///
    /// Failures are reported in [`RunReport::outcome`], never returned.
    pub async fn run(&self, request: &ReleaseRequest) -> RunReport {
        self.run_until(request, std::future::pending::<()>()).await
    }

    /// Like [`ReleaseRunner::run`], but aborts the current stage once
    /// `shutdown` completes. The work area is still removed and the report
    /// still emitted.
    pub async fn run_until<F: Future>(&self, request: &ReleaseRequest, shutdown: F) -> RunReport {
        let started = Instant::now();
        let mut ctx = RunContext::new();
        let mut outcome = RunOutcome::Released;
        let mut shutdown = pin!(shutdown);

        tracing::info!(repo = %request.repo_url, "starting release");

        for stage in Stage::ALL {
            let stage_started = Instant::now();
            let transition = tokio::select! {
                transition = self.step(stage, request, &mut ctx) => transition,
                _ = &mut shutdown => Transition::Fatal(Error::Interrupted),
            };
            ctx.record(stage, stage_started.elapsed());

            match transition {
                Transition::Continue => {
                    tracing::debug!(stage = %stage, "stage complete");
                    if request.stop_after == Some(stage) {
                        outcome = RunOutcome::Paused {
                            stage,
                            reason: format!("stopped after {} as requested", stage),
                        };
                        break;
                    }
                }
                Transition::Paused { reason } => {
                    tracing::info!(stage = %stage, reason = %reason, "release paused");
                    outcome = RunOutcome::Paused { stage, reason };
                    break;
                }
                Transition::Fatal(error) => {
                    tracing::error!(stage = %stage, error = %error, "release failed");
                    outcome = RunOutcome::Failed {
                        stage,
                        gate: error.is_gate_failure(),
                        error: error.to_string(),
                    };
                    break;
                }
            }
        }

        ctx.release_work_area();

        let report = RunReport {
            repo_url: request.repo_url.clone(),
            packages: ctx.packages,
            previous_version: ctx.baseline_tag,
            release_type: ctx.release_type,
            message: ctx.message,
            branch: ctx.branch,
            changeset_path: ctx.changeset_path,
            commit_id: ctx.commit_id,
            changeset_pr: ctx.changeset_pr,
            version_pr: ctx.version_pr,
            stages: ctx.timings,
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if let Err(e) = self.sink.emit_result(&report) {
            tracing::error!(error = %e, "failed to emit run report");
        }
        report
    }

    async fn step(&self, stage: Stage, request: &ReleaseRequest, ctx: &mut RunContext) -> Transition {
        if stage.is_gate() {
            match self.confirm_gate(stage, ctx) {
                Ok(Decision::Proceed) => {}
                Ok(Decision::Decline) => {
                    return Transition::paused(format!("declined before {}", stage))
                }
                Err(e) => return Transition::Fatal(e),
            }
        }

        self.sink.status(stage.label());

        let result = match stage {
            Stage::AcquireWorkspace => self.acquire_workspace(request, ctx).await,
            Stage::IdentifyPackage => self.identify_package(ctx).await,
            Stage::BuildDiffContext => self.build_context(ctx).await,
            Stage::DecideReleaseType => self.decide_release_type(request, ctx).await,
            Stage::DecideMessage => self.decide_message(request, ctx).await,
            Stage::CreateBranch => self.create_branch(ctx).await,
            Stage::WriteChangeset => self.write_changeset(ctx),
            Stage::CommitAndPush => self.commit_and_push(ctx).await,
            Stage::OpenPullRequest => self.open_pull_request(ctx).await,
            Stage::AwaitChangesetChecks => match ctx.changeset_pr() {
                Ok(pr) => self.await_checks(pr.number).await,
                Err(e) => Err(e),
            },
            Stage::MergeChangeset => match ctx.changeset_pr() {
                Ok(pr) => self.merge(pr.number).await,
                Err(e) => Err(e),
            },
            Stage::DiscoverVersionPr => self.discover_version_pr(ctx).await,
            Stage::AwaitVersionChecks => match ctx.version_pr() {
                Ok(pr) => self.await_checks(pr.number).await,
                Err(e) => Err(e),
            },
            Stage::MergeVersionPr => match ctx.version_pr() {
                Ok(pr) => self.merge(pr.number).await,
                Err(e) => Err(e),
            },
        };

        result.into()
    }

    fn confirm_gate(&self, stage: Stage, ctx: &RunContext) -> Result<Decision> {
        let prompt = match stage {
            Stage::AwaitChangesetChecks => {
                format!("Wait for checks on changeset PR #{}?", ctx.changeset_pr()?.number)
            }
            Stage::MergeChangeset => format!("Merge changeset PR #{}?", ctx.changeset_pr()?.number),
            Stage::DiscoverVersionPr => format!(
                "Wait for the version PR from {}?",
                self.version_branch()
            ),
            Stage::AwaitVersionChecks => {
                format!("Wait for checks on version PR #{}?", ctx.version_pr()?.number)
            }
            Stage::MergeVersionPr => format!(
                "Merge version PR #{} and publish?",
                ctx.version_pr()?.number
            ),
            _ => return Ok(Decision::Proceed),
        };
        self.sink.confirm(&prompt)
    }

    fn version_branch(&self) -> String {
        self.config
            .automation
            .version_branch(&self.config.repository.base_branch)
    }

    async fn acquire_workspace(&self, request: &ReleaseRequest, ctx: &mut RunContext) -> Result<()> {
        let area = WorkArea::create(&self.config.repository.work_root())?;
        tracing::info!(run_id = area.run_id(), repo = %request.repo_url, "acquired work area");
        let checkout = area.checkout_dir();
        ctx.work_area = Some(area);

        self.scm
            .shallow_clone(
                &request.repo_url,
                &self.config.repository.base_branch,
                self.config.repository.clone_depth,
                &checkout,
            )
            .await
    }

    async fn identify_package(&self, ctx: &mut RunContext) -> Result<()> {
        let checkout = ctx.checkout()?;

        ctx.packages = if self.config.changeset.packages.is_empty() {
            let info = PackageInfo::discover(&checkout)?;
            tracing::info!(name = %info.name, version = %info.version, manifest = info.manifest.file_name(), "identified package");
            vec![info.name]
        } else {
            self.config.changeset.packages.clone()
        };

        let tags = self
            .scm
            .version_tags(&checkout, &self.config.repository.tag_pattern)
            .await?;
        ctx.baseline_tag = tags.into_iter().next();
        tracing::info!(baseline = ?ctx.baseline_tag, "located baseline tag");
        Ok(())
    }

    async fn build_context(&self, ctx: &mut RunContext) -> Result<()> {
        let checkout = ctx.checkout()?;
        let diff = build_diff_context(
            self.scm.as_ref(),
            &checkout,
            ctx.baseline_tag.as_deref(),
            &self.config.analysis,
        )
        .await?;
        ctx.diff = Some(diff);
        Ok(())
    }

    async fn decide_release_type(&self, request: &ReleaseRequest, ctx: &mut RunContext) -> Result<()> {
        let release_type = match request.release_type {
            Some(explicit) => {
                tracing::info!(release_type = %explicit, "using explicit release type");
                explicit
            }
            None => {
                let suggested = suggest_or_patch(self.notes.as_ref(), ctx.diff()?).await;
                self.sink.choose_release_type(suggested)?
            }
        };
        ctx.release_type = Some(release_type);
        Ok(())
    }

    async fn decide_message(&self, request: &ReleaseRequest, ctx: &mut RunContext) -> Result<()> {
        if let Some(explicit) = &request.message {
            tracing::info!("using explicit release message");
            ctx.message = Some(explicit.clone());
            return Ok(());
        }

        let generated = summarize_or_none(
            self.notes.as_ref(),
            &ctx.packages,
            ctx.release_type()?,
            ctx.diff()?,
        )
        .await;

        let message = self
            .sink
            .request_message(generated.as_deref())?
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or(Error::MissingMessage)?;
        ctx.message = Some(message);
        Ok(())
    }

    async fn create_branch(&self, ctx: &mut RunContext) -> Result<()> {
        let branch = release_branch_name(ctx.release_type()?, chrono::Utc::now());
        self.scm.create_and_checkout(&ctx.checkout()?, &branch).await?;
        tracing::info!(branch = %branch, "created release branch");
        ctx.branch = Some(branch);
        Ok(())
    }

    fn write_changeset(&self, ctx: &mut RunContext) -> Result<()> {
        let decision = ReleaseDecision {
            release_type: ctx.release_type()?,
            message: ctx.message()?.to_string(),
        };
        let changeset = Changeset::new(&ctx.packages, &decision);
        let path = changeset.write(&ctx.checkout()?, &self.config.changeset.directory)?;
        ctx.changeset_path = Some(path);
        Ok(())
    }

    async fn commit_and_push(&self, ctx: &mut RunContext) -> Result<()> {
        let checkout = ctx.checkout()?;
        let pathspec = path_to_pathspec(ctx.changeset_path()?.to_path_buf());

        self.scm.stage(&checkout, &pathspec).await?;
        let message = commit_message(ctx.release_type()?, &ctx.packages);
        let commit_id = self.scm.commit(&checkout, &message).await?;
        tracing::info!(commit = %commit_id, "committed changeset");

        let branch = ctx.branch()?;
        self.scm
            .push(&checkout, &self.config.repository.remote, branch)
            .await?;
        tracing::info!(branch = %branch, remote = %self.config.repository.remote, "pushed release branch");

        ctx.commit_id = Some(commit_id);
        Ok(())
    }

    async fn open_pull_request(&self, ctx: &mut RunContext) -> Result<()> {
        let release_type = ctx.release_type()?;
        let message = ctx.message()?;

        let diff_stat = match &ctx.baseline_tag {
            Some(tag) => match self.scm.diff_stat(&ctx.checkout()?, tag, "HEAD").await {
                Ok(stat) => Some(stat),
                Err(e) => {
                    tracing::warn!(error = %e, "diff stat unavailable for PR body");
                    None
                }
            },
            None => None,
        };

        let title = pr_title(release_type, message);
        let body = pr_body(
            &ctx.packages,
            release_type,
            message,
            ctx.baseline_tag.as_deref(),
            diff_stat.as_deref(),
        );

        let pr = self
            .platform
            .create_pull_request(ctx.branch()?, &self.config.repository.base_branch, &title, &body)
            .await?;
        tracing::info!(pr = pr.number, url = %pr.url, "opened changeset PR");
        self.sink.status(&format!("Changeset PR: {}", pr.url));
        ctx.changeset_pr = Some(pr);
        Ok(())
    }

    async fn await_checks(&self, pr_number: u64) -> Result<()> {
        let checks = &self.config.polling.checks;
        let outcome = wait_for_checks(
            self.platform.as_ref(),
            pr_number,
            checks.settings().to_poll_config(),
            checks.require_checks,
        )
        .await?;

        if !outcome.success {
            return Err(Error::ChecksFailed {
                pr: pr_number,
                failing: outcome.failing(),
            });
        }
        Ok(())
    }

    async fn merge(&self, pr_number: u64) -> Result<()> {
        let method = self.config.automation.merge_method;
        self.platform.merge_pull_request(pr_number, method).await?;
        tracing::info!(pr = pr_number, method = ?method, "merged PR");
        Ok(())
    }

    async fn discover_version_pr(&self, ctx: &mut RunContext) -> Result<()> {
        let branch = self.version_branch();
        let pr = discover_pull_request(
            self.platform.as_ref(),
            &branch,
            self.config.polling.discovery.settings().to_poll_config(),
        )
        .await?;
        tracing::info!(pr = pr.number, url = %pr.url, "found version PR");
        self.sink.status(&format!("Version PR: {}", pr.url));
        ctx.version_pr = Some(pr);
        Ok(())
    }
}

/// Branch name for a release created at `now`.
pub fn release_branch_name(release_type: ReleaseType, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("release/{}-{}", release_type, now.format("%Y%m%d-%H%M%S"))
}

/// Commit message for the changeset commit.
pub fn commit_message(release_type: ReleaseType, packages: &[String]) -> String {
    format!(
        "chore(release): add {} changeset for {}",
        release_type,
        packages.join(", ")
    )
}

/// PR title built from the first line of the release message.
pub fn pr_title(release_type: ReleaseType, message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default().trim();
    truncate_string(&format!("{} release: {}", release_type, first_line), MAX_TITLE_LEN)
}

/// PR body recording the full release decision.
pub fn pr_body(
    packages: &[String],
    release_type: ReleaseType,
    message: &str,
    baseline: Option<&str>,
    diff_stat: Option<&str>,
) -> String {
    let mut body = String::new();
    body.push_str("## Release\n\n");
    body.push_str(&format!("- **Type:** {}\n", release_type));
    body.push_str(&format!("- **Packages:** {}\n", packages.join(", ")));
    body.push_str(&format!(
        "- **Previous version:** {}\n\n",
        baseline.unwrap_or(crate::model::UNKNOWN_VERSION)
    ));
    body.push_str("## Message\n\n");
    body.push_str(message.trim());
    body.push('\n');

    if let Some(stat) = diff_stat.filter(|s| !s.trim().is_empty()) {
        body.push_str("\n## Changes since last release\n\n```\n");
        body.push_str(stat.trim_end());
        body.push_str("\n```\n");
    }
    body
}

fn path_to_pathspec(path: PathBuf) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Truncates to `max_len` characters, ending with "..." if anything was cut.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

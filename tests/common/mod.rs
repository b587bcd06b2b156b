//! In-memory gateways and a scripted output sink for driving
//! `ReleaseRunner` without git, GitHub, or an LLM.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use release_pilot::{
    CheckSource, Decision, DiffContext, DiffSummary, Error, LogRange, MergeMethod, NoteGenerator,
    OutputSink, PrState, PullRequest, RawCheck, ReleaseConfig, ReleaseType, Result, RunReport,
    ReviewPlatform, SourceControl,
};

pub const PACKAGE_JSON: &str = r#"{"name":"@acme/auth","version":"1.4.0"}"#;

/// Source control fake that "clones" by writing a package manifest.
#[derive(Default)]
pub struct FakeScm {
    pub tags: Vec<String>,
    pub commits: Vec<String>,
    pub fail_clone: bool,
    pub log_ranges: Mutex<Vec<LogRange>>,
    pub branches: Mutex<Vec<String>>,
    /// Staged pathspecs with the file contents at staging time.
    pub staged: Mutex<Vec<(String, String)>>,
    pub commit_messages: Mutex<Vec<String>>,
    pub pushes: Mutex<Vec<(String, String)>>,
    pub tag_relative_queries: AtomicUsize,
}

impl FakeScm {
    pub fn new() -> Self {
        Self {
            commits: vec![
                "feat: add OAuth provider".to_string(),
                "fix: refresh tokens".to_string(),
            ],
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }
}

#[async_trait]
impl SourceControl for FakeScm {
    async fn shallow_clone(&self, url: &str, _branch: &str, _depth: u32, dest: &Path) -> Result<()> {
        if self.fail_clone {
            return Err(Error::Git(format!("repository '{}' not found", url)));
        }
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("package.json"), PACKAGE_JSON)?;
        Ok(())
    }

    async fn create_and_checkout(&self, _repo: &Path, branch: &str) -> Result<()> {
        self.branches.lock().unwrap().push(branch.to_string());
        Ok(())
    }

    async fn stage(&self, repo: &Path, pathspec: &str) -> Result<()> {
        let content = std::fs::read_to_string(repo.join(pathspec))?;
        self.staged
            .lock()
            .unwrap()
            .push((pathspec.to_string(), content));
        Ok(())
    }

    async fn commit(&self, _repo: &Path, message: &str) -> Result<String> {
        self.commit_messages.lock().unwrap().push(message.to_string());
        Ok("0123abcd".to_string())
    }

    async fn push(&self, _repo: &Path, remote: &str, branch: &str) -> Result<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((remote.to_string(), branch.to_string()));
        Ok(())
    }

    async fn latest_commit_id(&self, _repo: &Path) -> Result<String> {
        Ok("0123abcd".to_string())
    }

    async fn version_tags(&self, _repo: &Path, _pattern: &str) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    async fn diff_stat(&self, _repo: &Path, _from: &str, _to: &str) -> Result<String> {
        self.tag_relative_queries.fetch_add(1, Ordering::SeqCst);
        Ok(" src/oauth.ts | 40 ++++++++\n 1 file changed, 40 insertions(+)\n".to_string())
    }

    async fn diff_summary(&self, _repo: &Path, _from: &str, _to: &str) -> Result<DiffSummary> {
        self.tag_relative_queries.fetch_add(1, Ordering::SeqCst);
        Ok(DiffSummary {
            files: vec!["src/oauth.ts".into()],
            insertions: 40,
            deletions: 0,
        })
    }

    async fn log(&self, _repo: &Path, range: &LogRange) -> Result<Vec<String>> {
        self.log_ranges.lock().unwrap().push(range.clone());
        if matches!(range, LogRange::Since(_)) {
            self.tag_relative_queries.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self.commits.clone())
    }

    async fn raw_diff(&self, _repo: &Path, _from: &str, _to: &str) -> Result<String> {
        self.tag_relative_queries.fetch_add(1, Ordering::SeqCst);
        Ok("+export function oauth() {}\n".to_string())
    }
}

pub fn pull_request(number: u64, head_branch: &str) -> PullRequest {
    PullRequest {
        number,
        url: format!("https://github.com/acme/auth/pull/{}", number),
        head_branch: head_branch.to_string(),
        head_sha: format!("sha{}", number),
        state: PrState::Open,
        mergeable: Some(true),
        merged: Some(false),
    }
}

pub fn structured(checks: &[(&str, &str, Option<&str>)]) -> CheckSource {
    CheckSource::Structured(
        checks
            .iter()
            .map(|(name, status, conclusion)| RawCheck {
                name: Some(name.to_string()),
                status: Some(status.to_string()),
                conclusion: conclusion.map(str::to_string),
                ..Default::default()
            })
            .collect(),
    )
}

pub fn passing() -> CheckSource {
    structured(&[("build", "COMPLETED", Some("SUCCESS"))])
}

/// Review platform fake.
///
/// Check snapshots are served per PR in order; the last one repeats.
pub struct FakePlatform {
    pub changeset_pr: u64,
    pub version_pr: u64,
    /// Discovery lookups that find nothing before the version PR appears.
    /// `None` means it never appears.
    pub version_pr_after: Option<usize>,
    pub checks: Mutex<HashMap<u64, VecDeque<CheckSource>>>,
    pub created: Mutex<Vec<(String, String, String, String)>>,
    pub merged: Mutex<Vec<(u64, MergeMethod)>>,
    pub lookups: AtomicUsize,
    pub check_polls: AtomicUsize,
    /// Answer PR creation with output that names no pull request.
    pub garbled_create: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            changeset_pr: 41,
            version_pr: 42,
            version_pr_after: Some(1),
            checks: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            merged: Mutex::new(Vec::new()),
            lookups: AtomicUsize::new(0),
            check_polls: AtomicUsize::new(0),
            garbled_create: false,
        }
    }

    pub fn with_garbled_create(mut self) -> Self {
        self.garbled_create = true;
        self
    }

    pub fn with_checks(self, pr: u64, snapshots: Vec<CheckSource>) -> Self {
        self.checks.lock().unwrap().insert(pr, snapshots.into());
        self
    }

    pub fn without_version_pr(mut self) -> Self {
        self.version_pr_after = None;
        self
    }

    pub fn merged_numbers(&self) -> Vec<u64> {
        self.merged.lock().unwrap().iter().map(|(n, _)| *n).collect()
    }
}

#[async_trait]
impl ReviewPlatform for FakePlatform {
    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        self.created.lock().unwrap().push((
            head.to_string(),
            base.to_string(),
            title.to_string(),
            body.to_string(),
        ));
        if self.garbled_create {
            return Err(Error::InvalidPrResponse(
                "Warning: 1 uncommitted change\n".to_string(),
            ));
        }
        Ok(pull_request(self.changeset_pr, head))
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        Ok(pull_request(number, "unknown"))
    }

    async fn list_check_runs(&self, number: u64) -> Result<CheckSource> {
        self.check_polls.fetch_add(1, Ordering::SeqCst);
        let mut checks = self.checks.lock().unwrap();
        let queue = checks
            .get_mut(&number)
            .ok_or_else(|| Error::GitHub(format!("no checks for #{}", number)))?;
        let snapshot = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        snapshot.ok_or_else(|| Error::GitHub("no snapshot".to_string()))
    }

    async fn merge_pull_request(&self, number: u64, method: MergeMethod) -> Result<()> {
        self.merged.lock().unwrap().push((number, method));
        Ok(())
    }

    async fn find_open_pr_by_head_branch(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        let seen = self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(match self.version_pr_after {
            Some(after) if seen >= after => Some(pull_request(self.version_pr, head_branch)),
            _ => None,
        })
    }
}

/// Note generator that counts calls.
pub struct FakeNotes {
    pub suggestion: Option<ReleaseType>,
    pub summary: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeNotes {
    pub fn answering(suggestion: ReleaseType, summary: &str) -> Self {
        Self {
            suggestion: Some(suggestion),
            summary: Some(summary.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            suggestion: None,
            summary: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteGenerator for FakeNotes {
    async fn suggest_release_type(&self, _context: &DiffContext) -> Result<ReleaseType> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.suggestion
            .ok_or_else(|| Error::Generator("claude not installed".to_string()))
    }

    async fn generate_summary(
        &self,
        _packages: &[String],
        _release_type: ReleaseType,
        _context: &DiffContext,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.summary
            .clone()
            .ok_or_else(|| Error::Generator("claude not installed".to_string()))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Output sink with scripted answers.
#[derive(Default)]
pub struct ScriptedSink {
    /// Decline any confirmation whose prompt contains this text.
    pub decline_matching: Option<String>,
    /// Message typed when no summary was generated.
    pub manual_message: Option<String>,
    pub prompts: Mutex<Vec<String>>,
    pub statuses: Mutex<Vec<String>>,
    pub offered_messages: Mutex<Vec<Option<String>>>,
    pub reports: Mutex<Vec<RunReport>>,
}

impl ScriptedSink {
    pub fn declining(text: &str) -> Self {
        Self {
            decline_matching: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn typing(message: &str) -> Self {
        Self {
            manual_message: Some(message.to_string()),
            ..Default::default()
        }
    }
}

impl OutputSink for ScriptedSink {
    fn status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn confirm(&self, prompt: &str) -> Result<Decision> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.decline_matching {
            Some(text) if prompt.contains(text.as_str()) => Ok(Decision::Decline),
            _ => Ok(Decision::Proceed),
        }
    }

    fn choose_release_type(&self, suggested: ReleaseType) -> Result<ReleaseType> {
        Ok(suggested)
    }

    fn request_message(&self, generated: Option<&str>) -> Result<Option<String>> {
        self.offered_messages
            .lock()
            .unwrap()
            .push(generated.map(str::to_string));
        Ok(generated
            .map(str::to_string)
            .or_else(|| self.manual_message.clone()))
    }

    fn emit_result(&self, report: &RunReport) -> Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Configuration rooted in a temp dir with fast polling.
pub fn test_config(work_root: &TempDir) -> ReleaseConfig {
    let mut config = ReleaseConfig::default();
    config.repository.work_root = Some(work_root.path().to_path_buf());
    config.polling.checks.timeout_secs = 5;
    config.polling.checks.interval_secs = 0;
    config.polling.discovery.timeout_secs = 5;
    config.polling.discovery.interval_secs = 0;
    config
}

/// Asserts that no work area survived the run.
pub fn assert_work_root_empty(work_root: &TempDir) {
    let leftovers: Vec<_> = std::fs::read_dir(work_root.path())
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "work area not removed: {:?}", leftovers);
}

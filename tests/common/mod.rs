//! Shared test helpers

#![allow(dead_code)]

mod mock_platform;
mod mock_tasks;

pub use mock_platform::{Fail, MockPlatformService, PlatformCall};
pub use mock_tasks::{CreateTaskCall, MockTaskSink};

use merge_warden::delegate::{ConflictDelegate, TaskSink};
use merge_warden::orchestrator::MergeOrchestrator;
use merge_warden::platform::PlatformService;
use merge_warden::registry::{ExclusionRegistry, MemoryRegistry};
use merge_warden::types::{PrStatus, PullRequestRef, PullRequestState};
use std::sync::Arc;

pub const REPO: &str = "acme/widgets";

/// Web URL of PR `number` in the test repository
pub fn pr_url(number: u64) -> String {
    format!("https://github.com/{REPO}/pull/{number}")
}

/// Parsed reference to PR `number` in the test repository
pub fn github_ref(number: u64) -> PullRequestRef {
    PullRequestRef {
        host: "github.com".to_string(),
        owner_repo: REPO.to_string(),
        number,
    }
}

/// An open, mergeable, non-draft PR
pub fn make_state(number: u64) -> PullRequestState {
    PullRequestState {
        number,
        status: PrStatus::Open,
        title: format!("Add widget cache {number}"),
        body: Some("Caches rendered widgets between requests.".to_string()),
        author: "build-agent".to_string(),
        is_draft: false,
        mergeable: Some(true),
        has_conflicts: false,
        head_branch: format!("feature-{number}"),
        head_repo_full_name: Some(REPO.to_string()),
        base_branch: "main".to_string(),
        repo_full_name: REPO.to_string(),
        html_url: pr_url(number),
    }
}

/// An open PR the platform reports as conflicting
pub fn make_conflicting_state(number: u64) -> PullRequestState {
    PullRequestState {
        mergeable: Some(false),
        has_conflicts: true,
        ..make_state(number)
    }
}

/// An open, conflicting PR whose head branch lives in a fork
pub fn make_fork_conflicting_state(number: u64) -> PullRequestState {
    PullRequestState {
        head_repo_full_name: Some("contributor/widgets".to_string()),
        ..make_conflicting_state(number)
    }
}

/// Mocks wired into an orchestrator
pub struct Harness {
    pub platform: Arc<MockPlatformService>,
    pub registry: Arc<MemoryRegistry>,
    pub tasks: Arc<MockTaskSink>,
    pub orchestrator: MergeOrchestrator,
}

impl Harness {
    /// Fresh mocks and an orchestrator without gates
    pub fn new() -> Self {
        let platform = Arc::new(MockPlatformService::new());
        let registry = Arc::new(MemoryRegistry::new());
        let tasks = Arc::new(MockTaskSink::new());
        let orchestrator = build_orchestrator(&platform, &registry, &tasks);
        Self {
            platform,
            registry,
            tasks,
            orchestrator,
        }
    }

    /// Replace the orchestrator, e.g. to add gates
    pub fn with_orchestrator(
        mut self,
        f: impl FnOnce(MergeOrchestrator) -> MergeOrchestrator,
    ) -> Self {
        let orchestrator = build_orchestrator(&self.platform, &self.registry, &self.tasks);
        self.orchestrator = f(orchestrator);
        self
    }
}

/// Orchestrator over the given mocks and any registry implementation
pub fn build_orchestrator<R: ExclusionRegistry + 'static>(
    platform: &Arc<MockPlatformService>,
    registry: &Arc<R>,
    tasks: &Arc<MockTaskSink>,
) -> MergeOrchestrator {
    let sink: Arc<dyn TaskSink> = tasks.clone();
    let platform: Arc<dyn PlatformService> = platform.clone();
    let registry: Arc<dyn ExclusionRegistry> = registry.clone();
    let delegate = ConflictDelegate::new(sink, vec!["merge-conflict".to_string()]);
    MergeOrchestrator::new(platform, registry, delegate)
}

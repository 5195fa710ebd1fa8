//! Hosting-platform client
//!
//! A thin, easily mocked boundary over the code-hosting API. Implementations
//! classify failures into the crate's error taxonomy and never retry; retry
//! policy belongs to the orchestrator.

mod factory;
mod github;
mod timeout;

pub use factory::create_platform_service;
pub use github::GitHubService;
pub use timeout::TimeoutPlatform;

use crate::error::Result;
use crate::types::{MergeMethod, MergeResult, PullRequestRef, PullRequestState};
use async_trait::async_trait;

/// Platform service trait for pull request operations
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Web host this service talks to (e.g. `github.com`)
    fn host(&self) -> &str;

    /// Fetch a snapshot of the pull request
    ///
    /// Errors: `NotFound`, `Transient`, `PermissionDenied`.
    async fn get_pr_state(&self, pr: &PullRequestRef) -> Result<PullRequestState>;

    /// Convert a draft PR to ready for review
    ///
    /// Calling this on a PR that is already ready is a no-op success.
    async fn set_ready_for_review(&self, pr: &PullRequestRef) -> Result<()>;

    /// Merge the PR with the given method
    ///
    /// Errors: `Conflict`, `NotAllowed`, `NotMergeable`, `PermissionDenied`,
    /// `Transient`.
    async fn merge_pr(&self, pr: &PullRequestRef, method: MergeMethod) -> Result<MergeResult>;

    /// Create `new_branch` pointing at the current head of `from_branch`
    ///
    /// Fails with `NotFound` if `from_branch` cannot be resolved.
    async fn create_branch(
        &self,
        repo_full_name: &str,
        from_branch: &str,
        new_branch: &str,
    ) -> Result<()>;

    /// Whether the PR has at least one approving review
    async fn is_approved(&self, pr: &PullRequestRef) -> Result<bool>;
}

//! Per-call deadline for platform services

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{MergeMethod, MergeResult, PullRequestRef, PullRequestState};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Wraps a platform service so every call is bounded by a deadline.
///
/// An elapsed deadline is reported as `Transient`, never as success.
pub struct TimeoutPlatform<P> {
    inner: P,
    limit: Duration,
}

impl<P: PlatformService> TimeoutPlatform<P> {
    /// Wrap `inner`, bounding each call by `limit`
    pub const fn new(inner: P, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>> + Send) -> Result<T> {
        if let Ok(result) = tokio::time::timeout(self.limit, fut).await {
            result
        } else {
            warn!(op, limit_ms = self.limit.as_millis(), "platform call timed out");
            Err(Error::Transient(format!(
                "{op} timed out after {}ms",
                self.limit.as_millis()
            )))
        }
    }
}

#[async_trait]
impl<P: PlatformService> PlatformService for TimeoutPlatform<P> {
    fn host(&self) -> &str {
        self.inner.host()
    }

    async fn get_pr_state(&self, pr: &PullRequestRef) -> Result<PullRequestState> {
        self.bounded("get_pr_state", self.inner.get_pr_state(pr)).await
    }

    async fn set_ready_for_review(&self, pr: &PullRequestRef) -> Result<()> {
        self.bounded("set_ready_for_review", self.inner.set_ready_for_review(pr))
            .await
    }

    async fn merge_pr(&self, pr: &PullRequestRef, method: MergeMethod) -> Result<MergeResult> {
        self.bounded("merge_pr", self.inner.merge_pr(pr, method)).await
    }

    async fn create_branch(
        &self,
        repo_full_name: &str,
        from_branch: &str,
        new_branch: &str,
    ) -> Result<()> {
        self.bounded(
            "create_branch",
            self.inner
                .create_branch(repo_full_name, from_branch, new_branch),
        )
        .await
    }

    async fn is_approved(&self, pr: &PullRequestRef) -> Result<bool> {
        self.bounded("is_approved", self.inner.is_approved(pr)).await
    }
}

//! Conflict delegation
//!
//! Two-phase pattern:
//! 1. Build - describe the conflict as a `ConflictResolutionTask` (pure)
//! 2. Submit - hand it to an external task system (effectful)
//!
//! The delegate does not track task completion.

mod github_issues;
mod task;

pub use github_issues::GitHubIssueSink;
pub use task::build_conflict_task;

use crate::error::{Error, Result};
use crate::types::{ConflictResolutionTask, PullRequestState, TaskId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// External task system (e.g. an issue tracker consumed by the coding agent)
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Create a task in `repo_full_name` and return its identifier
    async fn create_task(
        &self,
        repo_full_name: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<TaskId>;
}

/// Builds conflict tasks and submits them to a `TaskSink`
#[derive(Clone)]
pub struct ConflictDelegate {
    sink: Arc<dyn TaskSink>,
    labels: Vec<String>,
    task_repo: Option<String>,
}

impl ConflictDelegate {
    /// Create a delegate submitting to `sink` with the given labels
    pub fn new(sink: Arc<dyn TaskSink>, labels: Vec<String>) -> Self {
        Self {
            sink,
            labels,
            task_repo: None,
        }
    }

    /// Create every task in `repo` instead of the PR's own repository
    #[must_use]
    pub fn with_task_repo(mut self, repo: Option<String>) -> Self {
        self.task_repo = repo;
        self
    }

    /// Build the task for `state` (pure, see [`build_conflict_task`])
    pub fn build_conflict_task(&self, state: &PullRequestState) -> ConflictResolutionTask {
        build_conflict_task(state)
    }

    /// Submit `task` to the task system
    ///
    /// Every failure is reported as `DelegationFailed`.
    pub async fn submit(&self, task: &ConflictResolutionTask) -> Result<TaskId> {
        let repo = self
            .task_repo
            .as_deref()
            .unwrap_or(&task.target_context.repo_full_name);

        match self
            .sink
            .create_task(repo, &task.title, &task.description, &self.labels)
            .await
        {
            Ok(id) => {
                info!(task = %task.name, repo, id = %id, "submitted conflict task");
                Ok(id)
            }
            Err(e) => {
                warn!(task = %task.name, repo, error = %e, "conflict task submission failed");
                Err(match e {
                    Error::DelegationFailed(_) => e,
                    other => Error::DelegationFailed(other.to_string()),
                })
            }
        }
    }
}

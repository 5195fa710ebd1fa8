//! GitHub issues as the conflict task system

use crate::delegate::TaskSink;
use crate::error::{Error, Result};
use crate::types::TaskId;
use async_trait::async_trait;
use octocrab::Octocrab;
use tracing::debug;

/// Creates conflict tasks as GitHub issues using octocrab
pub struct GitHubIssueSink {
    client: Octocrab,
}

impl GitHubIssueSink {
    /// Create a sink authenticated with `token` against `api_base`
    pub fn new(token: &str, api_base: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(api_base.trim_end_matches('/'))
            .map_err(|e| Error::Platform(e.to_string()))?
            .build()
            .map_err(|e| Error::Platform(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TaskSink for GitHubIssueSink {
    async fn create_task(
        &self,
        repo_full_name: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<TaskId> {
        let (owner, repo) = repo_full_name.split_once('/').ok_or_else(|| {
            Error::DelegationFailed(format!("task repository '{repo_full_name}' is not owner/repo"))
        })?;

        debug!(repo_full_name, title, "creating conflict issue");
        let issue = self
            .client
            .issues(owner, repo)
            .create(title)
            .body(body)
            .labels(labels.to_vec())
            .send()
            .await
            .map_err(|e| Error::DelegationFailed(format!("failed to create issue: {e}")))?;

        debug!(repo_full_name, number = issue.number, "created conflict issue");
        Ok(TaskId {
            id: issue.number.to_string(),
            url: Some(issue.html_url.to_string()),
        })
    }
}

//! Core types for merge-warden

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Identity of a pull request, extracted from its web URL
///
/// The canonical string form is `host/owner/repo#number`. It is the key used
/// by the exclusion registry, the attempt counters and log fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PullRequestRef {
    /// Web host (e.g. `github.com`), including a port if one was given
    pub host: String,
    /// `owner/repo`, lowercased
    pub owner_repo: String,
    /// Pull request number
    pub number: u64,
}

impl PullRequestRef {
    /// Parse a pull request web URL of the form
    /// `https://<host>/<owner>/<repo>/pull/<number>`.
    ///
    /// A trailing slash and sub-pages (`/files`, `/commits`) are accepted.
    pub fn parse_url(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidReference {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(input.trim()).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "https" {
            return Err(invalid("expected an https URL"));
        }

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(invalid("URL has no host")),
        };

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [owner, repo, "pull", number, ..] => {
                let number = parse_number(number).ok_or_else(|| invalid("bad pull number"))?;
                Ok(Self {
                    host,
                    owner_repo: format!("{owner}/{repo}").to_lowercase(),
                    number,
                })
            }
            _ => Err(invalid(
                "expected https://<host>/<owner>/<repo>/pull/<number>",
            )),
        }
    }

    /// Web URL of the pull request
    pub fn web_url(&self) -> String {
        format!("https://{}/{}/pull/{}", self.host, self.owner_repo, self.number)
    }
}

fn parse_number(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|n| *n > 0)
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.host, self.owner_repo, self.number)
    }
}

impl FromStr for PullRequestRef {
    type Err = Error;

    /// Parse the canonical `host/owner/repo#number` form
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidReference {
            input: s.to_string(),
            reason: "expected host/owner/repo#number".to_string(),
        };

        let (path, number) = s.split_once('#').ok_or_else(invalid)?;
        let number = parse_number(number).ok_or_else(invalid)?;

        let mut parts = path.splitn(3, '/');
        let (Some(host), Some(owner), Some(repo)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if host.is_empty() || owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            owner_repo: format!("{owner}/{repo}").to_lowercase(),
            number,
        })
    }
}

impl TryFrom<String> for PullRequestRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PullRequestRef> for String {
    fn from(pr: PullRequestRef) -> Self {
        pr.to_string()
    }
}

/// PR lifecycle status on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrStatus {
    /// PR is open
    Open,
    /// PR was closed without merging
    Closed,
    /// PR was merged
    Merged,
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Snapshot of a pull request, fetched once per orchestration cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestState {
    /// PR number
    pub number: u64,
    /// Open, closed or merged
    pub status: PrStatus,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
    /// Login of the PR author
    pub author: String,
    /// Whether the PR is a draft
    pub is_draft: bool,
    /// Platform mergeability
    /// - `Some(true)` = mergeable
    /// - `Some(false)` = not mergeable
    /// - `None` = unknown (platform still computing)
    pub mergeable: Option<bool>,
    /// Whether the platform reports conflicts with the base branch
    pub has_conflicts: bool,
    /// Head branch name
    pub head_branch: String,
    /// `owner/repo` holding the head branch; `None` if that repository is gone
    pub head_repo_full_name: Option<String>,
    /// Base branch name
    pub base_branch: String,
    /// `owner/repo` the PR targets
    pub repo_full_name: String,
    /// Web URL for the PR
    pub html_url: String,
}

impl PullRequestState {
    /// Whether the platform has definitively reported a conflict
    pub const fn is_conflicted(&self) -> bool {
        self.has_conflicts || matches!(self.mergeable, Some(false))
    }

    /// Whether the head branch lives outside the target repository (a fork)
    pub fn is_cross_repository(&self) -> bool {
        self.head_repo_full_name
            .as_deref()
            .is_none_or(|head| !head.eq_ignore_ascii_case(&self.repo_full_name))
    }

    /// Ref in the target repository that points at the PR head
    ///
    /// Fork branches are not visible in the target repository, but the
    /// platform mirrors every PR head at `refs/pull/<n>/head`.
    pub fn head_source_ref(&self) -> String {
        if self.is_cross_repository() {
            format!("refs/pull/{}/head", self.number)
        } else {
            self.head_branch.clone()
        }
    }
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits into one
    Squash,
    /// Rebase commits onto base branch
    Rebase,
}

impl MergeMethod {
    /// API parameter value
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Squash => "squash",
            Self::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a merge operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

/// Identifier of a task created in the external task system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskId {
    /// System-specific identifier (issue number for GitHub)
    pub id: String,
    /// Web URL of the task, if the system has one
    pub url: Option<String>,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{} ({url})", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Where a conflict task should be worked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetContext {
    /// `owner/repo` holding the conflicting PR
    pub repo_full_name: String,
    /// Branch carrying the PR's changes
    pub head_branch: String,
    /// Branch the PR merges into
    pub base_branch: String,
    /// Web URL of the PR
    pub pr_url: String,
}

/// Task handed to the external task system to resolve a conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolutionTask {
    /// Stable machine name
    pub name: String,
    /// Task title
    pub title: String,
    /// Self-contained instructions
    pub description: String,
    /// Repository and branches to work on
    pub target_context: TargetContext,
}

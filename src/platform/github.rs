//! GitHub platform service implementation
//!
//! REST calls go through `reqwest` so the HTTP status can drive error
//! classification. The draft → ready transition has no REST endpoint and uses
//! the GraphQL mutation via octocrab.

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{MergeMethod, MergeResult, PrStatus, PullRequestRef, PullRequestState};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

// GraphQL response types for the ready-for-review mutation

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadyForReviewData {
    mark_pull_request_ready_for_review: MarkReadyPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadyPayload {
    pull_request: GraphQlPullRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlPullRequest {
    is_draft: bool,
}

// REST response types

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Deserialize)]
struct ApiRepo {
    full_name: String,
}

#[derive(Deserialize)]
struct ApiBranch {
    #[serde(rename = "ref")]
    ref_name: String,
    repo: Option<ApiRepo>,
}

#[derive(Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: Option<String>,
    body: Option<String>,
    state: String,
    #[serde(default)]
    merged: bool,
    merged_at: Option<String>,
    #[serde(default)]
    draft: bool,
    mergeable: Option<bool>,
    mergeable_state: Option<String>,
    html_url: String,
    node_id: Option<String>,
    user: Option<ApiUser>,
    head: ApiBranch,
    base: ApiBranch,
}

#[derive(Deserialize)]
struct ApiMergeResponse {
    sha: Option<String>,
    merged: bool,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ApiGitObject {
    sha: String,
}

#[derive(Deserialize)]
struct ApiGitRef {
    object: ApiGitObject,
}

#[derive(Deserialize)]
struct ApiReview {
    state: String,
    user: Option<ApiUser>,
}

/// Which call produced an error status; the same status means different
/// things on different endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Read,
    Update,
    Merge,
    CreateRef,
}

/// Map an HTTP error status from the GitHub API into the error taxonomy
fn classify_status(status: u16, message: &str, op: Operation) -> Error {
    let lower = message.to_lowercase();
    match status {
        401 => Error::PermissionDenied(message.to_string()),
        403 if lower.contains("rate limit") => Error::Transient(message.to_string()),
        403 => Error::PermissionDenied(message.to_string()),
        404 => Error::NotFound(message.to_string()),
        405 if op == Operation::Merge && lower.contains("not mergeable") => {
            Error::NotMergeable(message.to_string())
        }
        405 => Error::NotAllowed(message.to_string()),
        409 => Error::Conflict(message.to_string()),
        422 if op == Operation::Merge => Error::NotAllowed(message.to_string()),
        429 | 500..=599 => Error::Transient(format!("HTTP {status}: {message}")),
        _ => Error::Platform(format!("HTTP {status} during {op:?}: {message}")),
    }
}

/// Map an octocrab error into the error taxonomy
fn classify_octocrab(err: &octocrab::Error, op: Operation) -> Error {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            classify_status(source.status_code.as_u16(), &source.message, op)
        }
        other => Error::Transient(other.to_string()),
    }
}

/// Path of `git_ref` under `/git/ref/`, each segment percent-encoded
///
/// A full ref (`refs/pull/7/head`) is used as is; anything else names a branch.
fn git_ref_path(git_ref: &str) -> String {
    let short = git_ref
        .strip_prefix("refs/")
        .map_or_else(|| format!("heads/{git_ref}"), str::to_string);
    short
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// GitHub service
pub struct GitHubService {
    client: Octocrab,
    http_client: Client,
    token: String,
    host: String,
    api_base: String,
}

impl GitHubService {
    /// Create a new GitHub service
    ///
    /// `host` is the web host PR URLs use; `api_base` is the REST root
    /// (`https://api.github.com` or `https://<host>/api/v3`) and
    /// `graphql_base` the root the `/graphql` endpoint hangs off
    /// (`https://api.github.com` or `https://<host>/api`).
    pub fn new(token: &str, host: &str, api_base: &str, graphql_base: &str) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/').to_string();

        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(graphql_base.trim_end_matches('/'))
            .map_err(|e| Error::Platform(e.to_string()))?
            .build()
            .map_err(|e| Error::Platform(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("merge-warden")
            .build()
            .map_err(|e| Error::Platform(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            http_client,
            token: token.to_string(),
            host: host.to_string(),
            api_base,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.api_base))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Send a request and turn non-success statuses into classified errors
    async fn send(&self, request: RequestBuilder, op: Operation) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ApiError>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        debug!(status = status.as_u16(), ?op, %message, "GitHub API error");
        Err(classify_status(status.as_u16(), &message, op))
    }

    async fn fetch_pr(&self, pr: &PullRequestRef) -> Result<ApiPullRequest> {
        let path = format!("/repos/{}/pulls/{}", pr.owner_repo, pr.number);
        let response = self
            .send(self.request(Method::GET, &path), Operation::Read)
            .await?;
        Ok(response.json().await?)
    }
}

/// Convert the REST payload into our snapshot type
fn state_from_api(pr: &PullRequestRef, api: ApiPullRequest) -> PullRequestState {
    let status = if api.state == "open" {
        PrStatus::Open
    } else if api.merged || api.merged_at.is_some() {
        PrStatus::Merged
    } else {
        PrStatus::Closed
    };

    PullRequestState {
        number: api.number,
        status,
        title: api.title.unwrap_or_default(),
        body: api.body,
        author: api.user.map(|u| u.login).unwrap_or_default(),
        is_draft: api.draft,
        mergeable: api.mergeable,
        has_conflicts: api.mergeable_state.as_deref() == Some("dirty"),
        head_branch: api.head.ref_name,
        head_repo_full_name: api.head.repo.map(|r| r.full_name),
        base_branch: api.base.ref_name,
        repo_full_name: api
            .base
            .repo
            .map_or_else(|| pr.owner_repo.clone(), |r| r.full_name),
        html_url: api.html_url,
    }
}

/// Latest decisive review state per reviewer decides approval
fn reviews_approve(reviews: &[ApiReview]) -> bool {
    let mut latest: HashMap<&str, &str> = HashMap::new();
    for review in reviews {
        let Some(user) = &review.user else { continue };
        if matches!(
            review.state.as_str(),
            "APPROVED" | "CHANGES_REQUESTED" | "DISMISSED"
        ) {
            latest.insert(user.login.as_str(), review.state.as_str());
        }
    }
    latest.values().any(|s| *s == "APPROVED")
        && !latest.values().any(|s| *s == "CHANGES_REQUESTED")
}

#[async_trait]
impl PlatformService for GitHubService {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get_pr_state(&self, pr: &PullRequestRef) -> Result<PullRequestState> {
        debug!(pr = %pr, "getting PR state");
        let api = self.fetch_pr(pr).await?;
        let state = state_from_api(pr, api);
        debug!(
            pr = %pr,
            status = %state.status,
            draft = state.is_draft,
            mergeable = ?state.mergeable,
            conflicts = state.has_conflicts,
            "got PR state"
        );
        Ok(state)
    }

    async fn set_ready_for_review(&self, pr: &PullRequestRef) -> Result<()> {
        debug!(pr = %pr, "marking PR ready for review");
        // Fetch PR to get node_id for GraphQL mutation
        let api = self.fetch_pr(pr).await?;
        if !api.draft {
            debug!(pr = %pr, "PR already ready for review");
            return Ok(());
        }

        let node_id = api
            .node_id
            .ok_or_else(|| Error::Platform("PR missing node_id for GraphQL mutation".to_string()))?;

        let response: GraphQlResponse<MarkReadyForReviewData> = self
            .client
            .graphql(&serde_json::json!({
                "query": r"
                    mutation MarkPullRequestReadyForReview($pullRequestId: ID!) {
                        markPullRequestReadyForReview(input: { pullRequestId: $pullRequestId }) {
                            pullRequest {
                                isDraft
                            }
                        }
                    }
                ",
                "variables": {
                    "pullRequestId": node_id
                }
            }))
            .await
            .map_err(|e| classify_octocrab(&e, Operation::Update))?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            return Err(Error::Platform(format!(
                "GraphQL error: {}",
                messages.join(", ")
            )));
        }

        let data = response
            .data
            .ok_or_else(|| Error::Platform("No data in GraphQL response".to_string()))?;
        if data.mark_pull_request_ready_for_review.pull_request.is_draft {
            return Err(Error::Platform(
                "PR is still a draft after ready-for-review mutation".to_string(),
            ));
        }

        debug!(pr = %pr, "PR ready for review");
        Ok(())
    }

    async fn merge_pr(&self, pr: &PullRequestRef, method: MergeMethod) -> Result<MergeResult> {
        debug!(pr = %pr, %method, "merging PR");
        let path = format!("/repos/{}/pulls/{}/merge", pr.owner_repo, pr.number);
        let request = self
            .request(Method::PUT, &path)
            .json(&serde_json::json!({ "merge_method": method.as_str() }));

        let body: ApiMergeResponse = self.send(request, Operation::Merge).await?.json().await?;
        if !body.merged {
            return Err(Error::NotMergeable(
                body.message
                    .unwrap_or_else(|| "platform declined the merge".to_string()),
            ));
        }

        debug!(pr = %pr, sha = ?body.sha, "merge complete");
        Ok(MergeResult {
            merged: true,
            sha: body.sha,
            message: body.message,
        })
    }

    async fn create_branch(
        &self,
        repo_full_name: &str,
        from_branch: &str,
        new_branch: &str,
    ) -> Result<()> {
        debug!(repo_full_name, from_branch, new_branch, "creating branch");
        let path = format!("/repos/{repo_full_name}/git/ref/{}", git_ref_path(from_branch));
        let source: ApiGitRef = match self
            .send(self.request(Method::GET, &path), Operation::Read)
            .await
        {
            Ok(response) => response.json().await?,
            Err(Error::NotFound(_)) => {
                return Err(Error::NotFound(format!(
                    "source ref '{from_branch}' does not exist in {repo_full_name}"
                )));
            }
            Err(e) => return Err(e),
        };

        let path = format!("/repos/{repo_full_name}/git/refs");
        let request = self.request(Method::POST, &path).json(&serde_json::json!({
            "ref": format!("refs/heads/{new_branch}"),
            "sha": source.object.sha,
        }));
        self.send(request, Operation::CreateRef).await?;

        debug!(repo_full_name, new_branch, sha = %source.object.sha, "created branch");
        Ok(())
    }

    async fn is_approved(&self, pr: &PullRequestRef) -> Result<bool> {
        debug!(pr = %pr, "checking approvals");
        let path = format!("/repos/{}/pulls/{}/reviews", pr.owner_repo, pr.number);
        let reviews: Vec<ApiReview> = self
            .send(self.request(Method::GET, &path), Operation::Read)
            .await?
            .json()
            .await?;
        Ok(reviews_approve(&reviews))
    }
}

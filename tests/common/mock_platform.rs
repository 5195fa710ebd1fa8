//! Mock platform service for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use merge_warden::error::{Error, Result};
use merge_warden::platform::PlatformService;
use merge_warden::types::{MergeMethod, MergeResult, PrStatus, PullRequestRef, PullRequestState};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// One recorded platform call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    GetState(u64),
    SetReady(u64),
    Merge(u64, MergeMethod),
    CreateBranch {
        repo: String,
        from: String,
        name: String,
    },
    IsApproved(u64),
}

impl PlatformCall {
    /// Whether the call changes anything on the platform
    pub const fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::SetReady(_) | Self::Merge(..) | Self::CreateBranch { .. }
        )
    }
}

/// Error kinds the mock can inject (`Error` is not `Clone`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Transient,
    Conflict,
    NotMergeable,
    NotAllowed,
    PermissionDenied,
    NotFound,
    Platform,
}

impl Fail {
    pub fn to_error(self) -> Error {
        let msg = "injected".to_string();
        match self {
            Self::Transient => Error::Transient(msg),
            Self::Conflict => Error::Conflict(msg),
            Self::NotMergeable => Error::NotMergeable(msg),
            Self::NotAllowed => Error::NotAllowed(msg),
            Self::PermissionDenied => Error::PermissionDenied(msg),
            Self::NotFound => Error::NotFound(msg),
            Self::Platform => Error::Platform(msg),
        }
    }
}

/// Hand-written mock platform service
///
/// Features:
/// - Configurable PR snapshots keyed by number
/// - Ordered call log for verification
/// - Error injection per operation (and per merge method)
/// - Optional delay on every call, for timeout and concurrency tests
///
/// A successful merge marks the stored PR as merged and a successful
/// `set_ready_for_review` clears its draft flag, so repeated cycles observe
/// the platform's new state.
pub struct MockPlatformService {
    host: String,
    states: Mutex<HashMap<u64, PullRequestState>>,
    calls: Mutex<Vec<PlatformCall>>,
    approved: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    // Error injection
    error_on_get_state: Mutex<Option<Fail>>,
    error_on_set_ready: Mutex<Option<Fail>>,
    error_on_merge: Mutex<Vec<(MergeMethod, Fail)>>,
    error_on_create_branch: Mutex<Option<Fail>>,
    error_on_is_approved: Mutex<Option<Fail>>,
}

impl Default for MockPlatformService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatformService {
    /// Mock for `github.com`
    pub fn new() -> Self {
        Self::with_host("github.com")
    }

    /// Mock for another host
    pub fn with_host(host: &str) -> Self {
        Self {
            host: host.to_string(),
            states: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            approved: Mutex::new(true),
            delay: Mutex::new(None),
            error_on_get_state: Mutex::new(None),
            error_on_set_ready: Mutex::new(None),
            error_on_merge: Mutex::new(Vec::new()),
            error_on_create_branch: Mutex::new(None),
            error_on_is_approved: Mutex::new(None),
        }
    }

    // === Setup ===

    /// Store the snapshot returned for `state.number`
    pub fn set_state(&self, state: PullRequestState) {
        self.states.lock().unwrap().insert(state.number, state);
    }

    /// Stored snapshot for `number`
    pub fn state(&self, number: u64) -> Option<PullRequestState> {
        self.states.lock().unwrap().get(&number).cloned()
    }

    /// Answer for `is_approved`
    pub fn set_approved(&self, approved: bool) {
        *self.approved.lock().unwrap() = approved;
    }

    /// Sleep this long inside every call
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    // === Error injection methods ===

    pub fn fail_get_state(&self, fail: Fail) {
        *self.error_on_get_state.lock().unwrap() = Some(fail);
    }

    pub fn clear_get_state_failure(&self) {
        *self.error_on_get_state.lock().unwrap() = None;
    }

    pub fn fail_set_ready(&self, fail: Fail) {
        *self.error_on_set_ready.lock().unwrap() = Some(fail);
    }

    /// Make `merge_pr` with `method` fail
    pub fn fail_merge(&self, method: MergeMethod, fail: Fail) {
        self.error_on_merge.lock().unwrap().push((method, fail));
    }

    /// Make both merge methods fail with a conflict
    pub fn conflict_on_all_methods(&self) {
        self.fail_merge(MergeMethod::Merge, Fail::Conflict);
        self.fail_merge(MergeMethod::Rebase, Fail::Conflict);
    }

    pub fn clear_merge_failures(&self) {
        self.error_on_merge.lock().unwrap().clear();
    }

    pub fn fail_create_branch(&self, fail: Fail) {
        *self.error_on_create_branch.lock().unwrap() = Some(fail);
    }

    pub fn fail_is_approved(&self, fail: Fail) {
        *self.error_on_is_approved.lock().unwrap() = Some(fail);
    }

    // === Call inspection ===

    /// Every call, in order
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change platform state, in order
    pub fn mutating_calls(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(PlatformCall::is_mutating)
            .collect()
    }

    pub fn merge_calls(&self) -> Vec<MergeMethod> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Merge(_, method) => Some(method),
                _ => None,
            })
            .collect()
    }

    /// Names of the branches created
    pub fn created_branches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::CreateBranch { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    // === Internals ===

    async fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn injected(slot: &Mutex<Option<Fail>>) -> Result<()> {
        slot.lock().unwrap().map_or(Ok(()), |fail| Err(fail.to_error()))
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get_pr_state(&self, pr: &PullRequestRef) -> Result<PullRequestState> {
        self.record(PlatformCall::GetState(pr.number)).await;
        Self::injected(&self.error_on_get_state)?;
        self.state(pr.number)
            .ok_or_else(|| Error::NotFound(format!("pull request #{}", pr.number)))
    }

    async fn set_ready_for_review(&self, pr: &PullRequestRef) -> Result<()> {
        self.record(PlatformCall::SetReady(pr.number)).await;
        Self::injected(&self.error_on_set_ready)?;
        if let Some(state) = self.states.lock().unwrap().get_mut(&pr.number) {
            state.is_draft = false;
        }
        Ok(())
    }

    async fn merge_pr(&self, pr: &PullRequestRef, method: MergeMethod) -> Result<MergeResult> {
        self.record(PlatformCall::Merge(pr.number, method)).await;
        let injected = self
            .error_on_merge
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, fail)| *fail);
        if let Some(fail) = injected {
            return Err(fail.to_error());
        }
        if let Some(state) = self.states.lock().unwrap().get_mut(&pr.number) {
            state.status = PrStatus::Merged;
        }
        Ok(MergeResult {
            merged: true,
            sha: Some(format!("{:040x}", pr.number)),
            message: Some("Pull Request successfully merged".to_string()),
        })
    }

    async fn create_branch(
        &self,
        repo_full_name: &str,
        from_branch: &str,
        new_branch: &str,
    ) -> Result<()> {
        self.record(PlatformCall::CreateBranch {
            repo: repo_full_name.to_string(),
            from: from_branch.to_string(),
            name: new_branch.to_string(),
        })
        .await;
        Self::injected(&self.error_on_create_branch)
    }

    async fn is_approved(&self, pr: &PullRequestRef) -> Result<bool> {
        self.record(PlatformCall::IsApproved(pr.number)).await;
        Self::injected(&self.error_on_is_approved)?;
        Ok(*self.approved.lock().unwrap())
    }
}

//! Merge orchestration
//!
//! One cycle per invocation, following the gather → plan → execute split:
//! 1. Gather - registry lookup and a single PR snapshot
//! 2. Plan - `plan_cycle()` decides what to do (pure)
//! 3. Execute - promote, merge, back up and delegate (effectful)
//!
//! Every cycle ends in a typed [`OrchestrationResult`]; nothing here panics on
//! a PR failure.

pub mod gates;
mod locks;
mod outcome;
pub mod plan;

pub use gates::{
    ApprovalGate, AutoConfirm, ComplianceGate, CompliancePolicy, ComplianceResult,
    DenyPatternPolicy, DryRun, Gate, GateDecision, GateKind, PreviewConfirmer, PreviewGate,
};
pub use locks::KeyedLocks;
pub use outcome::{Disposition, ExclusionReason, OrchestrationResult, ReportKind};
pub use plan::{CycleAction, CyclePlan, MERGE_ORDER, plan_cycle};

use crate::delegate::ConflictDelegate;
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::registry::{ExclusionEntry, ExclusionRegistry};
use crate::types::{MergeMethod, PrStatus, PullRequestRef, PullRequestState};
use chrono::Utc;
use std::io;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

/// Conflict-handling cycles allowed before a PR is excluded
///
/// The counter is incremented on every conflict-handling cycle and the PR is
/// excluded once it reaches this value, so at most `MAX - 1` delegations
/// happen per PR.
pub const MAX_CONFLICT_ATTEMPTS: u32 = 2;

/// Reason recorded for operator-added exclusions
pub const MANUAL_EXCLUSION_REASON: &str = "excluded by operator";

/// Name of a backup branch for `head` taken now
pub fn backup_branch_name(head: &str) -> String {
    format!("backup/{head}-{}", Utc::now().format("%Y%m%d-%H%M%S"))
}

/// Administrative view over the exclusion registry
///
/// Needs no platform access, so the CLI can use it without credentials.
#[derive(Clone)]
pub struct RegistryAdmin {
    registry: Arc<dyn ExclusionRegistry>,
}

impl RegistryAdmin {
    /// Administer `registry`
    pub fn new(registry: Arc<dyn ExclusionRegistry>) -> Self {
        Self { registry }
    }

    /// Excluded PRs in canonical order
    pub fn list_excluded(&self) -> Vec<PullRequestRef> {
        self.registry.list_excluded()
    }

    /// Whether `pr` is excluded
    pub fn is_excluded(&self, pr: &PullRequestRef) -> bool {
        self.registry.is_excluded(pr)
    }

    /// Excluded PRs with reason and timestamp
    pub fn excluded_entries(&self) -> Vec<ExclusionEntry> {
        self.registry.excluded_entries()
    }

    /// Permanently exclude `pr`; a no-op if it is already excluded
    pub fn add_to_exclusion(&self, pr: &PullRequestRef) -> Result<()> {
        info!(pr = %pr, "excluding pull request by operator request");
        self.registry.exclude(pr, MANUAL_EXCLUSION_REASON)
    }

    /// Reset every conflict-attempt counter; exclusions stay
    pub fn clear_attempt_counters(&self) -> Result<()> {
        info!("clearing conflict attempt counters");
        self.registry.clear_attempts()
    }

    /// Current conflict-attempt counter for `pr`
    pub fn attempt_count(&self, pr: &PullRequestRef) -> u32 {
        self.registry.attempt_count(pr)
    }
}

/// Drives pull requests to a merged or explicitly handed-off state
pub struct MergeOrchestrator {
    platform: Arc<dyn PlatformService>,
    registry: Arc<dyn ExclusionRegistry>,
    delegate: ConflictDelegate,
    gates: Vec<Box<dyn Gate>>,
    locks: KeyedLocks,
}

impl MergeOrchestrator {
    /// Create an orchestrator with no optional gates
    pub fn new(
        platform: Arc<dyn PlatformService>,
        registry: Arc<dyn ExclusionRegistry>,
        delegate: ConflictDelegate,
    ) -> Self {
        Self {
            platform,
            registry,
            delegate,
            gates: Vec::new(),
            locks: KeyedLocks::new(),
        }
    }

    /// Add a gate; gates always run compliance → approval → preview
    #[must_use]
    pub fn with_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self.gates.sort_by_key(|g| g.kind());
        self
    }

    /// Kinds of the configured gates, in evaluation order
    pub fn gate_kinds(&self) -> Vec<GateKind> {
        self.gates.iter().map(|g| g.kind()).collect()
    }

    /// Administrative operations on this orchestrator's registry
    pub fn admin(&self) -> RegistryAdmin {
        RegistryAdmin::new(Arc::clone(&self.registry))
    }

    /// Excluded PRs in canonical order
    pub fn list_excluded(&self) -> Vec<PullRequestRef> {
        self.registry.list_excluded()
    }

    /// Permanently exclude `pr`
    pub fn add_to_exclusion(&self, pr: &PullRequestRef) -> Result<()> {
        self.admin().add_to_exclusion(pr)
    }

    /// Reset every conflict-attempt counter
    pub fn clear_attempt_counters(&self) -> Result<()> {
        self.admin().clear_attempt_counters()
    }

    /// Run one cycle for the PR at `url`
    ///
    /// Malformed input yields `InvalidReference` before any registry or
    /// network access.
    pub async fn handle_pull_request(&self, url: &str) -> OrchestrationResult {
        let pr = match PullRequestRef::parse_url(url) {
            Ok(pr) => pr,
            Err(Error::InvalidReference { input, reason }) => {
                debug!(input = %input, reason = %reason, "rejected pull request reference");
                return OrchestrationResult::InvalidReference { input, reason };
            }
            Err(e) => {
                return OrchestrationResult::InvalidReference {
                    input: url.to_string(),
                    reason: e.to_string(),
                };
            }
        };

        if !pr.host.eq_ignore_ascii_case(self.platform.host()) {
            return OrchestrationResult::InvalidReference {
                input: url.to_string(),
                reason: format!(
                    "host '{}' is not served by this platform ({})",
                    pr.host,
                    self.platform.host()
                ),
            };
        }

        self.handle_ref(pr).await
    }

    /// Run one cycle for an already parsed reference
    ///
    /// Cycles for the same PR are serialized; different PRs run concurrently.
    pub async fn handle_ref(&self, pr: PullRequestRef) -> OrchestrationResult {
        let span = info_span!("cycle", pr = %pr);
        async move {
            let _guard = self.locks.lock(&pr).await;
            let result = match self.run_cycle(&pr).await {
                Ok(result) => result,
                Err(e) => result_for_error(pr, e),
            };
            info!(result = result.label(), "cycle finished");
            result
        }
        .instrument(span)
        .await
    }

    async fn run_cycle(&self, pr: &PullRequestRef) -> Result<OrchestrationResult> {
        // =====================================================================
        // Phase 1: GATHER
        // =====================================================================

        let key = pr.clone();
        if self
            .with_registry(move |registry| Ok(registry.is_excluded(&key)))
            .await?
        {
            debug!("pull request is excluded, skipping");
            return Ok(OrchestrationResult::Excluded {
                pr: pr.clone(),
                reason: ExclusionReason::AlreadyExcluded,
            });
        }

        let state = self.platform.get_pr_state(pr).await?;
        debug!(
            status = %state.status,
            draft = state.is_draft,
            mergeable = ?state.mergeable,
            conflicts = state.has_conflicts,
            "fetched pull request state"
        );

        if state.status != PrStatus::Open {
            self.exclude(pr, format!("pull request is {}", state.status))
                .await?;
            info!(status = %state.status, "pull request is no longer open, excluded");
            return Ok(OrchestrationResult::Excluded {
                pr: pr.clone(),
                reason: ExclusionReason::Closed(state.status),
            });
        }

        // =====================================================================
        // Phase 2: PLAN
        // =====================================================================

        let plan = plan_cycle(&state);
        debug!(plan = %plan, "planned cycle");

        for gate in &self.gates {
            if let GateDecision::Hold(reason) = gate.check(pr, &state, &plan).await? {
                info!(gate = %gate.kind(), reason = %reason, "gate is holding the cycle");
                return Ok(OrchestrationResult::Pending {
                    pr: pr.clone(),
                    gate: gate.kind(),
                    reason,
                });
            }
        }

        // =====================================================================
        // Phase 3: EXECUTE
        // =====================================================================

        if plan.promote_draft {
            info!("marking draft ready for review");
            self.platform.set_ready_for_review(pr).await?;
        }

        match plan.action {
            CycleAction::Defer(reason) => {
                info!(reason = %reason, "deferring cycle");
                Ok(OrchestrationResult::Deferred {
                    pr: pr.clone(),
                    reason,
                })
            }
            CycleAction::ResolveConflict => self.handle_conflict(pr, &state, None).await,
            CycleAction::Attempt(methods) => self.attempt_merge(pr, &state, &methods).await,
        }
    }

    /// Try each method in order; conflict-class failures fall through to the
    /// next method, anything else ends the cycle.
    async fn attempt_merge(
        &self,
        pr: &PullRequestRef,
        state: &PullRequestState,
        methods: &[MergeMethod],
    ) -> Result<OrchestrationResult> {
        for &method in methods {
            match self.platform.merge_pr(pr, method).await {
                Ok(result) => {
                    info!(%method, sha = ?result.sha, "merged pull request");
                    return Ok(OrchestrationResult::Merged {
                        pr: pr.clone(),
                        method,
                        sha: result.sha,
                    });
                }
                Err(e) if e.is_conflict() => {
                    info!(%method, error = %e, "merge attempt conflicted");
                }
                Err(e) => return Err(e),
            }
        }

        let backup = match self.create_backup(state).await {
            Ok(name) => Some(name),
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                warn!(error = %e, "backup branch creation failed, continuing");
                None
            }
        };

        self.handle_conflict(pr, state, backup).await
    }

    async fn handle_conflict(
        &self,
        pr: &PullRequestRef,
        state: &PullRequestState,
        backup: Option<String>,
    ) -> Result<OrchestrationResult> {
        let key = pr.clone();
        let attempt = self
            .with_registry(move |registry| registry.increment_attempt(&key))
            .await?;
        debug!(attempt, max = MAX_CONFLICT_ATTEMPTS, "conflict attempt recorded");

        if attempt >= MAX_CONFLICT_ATTEMPTS {
            self.exclude(pr, format!("conflict attempts exhausted ({attempt})"))
                .await?;
            warn!(attempt, "conflict attempts exhausted, excluded");
            return Ok(OrchestrationResult::Excluded {
                pr: pr.clone(),
                reason: ExclusionReason::AttemptsExhausted { attempts: attempt },
            });
        }

        let backup = match backup {
            Some(name) => Some(name),
            None => match self.create_backup(state).await {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(error = %e, "backup branch creation failed, delegating without one");
                    None
                }
            },
        };

        let task = self.delegate.build_conflict_task(state);
        match self.delegate.submit(&task).await {
            Ok(task) => Ok(OrchestrationResult::ConflictDelegated {
                pr: pr.clone(),
                attempt,
                task,
                backup_branch: backup,
            }),
            Err(e) => Ok(OrchestrationResult::Reported {
                pr: pr.clone(),
                kind: ReportKind::DelegationFailed,
                message: e.to_string(),
            }),
        }
    }

    /// Backup of the PR head, taken in the target repository
    async fn create_backup(&self, state: &PullRequestState) -> Result<String> {
        let name = backup_branch_name(&state.head_branch);
        let source = state.head_source_ref();
        self.platform
            .create_branch(&state.repo_full_name, &source, &name)
            .await?;
        info!(branch = %name, source = %source, "created backup branch");
        Ok(name)
    }

    async fn exclude(&self, pr: &PullRequestRef, reason: String) -> Result<()> {
        let key = pr.clone();
        self.with_registry(move |registry| registry.exclude(&key, &reason))
            .await
    }

    /// Run a registry operation on the blocking pool
    ///
    /// File-backed registries wait on file locks and disk I/O, which must not
    /// stall the runtime worker driving other PRs' cycles.
    async fn with_registry<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ExclusionRegistry) -> Result<T> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || f(registry.as_ref()))
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))?
    }
}

/// Route an error that escaped the cycle to its result bucket
fn result_for_error(pr: PullRequestRef, err: Error) -> OrchestrationResult {
    let message = err.to_string();
    let kind = match err {
        Error::Transient(_) | Error::Registry(_) | Error::Io(_) => {
            warn!(error = %message, "cycle aborted");
            return OrchestrationResult::Aborted { pr, message };
        }
        Error::NotAllowed(_) => ReportKind::NotAllowed,
        Error::PermissionDenied(_) => ReportKind::PermissionDenied,
        Error::NotFound(_) => ReportKind::NotFound,
        Error::DelegationFailed(_) => ReportKind::DelegationFailed,
        _ => ReportKind::Platform,
    };
    warn!(kind = %kind, error = %message, "cycle reported a failure");
    OrchestrationResult::Reported { pr, kind, message }
}

//! Optional gates evaluated between the closed check and strategy selection
//!
//! A gate either lets the cycle proceed or holds it with a reason. Holding
//! never mutates the registry or the PR.

use crate::error::{Error, Result};
use crate::orchestrator::plan::CyclePlan;
use crate::platform::PlatformService;
use crate::types::{PullRequestRef, PullRequestState};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::Arc;

/// Which gate produced a decision; also the order gates run in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GateKind {
    /// Content policy on title and body
    Compliance,
    /// At least one approving review
    Approval,
    /// Operator confirmation of the planned action
    Preview,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compliance => "compliance",
            Self::Approval => "approval",
            Self::Preview => "preview",
        };
        f.write_str(s)
    }
}

/// Gate verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Continue with the cycle
    Proceed,
    /// Stop with a pending result
    Hold(String),
}

/// A check the cycle must pass before any mutation
#[async_trait]
pub trait Gate: Send + Sync {
    /// Which gate this is
    fn kind(&self) -> GateKind;

    /// Decide whether the cycle may continue
    async fn check(
        &self,
        pr: &PullRequestRef,
        state: &PullRequestState,
        plan: &CyclePlan,
    ) -> Result<GateDecision>;
}

// ============================================================================
// Compliance
// ============================================================================

/// Result of a compliance evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplianceResult {
    /// Nothing objectionable
    Compliant,
    /// The PR must not be merged automatically
    Violation(String),
}

/// Pluggable content policy
pub trait CompliancePolicy: Send + Sync {
    /// Evaluate the snapshot
    fn evaluate(&self, state: &PullRequestState) -> ComplianceResult;
}

impl<F> CompliancePolicy for F
where
    F: Fn(&PullRequestState) -> ComplianceResult + Send + Sync,
{
    fn evaluate(&self, state: &PullRequestState) -> ComplianceResult {
        self(state)
    }
}

/// Holds PRs whose title or body matches any configured pattern
///
/// Patterns are case-insensitive regular expressions.
#[derive(Debug, Clone)]
pub struct DenyPatternPolicy {
    patterns: Vec<Regex>,
}

impl DenyPatternPolicy {
    /// Compile `patterns`; an invalid pattern is a configuration error
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config(format!("invalid deny pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether no patterns are configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl CompliancePolicy for DenyPatternPolicy {
    fn evaluate(&self, state: &PullRequestState) -> ComplianceResult {
        let body = state.body.as_deref().unwrap_or_default();
        self.patterns
            .iter()
            .find(|re| re.is_match(&state.title) || re.is_match(body))
            .map_or(ComplianceResult::Compliant, |re| {
                ComplianceResult::Violation(format!("matches deny pattern '{}'", re.as_str()))
            })
    }
}

/// Runs a `CompliancePolicy` as a gate
pub struct ComplianceGate {
    policy: Box<dyn CompliancePolicy>,
}

impl ComplianceGate {
    /// Wrap `policy`
    pub fn new(policy: impl CompliancePolicy + 'static) -> Self {
        Self {
            policy: Box::new(policy),
        }
    }
}

#[async_trait]
impl Gate for ComplianceGate {
    fn kind(&self) -> GateKind {
        GateKind::Compliance
    }

    async fn check(
        &self,
        _pr: &PullRequestRef,
        state: &PullRequestState,
        _plan: &CyclePlan,
    ) -> Result<GateDecision> {
        Ok(match self.policy.evaluate(state) {
            ComplianceResult::Compliant => GateDecision::Proceed,
            ComplianceResult::Violation(reason) => GateDecision::Hold(reason),
        })
    }
}

// ============================================================================
// Approval
// ============================================================================

/// Holds the cycle until the PR has an approving review
pub struct ApprovalGate {
    platform: Arc<dyn PlatformService>,
}

impl ApprovalGate {
    /// Check approvals through `platform`
    pub fn new(platform: Arc<dyn PlatformService>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Gate for ApprovalGate {
    fn kind(&self) -> GateKind {
        GateKind::Approval
    }

    async fn check(
        &self,
        pr: &PullRequestRef,
        _state: &PullRequestState,
        _plan: &CyclePlan,
    ) -> Result<GateDecision> {
        if self.platform.is_approved(pr).await? {
            Ok(GateDecision::Proceed)
        } else {
            Ok(GateDecision::Hold("awaiting approving review".to_string()))
        }
    }
}

// ============================================================================
// Preview
// ============================================================================

/// Decides whether a previewed plan may run
#[async_trait]
pub trait PreviewConfirmer: Send + Sync {
    /// Return true to let the plan execute
    async fn confirm(&self, pr: &PullRequestRef, plan: &CyclePlan) -> Result<bool>;
}

/// Confirms everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl PreviewConfirmer for AutoConfirm {
    async fn confirm(&self, _pr: &PullRequestRef, _plan: &CyclePlan) -> Result<bool> {
        Ok(true)
    }
}

/// Confirms nothing, so every cycle stops after planning
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

#[async_trait]
impl PreviewConfirmer for DryRun {
    async fn confirm(&self, _pr: &PullRequestRef, _plan: &CyclePlan) -> Result<bool> {
        Ok(false)
    }
}

/// Shows the planned action to a confirmer before anything is mutated
pub struct PreviewGate {
    confirmer: Box<dyn PreviewConfirmer>,
}

impl PreviewGate {
    /// Ask `confirmer` before each cycle executes
    pub fn new(confirmer: impl PreviewConfirmer + 'static) -> Self {
        Self {
            confirmer: Box::new(confirmer),
        }
    }

    /// Ask an already boxed confirmer
    pub fn from_boxed(confirmer: Box<dyn PreviewConfirmer>) -> Self {
        Self { confirmer }
    }
}

#[async_trait]
impl Gate for PreviewGate {
    fn kind(&self) -> GateKind {
        GateKind::Preview
    }

    async fn check(
        &self,
        pr: &PullRequestRef,
        _state: &PullRequestState,
        plan: &CyclePlan,
    ) -> Result<GateDecision> {
        if self.confirmer.confirm(pr, plan).await? {
            Ok(GateDecision::Proceed)
        } else {
            Ok(GateDecision::Hold(format!("not confirmed: would {plan}")))
        }
    }
}

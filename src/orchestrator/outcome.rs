//! Typed results of an orchestration cycle

use crate::orchestrator::gates::GateKind;
use crate::types::{MergeMethod, PrStatus, PullRequestRef, TaskId};
use std::fmt;

/// Why a PR ended up excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// It was already in the registry; nothing was done
    AlreadyExcluded,
    /// The PR is closed or merged on the platform
    Closed(PrStatus),
    /// Conflict delegations reached the limit
    AttemptsExhausted {
        /// Counter value at exclusion
        attempts: u32,
    },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExcluded => write!(f, "already excluded"),
            Self::Closed(status) => write!(f, "pull request is {status}"),
            Self::AttemptsExhausted { attempts } => {
                write!(f, "conflict attempts exhausted ({attempts})")
            }
        }
    }
}

/// Classification of a failure that needs manual intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Branch protection or repository policy
    NotAllowed,
    /// Credentials lack permission
    PermissionDenied,
    /// PR or branch does not exist
    NotFound,
    /// Conflict task could not be created (attempt already spent)
    DelegationFailed,
    /// Unclassified platform failure
    Platform,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotAllowed => "not allowed",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::DelegationFailed => "delegation failed",
            Self::Platform => "platform error",
        };
        f.write_str(s)
    }
}

/// Coarse bucket a caller acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Merged automatically
    Handled,
    /// A human or agent has to act
    NeedsDecision,
    /// Permanently given up on
    GivenUp,
    /// Nothing changed; run the cycle again later
    RetryLater,
    /// The input was not a pull request reference
    Rejected,
}

/// Terminal result of one orchestration cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationResult {
    /// The PR was merged
    Merged {
        /// The PR
        pr: PullRequestRef,
        /// Method that succeeded
        method: MergeMethod,
        /// Merge commit, if reported
        sha: Option<String>,
    },
    /// A conflict task was handed to the task system
    ConflictDelegated {
        /// The PR
        pr: PullRequestRef,
        /// Attempt counter after this cycle
        attempt: u32,
        /// Created task
        task: TaskId,
        /// Backup branch created this cycle, if any
        backup_branch: Option<String>,
    },
    /// The PR is (now) permanently excluded
    Excluded {
        /// The PR
        pr: PullRequestRef,
        /// Why
        reason: ExclusionReason,
    },
    /// A failure that needs manual intervention; counters untouched unless
    /// `kind` is `DelegationFailed`
    Reported {
        /// The PR
        pr: PullRequestRef,
        /// Classification
        kind: ReportKind,
        /// Platform or task-system message
        message: String,
    },
    /// An optional gate is holding the PR
    Pending {
        /// The PR
        pr: PullRequestRef,
        /// Which gate
        gate: GateKind,
        /// Why it is holding
        reason: String,
    },
    /// Mergeability is not known yet
    Deferred {
        /// The PR
        pr: PullRequestRef,
        /// Why
        reason: String,
    },
    /// A transient failure aborted the cycle
    Aborted {
        /// The PR
        pr: PullRequestRef,
        /// Error message
        message: String,
    },
    /// The input was not a recognizable pull request URL
    InvalidReference {
        /// Rejected input
        input: String,
        /// Why
        reason: String,
    },
}

impl OrchestrationResult {
    /// Bucket this result belongs to
    pub const fn disposition(&self) -> Disposition {
        match self {
            Self::Merged { .. } => Disposition::Handled,
            Self::ConflictDelegated { .. } | Self::Reported { .. } | Self::Pending { .. } => {
                Disposition::NeedsDecision
            }
            Self::Excluded { .. } => Disposition::GivenUp,
            Self::Deferred { .. } | Self::Aborted { .. } => Disposition::RetryLater,
            Self::InvalidReference { .. } => Disposition::Rejected,
        }
    }

    /// The PR this result is about, if the input parsed
    pub const fn pr(&self) -> Option<&PullRequestRef> {
        match self {
            Self::Merged { pr, .. }
            | Self::ConflictDelegated { pr, .. }
            | Self::Excluded { pr, .. }
            | Self::Reported { pr, .. }
            | Self::Pending { pr, .. }
            | Self::Deferred { pr, .. }
            | Self::Aborted { pr, .. } => Some(pr),
            Self::InvalidReference { .. } => None,
        }
    }

    /// Short label for logs and CLI output
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Merged { .. } => "merged",
            Self::ConflictDelegated { .. } => "conflict delegated",
            Self::Excluded { .. } => "excluded",
            Self::Reported { .. } => "reported",
            Self::Pending { .. } => "pending",
            Self::Deferred { .. } => "deferred",
            Self::Aborted { .. } => "aborted",
            Self::InvalidReference { .. } => "invalid reference",
        }
    }
}

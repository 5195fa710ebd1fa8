//! Cycle planning - pure functions for deciding what a cycle will do
//!
//! No I/O happens here - the snapshot is passed in, making it easy to unit test.

use crate::types::{MergeMethod, PullRequestState};
use std::fmt;

/// Merge methods tried in order until one succeeds
pub const MERGE_ORDER: [MergeMethod; 2] = [MergeMethod::Merge, MergeMethod::Rebase];

/// What the cycle will do after the gates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    /// Try each merge method in order
    Attempt(Vec<MergeMethod>),
    /// The platform already reports a conflict; go straight to conflict handling
    ResolveConflict,
    /// Mergeability is unknown; change nothing and let a later cycle decide
    Defer(String),
}

/// Plan for one orchestration cycle
///
/// Created by `plan_cycle()` (pure) and executed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    /// Whether the PR must be marked ready for review first
    pub promote_draft: bool,
    /// Action after promotion
    pub action: CycleAction,
}

impl fmt::Display for CyclePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.promote_draft {
            write!(f, "mark ready for review, then ")?;
        }
        match &self.action {
            CycleAction::Attempt(methods) => {
                let names: Vec<&str> = methods.iter().map(|m| m.as_str()).collect();
                write!(f, "merge (trying {})", names.join(" → "))
            }
            CycleAction::ResolveConflict => write!(f, "delegate conflict resolution"),
            CycleAction::Defer(reason) => write!(f, "defer ({reason})"),
        }
    }
}

/// Create the cycle plan for an open PR (PURE - no I/O, easily testable)
pub fn plan_cycle(state: &PullRequestState) -> CyclePlan {
    let action = if state.is_conflicted() {
        CycleAction::ResolveConflict
    } else if state.mergeable.is_none() {
        CycleAction::Defer("mergeability is still being computed".to_string())
    } else {
        CycleAction::Attempt(MERGE_ORDER.to_vec())
    };

    CyclePlan {
        promote_draft: state.is_draft,
        action,
    }
}

//! Conflict task construction - pure functions
//!
//! No I/O happens here; the same snapshot always yields the same task.

use crate::types::{ConflictResolutionTask, PullRequestState, TargetContext};
use std::fmt::Write as _;

/// Build the conflict resolution task for a PR (PURE)
///
/// The description is self-contained: someone with no other context can
/// resolve the conflict from it alone.
pub fn build_conflict_task(state: &PullRequestState) -> ConflictResolutionTask {
    let name = format!(
        "resolve-conflict-{}-{}",
        state.repo_full_name.replace('/', "-").to_lowercase(),
        state.number
    );
    let title = format!(
        "Resolve merge conflicts in PR #{}: {}",
        state.number, state.title
    );

    ConflictResolutionTask {
        name,
        title,
        description: describe(state),
        target_context: TargetContext {
            repo_full_name: state.repo_full_name.clone(),
            head_branch: state.head_branch.clone(),
            base_branch: state.base_branch.clone(),
            pr_url: state.html_url.clone(),
        },
    }
}

/// Ordered resolution strategy; each step names what to do with the branches.
fn strategy_steps(head: &str, base: &str) -> [(&'static str, String); 5] {
    [
        (
            "Analyze",
            format!(
                "Fetch `{head}` and `{base}`. List every conflicting file and the commits on `{base}` that caused each conflict."
            ),
        ),
        (
            "Preserve intent",
            "Keep the behavior this pull request introduces. Do not drop its changes to make a conflict disappear.".to_string(),
        ),
        (
            "Integrate",
            format!(
                "Merge or rebase `{base}` into `{head}` and resolve each conflict so the changes from both sides survive."
            ),
        ),
        (
            "Test",
            "Build the project and run the full test suite. Fix any failure the integration introduced.".to_string(),
        ),
        (
            "Update",
            format!(
                "Push the resolved `{head}` so the pull request becomes mergeable again, then close this task."
            ),
        ),
    ]
}

fn describe(state: &PullRequestState) -> String {
    let mut out = String::new();
    let body = state
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or("_No description provided._");

    // Writing to a String cannot fail
    let _ = writeln!(out, "## Merge conflict in #{}: {}", state.number, state.title);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Automatic merging of this pull request failed because it conflicts with `{}`.",
        state.base_branch
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Pull request:** {}", state.html_url);
    let _ = writeln!(out, "- **Author:** @{}", state.author);
    let _ = writeln!(out, "- **Repository:** {}", state.repo_full_name);
    let _ = writeln!(out, "- **Head branch:** `{}`", state.head_branch);
    let _ = writeln!(out, "- **Base branch:** `{}`", state.base_branch);
    let _ = writeln!(out);
    let _ = writeln!(out, "### Original description");
    let _ = writeln!(out);
    let _ = writeln!(out, "{body}");
    let _ = writeln!(out);
    let _ = writeln!(out, "### Resolution strategy");
    let _ = writeln!(out);
    for (i, (step, detail)) in strategy_steps(&state.head_branch, &state.base_branch)
        .iter()
        .enumerate()
    {
        let _ = writeln!(out, "{}. **{step}:** {detail}", i + 1);
    }
    out
}

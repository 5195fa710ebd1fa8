//! Handle command - run one orchestration cycle per pull request

use crate::cli::context::CommandContext;
use crate::cli::style::{CROSS, Stylize, check, link, spinner_style};
use anstream::println;
use async_trait::async_trait;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use merge_warden::error::{Error, Result};
use merge_warden::orchestrator::{
    CyclePlan, Disposition, DryRun, MergeOrchestrator, OrchestrationResult, PreviewConfirmer,
};
use merge_warden::types::PullRequestRef;
use std::sync::Arc;
use std::time::Duration;

/// Options for the handle command
#[derive(Debug, Clone, Default)]
pub struct HandleOptions {
    /// Plan each cycle and stop before mutating anything
    pub dry_run: bool,
    /// Show each plan and prompt before executing it
    pub confirm: bool,
}

/// Asks on the terminal before each cycle executes
struct PromptConfirmer;

#[async_trait]
impl PreviewConfirmer for PromptConfirmer {
    async fn confirm(&self, pr: &PullRequestRef, plan: &CyclePlan) -> Result<bool> {
        let prompt = format!("{pr}: {plan}. Proceed?");
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(prompt)
                .default(true)
                .interact()
                .map_err(|e| Error::Io(std::io::Error::other(e)))
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

/// Run the handle command
///
/// Returns `false` when any result is an invalid reference or an aborted
/// cycle, so the caller can set a failing exit code.
pub async fn run_handle(
    ctx: &CommandContext,
    urls: &[String],
    options: HandleOptions,
) -> Result<bool> {
    let preview: Option<Box<dyn PreviewConfirmer>> = if options.dry_run {
        Some(Box::new(DryRun))
    } else if options.confirm {
        Some(Box::new(PromptConfirmer))
    } else {
        None
    };
    let orchestrator = Arc::new(ctx.orchestrator(preview).await?);

    let results = if options.confirm {
        // Prompts must not interleave
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push(orchestrator.handle_pull_request(url).await);
        }
        results
    } else {
        run_concurrently(&orchestrator, urls).await?
    };

    let mut ok = true;
    for result in &results {
        print_result(result);
        if matches!(
            result,
            OrchestrationResult::InvalidReference { .. } | OrchestrationResult::Aborted { .. }
        ) {
            ok = false;
        }
    }

    if options.dry_run {
        println!();
        println!("{}", "Dry run: nothing was changed.".muted());
    }

    Ok(ok)
}

/// Run one cycle per URL on the runtime, returning results in input order
async fn run_concurrently(
    orchestrator: &Arc<MergeOrchestrator>,
    urls: &[String],
) -> Result<Vec<OrchestrationResult>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Handling {} pull request(s)...", urls.len()));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let handles: Vec<_> = urls
        .iter()
        .map(|url| {
            let orchestrator = Arc::clone(orchestrator);
            let url = url.clone();
            tokio::spawn(async move { orchestrator.handle_pull_request(&url).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        results.push(result);
    }

    spinner.finish_and_clear();
    Ok(results)
}

fn pr_label(pr: &PullRequestRef) -> String {
    link(&pr.to_string(), &pr.web_url()).accent()
}

/// Print one line (plus detail) per result
fn print_result(result: &OrchestrationResult) {
    let marker = match result.disposition() {
        Disposition::Handled => check(),
        Disposition::NeedsDecision => "!".warn(),
        Disposition::GivenUp => "-".muted(),
        Disposition::RetryLater => "~".warn(),
        Disposition::Rejected => CROSS.failure(),
    };

    match result {
        OrchestrationResult::Merged { pr, method, sha } => {
            let sha = sha.as_deref().map_or_else(String::new, |s| {
                format!(" ({})", s.get(..12).unwrap_or(s)).muted()
            });
            println!("{marker} {} merged via {}{sha}", pr_label(pr), method.emphasis());
        }
        OrchestrationResult::ConflictDelegated {
            pr,
            attempt,
            task,
            backup_branch,
        } => {
            println!(
                "{marker} {} conflict delegated (attempt {attempt}): task {}",
                pr_label(pr),
                task.to_string().accent()
            );
            if let Some(branch) = backup_branch {
                println!("    backup: {}", branch.accent());
            }
        }
        OrchestrationResult::Excluded { pr, reason } => {
            println!("{marker} {} excluded: {}", pr_label(pr), reason.muted());
        }
        OrchestrationResult::Reported { pr, kind, message } => {
            println!("{marker} {} {}", pr_label(pr), kind.warn());
            println!("    {}", message.muted());
        }
        OrchestrationResult::Pending { pr, gate, reason } => {
            println!(
                "{marker} {} pending on {} gate: {}",
                pr_label(pr),
                gate.emphasis(),
                reason
            );
        }
        OrchestrationResult::Deferred { pr, reason } => {
            println!("{marker} {} deferred: {}", pr_label(pr), reason.muted());
        }
        OrchestrationResult::Aborted { pr, message } => {
            println!("{marker} {} aborted: {}", pr_label(pr), message.warn());
        }
        OrchestrationResult::InvalidReference { input, reason } => {
            println!("{marker} {} {}", input.failure(), reason.muted());
        }
    }
}

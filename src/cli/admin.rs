//! Registry administration commands
//!
//! These only touch the local registry file and need no credentials.

use crate::cli::context::{CommandContext, parse_reference};
use crate::cli::style::{Stylize, check};
use anstream::println;
use merge_warden::error::Result;

/// `warden excluded list`
pub fn run_excluded_list(ctx: &CommandContext) {
    let entries = ctx.admin().excluded_entries();
    if entries.is_empty() {
        println!("{}", "No excluded pull requests.".muted());
        println!("{}", format!("Registry: {}", ctx.state_path.display()).muted());
        return;
    }

    println!(
        "{} {}",
        "Excluded pull requests".emphasis(),
        format!("({})", entries.len()).muted()
    );
    for entry in entries {
        println!(
            "  {}  {}  {}",
            entry.pr.to_string().accent(),
            entry.record.reason,
            entry
                .record
                .excluded_at
                .format("%Y-%m-%d %H:%M UTC")
                .to_string()
                .muted()
        );
    }
}

/// `warden excluded add <url>`
pub fn run_excluded_add(ctx: &CommandContext, input: &str) -> Result<()> {
    let pr = parse_reference(input)?;
    let admin = ctx.admin();
    let already = admin.is_excluded(&pr);
    admin.add_to_exclusion(&pr)?;

    if already {
        println!("{} is already excluded", pr.to_string().accent());
    } else {
        println!("{} Excluded {}", check(), pr.to_string().accent());
    }
    Ok(())
}

/// `warden attempts clear`
pub fn run_attempts_clear(ctx: &CommandContext) -> Result<()> {
    ctx.admin().clear_attempt_counters()?;
    println!("{} Cleared conflict attempt counters", check());
    Ok(())
}

/// `warden attempts show <url>`
pub fn run_attempts_show(ctx: &CommandContext, input: &str) -> Result<()> {
    let pr = parse_reference(input)?;
    let admin = ctx.admin();
    let count = admin.attempt_count(&pr);
    let excluded = admin.is_excluded(&pr);

    println!(
        "{}: {} conflict attempt(s){}",
        pr.to_string().accent(),
        count,
        if excluded {
            " (excluded)".warn()
        } else {
            String::new()
        }
    );
    Ok(())
}

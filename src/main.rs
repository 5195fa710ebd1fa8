//! warden - merge orchestration for agent-authored pull requests

mod cli;

use anstream::eprintln;
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use cli::{CommandContext, HandleOptions, Stylize};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Drive pull requests to merged, delegated, excluded or reported
#[derive(Parser)]
#[command(name = "warden", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/merge-warden/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Exclusion registry file (overrides config and MERGE_WARDEN_STATE_FILE)
    #[arg(long, global = true, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one orchestration cycle for each pull request URL
    Handle {
        /// Pull request URLs (https://<host>/<owner>/<repo>/pull/<number>)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Show the planned action without changing anything
        #[arg(long, conflicts_with = "confirm")]
        dry_run: bool,

        /// Show each planned action and ask before executing it
        #[arg(long)]
        confirm: bool,
    },

    /// Inspect or extend the exclusion registry
    Excluded {
        #[command(subcommand)]
        action: ExcludedCommand,
    },

    /// Inspect or reset conflict attempt counters
    Attempts {
        #[command(subcommand)]
        action: AttemptsCommand,
    },
}

#[derive(Subcommand)]
enum ExcludedCommand {
    /// List excluded pull requests
    List,
    /// Permanently exclude a pull request
    Add {
        /// Pull request URL or host/owner/repo#number
        url: String,
    },
}

#[derive(Subcommand)]
enum AttemptsCommand {
    /// Reset every counter (exclusions stay)
    Clear,
    /// Show the counter for one pull request
    Show {
        /// Pull request URL or host/owner/repo#number
        url: String,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "merge_warden=info,warden=info",
        2 => "merge_warden=debug,warden=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = CommandContext::load(cli.config.as_deref(), cli.state_file.as_deref())?;

    match cli.command {
        Commands::Handle {
            urls,
            dry_run,
            confirm,
        } => {
            let ok = cli::run_handle(&ctx, &urls, HandleOptions { dry_run, confirm }).await?;
            return Ok(if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Commands::Excluded { action } => match action {
            ExcludedCommand::List => cli::run_excluded_list(&ctx),
            ExcludedCommand::Add { url } => cli::run_excluded_add(&ctx, &url)?,
        },
        Commands::Attempts { action } => match action {
            AttemptsCommand::Clear => cli::run_attempts_clear(&ctx)?,
            AttemptsCommand::Show { url } => cli::run_attempts_show(&ctx, &url)?,
        },
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".failure());
            ExitCode::FAILURE
        }
    }
}

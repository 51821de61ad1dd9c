//! CLI for the bootstrap checker.
//!
//! Meant to be run from a timer: `bootstrap run` performs one
//! reconciliation pass and exits.

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use bootstrap::inventory::load_expected_nodes;
use bootstrap::probe::{HealthProber, HealthVerdict};
use bootstrap::{run_pass_with_tracker, BootstrapConfig, GitHubTracker, PassOutcome, SystemRunner};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bootstrap")]
#[command(about = "Self-healing bootstrap checker - verifies cluster nodes and gates rebuilds behind ticket approval")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML config file
    #[arg(long, env = "BOOTSTRAP_CONFIG", default_value = "bootstrap.toml", global = true)]
    config: PathBuf,

    /// Override the tracker token file
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    /// Override the tracker repository (owner/repo)
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass
    Run,
    /// Check cluster health only, without touching the tracker
    Probe,
    /// Print the expected nodes read from the inventory
    Nodes,
}

fn load_config(cli: &Cli) -> Result<BootstrapConfig> {
    let mut config = BootstrapConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    if let Some(path) = &cli.token_file {
        config.tracker.token_path.clone_from(path);
    }
    if let Some(repo) = &cli.repo {
        let (owner, name) = repo
            .split_once('/')
            .context("--repo must be in owner/repo format")?;
        config.tracker.owner = owner.to_string();
        config.tracker.repo = name.to_string();
    }
    Ok(config)
}

fn print_outcome(outcome: &PassOutcome) {
    let line = outcome.to_string();
    match outcome {
        PassOutcome::Healthy => println!("{}", line.green()),
        PassOutcome::Remediated { outcome, .. } if outcome.is_success() => {
            println!("{}", line.green());
        }
        PassOutcome::TicketOpened { .. } | PassOutcome::AwaitingApproval { .. } => {
            println!("{}", line.yellow());
        }
        PassOutcome::Remediated { .. } => println!("{}", line.red()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;
    let expected = load_expected_nodes(&config.cluster.inventory_path).with_context(|| {
        format!(
            "Failed to read inventory {}",
            config.cluster.inventory_path.display()
        )
    })?;
    debug!(nodes = ?expected, "Expected nodes");

    let runner = SystemRunner::new().with_working_dir(config.commands.working_dir.clone());

    match cli.command {
        Commands::Nodes => {
            for node in expected.iter() {
                println!("{node}");
            }
        }

        Commands::Probe => {
            let verdict = HealthProber::new(&runner, &config.commands.list_nodes)
                .probe(&expected)
                .await;
            match verdict {
                HealthVerdict::Healthy => println!("{}", "Cluster healthy".green()),
                HealthVerdict::Unhealthy { missing, .. } => {
                    println!("{} missing: {}", "Cluster unhealthy;".red(), missing.join(", "));
                }
            }
        }

        Commands::Run => {
            let outcome =
                run_pass_with_tracker(&config, &runner, &expected, GitHubTracker::from_config)
                    .await
                    .with_context(|| {
                        format!("Reconciliation failed for {}", config.tracker.repo_path())
                    })?;
            print_outcome(&outcome);
        }
    }

    Ok(())
}

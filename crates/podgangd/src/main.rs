//! podgangd — the PodGang daemon.
//!
//! Single binary that assembles the gang scheduling subsystems:
//! - Scheduling group engine (membership, queue, node set)
//! - Gang scheduling loop
//! - Bind retry queue
//! - Event feed replay with a simulated cluster
//!
//! # Usage
//!
//! ```text
//! podgangd standalone --events cluster.jsonl --config podgang.toml --run-for 30
//! ```

mod feed;
mod standalone;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use standalone::StandaloneOptions;

const DEFAULT_LOG_FILTER: &str = "info,podgangd=debug,podgang=debug";

#[derive(Parser)]
#[command(name = "podgangd", about = "PodGang gang-scheduling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an event feed against an in-process cluster simulation.
    Standalone {
        /// JSON-lines file of pod and node events.
        #[arg(long)]
        events: PathBuf,

        /// Path to podgang.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Scheduler name this instance answers to (overrides the config).
        #[arg(long)]
        scheduler_name: Option<String>,

        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        run_for: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            events,
            config,
            scheduler_name,
            run_for,
        } => {
            let report = standalone::run_standalone(StandaloneOptions {
                events,
                config,
                scheduler_name,
                run_for: run_for.map(Duration::from_secs),
            })
            .await?;

            info!(
                applied = report.applied,
                skipped = report.skipped,
                bindings = report.bindings.len(),
                remaining = ?report.remaining_groups,
                "standalone run finished"
            );
            Ok(())
        }
    }
}

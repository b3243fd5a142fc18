//! Geodiff CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "geodiff")]
#[command(about = "Entity diff and reconciliation for knowledge graph edits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff a local edit session against a stored remote graph
    Local {
        /// Remote store fixture (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Local session: values, relations and optional context (JSON)
        #[arg(long)]
        session: PathBuf,

        /// Space the edits belong to
        #[arg(long)]
        space: String,
    },
    /// Post-process server-computed diffs
    Process {
        /// Remote store fixture (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Server diff payload (JSON)
        #[arg(long)]
        diffs: PathBuf,

        /// Space the diffs belong to
        #[arg(long)]
        space: String,
    },
    /// Convert an oldest-version snapshot into an all-added diff
    Snapshot {
        /// Entity snapshot (JSON)
        #[arg(long)]
        input: PathBuf,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries the JSON output
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "geodiff={0},geodiff_core={0},geodiff_engine={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Local { store, session, space } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::local(&store, &session, &space, config).await
        }
        Commands::Process { store, diffs, space } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::process(&store, &diffs, &space, config).await
        }
        Commands::Snapshot { input } => commands::snapshot(&input),
        Commands::Version => {
            println!("geodiff v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

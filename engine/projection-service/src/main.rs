//! Hot Shot Props command line
//!
//! Ingests player game logs, rebuilds features and serves ensemble
//! projections, either one step at a time or on a schedule.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stat_fetcher::{GameLogSource, HttpGameLogSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use projection_service::render::{render_projection, render_recent};
use projection_service::{
    initialize_logging, load_configuration, run_scheduled, shutdown_signal, Pipeline, ServiceConfig,
};

#[derive(Parser)]
#[command(name = "hotshot", version, about = "Player stat projections from game logs")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch new game logs into the raw store
    Ingest,
    /// Rebuild the feature table from the raw store
    BuildFeatures,
    /// Project a player's next game (by name or id)
    Project {
        player: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List players with features
    Players,
    /// Show a player's most recent games
    Recent {
        player: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        games: usize,
    },
    /// Run one full refresh cycle
    Refresh,
    /// Run refresh cycles on a schedule until interrupted
    Run,
}

fn http_source(config: &ServiceConfig) -> Result<Arc<dyn GameLogSource>> {
    let source = HttpGameLogSource::new(&config.fetcher).context("Failed to create API client")?;
    Ok(Arc::new(source))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_deref())?;
    initialize_logging(&config.logging)?;
    info!("Starting hotshot v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Arc::new(Pipeline::open(config.clone())?);

    match cli.command {
        Command::Ingest => {
            let report = pipeline.ingest(http_source(&config)?).await?;
            println!(
                "{} players, {} new records, {} duplicates, {} failed",
                report.players,
                report.merged.inserted,
                report.merged.duplicates,
                report.failed.len()
            );
        }
        Command::BuildFeatures => {
            let summary = pipeline.build_features()?;
            println!(
                "{} feature rows for {} players ({} skipped)",
                summary.rows,
                summary.players,
                summary.skipped.len()
            );
        }
        Command::Project { player, json } => {
            let result = pipeline.project(&player)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_projection(&result));
            }
        }
        Command::Players => {
            for name in pipeline.players() {
                println!("{name}");
            }
        }
        Command::Recent { player, games } => {
            let rows = pipeline
                .recent_games(&player, games)
                .with_context(|| format!("No games for {player:?}"))?;
            print!("{}", render_recent(&rows));
        }
        Command::Refresh => {
            let report = pipeline.refresh(http_source(&config)?).await?;
            println!(
                "{} new records, {} feature rows, {} models loaded",
                report.fetch.merged.inserted, report.build.rows, report.models_loaded
            );
        }
        Command::Run => {
            let source = http_source(&config)?;
            info!("Running scheduled refreshes. Press Ctrl+C to stop.");
            run_scheduled(Arc::clone(&pipeline), source, &config.scheduler, shutdown_signal()).await?;
        }
    }

    Ok(())
}

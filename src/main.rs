//! koukai: release publication pipeline for a fansub distribution site.
//!
//! Two entry points: publish one release by id (optionally as a dry run),
//! or run the periodic scheduler that publishes whatever has come due.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use koukai_config::Config;
use koukai_pipeline::{Orchestrator, Scheduler};
use koukai_store::{Database, Repository};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "koukai", version, about = "Release publication pipeline")]
struct Cli {
    /// Configuration file (defaults to koukai.toml in the platform config
    /// directory; KOUKAI_* environment variables override either).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a single release now.
    Publish {
        /// Id of the release to publish.
        release_id: i64,
        /// Describe every side effect without performing any.
        #[arg(short = 'd', long)]
        dry_run: bool,
    },
    /// Run the periodic publication scheduler.
    Schedule {
        /// Run a single scheduling pass and exit.
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "aborting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Arc::new(Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?);
    let db = Database::connect(&config.paths.database)
        .await
        .or_raise(|| ErrorKind::Store)?;
    let repo = Repository::from(&db);
    let publishers = koukai_publish::publishers(&config);
    let orchestrator = Arc::new(Orchestrator::new(
        repo.clone(),
        publishers,
        Arc::clone(&config),
    ));

    match cli.command {
        Command::Publish {
            release_id,
            dry_run,
        } => {
            orchestrator
                .publish_release(release_id, dry_run)
                .await
                .or_raise(|| ErrorKind::Pipeline)?;
        }
        Command::Schedule { once } => {
            let scheduler = Scheduler::new(
                repo,
                orchestrator,
                Duration::from_secs(config.scheduler.period_secs),
            );
            if once {
                scheduler.tick().await.or_raise(|| ErrorKind::Pipeline)?;
            } else {
                scheduler.run().await.or_raise(|| ErrorKind::Pipeline)?;
            }
        }
    }

    db.close().await;
    Ok(())
}

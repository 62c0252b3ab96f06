use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedmill::config::Config;
use feedmill::ingest::{run_ingest, PipelineContext, RunOptions};
use feedmill::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(
    name = "feedmill",
    about = "RSS ingestion pipeline: fetch, clean, classify, de-duplicate"
)]
struct Args {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", default_value = "feedmill.toml")]
    config: PathBuf,

    /// Only ingest the source with this exact name
    #[arg(long, value_name = "NAME")]
    source: Option<String>,

    /// Append `&from=<VALUE>` to every feed URL (test harness hook)
    #[arg(long, value_name = "VALUE")]
    from: Option<String>,

    /// Run even if the minimum fetch interval has not elapsed
    #[arg(long)]
    force: bool,

    /// Create the database schema and exit
    #[arg(long)]
    init_db: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for progress logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config).context("Failed to load configuration")?;

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedmill appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    if args.init_db {
        println!("Database initialized at {}", config.database_path);
        return Ok(());
    }

    let options = RunOptions {
        source_filter: args.source,
        from_suffix: args.from,
        force: args.force,
    };
    let ctx = PipelineContext::prepare(db, reqwest::Client::new(), &config, options)
        .await
        .context("Failed to prepare pipeline")?;

    let added = run_ingest(&ctx).await.context("Ingestion run failed")?;
    println!("{} new item(s) ingested", added);

    Ok(())
}

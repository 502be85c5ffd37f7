use std::path::PathBuf;

use clap::Parser;
use prefarm_audit::config::{load_yaml, IngestConfig};
use prefarm_audit::ingest::ingest_file;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,

    /// overrides the configured summary CSV
    #[clap(long, value_parser)]
    summary: Option<PathBuf>,

    /// overrides the configured table
    #[clap(long, value_parser)]
    table: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = _main().await {
        tracing::error!("Error ingesting file: {:?}", err);
        std::process::exit(1);
    }
}

async fn _main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer();

    let sqlx_filter = tracing_subscriber::filter::Targets::new()
        // sqlx logs every SQL query and how long it took which is very noisy
        .with_target("sqlx", tracing::Level::WARN)
        .with_default(tracing_subscriber::fmt::Subscriber::DEFAULT_MAX_LEVEL);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(sqlx_filter)
        .init();

    dotenvy::dotenv().ok();

    let Cli {
        config_path,
        summary,
        table,
    } = Cli::parse();

    let mut config: IngestConfig = load_yaml(&config_path)?;
    if let Some(summary) = summary {
        config.summary_path = summary;
    }
    if let Some(table) = table {
        config.table = table;
    }

    let count = ingest_file(&config, |key| std::env::var(key).ok()).await?;
    tracing::info!("Ingestion completed, {} rows inserted", count);
    Ok(())
}

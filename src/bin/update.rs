use std::path::PathBuf;

use clap::Parser;
use prefarm_audit::config::{load_yaml, UpdateConfig};
use prefarm_audit::custody::{publish_summary, summarize_audit, sync_and_audit};
use prefarm_audit::ingest::ingest_file;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,

    /// stop after publishing the summary
    #[clap(long)]
    skip_ingest: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = _main().await {
        tracing::error!("Error updating prefarm data: {:?}", err);
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
        skip_ingest,
    } = Cli::parse();
    let config: UpdateConfig = load_yaml(&config_path)?;
    let custody = &config.custody;

    if custody.skip_sync {
        tracing::info!("reusing audit output {:?}", custody.audit_output);
    } else {
        sync_and_audit(custody).await?;
    }

    let rows = summarize_audit(&custody.audit_output, &custody.summary_output)?;
    tracing::info!("{} rows written to {:?}", rows, custody.summary_output);

    let web_data_dir = custody.resolved_web_data_dir(|key| std::env::var(key).ok());
    let published = publish_summary(&custody.summary_output, web_data_dir.as_deref())?;

    if skip_ingest {
        return Ok(());
    }
    let count = ingest_file(&config.ingest(published), |key| std::env::var(key).ok()).await?;
    tracing::info!("Update completed, {} rows inserted", count);
    Ok(())
}

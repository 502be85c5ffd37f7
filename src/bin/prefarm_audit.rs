use std::path::PathBuf;

use clap::Parser;
use prefarm_audit::audit::run_audit;
use prefarm_audit::config::{load_yaml, AuditConfig};
use prefarm_audit::report::{dump_events, dump_summary, render_reports, summary_rows};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,

    /// number of most recent events listed per address
    #[clap(long, value_parser)]
    limit: Option<usize>,

    /// only audit the named addresses
    #[clap(long = "only", value_parser)]
    only: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = _main().await {
        tracing::error!("audit failed: {:?}", err);
        std::process::exit(1);
    }
}

async fn _main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let http_filter = tracing_subscriber::filter::Targets::new()
        // connection level chatter of the https client
        .with_target("hyper", tracing::Level::WARN)
        .with_target("rustls", tracing::Level::WARN)
        .with_target("reqwest", tracing::Level::WARN)
        .with_default(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(http_filter)
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        tracing::info!("Loaded environment from {:?}", path);
    }

    let Cli {
        config_path,
        limit,
        only,
    } = Cli::parse();

    let mut config: AuditConfig = load_yaml(&config_path)?;
    config
        .node
        .apply_env_overrides(|key| std::env::var(key).ok())?;
    let limit = limit.unwrap_or(config.limit);

    let addresses: Vec<_> = config
        .addresses
        .iter()
        .filter(|tracked| only.is_empty() || only.contains(&tracked.name))
        .cloned()
        .collect();
    if addresses.is_empty() {
        anyhow::bail!("no tracked address matches {:?}", only);
    }

    tracing::info!(
        "Auditing {} addresses on {} via {}:{}",
        addresses.len(),
        config.node.network,
        config.node.host,
        config.node.port
    );
    let connector = config.node.connector();
    let reports = run_audit(&connector, &addresses, limit).await;

    println!("{}", render_reports(&reports, config.node.network.unit()));

    if let Some(path) = &config.export.events_output_path {
        let rows = dump_events(&reports, path)?;
        tracing::info!("{} events written to {:?}", rows, path);
    }
    if let Some(path) = &config.export.summary_output_path {
        let rows = summary_rows(&reports);
        dump_summary(&rows, path)?;
        tracing::info!("{} summary rows written to {:?}", rows.len(), path);
    }

    Ok(())
}

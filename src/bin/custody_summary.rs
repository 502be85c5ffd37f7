use std::path::PathBuf;

use clap::Parser;
use prefarm_audit::config::{load_yaml, CustodyConfig};
use prefarm_audit::custody::{publish_summary, summarize_audit, sync_and_audit};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,

    /// copy the summary into WEB_DATA_DIR (or the configured web_data_dir)
    #[clap(long)]
    publish: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = _main().await {
        tracing::error!("Error during audit processing: {:?}", err);
        std::process::exit(1);
    }
}

async fn _main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry().with(fmt_layer).init();

    dotenvy::dotenv().ok();

    let Cli {
        config_path,
        publish,
    } = Cli::parse();
    let config: CustodyConfig = load_yaml(&config_path)?;

    if config.skip_sync {
        tracing::info!("reusing audit output {:?}", config.audit_output);
    } else {
        sync_and_audit(&config).await?;
    }

    let rows = summarize_audit(&config.audit_output, &config.summary_output)?;
    tracing::info!("{} rows written to {:?}", rows, config.summary_output);

    if publish {
        let web_data_dir = config.resolved_web_data_dir(|key| std::env::var(key).ok());
        publish_summary(&config.summary_output, web_data_dir.as_deref())?;
    }
    Ok(())
}

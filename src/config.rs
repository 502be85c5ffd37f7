use crate::address::Network;
use crate::node::rpc::RpcConnector;
use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_RPC_PORT: u16 = 8555;
pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_TABLE: &str = "prefarmdb";

pub fn load_yaml<T: DeserializeOwned>(config_path: &Path) -> anyhow::Result<T> {
    tracing::info!("Config file {:?}", config_path);
    let file = File::open(config_path).with_context(|| {
        format!(
            "Cannot read config file {path}",
            path = config_path.display()
        )
    })?;
    serde_yaml::from_reader(file).with_context(|| {
        format!(
            "Cannot parse config file {path}",
            path = config_path.display()
        )
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    pub node: NodeConfig,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub addresses: Vec<TrackedAddress>,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackedAddress {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    pub events_output_path: Option<PathBuf>,
    pub summary_output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// node root holding `config/ssl`
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub network: Network,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_RPC_PORT
}

fn default_root() -> PathBuf {
    PathBuf::from("~/.chia/mainnet")
}

fn default_timeout_secs() -> u64 {
    30
}

impl NodeConfig {
    /// `CHIA_ROOT`, `CHIA_NETWORK`, `CHIA_RPC_HOST` and `CHIA_RPC_PORT` win over the file.
    pub fn apply_env_overrides<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = var("CHIA_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(network) = var("CHIA_NETWORK") {
            self.network = Network::from_str(&network)?;
        }
        if let Some(host) = var("CHIA_RPC_HOST") {
            self.host = host;
        }
        if let Some(port) = var("CHIA_RPC_PORT") {
            self.port = u16::from_str(port.trim())
                .map_err(|err| anyhow!("invalid CHIA_RPC_PORT {:?}: {}", port, err))?;
        }
        Ok(())
    }

    pub fn resolved_root(&self, home: Option<&str>) -> PathBuf {
        match (self.root.strip_prefix("~"), home) {
            (Ok(rest), Some(home)) => Path::new(home).join(rest),
            _ => self.root.clone(),
        }
    }

    pub fn connector(&self) -> RpcConnector {
        let home = std::env::var("HOME").ok();
        RpcConnector::with_root(
            self.host.clone(),
            self.port,
            self.resolved_root(home.as_deref()),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum DbConfig {
    Postgres {
        host: String,
        port: u64,
        user: String,
        password: String,
        db: String,
    },
}

impl DbConfig {
    pub fn url(&self) -> String {
        match self {
            DbConfig::Postgres {
                host,
                port,
                user,
                password,
                db,
            } => format!("postgresql://{user}:{password}@{host}:{port}/{db}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// falls back to `DATABASE_URL` when absent
    pub db: Option<DbConfig>,
    pub summary_path: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl IngestConfig {
    pub fn database_url<F>(&self, var: F) -> anyhow::Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        match &self.db {
            Some(db) => Ok(db.url()),
            None => var("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL env var not set")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustodyConfig {
    /// custody tool executable, `cic` from PATH by default
    pub cic_path: Option<PathBuf>,
    pub prefarm_config: PathBuf,
    pub sync_db: PathBuf,
    pub audit_output: PathBuf,
    pub summary_output: PathBuf,
    /// remove an existing sync db before syncing
    #[serde(default)]
    pub fresh_sync: bool,
    /// reuse an existing audit output instead of running the tool
    #[serde(default)]
    pub skip_sync: bool,
    /// web data directory the summary is published to
    #[serde(default)]
    pub web_data_dir: Option<PathBuf>,
}

impl CustodyConfig {
    /// `WEB_DATA_DIR` wins over the file.
    pub fn resolved_web_data_dir<F>(&self, var: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        var("WEB_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.web_data_dir.clone())
    }
}

/// Sync, summarize, publish and ingest in one run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateConfig {
    pub custody: CustodyConfig,
    /// falls back to `DATABASE_URL` when absent
    pub db: Option<DbConfig>,
    #[serde(default = "default_table")]
    pub table: String,
}

impl UpdateConfig {
    /// Ingestion of the summary published at `summary_path`.
    pub fn ingest(&self, summary_path: PathBuf) -> IngestConfig {
        IngestConfig {
            db: self.db.clone(),
            summary_path,
            table: self.table.clone(),
        }
    }
}

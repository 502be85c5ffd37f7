//! Summaries of the custody tool's (`cic`) audit output.
//!
//! The audit file is plain text with JSON objects concatenated into it. Each
//! `HANDLE_PAYMENT` object becomes one dated summary row.

use crate::amount::XchAmount;
use crate::config::CustodyConfig;
use crate::report::{dump_summary, SummaryRow};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;

pub const PAYMENT_ACTION: &str = "HANDLE_PAYMENT";

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("config file not found: {0:?}")]
    MissingConfig(PathBuf),
    #[error("no HANDLE_PAYMENT transactions found in {0:?}")]
    NoPayments(PathBuf),
    #[error("WEB_DATA_DIR is not set and the config has no web_data_dir")]
    MissingWebDataDir,
    #[error("summary {0:?} has no file name")]
    InvalidSummaryPath(PathBuf),
    #[error("{command} exited with {status}")]
    ToolFailed { command: String, status: ExitStatus },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Write(#[from] anyhow::Error),
}

/// All JSON objects found in `text`, skipping anything that doesn't parse.
pub fn extract_json_objects(text: &str) -> Vec<Value> {
    let mut objects = vec![];
    let mut position = 0;
    while let Some(offset) = text[position..].find('{') {
        let start = position + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                objects.push(value);
                position = start + stream.byte_offset();
            }
            _ => position = start + 1,
        }
    }
    objects
}

fn payment(object: &Value) -> Option<(i64, XchAmount)> {
    if object.get("action").and_then(Value::as_str) != Some(PAYMENT_ACTION) {
        return None;
    }
    let time = object.get("time")?;
    let time = time.as_i64().or_else(|| time.as_f64().map(|t| t as i64))?;
    let amount = object.get("params")?.get("out_amount")?;
    let mojos = match amount {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|mojos| *mojos >= 0.0 && mojos.fract() == 0.0 && *mojos <= u64::MAX as f64)
                .map(|mojos| mojos as u64)
        })?,
        Value::String(text) => text.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    Some((time, XchAmount::from(mojos)))
}

/// Payment rows in chronological order.
pub fn payment_rows(objects: &[Value]) -> Vec<SummaryRow> {
    let mut payments: Vec<_> = objects
        .iter()
        .filter_map(|object| {
            let parsed = payment(object);
            if parsed.is_none() && object.get("action").and_then(Value::as_str) == Some(PAYMENT_ACTION) {
                tracing::warn!("skipping malformed payment: {}", object);
            }
            parsed
        })
        .collect();
    payments.sort_by_key(|(time, _)| *time);
    payments
        .into_iter()
        .filter_map(|(time, amount)| {
            Utc.timestamp_opt(time, 0).single().map(|time| SummaryRow {
                time: time.date_naive(),
                amount,
            })
        })
        .collect()
}

pub fn summarize_audit(audit_path: &Path, summary_path: &Path) -> Result<usize, CustodyError> {
    let text = std::fs::read_to_string(audit_path)?;
    let objects = extract_json_objects(&text);
    tracing::info!("Parsed {} JSON objects from {:?}", objects.len(), audit_path);
    let rows = payment_rows(&objects);
    if rows.is_empty() {
        tracing::error!("No {} transactions found in {:?}", PAYMENT_ACTION, audit_path);
        return Err(CustodyError::NoPayments(audit_path.to_path_buf()));
    }
    tracing::info!("Found {} {} transactions", rows.len(), PAYMENT_ACTION);
    dump_summary(&rows, summary_path)?;
    Ok(rows.len())
}

/// Copy the summary into the web data directory, creating it when needed.
pub fn publish_summary(
    summary_path: &Path,
    web_data_dir: Option<&Path>,
) -> Result<PathBuf, CustodyError> {
    let web_data_dir = web_data_dir.ok_or(CustodyError::MissingWebDataDir)?;
    let file_name = summary_path
        .file_name()
        .ok_or_else(|| CustodyError::InvalidSummaryPath(summary_path.to_path_buf()))?;
    std::fs::create_dir_all(web_data_dir)?;
    let published = web_data_dir.join(file_name);
    std::fs::copy(summary_path, &published)?;
    tracing::info!("summary published to {:?}", published);
    Ok(published)
}

fn cic_executable(config: &CustodyConfig) -> PathBuf {
    config
        .cic_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("cic"))
}

async fn run(program: &Path, args: &[&str]) -> Result<(), CustodyError> {
    let command = format!("{} {}", program.display(), args.join(" "));
    tracing::info!("running {}", command);
    let status = Command::new(program).args(args).status().await?;
    if !status.success() {
        return Err(CustodyError::ToolFailed { command, status });
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// `cic sync` the prefarm into the sync db, then `cic audit` it into the audit file.
pub async fn sync_and_audit(config: &CustodyConfig) -> Result<(), CustodyError> {
    if !config.prefarm_config.exists() {
        return Err(CustodyError::MissingConfig(config.prefarm_config.clone()));
    }
    ensure_parent(&config.sync_db)?;
    ensure_parent(&config.audit_output)?;
    if config.fresh_sync && config.sync_db.exists() {
        tracing::info!("Removing existing sync DB: {:?}", config.sync_db);
        std::fs::remove_file(&config.sync_db)?;
    }

    let cic = cic_executable(config);
    let prefarm_config = config.prefarm_config.to_string_lossy().into_owned();
    let sync_db = config.sync_db.to_string_lossy().into_owned();
    let audit_output = config.audit_output.to_string_lossy().into_owned();
    run(&cic, &["sync", "-c", prefarm_config.as_str(), "-db", sync_db.as_str()]).await?;
    run(&cic, &["audit", "-db", sync_db.as_str(), "-f", audit_output.as_str()]).await?;
    tracing::info!("audit written to {:?}", config.audit_output);
    Ok(())
}

//! Loads summary CSV files into the Postgres summary table.

use crate::amount::XchAmount;
use crate::config::IngestConfig;
use crate::report::SummaryRow;
use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DbBackend, DbErr, Statement, TransactionTrait};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("summary CSV not found: {0:?}")]
    MissingSummary(PathBuf),
    #[error("summary CSV {0:?} lacks a {1} column")]
    MissingColumn(PathBuf, &'static str),
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

/// Rows of a `time,amount_xch` CSV. Rows with a bad date or amount are skipped.
pub fn read_summary(path: &Path) -> Result<Vec<SummaryRow>, IngestError> {
    if !path.is_file() {
        tracing::error!("Summary CSV not found: {:?}", path);
        return Err(IngestError::MissingSummary(path.to_path_buf()));
    }
    let mut lines = BufReader::new(File::open(path)?).lines();
    let header = match lines.next() {
        Some(header) => header?,
        None => return Ok(vec![]),
    };
    let columns: Vec<_> = header.split(',').map(str::trim).collect();
    let column = |name: &'static str| {
        columns
            .iter()
            .position(|column| *column == name)
            .ok_or_else(|| IngestError::MissingColumn(path.to_path_buf(), name))
    };
    let time_column = column("time")?;
    let amount_column = column("amount_xch")?;

    let mut rows = vec![];
    for line in lines {
        let line = line?;
        let fields: Vec<_> = line.split(',').map(str::trim).collect();
        let (time, amount) = match (fields.get(time_column), fields.get(amount_column)) {
            (Some(time), Some(amount)) if !time.is_empty() && !amount.is_empty() => (*time, *amount),
            _ => continue,
        };
        let time = match NaiveDate::parse_from_str(time, "%Y-%m-%d") {
            Ok(time) => time,
            Err(_) => {
                tracing::warn!("Invalid date '{}', skipping", time);
                continue;
            }
        };
        let amount = match XchAmount::from_str(amount) {
            Ok(amount) => amount,
            Err(_) => {
                tracing::warn!("Invalid amount '{}' on date {}, skipping", amount, time);
                continue;
            }
        };
        rows.push(SummaryRow { time, amount });
    }
    Ok(rows)
}

/// Plain SQL identifier: ascii letter or `_`, then ascii alphanumerics or `_`.
pub fn validate_table_name(table: &str) -> Result<(), IngestError> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(IngestError::InvalidTable(table.to_string()))
    }
}

pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            time DATE PRIMARY KEY,
            amount_xch NUMERIC(20,12) NOT NULL
        )"
    )
}

pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (time, amount_xch) VALUES ($1::date, $2::numeric) ON CONFLICT (time) DO NOTHING"
    )
}

/// Inserts `rows`, leaving dates already present untouched. Returns the number
/// of rows actually inserted.
pub async fn ingest_rows(rows: &[SummaryRow], url: &str, table: &str) -> Result<u64, IngestError> {
    validate_table_name(table)?;
    let conn = Database::connect(url).await?;
    tracing::info!("Connection success");

    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        create_table_sql(table),
    ))
    .await?;

    let insert = insert_sql(table);
    let txn = conn.begin().await?;
    let mut inserted = 0;
    for row in rows {
        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &insert,
                [
                    row.time.format("%Y-%m-%d").to_string().into(),
                    row.amount.to_string().into(),
                ],
            ))
            .await?;
        inserted += result.rows_affected();
    }
    txn.commit().await?;
    conn.close().await?;

    tracing::info!(
        "Ingested {} of {} rows into '{}' (duplicates skipped by PK)",
        inserted,
        rows.len(),
        table
    );
    Ok(inserted)
}

/// Reads the configured summary and ingests it. An empty summary never
/// touches the database.
pub async fn ingest_file<F>(config: &IngestConfig, var: F) -> Result<u64, IngestError>
where
    F: Fn(&str) -> Option<String>,
{
    validate_table_name(&config.table)?;
    let rows = read_summary(&config.summary_path)?;
    if rows.is_empty() {
        tracing::info!("No records to ingest for file {:?}", config.summary_path);
        return Ok(0);
    }
    let url = config.database_url(var)?;
    ingest_rows(&rows, &url, &config.table).await
}

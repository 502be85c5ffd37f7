//! Console and CSV renderings of an audit run.

use crate::amount::XchAmount;
use crate::audit::{totals, AddressReport};
use crate::ledger::{EventKind, LedgerEvent};
use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const UNKNOWN_TIME: &str = "unknown";
pub const EVENTS_HEADER: &str = "name,height,kind,amount_xch,coin_id,timestamp,confirmed";
pub const SUMMARY_HEADER: &str = "time,amount_xch";

/// One dated amount, as ingested into the summary table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryRow {
    pub time: NaiveDate,
    pub amount: XchAmount,
}

impl ToString for SummaryRow {
    fn to_string(&self) -> String {
        format!("{},{}", self.time.format("%Y-%m-%d"), self.amount)
    }
}

fn format_time(timestamp: &Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

pub fn format_event(event: &LedgerEvent, unit: &str) -> String {
    format!(
        "[{}] {}: {} {} {} {}",
        event.height,
        event.kind,
        event.amount,
        unit,
        event.coin_id,
        format_time(&event.timestamp)
    )
}

pub fn render_report(report: &AddressReport, unit: &str) -> Vec<String> {
    let mut lines = vec![];
    if let Some(reason) = &report.failure {
        lines.push(format!("{}: FAILED ({})", report.name, reason));
    }
    lines.push(format!("{}: {} {}", report.name, report.balance, unit));
    lines.extend(
        report
            .events
            .iter()
            .map(|event| format!("  {}", format_event(event, unit))),
    );
    lines
}

pub fn render_reports(reports: &[AddressReport], unit: &str) -> String {
    let mut lines = reports
        .iter()
        .flat_map(|report| render_report(report, unit))
        .collect::<Vec<_>>();
    let failed = reports.iter().filter(|report| report.is_failed()).count();
    lines.push(format!(
        "total: {} {} ({} addresses, {} failed)",
        totals(reports).total(),
        unit,
        reports.len(),
        failed
    ));
    lines.join("\n")
}

fn create_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

pub fn dump_events(reports: &[AddressReport], path: &Path) -> anyhow::Result<usize> {
    let mut output = create_file(path)?;
    output.write_all(format!("{}\n", EVENTS_HEADER).as_bytes())?;
    let mut rows = 0;
    for report in reports {
        for event in report.events.iter() {
            output.write_all(
                format!(
                    "{},{},{},{},{},{},{}\n",
                    report.name,
                    event.height,
                    event.kind,
                    event.amount,
                    event.coin_id,
                    format_time(&event.timestamp),
                    event.confirmed
                )
                .as_bytes(),
            )?;
            rows += 1;
        }
    }
    Ok(rows)
}

/// Outgoing payments with a known block time, oldest first.
pub fn summary_rows(reports: &[AddressReport]) -> Vec<SummaryRow> {
    reports
        .iter()
        .flat_map(|report| report.events.iter())
        .filter(|event| event.kind == EventKind::Sent)
        .filter_map(|event| event.timestamp.map(|time| (time, event.amount)))
        .sorted_by_key(|(time, _)| *time)
        .map(|(time, amount)| SummaryRow {
            time: time.date_naive(),
            amount,
        })
        .collect()
}

pub fn dump_summary(rows: &[SummaryRow], path: &Path) -> anyhow::Result<()> {
    let mut output = create_file(path)?;
    output.write_all(format!("{}\n", SUMMARY_HEADER).as_bytes())?;
    for row in rows {
        output.write_all(format!("{}\n", row.to_string()).as_bytes())?;
    }
    Ok(())
}

use crate::address;
use crate::amount::XchAmount;
use crate::balance::{balance, BalanceAccumulator};
use crate::bytes::Bytes32;
use crate::config::TrackedAddress;
use crate::ledger::{reconcile, LedgerEvent};
use crate::node::{Connect, FullNode};

/// What one run found for a tracked address.
///
/// A failed address always carries a zero balance and no events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressReport {
    pub name: String,
    pub address: String,
    pub balance: XchAmount,
    pub events: Vec<LedgerEvent>,
    pub failure: Option<String>,
}

impl AddressReport {
    fn failed(tracked: &TrackedAddress, reason: String) -> Self {
        Self {
            name: tracked.name.clone(),
            address: tracked.address.clone(),
            balance: XchAmount::ZERO,
            events: vec![],
            failure: Some(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Connects once and audits every address in order.
///
/// Addresses are decoded before connecting, and a run with no decodable address
/// never connects. Every failure is confined to its address. The session is
/// closed exactly once after the last address.
pub async fn run_audit<C: Connect>(
    connector: &C,
    addresses: &[TrackedAddress],
    limit: usize,
) -> Vec<AddressReport> {
    let decoded: Vec<_> = addresses
        .iter()
        .map(|tracked| {
            address::parse(&tracked.address).map_err(|err| {
                tracing::error!("skipping {}: {}", tracked.name, err);
                err.to_string()
            })
        })
        .collect();

    if decoded.iter().all(Result::is_err) {
        return addresses
            .iter()
            .zip(decoded)
            .map(|(tracked, decoded)| AddressReport::failed(tracked, decoded.err().unwrap_or_default()))
            .collect();
    }

    let session = match connector.connect().await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!("connection failed: {}", err);
            let reason = err.to_string();
            return addresses
                .iter()
                .zip(decoded)
                .map(|(tracked, decoded)| {
                    AddressReport::failed(tracked, decoded.err().unwrap_or_else(|| reason.clone()))
                })
                .collect();
        }
    };

    let mut reports = Vec::with_capacity(addresses.len());
    for (tracked, decoded) in addresses.iter().zip(decoded) {
        let report = match decoded {
            Ok(puzzle_hash) => audit_puzzle_hash(&session, tracked, &puzzle_hash, limit).await,
            Err(reason) => AddressReport::failed(tracked, reason),
        };
        reports.push(report);
    }

    session.close().await;
    reports
}

/// Audits a single address over an already open session.
pub async fn audit_address<N: FullNode>(
    node: &N,
    tracked: &TrackedAddress,
    limit: usize,
) -> AddressReport {
    match address::parse(&tracked.address) {
        Ok(puzzle_hash) => audit_puzzle_hash(node, tracked, &puzzle_hash, limit).await,
        Err(err) => {
            tracing::error!("skipping {}: {}", tracked.name, err);
            AddressReport::failed(tracked, err.to_string())
        }
    }
}

async fn audit_puzzle_hash<N: FullNode>(
    node: &N,
    tracked: &TrackedAddress,
    puzzle_hash: &Bytes32,
    limit: usize,
) -> AddressReport {
    let records = match node.get_coin_records_by_puzzle_hash(puzzle_hash, true).await {
        Ok(records) => records,
        Err(err) => {
            tracing::error!("can't fetch coins of {}: {}", tracked.name, err);
            return AddressReport::failed(tracked, err.to_string());
        }
    };
    tracing::info!(
        "{}: {} coin records for {}",
        tracked.name,
        records.len(),
        puzzle_hash
    );

    AddressReport {
        name: tracked.name.clone(),
        address: tracked.address.clone(),
        balance: balance(&records),
        events: reconcile(&records, limit, node).await,
        failure: None,
    }
}

pub fn totals(reports: &[AddressReport]) -> BalanceAccumulator {
    let mut accumulator = BalanceAccumulator::new();
    for report in reports {
        accumulator.add_balance(&report.name, report.balance);
    }
    accumulator
}

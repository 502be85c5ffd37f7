//! Turns the coin records of one puzzle hash into a ledger of events.

use crate::amount::XchAmount;
use crate::bytes::Bytes32;
use crate::coin::CoinRecord;
use crate::node::BlockTimestamps;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// created by a block reward
    Farmed,
    Received,
    Sent,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Farmed => "FARMED",
            EventKind::Received => "RECEIVED",
            EventKind::Sent => "SENT",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    pub kind: EventKind,
    pub amount: XchAmount,
    pub coin_id: Bytes32,
    pub height: u32,
    /// `None` when the block time couldn't be resolved
    pub timestamp: Option<DateTime<Utc>>,
    pub confirmed: bool,
}

/// Builds the most recent `limit` events for `records`.
///
/// Only the first `2 * limit` records are examined, so the result is exact
/// only while the puzzle hash has at most that many coins. Each record yields
/// a creation event and, when spent, a `Sent` event. Events are ordered by
/// height, newest first, with unconfirmed (height 0) events last.
///
/// Failed timestamp lookups leave the event's timestamp empty.
pub async fn reconcile<L: BlockTimestamps + ?Sized>(
    records: &[CoinRecord],
    limit: usize,
    block_lookup: &L,
) -> Vec<LedgerEvent> {
    if limit == 0 {
        return vec![];
    }

    let mut timestamps = TimestampCache::new(block_lookup);
    let mut events = Vec::new();
    for record in records.iter().take(limit.saturating_mul(2)) {
        let amount = XchAmount::from(record.amount);
        let confirmed = record.is_confirmed();

        events.push(LedgerEvent {
            kind: if record.coinbase {
                EventKind::Farmed
            } else {
                EventKind::Received
            },
            amount,
            coin_id: record.coin_id,
            height: record.confirmed_height,
            timestamp: timestamps.at(record.confirmed_height).await,
            confirmed,
        });

        if record.is_spent() {
            // a spend of a coin the node never confirmed is kept with the unconfirmed events
            let height = if confirmed { record.spent_height } else { 0 };
            events.push(LedgerEvent {
                kind: EventKind::Sent,
                amount,
                coin_id: record.coin_id,
                height,
                timestamp: timestamps.at(height).await,
                confirmed,
            });
        }
    }

    events.sort_by(|a, b| b.height.cmp(&a.height));
    events.truncate(limit);
    events
}

struct TimestampCache<'a, L: ?Sized> {
    lookup: &'a L,
    resolved: HashMap<u32, Option<DateTime<Utc>>>,
}

impl<'a, L: BlockTimestamps + ?Sized> TimestampCache<'a, L> {
    fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            resolved: HashMap::new(),
        }
    }

    async fn at(&mut self, height: u32) -> Option<DateTime<Utc>> {
        if height == 0 {
            return None;
        }
        if let Some(resolved) = self.resolved.get(&height) {
            return *resolved;
        }
        let resolved = match self.lookup.block_timestamp(height).await {
            Ok(seconds) => {
                let time = i64::try_from(seconds)
                    .ok()
                    .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single());
                if time.is_none() {
                    tracing::debug!("block {} has out of range timestamp {}", height, seconds);
                }
                time
            }
            Err(err) => {
                tracing::debug!("timestamp lookup failed: {}", err);
                None
            }
        };
        self.resolved.insert(height, resolved);
        resolved
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::amount::XchAmount;
    use crate::bytes::Bytes32;
    use crate::coin::CoinRecord;
    use crate::ledger::{reconcile, EventKind};
    use crate::node::{BlockTimestamps, LookupError};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Block `h` was made at `1_600_000_000 + h`.
    #[derive(Default)]
    pub(crate) struct LinearTimestamps {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl BlockTimestamps for LinearTimestamps {
        async fn block_timestamp(&self, height: u32) -> Result<u64, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1_600_000_000 + height as u64)
        }
    }

    pub(crate) struct FailingTimestamps;

    #[async_trait]
    impl BlockTimestamps for FailingTimestamps {
        async fn block_timestamp(&self, height: u32) -> Result<u64, LookupError> {
            Err(LookupError {
                height,
                reason: "unavailable".to_string(),
            })
        }
    }

    pub(crate) fn record(
        seed: u8,
        amount: u64,
        confirmed_height: u32,
        spent_height: u32,
        coinbase: bool,
    ) -> CoinRecord {
        CoinRecord::new(
            Bytes32::new([seed; 32]),
            Bytes32::new([0x22; 32]),
            amount,
            confirmed_height,
            spent_height,
            coinbase,
        )
    }

    fn mixed_records() -> Vec<CoinRecord> {
        (0..40u32)
            .map(|i| {
                let confirmed = if i % 7 == 0 { 0 } else { 10 + (i * 37) % 200 };
                let spent = if confirmed != 0 && i % 3 == 0 {
                    confirmed + 5
                } else {
                    0
                };
                record(i as u8, 1_000 + i as u64, confirmed, spent, i % 4 == 0)
            })
            .collect()
    }

    #[tokio::test]
    async fn farmed_coin() {
        let records = vec![record(1, 2_000_000_000_000, 100, 0, true)];
        let events = reconcile(&records, 10, &LinearTimestamps::default()).await;
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind, EventKind::Farmed);
        assert_eq!(event.amount.as_xch(), 2.0);
        assert!(event.confirmed);
        assert_eq!(event.height, 100);
        assert_eq!(event.coin_id, records[0].coin_id);
        assert_eq!(
            event.timestamp,
            Utc.timestamp_opt(1_600_000_100, 0).single()
        );
    }

    #[tokio::test]
    async fn received_then_sent() {
        let records = vec![record(1, 1_000_000_000_000, 50, 75, false)];
        let events = reconcile(&records, 10, &LinearTimestamps::default()).await;
        let shape: Vec<_> = events.iter().map(|e| (e.kind, e.height)).collect();
        assert_eq!(shape, vec![(EventKind::Sent, 75), (EventKind::Received, 50)]);
        assert!(events.iter().all(|e| e.amount == XchAmount::from(1_000_000_000_000u64)));
        assert_eq!(events[0].coin_id, events[1].coin_id);
    }

    #[tokio::test]
    async fn empty_input() {
        for limit in [0, 1, 100] {
            assert!(reconcile(&[], limit, &LinearTimestamps::default())
                .await
                .is_empty());
        }
    }

    #[tokio::test]
    async fn zero_limit_skips_lookups() {
        let lookup = LinearTimestamps::default();
        let events = reconcile(&mixed_records(), 0, &lookup).await;
        assert!(events.is_empty());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_creation_event_per_record_plus_one_per_spend() {
        let records = mixed_records();
        let spent = records.iter().filter(|r| r.is_spent()).count();
        // large enough that nothing is truncated
        let events = reconcile(&records, 1_000, &LinearTimestamps::default()).await;
        assert_eq!(events.len(), records.len() + spent);
        assert_eq!(
            events.iter().filter(|e| e.kind == EventKind::Sent).count(),
            spent
        );
    }

    #[tokio::test]
    async fn ordered_newest_first_unconfirmed_last() {
        let events = reconcile(&mixed_records(), 1_000, &LinearTimestamps::default()).await;
        assert!(events.windows(2).all(|w| w[0].height >= w[1].height));
        let first_unconfirmed = events
            .iter()
            .position(|e| e.height == 0)
            .expect("fixture has unconfirmed coins");
        assert!(events[first_unconfirmed..].iter().all(|e| e.height == 0));
        assert!(events[first_unconfirmed..].iter().all(|e| !e.confirmed));
        assert!(events[first_unconfirmed..].iter().all(|e| e.timestamp.is_none()));
    }

    #[tokio::test]
    async fn lookup_failures_degrade_to_unknown() {
        let records = mixed_records();
        let spent = records.iter().filter(|r| r.is_spent()).count();
        let events = reconcile(&records, 1_000, &FailingTimestamps).await;
        assert_eq!(events.len(), records.len() + spent);
        assert!(events.iter().all(|e| e.timestamp.is_none()));
    }

    #[tokio::test]
    async fn truncates_before_sorting() {
        // only the first 2 * limit records are looked at, the newest coin is last
        let mut records: Vec<_> = (1..=4u32).map(|h| record(h as u8, 1, h, 0, false)).collect();
        records.push(record(9, 1, 1_000, 0, false));
        let events = reconcile(&records, 2, &LinearTimestamps::default()).await;
        let heights: Vec<_> = events.iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![4, 3]);
    }

    #[tokio::test]
    async fn duplicate_records_are_not_merged() {
        let coin = record(3, 5, 20, 30, false);
        let events =
            reconcile(&[coin.clone(), coin], 10, &LinearTimestamps::default()).await;
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn unconfirmed_spend_passes_through() {
        let events = reconcile(
            &[record(4, 5, 0, 30, false)],
            10,
            &LinearTimestamps::default(),
        )
        .await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| !e.confirmed && e.height == 0));
    }

    #[tokio::test]
    async fn lookups_are_shared_per_height() {
        let lookup = LinearTimestamps::default();
        let records = vec![record(1, 1, 10, 20, false), record(2, 1, 10, 20, false)];
        reconcile(&records, 10, &lookup).await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn kind_names() {
        assert_eq!(EventKind::Farmed.to_string(), "FARMED");
        assert_eq!(
            serde_json::to_string(&EventKind::Received).unwrap(),
            "\"RECEIVED\""
        );
    }
}

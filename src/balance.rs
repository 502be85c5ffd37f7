use crate::amount::XchAmount;
use crate::coin::CoinRecord;
use std::collections::BTreeMap;

/// Sum of the unspent coins, farmed or received alike.
pub fn balance(records: &[CoinRecord]) -> XchAmount {
    records
        .iter()
        .filter(|record| !record.is_spent())
        .map(|record| XchAmount::from(record.amount))
        .sum()
}

/// Balances of the tracked addresses seen during one run, by name.
#[derive(Default)]
pub struct BalanceAccumulator {
    balance_by_name: BTreeMap<String, XchAmount>,
}

impl BalanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, name: &str) -> XchAmount {
        self.balance_by_name.get(name).copied().unwrap_or_default()
    }

    pub fn add_records(&mut self, name: &str, records: &[CoinRecord]) {
        self.add_balance(name, balance(records));
    }

    pub fn add_balance(&mut self, name: &str, amount: XchAmount) {
        *self.balance_by_name.entry(name.to_string()).or_default() += amount;
    }

    pub fn total(&self) -> XchAmount {
        self.balance_by_name.values().copied().sum()
    }

    pub fn len(&self) -> usize {
        self.balance_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_balances(self) -> BTreeMap<String, XchAmount> {
        self.balance_by_name
    }
}

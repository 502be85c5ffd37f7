use crate::bytes::Bytes32;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One coin as reported by the full node, spent or unspent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRecord {
    pub coin_id: Bytes32,
    pub parent_coin_info: Bytes32,
    pub puzzle_hash: Bytes32,
    /// mojos
    pub amount: u64,
    /// 0 while unconfirmed
    pub confirmed_height: u32,
    /// 0 while unspent
    pub spent_height: u32,
    pub coinbase: bool,
}

impl CoinRecord {
    pub fn new(
        parent_coin_info: Bytes32,
        puzzle_hash: Bytes32,
        amount: u64,
        confirmed_height: u32,
        spent_height: u32,
        coinbase: bool,
    ) -> Self {
        Self {
            coin_id: coin_id(&parent_coin_info, &puzzle_hash, amount),
            parent_coin_info,
            puzzle_hash,
            amount,
            confirmed_height,
            spent_height,
            coinbase,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.spent_height != 0
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_height != 0
    }
}

/// `sha256(parent || puzzle_hash || amount)` with the amount in its minimal
/// signed big-endian form.
pub fn coin_id(parent_coin_info: &Bytes32, puzzle_hash: &Bytes32, amount: u64) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(parent_coin_info.as_bytes());
    hasher.update(puzzle_hash.as_bytes());
    hasher.update(amount_bytes(amount));
    Bytes32::new(hasher.finalize().into())
}

fn amount_bytes(amount: u64) -> Vec<u8> {
    if amount == 0 {
        return vec![];
    }
    let bytes = amount.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut encoded = Vec::with_capacity(bytes.len() - first + 1);
    // keep the value positive when the high bit is set
    if bytes[first] & 0x80 != 0 {
        encoded.push(0);
    }
    encoded.extend_from_slice(&bytes[first..]);
    encoded
}

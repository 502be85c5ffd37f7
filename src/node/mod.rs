//! The slice of the full node interface an audit consumes.

pub mod rpc;

use crate::bytes::Bytes32;
use crate::coin::CoinRecord;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("can't reach the node: {0}")]
    Connection(String),
    #[error("{method} failed: {reason}")]
    Query { method: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no timestamp for block {height}: {reason}")]
pub struct LookupError {
    pub height: u32,
    pub reason: String,
}

/// Height to unix timestamp resolution.
#[async_trait]
pub trait BlockTimestamps: Send + Sync {
    async fn block_timestamp(&self, height: u32) -> Result<u64, LookupError>;
}

/// An open session with a full node.
#[async_trait]
pub trait FullNode: BlockTimestamps + Sized {
    /// An address with no activity yields an empty list.
    async fn get_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: &Bytes32,
        include_spent: bool,
    ) -> Result<Vec<CoinRecord>, NodeError>;

    async fn close(self);
}

#[async_trait]
pub trait Connect: Send + Sync {
    type Session: FullNode;

    async fn connect(&self) -> Result<Self::Session, NodeError>;
}

//! Full node JSON RPC over mutually authenticated HTTPS.

use crate::bytes::Bytes32;
use crate::coin::CoinRecord;
use crate::node::{BlockTimestamps, Connect, FullNode, LookupError, NodeError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

const FULL_NODE_CERT: &str = "config/ssl/full_node/private_full_node.crt";
const FULL_NODE_KEY: &str = "config/ssl/full_node/private_full_node.key";

#[derive(Debug, Clone)]
pub struct RpcConnector {
    pub host: String,
    pub port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub timeout: Duration,
}

impl RpcConnector {
    /// Uses the full node's private certificate pair below `root`.
    pub fn with_root(host: String, port: u16, root: PathBuf, timeout: Duration) -> Self {
        Self {
            host,
            port,
            cert_path: root.join(FULL_NODE_CERT),
            key_path: root.join(FULL_NODE_KEY),
            timeout,
        }
    }

    fn build_client(&self) -> Result<Client, NodeError> {
        let mut pem = std::fs::read(&self.cert_path).map_err(|err| {
            NodeError::Connection(format!(
                "can't read certificate {}: {}",
                self.cert_path.display(),
                err
            ))
        })?;
        let key = std::fs::read(&self.key_path).map_err(|err| {
            NodeError::Connection(format!(
                "can't read key {}: {}",
                self.key_path.display(),
                err
            ))
        })?;
        pem.push(b'\n');
        pem.extend(key);
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|err| NodeError::Connection(format!("invalid client identity: {}", err)))?;

        // the node serves a certificate signed by its own private CA
        Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .danger_accept_invalid_certs(true)
            .timeout(self.timeout)
            .build()
            .map_err(|err| NodeError::Connection(format!("failed to build HTTP client: {}", err)))
    }
}

#[async_trait]
impl Connect for RpcConnector {
    type Session = RpcSession;

    async fn connect(&self) -> Result<RpcSession, NodeError> {
        let session = RpcSession {
            client: self.build_client()?,
            endpoint: format!("https://{}:{}", self.host, self.port),
        };
        let state: BlockchainStateResponse = session
            .call("get_blockchain_state", json!({}))
            .await
            .map_err(|err| match err {
                NodeError::Query { method, reason } => {
                    NodeError::Connection(format!("{} failed: {}", method, reason))
                }
                other => other,
            })?;
        tracing::info!(
            "connected to {}, peak height {:?}, synced {:?}",
            session.endpoint,
            state.blockchain_state.peak.as_ref().map(|peak| peak.height),
            state.blockchain_state.sync.as_ref().map(|sync| sync.synced),
        );
        Ok(session)
    }
}

pub struct RpcSession {
    client: Client,
    endpoint: String,
}

impl RpcSession {
    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, NodeError> {
        let query_error = |reason: String| NodeError::Query {
            method: method.to_string(),
            reason,
        };
        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, method))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    NodeError::Connection(err.to_string())
                } else {
                    query_error(err.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| query_error(format!("unreadable body: {}", err)))?;
        decode_response(method, status, &body)
    }
}

/// Checks the status and the `success` flag before decoding the payload.
fn decode_response<T: DeserializeOwned>(
    method: &str,
    status: StatusCode,
    body: &str,
) -> Result<T, NodeError> {
    let query_error = |reason: String| NodeError::Query {
        method: method.to_string(),
        reason,
    };
    match status {
        StatusCode::OK => {}
        code => return Err(query_error(format!("status {:?}", code))),
    }

    let payload: Value =
        serde_json::from_str(body).map_err(|err| query_error(format!("invalid json: {}", err)))?;
    match payload.get("success").and_then(Value::as_bool) {
        Some(true) => {}
        _ => {
            let reason = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("node reported failure")
                .to_string();
            return Err(query_error(reason));
        }
    }
    serde_json::from_value(payload).map_err(|err| query_error(format!("unexpected payload: {}", err)))
}

fn block_timestamp_from(
    height: u32,
    response: Result<BlockRecordResponse, NodeError>,
) -> Result<u64, LookupError> {
    let response = response.map_err(|err| LookupError {
        height,
        reason: err.to_string(),
    })?;
    response.block_record.timestamp.ok_or_else(|| LookupError {
        height,
        reason: "not a transaction block".to_string(),
    })
}

#[async_trait]
impl BlockTimestamps for RpcSession {
    async fn block_timestamp(&self, height: u32) -> Result<u64, LookupError> {
        let response = self
            .call("get_block_record_by_height", json!({ "height": height }))
            .await;
        block_timestamp_from(height, response)
    }
}

#[async_trait]
impl FullNode for RpcSession {
    async fn get_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: &Bytes32,
        include_spent: bool,
    ) -> Result<Vec<CoinRecord>, NodeError> {
        let response: CoinRecordsResponse = self
            .call(
                "get_coin_records_by_puzzle_hash",
                json!({
                    "puzzle_hash": puzzle_hash.to_hex(),
                    "include_spent_coins": include_spent,
                }),
            )
            .await?;
        Ok(response
            .coin_records
            .into_iter()
            .map(CoinRecord::from)
            .collect())
    }

    async fn close(self) {
        tracing::debug!("releasing node session {}", self.endpoint);
        drop(self.client);
    }
}

#[derive(Debug, Deserialize)]
struct BlockchainStateResponse {
    blockchain_state: BlockchainState,
}

#[derive(Debug, Deserialize)]
struct BlockchainState {
    peak: Option<PeakRecord>,
    sync: Option<SyncState>,
}

#[derive(Debug, Deserialize)]
struct PeakRecord {
    height: u32,
}

#[derive(Debug, Deserialize)]
struct SyncState {
    synced: bool,
}

#[derive(Debug, Deserialize)]
struct CoinRecordsResponse {
    coin_records: Vec<WireCoinRecord>,
}

#[derive(Debug, Deserialize)]
struct WireCoin {
    parent_coin_info: Bytes32,
    puzzle_hash: Bytes32,
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct WireCoinRecord {
    coin: WireCoin,
    confirmed_block_index: u32,
    spent_block_index: u32,
    coinbase: bool,
}

impl From<WireCoinRecord> for CoinRecord {
    fn from(record: WireCoinRecord) -> Self {
        CoinRecord::new(
            record.coin.parent_coin_info,
            record.coin.puzzle_hash,
            record.coin.amount,
            record.confirmed_block_index,
            record.spent_block_index,
            record.coinbase,
        )
    }
}

#[derive(Debug, Deserialize)]
struct BlockRecordResponse {
    block_record: WireBlockRecord,
}

#[derive(Debug, Deserialize)]
struct WireBlockRecord {
    timestamp: Option<u64>,
}

#[cfg(test)]
mod tests {
    use crate::bytes::Bytes32;
    use crate::coin::CoinRecord;
    use crate::node::rpc::{
        block_timestamp_from, decode_response, BlockRecordResponse, CoinRecordsResponse, RpcConnector,
    };
    use crate::node::NodeError;
    use reqwest::StatusCode;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn decodes_coin_records() {
        let payload = serde_json::json!({
            "success": true,
            "coin_records": [{
                "coin": {
                    "amount": 2_000_000_000_000u64,
                    "parent_coin_info": format!("0x{}", "11".repeat(32)),
                    "puzzle_hash": format!("0x{}", "22".repeat(32)),
                },
                "coinbase": true,
                "confirmed_block_index": 100,
                "spent": false,
                "spent_block_index": 0,
                "timestamp": 1616000000u64,
            }],
        });
        let response: CoinRecordsResponse = serde_json::from_value(payload).unwrap();
        let records: Vec<CoinRecord> = response
            .coin_records
            .into_iter()
            .map(CoinRecord::from)
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, 2_000_000_000_000);
        assert_eq!(records[0].confirmed_height, 100);
        assert_eq!(records[0].puzzle_hash, Bytes32::new([0x22; 32]));
        assert!(records[0].coinbase);
    }

    #[test]
    fn rejects_missing_fields() {
        let payload = serde_json::json!({
            "success": true,
            "coin_records": [{
                "coin": { "amount": 1, "puzzle_hash": format!("0x{}", "22".repeat(32)) },
                "coinbase": false,
                "confirmed_block_index": 1,
                "spent_block_index": 0,
            }],
        });
        assert!(serde_json::from_value::<CoinRecordsResponse>(payload).is_err());
    }

    #[test]
    fn non_transaction_block_has_no_timestamp() {
        let payload = serde_json::json!({
            "success": true,
            "block_record": { "height": 5, "timestamp": null },
        });
        let response: BlockRecordResponse = serde_json::from_value(payload).unwrap();
        assert!(response.block_record.timestamp.is_none());
    }

    #[test]
    fn certificate_paths() {
        let connector = RpcConnector::with_root(
            "localhost".to_string(),
            8555,
            PathBuf::from("/home/farmer/.chia/mainnet"),
            Duration::from_secs(5),
        );
        assert_eq!(
            connector.cert_path,
            PathBuf::from("/home/farmer/.chia/mainnet/config/ssl/full_node/private_full_node.crt")
        );
        assert_eq!(
            connector.key_path,
            PathBuf::from("/home/farmer/.chia/mainnet/config/ssl/full_node/private_full_node.key")
        );
    }

    fn query_reason<T: std::fmt::Debug>(result: Result<T, NodeError>) -> String {
        match result {
            Err(NodeError::Query { method, reason }) => {
                assert_eq!(method, "get_coin_records_by_puzzle_hash");
                reason
            }
            other => panic!("expected a query error, got {:?}", other),
        }
    }

    #[test]
    fn node_failure_carries_error_text() {
        let result = decode_response::<CoinRecordsResponse>(
            "get_coin_records_by_puzzle_hash",
            StatusCode::OK,
            r#"{"success": false, "error": "Puzzle hash not found"}"#,
        );
        assert_eq!(query_reason(result), "Puzzle hash not found");
    }

    #[test]
    fn missing_success_flag_is_a_failure() {
        let result = decode_response::<CoinRecordsResponse>(
            "get_coin_records_by_puzzle_hash",
            StatusCode::OK,
            r#"{"coin_records": []}"#,
        );
        assert_eq!(query_reason(result), "node reported failure");
    }

    #[test]
    fn non_ok_status_is_a_failure() {
        let result = decode_response::<CoinRecordsResponse>(
            "get_coin_records_by_puzzle_hash",
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success": true, "coin_records": []}"#,
        );
        assert!(query_reason(result).starts_with("status "));
    }

    #[test]
    fn success_without_records_is_unexpected() {
        let result = decode_response::<CoinRecordsResponse>(
            "get_coin_records_by_puzzle_hash",
            StatusCode::OK,
            r#"{"success": true}"#,
        );
        assert!(query_reason(result).starts_with("unexpected payload"));

        let result = decode_response::<CoinRecordsResponse>(
            "get_coin_records_by_puzzle_hash",
            StatusCode::OK,
            "<html>",
        );
        assert!(query_reason(result).starts_with("invalid json"));
    }

    #[test]
    fn decodes_successful_response() {
        let response: CoinRecordsResponse = decode_response(
            "get_coin_records_by_puzzle_hash",
            StatusCode::OK,
            r#"{"success": true, "coin_records": []}"#,
        )
        .unwrap();
        assert!(response.coin_records.is_empty());
    }

    #[test]
    fn block_lookup_failures_become_lookup_errors() {
        let failed = decode_response::<BlockRecordResponse>(
            "get_block_record_by_height",
            StatusCode::OK,
            r#"{"success": false, "error": "Block at height 7 not found"}"#,
        );
        let err = block_timestamp_from(7, failed).unwrap_err();
        assert_eq!(err.height, 7);
        assert!(err.reason.contains("Block at height 7 not found"));

        let no_timestamp = decode_response::<BlockRecordResponse>(
            "get_block_record_by_height",
            StatusCode::OK,
            r#"{"success": true, "block_record": {"height": 5, "timestamp": null}}"#,
        );
        let err = block_timestamp_from(5, no_timestamp).unwrap_err();
        assert_eq!(err.height, 5);
        assert_eq!(err.reason, "not a transaction block");

        let found = decode_response::<BlockRecordResponse>(
            "get_block_record_by_height",
            StatusCode::OK,
            r#"{"success": true, "block_record": {"height": 4, "timestamp": 1616000000}}"#,
        );
        assert_eq!(block_timestamp_from(4, found).unwrap(), 1_616_000_000);
    }

    #[tokio::test]
    async fn missing_certificate_is_a_connection_error() {
        use crate::node::Connect;
        let root = tempfile::tempdir().unwrap();
        let connector = RpcConnector::with_root(
            "localhost".to_string(),
            8555,
            root.path().to_path_buf(),
            Duration::from_secs(1),
        );
        assert!(matches!(
            connector.connect().await,
            Err(NodeError::Connection(_))
        ));
    }
}

//! JSON-RPC chain client

use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tokio_retry::{RetryIf, strategy::ExponentialBackoff};
use tracing::{debug, info, warn};
use xlayer_fp_bindings::{
    CreateGameCall, Log, decode_active_games, decode_output_proposed,
    encode_get_active_games, encode_resolve_challenger_wins, output_proposed_topic,
};
use xlayer_fp_primitives::GameId;

use super::{
    ChainError, DisputeGameClient, ProposalFeed, ProposalSource, ProposalSubscription,
    TransactionReceipt,
};

/// First retry delay for read-only calls
const RETRY_BASE_MS: u64 = 250;

/// Ceiling on the delay between retries
const RETRY_MAX_DELAY: Duration = Duration::from_millis(1000);

/// Retries after the first failed attempt
const RETRY_ATTEMPTS: usize = 5;

/// Interval between receipt polls while waiting for confirmation
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Widest block range requested from `eth_getLogs` at once
const MAX_LOG_RANGE: u64 = 2_000;

/// Undelivered proposals buffered per subscription
const SUBSCRIPTION_BUFFER: usize = 256;

/// Minimal JSON-RPC 2.0 client over HTTP.
#[derive(Debug, Clone)]
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

impl RpcClient {
    /// Client for the JSON-RPC endpoint at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: reqwest::Client::new() }
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// One request, no retries. A `null` result is returned as `Value::Null`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .json::<RpcResponse>()
            .await
            .map_err(|e| ChainError::Malformed(format!("{method}: {e}")))?;

        if let Some(error) = response.error {
            return Err(ChainError::Rpc { code: error.code, message: error.message });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Read-only call retried with exponential backoff on transport errors.
    /// Never use for `eth_sendTransaction`.
    pub async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let strategy = ExponentialBackoff::from_millis(RETRY_BASE_MS)
            .max_delay(RETRY_MAX_DELAY)
            .take(RETRY_ATTEMPTS);

        RetryIf::start(
            strategy,
            || {
                let params = params.clone();
                async move {
                    let res = self.call(method, params).await;
                    if let Err(err) = &res
                        && err.is_transient()
                    {
                        tracing::error!("(Retrying) {method}: {err}");
                    }
                    res
                }
            },
            |err: &ChainError| err.is_transient(),
        )
        .await
    }

    /// Latest block number, with retries.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        parse_quantity(&self.call_with_retry("eth_blockNumber", json!([])).await?)
    }
}

/// Parse a hex quantity such as `"0x1b4"`.
pub(crate) fn parse_quantity(value: &Value) -> Result<u64, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::Malformed(format!("expected hex quantity, got {value}")))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ChainError::Malformed(format!("bad quantity {s}: {e}")))
}

pub(crate) fn quantity(n: u64) -> String {
    format!("0x{n:x}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: B256,
    block_number: Value,
    status: Option<String>,
    #[serde(default)]
    logs: Vec<Log>,
}

/// L1 client for the dispute game factory and output oracle.
///
/// Transactions are sent with `eth_sendTransaction` from an account the node
/// has unlocked, then polled for a receipt until the confirmation timeout.
#[derive(Debug, Clone)]
pub struct L1Client {
    rpc: RpcClient,
    factory: Address,
    oracle: Address,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    start_block: Option<u64>,
}

impl L1Client {
    /// Client for the given factory and oracle contracts.
    pub fn new(rpc: RpcClient, factory: Address, oracle: Address) -> Self {
        Self {
            rpc,
            factory,
            oracle,
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(10),
            start_block: None,
        }
    }

    /// How long to wait for a receipt before giving up on a transaction.
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Interval between `eth_getLogs` polls.
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// First L1 block scanned for proposals. Defaults to the head at subscribe time.
    pub const fn with_start_block(mut self, block: Option<u64>) -> Self {
        self.start_block = block;
        self
    }

    async fn send_transaction(
        &self,
        from: Address,
        data: Bytes,
        value: U256,
    ) -> Result<TransactionReceipt, ChainError> {
        let tx = json!({
            "from": from,
            "to": self.factory,
            "data": data,
            "value": value,
        });
        let sent = self.rpc.call("eth_sendTransaction", json!([tx])).await?;
        let tx_hash: B256 = serde_json::from_value(sent)
            .map_err(|e| ChainError::Malformed(format!("eth_sendTransaction: {e}")))?;
        debug!(%tx_hash, "Transaction sent, waiting for receipt");
        self.wait_for_receipt(tx_hash).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, ChainError> {
        let deadline = Instant::now() + self.confirmation_timeout;
        loop {
            let receipt =
                self.rpc.call_with_retry("eth_getTransactionReceipt", json!([tx_hash])).await;
            match receipt {
                Ok(Value::Null) => {}
                Ok(value) => return parse_receipt(value, tx_hash),
                // Lookups may keep failing while the tx is pending; only the
                // deadline ends the wait.
                Err(e) => warn!(%tx_hash, error = %e, "Receipt lookup failed"),
            }
            if Instant::now() + RECEIPT_POLL_INTERVAL > deadline {
                return Err(ChainError::ConfirmationTimeout { tx_hash });
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    async fn output_proposed_logs(&self, from: u64, to: u64) -> Result<Vec<Log>, ChainError> {
        let filter = json!({
            "fromBlock": quantity(from),
            "toBlock": quantity(to),
            "address": self.oracle,
            "topics": [output_proposed_topic()],
        });
        let value = self.rpc.call_with_retry("eth_getLogs", json!([filter])).await?;
        serde_json::from_value(value).map_err(|e| ChainError::Malformed(format!("eth_getLogs: {e}")))
    }

    /// Forward proposals in `cursor..=head`, advancing `cursor` past every
    /// range fetched. Returns `false` once the subscriber is gone.
    async fn scan(&self, feed: &ProposalFeed, cursor: &mut u64, head: u64) -> bool {
        while *cursor <= head {
            let to = head.min(cursor.saturating_add(MAX_LOG_RANGE - 1));
            let logs = match self.output_proposed_logs(*cursor, to).await {
                Ok(logs) => logs,
                Err(e) => {
                    warn!(from = *cursor, to, error = %e, "Failed to fetch output proposals");
                    return true;
                }
            };
            for log in &logs {
                match decode_output_proposed(log) {
                    Ok(proposal) => {
                        if !feed.send(proposal).await {
                            return false;
                        }
                    }
                    Err(e) => warn!(error = %e, "Skipping undecodable OutputProposed log"),
                }
            }
            *cursor = to + 1;
        }
        !feed.is_cancelled()
    }

    async fn poll_proposals(self, mut feed: ProposalFeed, mut cursor: u64) {
        info!(oracle = %self.oracle, from_block = cursor, "Watching for output proposals");
        loop {
            match self.rpc.block_number().await {
                Ok(head) => {
                    if !self.scan(&feed, &mut cursor, head).await {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to read L1 head"),
            }

            tokio::select! {
                () = feed.cancelled() => break,
                () = sleep(self.poll_interval) => {}
            }
        }
        info!("Output proposal watcher stopped");
    }
}

fn parse_receipt(value: Value, tx_hash: B256) -> Result<TransactionReceipt, ChainError> {
    let raw: RawReceipt = serde_json::from_value(value)
        .map_err(|e| ChainError::Malformed(format!("receipt {tx_hash}: {e}")))?;
    if raw.status.as_deref() != Some("0x1") {
        return Err(ChainError::Reverted { tx_hash: raw.transaction_hash });
    }
    Ok(TransactionReceipt {
        tx_hash: raw.transaction_hash,
        block_number: parse_quantity(&raw.block_number)?,
        logs: raw.logs,
    })
}

#[async_trait]
impl DisputeGameClient for L1Client {
    fn factory(&self) -> Address {
        self.factory
    }

    async fn create_game(
        &self,
        from: Address,
        call: &CreateGameCall,
        bond: U256,
    ) -> Result<TransactionReceipt, ChainError> {
        self.send_transaction(from, call.abi_encode(), bond).await
    }

    async fn resolve_challenger_wins(
        &self,
        from: Address,
        game_id: &GameId,
        proof: &Bytes,
    ) -> Result<TransactionReceipt, ChainError> {
        self.send_transaction(from, encode_resolve_challenger_wins(game_id, proof), U256::ZERO)
            .await
    }

    async fn active_games(&self) -> Result<Vec<GameId>, ChainError> {
        let call = json!({ "to": self.factory, "data": encode_get_active_games() });
        let value = self.rpc.call_with_retry("eth_call", json!([call, "latest"])).await?;
        let returndata: Bytes = serde_json::from_value(value)
            .map_err(|e| ChainError::Malformed(format!("getActiveGames: {e}")))?;
        decode_active_games(&returndata)
            .map_err(|e| ChainError::Malformed(format!("getActiveGames: {e}")))
    }
}

#[async_trait]
impl ProposalSource for L1Client {
    async fn subscribe(&self) -> Result<ProposalSubscription, ChainError> {
        let cursor = match self.start_block {
            Some(block) => block,
            None => self.rpc.block_number().await?,
        };
        let (feed, subscription) = ProposalSubscription::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(self.clone().poll_proposals(feed, cursor));
        Ok(subscription)
    }
}

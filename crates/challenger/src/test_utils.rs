//! Scripted chain doubles for unit tests

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use tokio::sync::mpsc;
use xlayer_fp_bindings::{CreateGameCall, GameCreated, encode_resolve_challenger_wins};
use xlayer_fp_primitives::{ChallengeRecord, GameId, OutputProposal, keccak256};

use crate::{
    chain::{
        ChainError, DisputeGameClient, ProposalSource, ProposalSubscription, TransactionReceipt,
        TrustedRootSource,
    },
    clock::Clock,
    signer::{LocalValidator, SignerPool},
};

pub(crate) const FACTORY: Address = Address::repeat_byte(0xfa);
pub(crate) const CHALLENGER: Address = Address::repeat_byte(0xc1);
pub(crate) const PROPOSER: Address = Address::repeat_byte(0x22);

/// Validator `i` of [`pool_of`].
pub(crate) fn validator(i: usize) -> LocalValidator {
    LocalValidator::from_bytes(&B256::repeat_byte(i as u8 + 1)).unwrap()
}

pub(crate) fn pool_of(n: usize) -> SignerPool {
    SignerPool::new((0..n).map(|i| Arc::new(validator(i)) as _).collect())
}

pub(crate) fn proposal(output_index: u64, l2_block_number: u64, state_root: B256) -> OutputProposal {
    OutputProposal {
        output_index,
        l2_block_number,
        state_root,
        output_root: keccak256(state_root.as_slice()),
        proposer: PROPOSER,
    }
}

pub(crate) fn record(output_index: u64, l2_block_number: u64, deadline: u64) -> ChallengeRecord {
    ChallengeRecord {
        game_id: keccak256(&output_index.to_be_bytes()),
        challenger: CHALLENGER,
        proposer: PROPOSER,
        output_index,
        l2_block_number,
        claimed_state_root: B256::repeat_byte(0xbb),
        trusted_claim_root: B256::repeat_byte(0xaa),
        bond_amount: U256::from(100u64),
        created_at: deadline.saturating_sub(500),
        deadline,
    }
}

#[derive(Debug)]
pub(crate) struct ManualClock(AtomicU64);

impl ManualClock {
    pub(crate) const fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub(crate) fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory factory. Every successful `createGame` emits `GameCreated` with
/// a fresh game id unless told otherwise.
#[derive(Debug, Default)]
pub(crate) struct MockGameClient {
    factory: Address,
    games: AtomicU64,
    omit_event: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
    resolve_delay: Mutex<Option<Duration>>,
    create_failures: Mutex<VecDeque<ChainError>>,
    resolve_failures: Mutex<VecDeque<ChainError>>,
    creates: Mutex<Vec<(Address, CreateGameCall, U256)>>,
    resolves: Mutex<Vec<(Address, GameId, Bytes)>>,
    active: Mutex<Vec<GameId>>,
}

impl MockGameClient {
    pub(crate) fn new(factory: Address) -> Self {
        Self { factory, ..Default::default() }
    }

    pub(crate) fn omit_game_created(&self, omit: bool) {
        self.omit_event.store(omit, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_create(&self, err: ChainError) {
        self.create_failures.lock().unwrap().push_back(err);
    }

    pub(crate) fn fail_next_resolve(&self, err: ChainError) {
        self.resolve_failures.lock().unwrap().push_back(err);
    }

    pub(crate) fn delay_create(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn delay_resolve(&self, delay: Duration) {
        *self.resolve_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn set_active_games(&self, games: Vec<GameId>) {
        *self.active.lock().unwrap() = games;
    }

    pub(crate) fn create_calls(&self) -> Vec<(Address, CreateGameCall, U256)> {
        self.creates.lock().unwrap().clone()
    }

    pub(crate) fn resolve_calls(&self) -> Vec<(Address, GameId, Bytes)> {
        self.resolves.lock().unwrap().clone()
    }

    pub(crate) fn last_resolve_calldata(&self) -> Option<Bytes> {
        self.resolves
            .lock()
            .unwrap()
            .last()
            .map(|(_, game_id, proof)| encode_resolve_challenger_wins(game_id, proof))
    }

    fn tx_hash(&self, n: u64) -> B256 {
        keccak256_u64(b"tx", n)
    }
}

fn keccak256_u64(tag: &[u8], n: u64) -> B256 {
    xlayer_fp_primitives::keccak256_concat(&[tag, n.to_be_bytes().as_slice()])
}

#[async_trait]
impl DisputeGameClient for MockGameClient {
    fn factory(&self) -> Address {
        self.factory
    }

    async fn create_game(
        &self,
        from: Address,
        call: &CreateGameCall,
        bond: U256,
    ) -> Result<TransactionReceipt, ChainError> {
        self.creates.lock().unwrap().push((from, *call, bond));
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.create_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let n = self.games.fetch_add(1, Ordering::SeqCst);
        let mut logs = Vec::new();
        if !self.omit_event.load(Ordering::SeqCst) {
            let created = GameCreated {
                game_id: keccak256_u64(b"game", n),
                challenger: from,
                proposer: call.proposer,
                root_claim: call.root_claim,
                claim_root: call.claim_root,
                game_type: call.game_type,
                proof_type: call.proof_type,
            };
            logs.push(created.to_log(self.factory));
        }
        Ok(TransactionReceipt { tx_hash: self.tx_hash(n), block_number: n + 1, logs })
    }

    async fn resolve_challenger_wins(
        &self,
        from: Address,
        game_id: &GameId,
        proof: &Bytes,
    ) -> Result<TransactionReceipt, ChainError> {
        self.resolves.lock().unwrap().push((from, *game_id, proof.clone()));
        let delay = *self.resolve_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.resolve_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        let tx_hash = keccak256(game_id.as_slice());
        Ok(TransactionReceipt { tx_hash, block_number: 1, logs: vec![] })
    }

    async fn active_games(&self) -> Result<Vec<GameId>, ChainError> {
        Ok(self.active.lock().unwrap().clone())
    }
}

/// Proposal source fed by the test through an unbounded sender.
#[derive(Debug)]
pub(crate) struct ChannelSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<OutputProposal>>>,
}

impl ChannelSource {
    pub(crate) fn new() -> (Self, mpsc::UnboundedSender<OutputProposal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx: Mutex::new(Some(rx)) }, tx)
    }
}

#[async_trait]
impl ProposalSource for ChannelSource {
    async fn subscribe(&self) -> Result<ProposalSubscription, ChainError> {
        let mut rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChainError::Transport("source already subscribed".to_string()))?;
        let (mut feed, subscription) = ProposalSubscription::channel(16);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = feed.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(proposal) => {
                            if !feed.send(proposal).await {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });
        Ok(subscription)
    }
}

/// Root source backed by a fixed map.
#[derive(Debug, Default)]
pub(crate) struct StaticRoots(pub(crate) Mutex<Vec<(u64, B256)>>);

#[async_trait]
impl TrustedRootSource for StaticRoots {
    async fn state_root(&self, block: u64) -> Result<Option<B256>, ChainError> {
        Ok(self.0.lock().unwrap().iter().find(|(b, _)| *b == block).map(|(_, root)| *root))
    }
}

/// Scripted answer of [`MockRpcServer`].
#[derive(Clone, Debug)]
pub(crate) enum RpcReply {
    /// `{"result": value}`
    Result(serde_json::Value),
    /// JSON-RPC error object
    Error(i64, &'static str),
    /// Bare HTTP status with no body, seen by the client as a transport error.
    Status(u16),
}

type RpcHandler = dyn Fn(&str, &serde_json::Value) -> RpcReply + Send + Sync;

/// JSON-RPC over HTTP on an ephemeral local port. Every request is answered by
/// the handler and recorded; connections are closed after one response.
#[derive(Debug)]
pub(crate) struct MockRpcServer {
    url: String,
    requests: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    task: tokio::task::JoinHandle<()>,
}

impl MockRpcServer {
    pub(crate) async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &serde_json::Value) -> RpcReply + Send + Sync + 'static,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<RpcHandler> = Arc::new(handler);

        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve_one(stream, handler.as_ref(), &recorded).await;
                });
            }
        });
        Self { url, requests, task }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Params of every request for `method`, in arrival order.
    pub(crate) fn requests(&self, method: &str) -> Vec<serde_json::Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

impl Drop for MockRpcServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_one(
    mut stream: tokio::net::TcpStream,
    handler: &RpcHandler,
    recorded: &Mutex<Vec<(String, serde_json::Value)>>,
) -> std::io::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let body = loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < end + 4 + len {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            break buf[end + 4..end + 4 + len].to_vec();
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let request: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    recorded.lock().unwrap().push((method.clone(), params.clone()));

    let (status, body) = match handler(&method, &params) {
        RpcReply::Result(result) => {
            (200, serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
        }
        RpcReply::Error(code, message) => (
            200,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": code, "message": message }
            })
            .to_string(),
        ),
        RpcReply::Status(status) => (status, String::new()),
    };
    let response = format!(
        "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

//! L1 chain access
//!
//! The challenger talks to two contracts: the dispute game factory (write
//! path, [`DisputeGameClient`]) and the output oracle (event stream,
//! [`ProposalSource`]). [`rpc::L1Client`] implements both over JSON-RPC.

mod feed;
pub mod rpc;
mod subscription;

pub use feed::{L2RootFeed, TrustedRootSource};
pub use subscription::{ProposalFeed, ProposalSubscription, SubscriptionHandle};

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use xlayer_fp_bindings::{CreateGameCall, Log};
use xlayer_fp_primitives::GameId;

/// Chain client errors
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Endpoint unreachable or the connection dropped. The only retryable kind.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the node
        message: String,
    },
    /// Transaction was mined with status 0.
    #[error("transaction {tx_hash} reverted")]
    Reverted {
        /// Reverted transaction
        tx_hash: B256,
    },
    /// No receipt within the confirmation timeout. The transaction may still land.
    #[error("transaction {tx_hash} not confirmed in time")]
    ConfirmationTimeout {
        /// Transaction still in flight
        tx_hash: B256,
    },
    /// The node answered with something that does not parse.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ChainError {
    /// Whether retrying the same read is expected to help.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether a transaction that failed this way may still have been
    /// included, so its bond may already be posted.
    pub const fn may_have_landed(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConfirmationTimeout { .. } | Self::Malformed(_))
    }
}

/// Receipt of a successfully mined transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub tx_hash: B256,
    /// Block the transaction was mined in
    pub block_number: u64,
    /// Logs emitted by the transaction
    pub logs: Vec<Log>,
}

/// Write and read access to the dispute game factory.
///
/// Transaction methods block until the transaction is mined and return
/// [`ChainError::Reverted`] rather than a failed receipt. They never resubmit.
#[async_trait]
pub trait DisputeGameClient: Send + Sync + std::fmt::Debug {
    /// Address of the factory, used to pick its events out of receipts.
    fn factory(&self) -> Address;

    /// Send a bonded `createGame` from `from` and wait for confirmation.
    async fn create_game(
        &self,
        from: Address,
        call: &CreateGameCall,
        bond: U256,
    ) -> Result<TransactionReceipt, ChainError>;

    /// Send `resolveChallengerWins` from `from` and wait for confirmation.
    async fn resolve_challenger_wins(
        &self,
        from: Address,
        game_id: &GameId,
        proof: &Bytes,
    ) -> Result<TransactionReceipt, ChainError>;

    /// Games the factory still considers open.
    async fn active_games(&self) -> Result<Vec<GameId>, ChainError>;
}

/// Source of `OutputProposed` events.
#[async_trait]
pub trait ProposalSource: Send + Sync + std::fmt::Debug {
    /// Start a new stream of proposals. Dropping or cancelling the returned
    /// subscription stops the producer.
    async fn subscribe(&self) -> Result<ProposalSubscription, ChainError>;
}

//! Resolving games with a fraud proof

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use tracing::{error, info, warn};
use xlayer_fp_audit::{AuditEntry, AuditLog, ChallengeStage};
use xlayer_fp_primitives::GameId;

use crate::{
    chain::{ChainError, DisputeGameClient},
    clock::Clock,
    prover::{ProofBuilder, ProofError},
    store::ChallengeStore,
    verifier::StateVerifier,
};

/// Resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No record for the game. Terminal.
    #[error("no pending challenge for game {0}")]
    ChallengeNotFound(GameId),
    /// The pool is empty.
    #[error("no validators configured")]
    NoValidatorsConfigured,
    /// No trusted state root for the disputed block yet, so there is no post
    /// state to prove against.
    #[error("post state of L2 block {l2_block_number} unknown for game {game_id}")]
    PostStateUnknown {
        /// Game awaiting resolution
        game_id: GameId,
        /// Disputed L2 block
        l2_block_number: u64,
    },
    /// Terminal: the game can no longer be resolved by this challenger.
    #[error("resolution window for game {game_id} closed at {deadline}")]
    ResolutionWindowClosed {
        /// Expired game
        game_id: GameId,
        /// Unix seconds the window closed at
        deadline: u64,
    },
    /// Proof construction failed.
    #[error(transparent)]
    Proof(#[from] ProofError),
    /// Submission failed on chain or in transport.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl ResolveError {
    /// Whether trying again later cannot succeed.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ChallengeNotFound(_) | Self::ResolutionWindowClosed { .. })
    }
}

/// Submits fraud proofs for pending games and retires their records.
#[derive(Debug, Clone)]
pub struct GameResolver {
    client: Arc<dyn DisputeGameClient>,
    store: Arc<dyn ChallengeStore>,
    verifier: Arc<StateVerifier>,
    builder: Arc<ProofBuilder>,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
}

impl GameResolver {
    /// Resolver reading post states from `verifier` and signing with `builder`.
    pub fn new(
        client: Arc<dyn DisputeGameClient>,
        store: Arc<dyn ChallengeStore>,
        verifier: Arc<StateVerifier>,
        builder: Arc<ProofBuilder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { client, store, verifier, builder, clock, audit: AuditLog::disabled() }
    }

    /// Record resolution stages to `audit`.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Prove `game_id` fraudulent and claim the win from `challenger`.
    ///
    /// `actual_post_state` is the post state from a trusted execution source;
    /// without one the trusted root currently stored for the disputed block is
    /// used, and [`ResolveError::PostStateUnknown`] is returned if there is
    /// none. The counter-claim recorded at challenge time is never signed as a
    /// post state, since it may be a placeholder. Returns the hash of the
    /// resolving transaction. The record is removed only once that transaction
    /// is confirmed.
    pub async fn resolve_challenger_wins(
        &self,
        game_id: &GameId,
        challenger: Address,
        actual_post_state: Option<B256>,
    ) -> Result<B256, ResolveError> {
        let record = self.store.get(game_id).ok_or(ResolveError::ChallengeNotFound(*game_id))?;
        if self.builder.pool().is_empty() {
            return Err(ResolveError::NoValidatorsConfigured);
        }

        let entry = AuditEntry::for_record(&record);
        let window_closed =
            ResolveError::ResolutionWindowClosed { game_id: *game_id, deadline: record.deadline };
        let Some(remaining) = record.remaining(self.clock.now()) else {
            warn!(%game_id, deadline = record.deadline, "Resolution window closed");
            self.audit.record(ChallengeStage::ChallengeExpired, &entry);
            return Err(window_closed);
        };

        let Some(post_state) = actual_post_state
            .or_else(|| self.verifier.trusted_state_root(record.l2_block_number))
        else {
            warn!(
                %game_id,
                l2_block_number = record.l2_block_number,
                "No trusted post state yet, deferring resolution"
            );
            return Err(ResolveError::PostStateUnknown {
                game_id: *game_id,
                l2_block_number: record.l2_block_number,
            });
        };
        let proof = match self
            .builder
            .generate_fraud_proof(
                record.l2_block_number,
                &record.claimed_state_root,
                &record.trusted_claim_root,
                &post_state,
            )
            .await
        {
            Ok(proof) => proof,
            Err(e) => {
                error!(%game_id, error = %e, "Fraud proof construction failed");
                self.audit.record(ChallengeStage::ResolutionFailed, &entry.with_detail(e.to_string()));
                return Err(e.into());
            }
        };

        info!(
            %game_id,
            l2_block_number = record.l2_block_number,
            proof_len = proof.len(),
            remaining_secs = remaining.as_secs(),
            "Submitting resolveChallengerWins"
        );

        let submission = self.client.resolve_challenger_wins(challenger, game_id, &proof);
        let receipt = match tokio::time::timeout(remaining, submission).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                error!(%game_id, error = %e, "resolveChallengerWins failed");
                self.audit.record(ChallengeStage::ResolutionFailed, &entry.with_detail(e.to_string()));
                return Err(e.into());
            }
            Err(_) => {
                warn!(%game_id, deadline = record.deadline, "Resolution window closed while submitting");
                self.audit.record(ChallengeStage::ChallengeExpired, &entry);
                return Err(window_closed);
            }
        };

        self.store.remove(game_id);
        info!(%game_id, tx_hash = %receipt.tx_hash, "Challenge resolved");
        self.audit.record(ChallengeStage::ResolutionSubmitted, &entry.with_tx(receipt.tx_hash));
        Ok(receipt.tx_hash)
    }
}

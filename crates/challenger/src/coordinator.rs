//! Opening bonded dispute games

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, U256};
use tracing::{error, info, warn};
use xlayer_fp_audit::{AuditEntry, AuditLog, ChallengeStage};
use xlayer_fp_bindings::{BindingError, CreateGameCall, find_game_created};
use xlayer_fp_primitives::{ChallengeKey, ChallengeRecord, GameId, OutputProposal};

use crate::{
    chain::{ChainError, DisputeGameClient},
    clock::Clock,
    store::ChallengeStore,
    verifier::StateVerifier,
};

/// Challenge submission errors
#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    /// Transaction confirmed without a `GameCreated` from the factory.
    #[error("no GameCreated event in receipt of {tx_hash}")]
    EventNotFound {
        /// Confirmed `createGame` transaction
        tx_hash: B256,
    },
    /// The factory's `GameCreated` log does not decode.
    #[error("malformed GameCreated event in receipt of {tx_hash}: {source}")]
    MalformedEvent {
        /// Confirmed `createGame` transaction
        tx_hash: B256,
        /// Decode failure
        source: BindingError,
    },
    /// The claim is already challenged or reserved.
    #[error("{key} already has a pending challenge")]
    DuplicateChallenge {
        /// Claim already held
        key: ChallengeKey,
    },
    /// Submission failed on chain or in transport.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Opens dispute games for invalid outputs and owns the resulting records.
#[derive(Debug, Clone)]
pub struct ChallengeCoordinator {
    client: Arc<dyn DisputeGameClient>,
    store: Arc<dyn ChallengeStore>,
    verifier: Arc<StateVerifier>,
    clock: Arc<dyn Clock>,
    bond: U256,
    resolution_window: Duration,
    audit: AuditLog,
}

impl ChallengeCoordinator {
    /// Coordinator posting `bond` per game with deadlines `resolution_window`
    /// after confirmation.
    pub fn new(
        client: Arc<dyn DisputeGameClient>,
        store: Arc<dyn ChallengeStore>,
        verifier: Arc<StateVerifier>,
        clock: Arc<dyn Clock>,
        bond: U256,
        resolution_window: Duration,
    ) -> Self {
        Self {
            client,
            store,
            verifier,
            clock,
            bond,
            resolution_window,
            audit: AuditLog::disabled(),
        }
    }

    /// Record challenge stages to `audit`.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Table of pending challenges and reservations.
    pub fn store(&self) -> &Arc<dyn ChallengeStore> {
        &self.store
    }

    /// End of the hold on an output whose `createGame` outcome is unknown.
    /// Past it, a game that did land can no longer be resolved anyway.
    fn hold_until(&self) -> u64 {
        self.clock.now().saturating_add(self.resolution_window.as_secs())
    }

    /// Open a bonded game against `output` from `challenger` and record it.
    ///
    /// Blocks until the transaction is confirmed. A failed submission is
    /// returned as is and never retried; when the chain error leaves open
    /// whether the bond was posted, the output is held for one resolution
    /// window so a later delivery cannot bond twice.
    pub async fn challenge_output(
        &self,
        output: &OutputProposal,
        challenger: Address,
    ) -> Result<GameId, ChallengeError> {
        let key = output.challenge_key();
        if !self.store.try_reserve(key) {
            return Err(ChallengeError::DuplicateChallenge { key });
        }

        let claim_root = self.verifier.claim_root(output.l2_block_number, &output.state_root);
        let call = CreateGameCall::fraud(output.proposer, output.state_root, claim_root);
        let entry = AuditEntry::for_output(output).with_trusted_root(claim_root);

        info!(
            output_index = output.output_index,
            l2_block_number = output.l2_block_number,
            claimed_root = %output.state_root,
            claim_root = %claim_root,
            bond = %self.bond,
            "Submitting createGame"
        );

        let receipt = match self.client.create_game(challenger, &call, self.bond).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if e.may_have_landed() {
                    let until = self.hold_until();
                    warn!(%key, until, error = %e, "createGame outcome unknown, holding output");
                    self.store.hold(key, until);
                } else {
                    self.store.release(&key);
                }
                error!(output_index = output.output_index, error = %e, "createGame failed");
                self.audit.record(ChallengeStage::ChallengeFailed, &entry.with_detail(e.to_string()));
                return Err(e.into());
            }
        };

        // The bond is posted from here on, so the key stays held on every
        // failure below.
        let created = match find_game_created(&receipt.logs, &self.client.factory()) {
            Ok(Some(created)) => created,
            Ok(None) => {
                self.store.hold(key, self.hold_until());
                let err = ChallengeError::EventNotFound { tx_hash: receipt.tx_hash };
                error!(%key, tx_hash = %receipt.tx_hash, "createGame confirmed without GameCreated");
                self.audit.record(
                    ChallengeStage::ChallengeFailed,
                    &entry.with_tx(receipt.tx_hash).with_detail(err.to_string()),
                );
                return Err(err);
            }
            Err(source) => {
                self.store.hold(key, self.hold_until());
                let err = ChallengeError::MalformedEvent { tx_hash: receipt.tx_hash, source };
                error!(%key, error = %err, "createGame receipt unreadable");
                self.audit.record(
                    ChallengeStage::ChallengeFailed,
                    &entry.with_tx(receipt.tx_hash).with_detail(err.to_string()),
                );
                return Err(err);
            }
        };

        let created_at = self.clock.now();
        let record = ChallengeRecord {
            game_id: created.game_id,
            challenger,
            proposer: output.proposer,
            output_index: output.output_index,
            l2_block_number: output.l2_block_number,
            claimed_state_root: output.state_root,
            trusted_claim_root: claim_root,
            bond_amount: self.bond,
            created_at,
            deadline: created_at.saturating_add(self.resolution_window.as_secs()),
        };
        self.store.commit(record.clone());

        info!(
            game_id = %record.game_id,
            output_index = record.output_index,
            l2_block_number = record.l2_block_number,
            tx_hash = %receipt.tx_hash,
            deadline = record.deadline,
            "Dispute game created"
        );
        self.audit.record(
            ChallengeStage::ChallengeSubmitted,
            &AuditEntry::for_record(&record).with_tx(receipt.tx_hash),
        );
        Ok(record.game_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        roots::InMemoryRootStore,
        store::InMemoryChallengeStore,
        test_utils::{CHALLENGER, FACTORY, ManualClock, MockGameClient, proposal},
        verifier::UnknownRootPolicy,
    };

    struct Fixture {
        client: Arc<MockGameClient>,
        store: Arc<InMemoryChallengeStore>,
        verifier: Arc<StateVerifier>,
        coordinator: ChallengeCoordinator,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(MockGameClient::new(FACTORY));
        let store = Arc::new(InMemoryChallengeStore::new());
        let verifier = Arc::new(StateVerifier::new(
            Arc::new(InMemoryRootStore::default()),
            UnknownRootPolicy::FailOpen,
        ));
        let coordinator = ChallengeCoordinator::new(
            client.clone(),
            store.clone(),
            verifier.clone(),
            Arc::new(ManualClock::new(1_000)),
            U256::from(100u64),
            Duration::from_secs(500),
        );
        Fixture { client, store, verifier, coordinator }
    }

    #[tokio::test]
    async fn test_challenge_records_game() {
        let f = fixture();
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));
        let output = proposal(1, 100, B256::repeat_byte(0xbb));

        let game_id = f.coordinator.challenge_output(&output, CHALLENGER).await.unwrap();

        let record = f.store.get(&game_id).unwrap();
        assert_eq!(record.claimed_state_root, B256::repeat_byte(0xbb));
        assert_eq!(record.trusted_claim_root, B256::repeat_byte(0xaa));
        assert_eq!(record.challenger, CHALLENGER);
        assert_eq!(record.bond_amount, U256::from(100u64));
        assert_eq!(record.created_at, 1_000);
        assert_eq!(record.deadline, 1_500);

        let calls = f.client.create_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, CHALLENGER);
        let expected =
            CreateGameCall::fraud(output.proposer, output.state_root, B256::repeat_byte(0xaa));
        assert_eq!(calls[0].1, expected);
        assert_eq!(calls[0].2, U256::from(100u64));
    }

    #[tokio::test]
    async fn test_second_detection_is_rejected() {
        let f = fixture();
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));
        let output = proposal(1, 100, B256::repeat_byte(0xbb));

        f.coordinator.challenge_output(&output, CHALLENGER).await.unwrap();
        let err = f.coordinator.challenge_output(&output, CHALLENGER).await.unwrap_err();

        assert!(matches!(err, ChallengeError::DuplicateChallenge { .. }));
        assert_eq!(f.client.create_calls().len(), 1);
        assert_eq!(f.store.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_event_creates_no_record() {
        let f = fixture();
        f.client.omit_game_created(true);
        let output = proposal(1, 100, B256::repeat_byte(0xbb));

        let err = f.coordinator.challenge_output(&output, CHALLENGER).await.unwrap_err();
        assert!(matches!(err, ChallengeError::EventNotFound { .. }));
        assert!(f.store.pending().is_empty());
        // Bond may be posted: the output must not be challenged again.
        assert!(f.store.contains_key(&output.challenge_key()));
        assert_eq!(f.store.expire_holds(1_500), vec![output.challenge_key()]);
    }

    #[tokio::test]
    async fn test_revert_frees_output() {
        let f = fixture();
        f.client.fail_next_create(ChainError::Reverted { tx_hash: B256::repeat_byte(0x01) });
        let output = proposal(1, 100, B256::repeat_byte(0xbb));

        let err = f.coordinator.challenge_output(&output, CHALLENGER).await.unwrap_err();
        assert!(matches!(err, ChallengeError::Chain(ChainError::Reverted { .. })));
        assert!(f.store.pending().is_empty());
        assert!(!f.store.contains_key(&output.challenge_key()));
        // No automatic retry.
        assert_eq!(f.client.create_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_holds_output_for_one_window() {
        let f = fixture();
        f.client.fail_next_create(ChainError::ConfirmationTimeout { tx_hash: B256::ZERO });
        let output = proposal(1, 100, B256::repeat_byte(0xbb));

        assert!(f.coordinator.challenge_output(&output, CHALLENGER).await.is_err());
        assert!(matches!(
            f.coordinator.challenge_output(&output, CHALLENGER).await,
            Err(ChallengeError::DuplicateChallenge { .. })
        ));

        // Held from t=1000 for the 500s window.
        assert!(f.store.expire_holds(1_499).is_empty());
        assert_eq!(f.store.expire_holds(1_500), vec![output.challenge_key()]);
        f.coordinator.challenge_output(&output, CHALLENGER).await.unwrap();
        assert_eq!(f.client.create_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_root_uses_placeholder() {
        let f = fixture();
        let output = proposal(2, 200, B256::repeat_byte(0xcc));

        let game_id = f.coordinator.challenge_output(&output, CHALLENGER).await.unwrap();
        let record = f.store.get(&game_id).unwrap();
        assert_eq!(
            record.trusted_claim_root,
            xlayer_fp_primitives::domain::placeholder_claim_root(200, &B256::repeat_byte(0xcc))
        );
    }
}

//! Common types

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Identifier assigned to a dispute game by the factory.
pub type GameId = B256;

/// L2 block number type
pub type BlockNumber = u64;

/// Output proposal as emitted by the L1 output oracle. Never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputProposal {
    /// Position in the oracle's output list
    pub output_index: u64,
    /// L2 block the output commits to
    pub l2_block_number: BlockNumber,
    /// State root claimed by the proposer
    pub state_root: B256,
    /// Output root posted alongside the state root
    pub output_root: B256,
    /// Account that posted the output
    pub proposer: Address,
}

impl OutputProposal {
    /// Key used to detect a second delivery of the same claim.
    pub const fn challenge_key(&self) -> ChallengeKey {
        ChallengeKey { output_index: self.output_index, claimed_state_root: self.state_root }
    }
}

/// Dedup key for challenges.
///
/// A replayed `OutputProposed` event (reorg, at-least-once delivery) maps to
/// the same key. A replacement output at the same index with a different root
/// does not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChallengeKey {
    /// Output index in the oracle
    pub output_index: u64,
    /// Root the proposer claimed at that index
    pub claimed_state_root: B256,
}

impl fmt::Display for ChallengeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output {} ({})", self.output_index, self.claimed_state_root)
    }
}

/// A confirmed, not yet resolved, dispute game opened by this challenger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    /// Game opened by the factory
    pub game_id: GameId,
    /// Account that posted the bond
    pub challenger: Address,
    /// Account whose output is disputed
    pub proposer: Address,
    /// Disputed output index
    pub output_index: u64,
    /// L2 block of the disputed output
    pub l2_block_number: BlockNumber,
    /// Root claimed by the proposer
    pub claimed_state_root: B256,
    /// Root the challenger submitted as its counter-claim
    pub trusted_claim_root: B256,
    /// Bond posted with `createGame`, in wei
    pub bond_amount: U256,
    /// Unix seconds at confirmation
    pub created_at: u64,
    /// Unix seconds after which the game can no longer be resolved by us
    pub deadline: u64,
}

impl ChallengeRecord {
    /// Dedup key of the disputed claim.
    pub const fn key(&self) -> ChallengeKey {
        ChallengeKey { output_index: self.output_index, claimed_state_root: self.claimed_state_root }
    }

    /// Whether the resolution window has closed at `now`.
    pub const fn is_expired(&self, now: u64) -> bool {
        now >= self.deadline
    }

    /// Time left in the resolution window, `None` once it has closed.
    pub const fn remaining(&self, now: u64) -> Option<Duration> {
        if self.is_expired(now) {
            None
        } else {
            Some(Duration::from_secs(self.deadline - now))
        }
    }
}

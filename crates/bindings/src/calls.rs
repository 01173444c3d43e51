//! Dispute game factory calls

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::SolCall;
use xlayer_fp_primitives::GameId;

use crate::{
    BindingError,
    IDisputeGameFactory::{createGameCall, getActiveGamesCall, resolveChallengerWinsCall},
};

/// Game type for output-root disputes
pub const GAME_TYPE_OUTPUT_ROOT: u8 = 0;

/// Proof type code for fraud-proof games
pub const PROOF_TYPE_FRAUD: u8 = 1;

/// Arguments of `createGame`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateGameCall {
    /// Proposer of the disputed output
    pub proposer: Address,
    /// State root claimed by the proposer
    pub root_claim: B256,
    /// Challenger's counter-claim
    pub claim_root: B256,
    /// Dispute game type code
    pub game_type: u8,
    /// Proof system code
    pub proof_type: u8,
}

impl CreateGameCall {
    /// Fraud-proof game over an output root.
    pub const fn fraud(proposer: Address, root_claim: B256, claim_root: B256) -> Self {
        Self {
            proposer,
            root_claim,
            claim_root,
            game_type: GAME_TYPE_OUTPUT_ROOT,
            proof_type: PROOF_TYPE_FRAUD,
        }
    }

    /// Calldata for `createGame`.
    pub fn abi_encode(&self) -> Bytes {
        createGameCall {
            proposer: self.proposer,
            rootClaim: self.root_claim,
            claimRoot: self.claim_root,
            gameType: self.game_type,
            proofType: self.proof_type,
        }
        .abi_encode()
        .into()
    }
}

/// Calldata for `resolveChallengerWins(gameId, proofBytes)`.
pub fn encode_resolve_challenger_wins(game_id: &GameId, proof: &[u8]) -> Bytes {
    resolveChallengerWinsCall { gameId: *game_id, proofBytes: Bytes::copy_from_slice(proof) }
        .abi_encode()
        .into()
}

/// Calldata for `getActiveGames()`.
pub fn encode_get_active_games() -> Bytes {
    getActiveGamesCall {}.abi_encode().into()
}

/// Decode the `bytes32[]` returned by `getActiveGames()`. Empty return data,
/// as from an address with no code, decodes to no games.
pub fn decode_active_games(returndata: &[u8]) -> Result<Vec<GameId>, BindingError> {
    if returndata.is_empty() {
        return Ok(Vec::new());
    }
    Ok(getActiveGamesCall::abi_decode_returns(returndata)?)
}

//! Output oracle and dispute game factory events

use alloy_primitives::{Address, B256, Log, U256};
use alloy_sol_types::SolEvent;
use xlayer_fp_primitives::{GameId, OutputProposal};

use crate::{BindingError, IDisputeGameFactory, IOutputOracle};

/// Topic 0 of `OutputProposed`
pub const fn output_proposed_topic() -> B256 {
    IOutputOracle::OutputProposed::SIGNATURE_HASH
}

/// Topic 0 of `GameCreated`
pub const fn game_created_topic() -> B256 {
    IDisputeGameFactory::GameCreated::SIGNATURE_HASH
}

/// Decode an `OutputProposed` log.
pub fn decode_output_proposed(log: &Log) -> Result<OutputProposal, BindingError> {
    let event = IOutputOracle::OutputProposed::decode_log_data(&log.data)?;
    Ok(OutputProposal {
        output_index: narrow("outputIndex", event.outputIndex)?,
        l2_block_number: narrow("l2BlockNumber", event.l2BlockNumber)?,
        state_root: event.stateRoot,
        output_root: event.outputRoot,
        proposer: event.proposer,
    })
}

/// Log as the output oracle would emit it for `proposal`.
pub fn output_proposed_log(proposal: &OutputProposal, oracle: Address) -> Log {
    let event = IOutputOracle::OutputProposed {
        outputIndex: U256::from(proposal.output_index),
        l2BlockNumber: U256::from(proposal.l2_block_number),
        stateRoot: proposal.state_root,
        outputRoot: proposal.output_root,
        proposer: proposal.proposer,
    };
    Log { address: oracle, data: event.encode_log_data() }
}

/// Decoded `GameCreated` event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameCreated {
    /// Factory-assigned game id
    pub game_id: GameId,
    /// Account that posted the bond
    pub challenger: Address,
    /// Proposer of the disputed output
    pub proposer: Address,
    /// Disputed state root
    pub root_claim: B256,
    /// Challenger's counter-claim
    pub claim_root: B256,
    /// Dispute game type code
    pub game_type: u8,
    /// Proof system code
    pub proof_type: u8,
}

impl From<IDisputeGameFactory::GameCreated> for GameCreated {
    fn from(event: IDisputeGameFactory::GameCreated) -> Self {
        Self {
            game_id: event.gameId,
            challenger: event.challenger,
            proposer: event.proposer,
            root_claim: event.rootClaim,
            claim_root: event.claimRoot,
            game_type: event.gameType,
            proof_type: event.proofType,
        }
    }
}

impl GameCreated {
    /// Log as the factory would emit it.
    pub fn to_log(&self, factory: Address) -> Log {
        let event = IDisputeGameFactory::GameCreated {
            gameId: self.game_id,
            challenger: self.challenger,
            proposer: self.proposer,
            rootClaim: self.root_claim,
            claimRoot: self.claim_root,
            gameType: self.game_type,
            proofType: self.proof_type,
        };
        Log { address: factory, data: event.encode_log_data() }
    }
}

/// Decode a `GameCreated` log.
pub fn decode_game_created(log: &Log) -> Result<GameCreated, BindingError> {
    Ok(IDisputeGameFactory::GameCreated::decode_log_data(&log.data)?.into())
}

/// First `GameCreated` emitted by `factory` among `logs`.
///
/// Logs from other contracts, or with a different topic 0, are skipped. A log
/// that claims to be `GameCreated` but fails to decode is an error rather
/// than being skipped.
pub fn find_game_created(
    logs: &[Log],
    factory: &Address,
) -> Result<Option<GameCreated>, BindingError> {
    let topic0 = game_created_topic();
    logs.iter()
        .find(|log| log.address == *factory && log.data.topics().first() == Some(&topic0))
        .map(decode_game_created)
        .transpose()
}

fn narrow(field: &'static str, value: U256) -> Result<u64, BindingError> {
    u64::try_from(value).map_err(|_| BindingError::ValueOverflow { field, value })
}

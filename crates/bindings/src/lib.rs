//! Contract bindings
//!
//! Calls and events of the dispute game factory and the L2 output oracle,
//! declared with [`alloy_sol_types::sol!`].

use alloy_sol_types::sol;

pub mod calls;
pub mod events;

pub use alloy_primitives::Log;
pub use calls::{
    CreateGameCall, decode_active_games, encode_get_active_games, encode_resolve_challenger_wins,
};
pub use events::{
    GameCreated, decode_game_created, decode_output_proposed, find_game_created,
    game_created_topic, output_proposed_log, output_proposed_topic,
};

sol! {
    /// Factory that opens and settles fraud-proof games.
    #[allow(missing_docs)]
    interface IDisputeGameFactory {
        /// Emitted once per game opened by `createGame`.
        event GameCreated(
            bytes32 indexed gameId,
            address indexed challenger,
            address indexed proposer,
            bytes32 rootClaim,
            bytes32 claimRoot,
            uint8 gameType,
            uint8 proofType
        );

        /// Open a bonded game against `rootClaim`.
        function createGame(
            address proposer,
            bytes32 rootClaim,
            bytes32 claimRoot,
            uint8 gameType,
            uint8 proofType
        ) external payable returns (bytes32 gameId);

        /// Settle a game in the challenger's favour with a quorum-signed proof.
        function resolveChallengerWins(bytes32 gameId, bytes calldata proofBytes) external;

        /// Games not yet settled.
        function getActiveGames() external view returns (bytes32[] memory);
    }
}

sol! {
    /// L2 output oracle.
    #[allow(missing_docs)]
    interface IOutputOracle {
        /// Emitted for every proposed L2 output.
        event OutputProposed(
            uint256 indexed outputIndex,
            uint256 indexed l2BlockNumber,
            bytes32 stateRoot,
            bytes32 outputRoot,
            address proposer
        );
    }
}

/// Binding decode errors
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    /// Log or return data does not match the declared ABI.
    #[error(transparent)]
    Abi(#[from] alloy_sol_types::Error),
    /// A `uint256` field does not fit the native width.
    #[error("{field} out of range: {value}")]
    ValueOverflow {
        /// ABI field name
        field: &'static str,
        /// Decoded value
        value: alloy_primitives::U256,
    },
}

//! X Layer challenger primitives
//!
//! Types and pure functions shared by the challenger daemon and anything that
//! needs to produce or check its proofs:
//! - Output proposals, challenge records and their dedup key
//! - The packed proof wire layout (see [`codec`])
//! - Domain-separated signing digests (see [`domain`])

pub mod codec;
pub mod domain;
pub mod hasher;
pub mod proof;
pub mod types;

pub use codec::{CodecError, decode, encode};
pub use domain::{DEFENSE_DOMAIN, FRAUD_DOMAIN, PLACEHOLDER_DOMAIN};
pub use hasher::{keccak256, keccak256_concat};
pub use proof::{PROOF_VERSION, Proof, ProofType, SignatureBytes, SignatureCheckError};
pub use types::{BlockNumber, ChallengeKey, ChallengeRecord, GameId, OutputProposal};

pub use alloy_primitives::{Address, B256, Bytes, U256};

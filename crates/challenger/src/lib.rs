//! X Layer fraud-proof challenger
//!
//! Watches the L1 output oracle for proposed L2 outputs, compares each one
//! with a trusted state root and opens a bonded dispute game when they differ.
//! Pending games are later resolved with a fraud proof signed by a quorum of
//! validators.
//!
//! Flow: [`chain::ProposalSource`] -> [`Orchestrator`] -> [`StateVerifier`] ->
//! [`ChallengeCoordinator`], then [`GameResolver`] -> [`ProofBuilder`].

pub mod chain;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod orchestrator;
pub mod prover;
pub mod quorum;
pub mod resolver;
pub mod roots;
pub mod signer;
pub mod store;
pub mod verifier;

#[cfg(test)]
mod test_utils;

pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigError};
pub use coordinator::{ChallengeCoordinator, ChallengeError};
pub use orchestrator::{Orchestrator, ProposalOutcome, Reconciliation};
pub use prover::{ProofBuilder, ProofError};
pub use quorum::{QuorumPolicy, SignerSelection};
pub use resolver::{GameResolver, ResolveError};
pub use roots::{InMemoryRootStore, RootStore};
pub use signer::{LocalValidator, SignerError, SignerPool, ValidatorSigner};
pub use store::{ChallengeStore, InMemoryChallengeStore};
pub use verifier::{StateVerifier, UnknownRootPolicy, Verdict};

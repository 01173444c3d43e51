//! Domain separation tags and signing digests
//!
//! Every proof signature covers a digest prefixed with a fixed 32-byte tag,
//! so a signature over a fraud proof can never be replayed as a defense proof
//! (or against any other protocol sharing the same keys). The tags are ASCII,
//! right-padded with zeros; every participant and the dispute contract must
//! use the identical values.

use alloy_primitives::B256;

use crate::hasher::keccak256_concat;

const fn domain_tag(tag: &[u8]) -> B256 {
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < tag.len() {
        out[i] = tag[i];
        i += 1;
    }
    B256::new(out)
}

/// Tag prefixed to every fraud proof digest.
pub const FRAUD_DOMAIN: B256 = domain_tag(b"XLAYER_FP_FRAUD_PROOF_V1");

/// Tag prefixed to every defense proof digest.
pub const DEFENSE_DOMAIN: B256 = domain_tag(b"XLAYER_FP_DEFENSE_PROOF_V1");

/// Tag used to derive the claim root when no trusted root is known.
pub const PLACEHOLDER_DOMAIN: B256 = domain_tag(b"XLAYER_FP_UNKNOWN_ROOT_V1");

/// Block hash bound into a proof: `keccak(blockNumber ‖ stateRoot ‖ claimRoot)`.
pub fn derive_block_hash(block_number: u64, state_root: &B256, claim_root: &B256) -> B256 {
    keccak256_concat(&[&block_number.to_be_bytes(), state_root.as_slice(), claim_root.as_slice()])
}

/// Output root bound into a proof: `keccak(blockHash ‖ stateRoot ‖ postStateRoot)`.
pub fn derive_output_root(block_hash: &B256, state_root: &B256, post_state_root: &B256) -> B256 {
    keccak256_concat(&[block_hash.as_slice(), state_root.as_slice(), post_state_root.as_slice()])
}

/// Digest signed by validators for a fraud proof.
pub fn fraud_digest(
    state_root: &B256,
    claim_root: &B256,
    actual_post_state: &B256,
    block_hash: &B256,
    block_number: u64,
    output_root: &B256,
) -> B256 {
    keccak256_concat(&[
        FRAUD_DOMAIN.as_slice(),
        state_root.as_slice(),
        claim_root.as_slice(),
        actual_post_state.as_slice(),
        block_hash.as_slice(),
        &block_number.to_be_bytes(),
        output_root.as_slice(),
    ])
}

/// Digest signed by validators for a defense proof. Same layout as the fraud
/// digest minus the actual post state.
pub fn defense_digest(
    state_root: &B256,
    claim_root: &B256,
    block_hash: &B256,
    block_number: u64,
    output_root: &B256,
) -> B256 {
    keccak256_concat(&[
        DEFENSE_DOMAIN.as_slice(),
        state_root.as_slice(),
        claim_root.as_slice(),
        block_hash.as_slice(),
        &block_number.to_be_bytes(),
        output_root.as_slice(),
    ])
}

/// Claim root submitted when the challenger holds no trusted root for the
/// block. Deterministic so a repeated attempt produces the same `createGame`
/// arguments.
pub fn placeholder_claim_root(l2_block_number: u64, state_root: &B256) -> B256 {
    keccak256_concat(&[
        PLACEHOLDER_DOMAIN.as_slice(),
        &l2_block_number.to_be_bytes(),
        state_root.as_slice(),
    ])
}

//! Fraud and defense proof construction

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes};
use tracing::debug;
use xlayer_fp_primitives::{
    CodecError, PROOF_VERSION, Proof, ProofType, SignatureBytes, encode,
    domain::{derive_block_hash, derive_output_root},
    proof::recover_signer,
};

use crate::{
    quorum::QuorumPolicy,
    signer::{SignerError, SignerPool},
};

/// Proof construction errors
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    /// The pool is empty.
    #[error("no validators configured")]
    NoValidatorsConfigured,
    /// Threshold for this proof type is zero.
    #[error("{} proof threshold must be at least 1", proof_type.as_str())]
    InvalidThreshold {
        /// Proof being built
        proof_type: ProofType,
    },
    /// Fewer validators than the threshold.
    #[error("{} proof needs {required} signatures but only {available} validators are configured", proof_type.as_str())]
    QuorumUnreachable {
        /// Proof being built
        proof_type: ProofType,
        /// Signatures needed
        required: usize,
        /// Validators in the pool
        available: usize,
    },
    /// A validator failed to sign.
    #[error(transparent)]
    Signer(#[from] SignerError),
    /// A validator returned bytes that are not a signature.
    #[error("validator {index} returned a malformed signature")]
    InvalidSignature {
        /// Pool index of the validator
        index: usize,
    },
    /// A signature recovers to someone other than the validator.
    #[error("validator {index} signed with a key other than its identity")]
    SignerMismatch {
        /// Pool index of the validator
        index: usize,
    },
    /// The proof does not encode.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Builds signed proofs from a validator pool and a quorum policy.
#[derive(Debug, Clone)]
pub struct ProofBuilder {
    pool: Arc<SignerPool>,
    policy: QuorumPolicy,
}

impl ProofBuilder {
    /// Builder signing with `pool` under `policy`.
    pub const fn new(pool: Arc<SignerPool>, policy: QuorumPolicy) -> Self {
        Self { pool, policy }
    }

    /// Validators available for signing.
    pub fn pool(&self) -> &SignerPool {
        &self.pool
    }

    /// Thresholds and selection in use.
    pub const fn policy(&self) -> &QuorumPolicy {
        &self.policy
    }

    /// Fraud proof that `state_root` at `block_number` is wrong and
    /// `actual_post_state` is the correct post state, countering `claim_root`.
    pub async fn build_fraud_proof(
        &self,
        block_number: u64,
        state_root: &B256,
        claim_root: &B256,
        actual_post_state: &B256,
    ) -> Result<Proof, ProofError> {
        self.build(ProofType::Fraud, block_number, state_root, claim_root, actual_post_state).await
    }

    /// Defense proof asserting the original claim `claim_root` is correct.
    /// The post state is the claim itself.
    pub async fn build_defense_proof(
        &self,
        block_number: u64,
        state_root: &B256,
        claim_root: &B256,
    ) -> Result<Proof, ProofError> {
        self.build(ProofType::Defense, block_number, state_root, claim_root, claim_root).await
    }

    /// Encoded [`Self::build_fraud_proof`].
    pub async fn generate_fraud_proof(
        &self,
        block_number: u64,
        state_root: &B256,
        claim_root: &B256,
        actual_post_state: &B256,
    ) -> Result<Bytes, ProofError> {
        let proof =
            self.build_fraud_proof(block_number, state_root, claim_root, actual_post_state).await?;
        Ok(encode(&proof)?)
    }

    /// Encoded [`Self::build_defense_proof`].
    pub async fn generate_defense_proof(
        &self,
        block_number: u64,
        state_root: &B256,
        claim_root: &B256,
    ) -> Result<Bytes, ProofError> {
        let proof = self.build_defense_proof(block_number, state_root, claim_root).await?;
        Ok(encode(&proof)?)
    }

    async fn build(
        &self,
        proof_type: ProofType,
        block_number: u64,
        state_root: &B256,
        claim_root: &B256,
        post_state_root: &B256,
    ) -> Result<Proof, ProofError> {
        let block_hash = derive_block_hash(block_number, state_root, claim_root);
        let output_root = derive_output_root(&block_hash, state_root, post_state_root);

        let mut proof = Proof {
            version: PROOF_VERSION,
            proof_type,
            pre_state_root: *state_root,
            post_state_root: *post_state_root,
            block_hash,
            block_number,
            output_root,
            signers: Vec::new(),
            signatures: Vec::new(),
        };
        let digest = proof.signing_digest(claim_root);

        let selected = self.policy.select(proof_type, self.pool.len(), &digest)?;
        let (signers, signatures) = self.collect_signatures(&selected, &digest).await?;
        proof.signers = signers;
        proof.signatures = signatures;

        debug!(
            proof_type = proof_type.as_str(),
            block_number,
            signers = proof.signers.len(),
            %digest,
            "Proof signed"
        );
        Ok(proof)
    }

    async fn collect_signatures(
        &self,
        selected: &[usize],
        digest: &B256,
    ) -> Result<(Vec<Address>, Vec<SignatureBytes>), ProofError> {
        let mut signers = Vec::with_capacity(selected.len());
        let mut signatures = Vec::with_capacity(selected.len());
        for &index in selected {
            let Some(validator) = self.pool.get(index) else {
                return Err(ProofError::NoValidatorsConfigured);
            };
            let identity = validator.identity();
            let signature = validator.sign_digest(digest).await?;
            match recover_signer(&signature, digest) {
                Some(recovered) if recovered == identity => {}
                Some(_) => return Err(ProofError::SignerMismatch { index }),
                None => return Err(ProofError::InvalidSignature { index }),
            }
            signers.push(identity);
            signatures.push(signature);
        }
        Ok((signers, signatures))
    }
}

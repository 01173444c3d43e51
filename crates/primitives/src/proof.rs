//! Fraud and defense proof records

use alloy_primitives::{Address, B256, FixedBytes, Signature};
use serde::{Deserialize, Serialize};

use crate::domain::{DEFENSE_DOMAIN, FRAUD_DOMAIN, defense_digest, fraud_digest};

/// Wire version written into every proof header.
pub const PROOF_VERSION: u8 = 1;

/// Raw `r ‖ s ‖ v` signature as carried on the wire.
pub type SignatureBytes = FixedBytes<65>;

/// Proof kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProofType {
    /// The proposed state is wrong
    Fraud = 1,
    /// The original proposal is correct
    Defense = 2,
}

impl ProofType {
    /// Wire tag
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag, `None` if unknown.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Fraud),
            2 => Some(Self::Defense),
            _ => None,
        }
    }

    /// Domain tag mixed into this kind's signing digest.
    pub const fn domain(self) -> B256 {
        match self {
            Self::Fraud => FRAUD_DOMAIN,
            Self::Defense => DEFENSE_DOMAIN,
        }
    }

    /// Lowercase name used in logs and errors.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fraud => "fraud",
            Self::Defense => "defense",
        }
    }
}

/// Signature verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureCheckError {
    /// Signer and signature lists differ in length.
    #[error("{signers} signers but {signatures} signatures")]
    CountMismatch {
        /// Number of signers
        signers: usize,
        /// Number of signatures
        signatures: usize,
    },
    /// A signature does not parse or recover.
    #[error("signature {index} is malformed")]
    Malformed {
        /// Position in the signature list
        index: usize,
    },
    /// A signature recovers to an address other than its signer.
    #[error("signature {index} recovers to {recovered}, expected {expected}")]
    SignerMismatch {
        /// Position in the signature list
        index: usize,
        /// Signer listed at `index`
        expected: Address,
        /// Address the signature recovers to
        recovered: Address,
    },
}

/// A fraud or defense proof, built per submission and never persisted.
///
/// `signers[i]` produced `signatures[i]` over [`Proof::signing_digest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Wire version, [`PROOF_VERSION`] when built here
    pub version: u8,
    /// Fraud or defense
    pub proof_type: ProofType,
    /// State root before the disputed block
    pub pre_state_root: B256,
    /// State root after the disputed block
    pub post_state_root: B256,
    /// Hash of the disputed block
    pub block_hash: B256,
    /// Number of the disputed block
    pub block_number: u64,
    /// Output root of the disputed output
    pub output_root: B256,
    /// Validators that signed, in pool order
    pub signers: Vec<Address>,
    /// One signature per signer
    pub signatures: Vec<SignatureBytes>,
}

impl Proof {
    /// Digest the validators signed.
    ///
    /// Fraud proofs do not carry the disputed claim, so the verifier supplies
    /// the game's claim root. For defense proofs the claim is the post state
    /// and `claim_root` should equal [`Proof::post_state_root`].
    pub fn signing_digest(&self, claim_root: &B256) -> B256 {
        match self.proof_type {
            ProofType::Fraud => fraud_digest(
                &self.pre_state_root,
                claim_root,
                &self.post_state_root,
                &self.block_hash,
                self.block_number,
                &self.output_root,
            ),
            ProofType::Defense => defense_digest(
                &self.pre_state_root,
                claim_root,
                &self.block_hash,
                self.block_number,
                &self.output_root,
            ),
        }
    }

    /// Check every signature recovers to the signer at the same index.
    pub fn verify_signatures(&self, claim_root: &B256) -> Result<(), SignatureCheckError> {
        if self.signers.len() != self.signatures.len() {
            return Err(SignatureCheckError::CountMismatch {
                signers: self.signers.len(),
                signatures: self.signatures.len(),
            });
        }

        let digest = self.signing_digest(claim_root);
        for (index, (expected, raw)) in self.signers.iter().zip(&self.signatures).enumerate() {
            let recovered = recover_signer(raw, &digest)
                .ok_or(SignatureCheckError::Malformed { index })?;
            if recovered != *expected {
                return Err(SignatureCheckError::SignerMismatch {
                    index,
                    expected: *expected,
                    recovered,
                });
            }
        }
        Ok(())
    }
}

/// Recover the address that signed `digest`, `None` if the bytes are not a
/// valid secp256k1 signature.
pub fn recover_signer(raw: &SignatureBytes, digest: &B256) -> Option<Address> {
    let signature = Signature::from_raw(raw.as_slice()).ok()?;
    signature.recover_address_from_prehash(digest).ok()
}

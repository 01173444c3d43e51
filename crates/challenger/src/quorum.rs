//! k-of-n validator selection

use std::{fmt, str::FromStr};

use alloy_primitives::B256;
use rand::{SeedableRng, rngs::StdRng, seq::index};
use serde::{Deserialize, Serialize};
use xlayer_fp_primitives::ProofType;

use crate::prover::ProofError;

/// How the k signers of a proof are picked from the pool.
///
/// Every strategy is a pure function of the digest and the pool order, so the
/// same request always yields the same signer set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerSelection {
    /// The first k validators.
    #[default]
    Ordered,
    /// k consecutive validators starting at a digest-derived offset, wrapping.
    Rotating,
    /// k distinct validators drawn with an RNG seeded by the digest, in pool order.
    Seeded,
}

impl SignerSelection {
    /// Name accepted by `SIGNER_SELECTION`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ordered => "ordered",
            Self::Rotating => "rotating",
            Self::Seeded => "seeded",
        }
    }

    fn pick(self, k: usize, n: usize, digest: &B256) -> Vec<usize> {
        match self {
            Self::Ordered => (0..k).collect(),
            Self::Rotating => {
                let mut word = [0u8; 8];
                word.copy_from_slice(&digest[..8]);
                // n is at most a few hundred, the cast back is lossless.
                let offset = (u64::from_be_bytes(word) % n as u64) as usize;
                (0..k).map(|i| (offset + i) % n).collect()
            }
            Self::Seeded => {
                let mut rng = StdRng::from_seed(digest.0);
                let mut picked = index::sample(&mut rng, n, k).into_vec();
                picked.sort_unstable();
                picked
            }
        }
    }
}

impl fmt::Display for SignerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignerSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ordered" => Ok(Self::Ordered),
            "rotating" | "round-robin" => Ok(Self::Rotating),
            "seeded" | "random" => Ok(Self::Seeded),
            other => Err(format!("unknown signer selection `{other}`")),
        }
    }
}

/// Signature thresholds per proof type plus the selection strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    /// Signatures required on a fraud proof
    pub fraud_threshold: usize,
    /// Signatures required on a defense proof
    pub defense_threshold: usize,
    /// Which validators sign
    pub selection: SignerSelection,
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self { fraud_threshold: 1, defense_threshold: 2, selection: SignerSelection::Ordered }
    }
}

impl QuorumPolicy {
    /// Signatures required for `proof_type`.
    pub const fn threshold(&self, proof_type: ProofType) -> usize {
        match proof_type {
            ProofType::Fraud => self.fraud_threshold,
            ProofType::Defense => self.defense_threshold,
        }
    }

    /// Pool indices that must sign `digest`, in signing order.
    ///
    /// Never returns fewer than the threshold: a pool that cannot meet it is
    /// an error, not a smaller proof.
    pub fn select(
        &self,
        proof_type: ProofType,
        pool_size: usize,
        digest: &B256,
    ) -> Result<Vec<usize>, ProofError> {
        let required = self.threshold(proof_type);
        if required == 0 {
            return Err(ProofError::InvalidThreshold { proof_type });
        }
        if pool_size == 0 {
            return Err(ProofError::NoValidatorsConfigured);
        }
        if required > pool_size {
            return Err(ProofError::QuorumUnreachable { proof_type, required, available: pool_size });
        }
        Ok(self.selection.pick(required, pool_size, digest))
    }
}

//! Keccak256 hasher

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// Hash a single value
pub fn keccak256(data: &[u8]) -> B256 {
    keccak256_concat(&[data])
}

/// Hash the concatenation of `parts` without allocating the joined buffer.
pub fn keccak256_concat(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    B256::new(output)
}

//! Packed proof byte layout
//!
//! ```text
//! version       1B
//! proofType     1B
//! preStateRoot  32B
//! postStateRoot 32B
//! blockHash     32B
//! blockNumber   8B  big-endian
//! outputRoot    32B
//! signerCount   1B
//! signers       signerCount * 20B
//! signatures    signerCount * 65B
//! ```
//!
//! Field order and widths are verified on-chain and must not change.

use alloy_primitives::{Address, B256, Bytes};

use crate::proof::{PROOF_VERSION, Proof, ProofType, SignatureBytes};

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 1 + 1 + 32 + 32 + 32 + 8 + 32 + 1;

/// Width of one signer identity.
pub const SIGNER_LEN: usize = 20;

/// Width of one signature.
pub const SIGNATURE_LEN: usize = 65;

/// Largest signer count the one-byte length prefix can express.
pub const MAX_SIGNERS: usize = u8::MAX as usize;

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input ends before the proof does.
    #[error("truncated proof: expected {expected} bytes, got {actual}")]
    TruncatedProof {
        /// Length the header implies
        expected: usize,
        /// Length received
        actual: usize,
    },
    /// Input continues past the proof.
    #[error("{extra} trailing bytes after proof")]
    TrailingBytes {
        /// Bytes left over
        extra: usize,
    },
    /// Header version is not [`PROOF_VERSION`](crate::proof::PROOF_VERSION).
    #[error("unsupported proof version {0}")]
    UnsupportedVersion(u8),
    /// Proof type tag is neither fraud nor defense.
    #[error("unknown proof type {0}")]
    UnknownProofType(u8),
    /// More signers than the length prefix can hold.
    #[error("{0} signers exceed the maximum of 255")]
    TooManySigners(usize),
    /// Signer and signature lists differ in length.
    #[error("{signers} signers but {signatures} signatures")]
    SignerCountMismatch {
        /// Number of signers
        signers: usize,
        /// Number of signatures
        signatures: usize,
    },
}

/// Total encoded length for a proof carrying `signer_count` signatures.
pub const fn encoded_len(signer_count: usize) -> usize {
    HEADER_LEN + signer_count * (SIGNER_LEN + SIGNATURE_LEN)
}

/// Encode a proof into its wire layout.
pub fn encode(proof: &Proof) -> Result<Bytes, CodecError> {
    if proof.version != PROOF_VERSION {
        return Err(CodecError::UnsupportedVersion(proof.version));
    }
    if proof.signers.len() != proof.signatures.len() {
        return Err(CodecError::SignerCountMismatch {
            signers: proof.signers.len(),
            signatures: proof.signatures.len(),
        });
    }
    let count = proof.signers.len();
    let count_byte = u8::try_from(count).map_err(|_| CodecError::TooManySigners(count))?;

    let mut out = Vec::with_capacity(encoded_len(count));
    out.push(proof.version);
    out.push(proof.proof_type.as_u8());
    out.extend_from_slice(proof.pre_state_root.as_slice());
    out.extend_from_slice(proof.post_state_root.as_slice());
    out.extend_from_slice(proof.block_hash.as_slice());
    out.extend_from_slice(&proof.block_number.to_be_bytes());
    out.extend_from_slice(proof.output_root.as_slice());
    out.push(count_byte);
    for signer in &proof.signers {
        out.extend_from_slice(signer.as_slice());
    }
    for signature in &proof.signatures {
        out.extend_from_slice(signature.as_slice());
    }

    debug_assert_eq!(out.len(), encoded_len(count));
    Ok(out.into())
}

/// Decode the wire layout. Exact inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Proof, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::TruncatedProof { expected: HEADER_LEN, actual: bytes.len() });
    }

    let count = bytes[HEADER_LEN - 1] as usize;
    let expected = encoded_len(count);
    if bytes.len() < expected {
        return Err(CodecError::TruncatedProof { expected, actual: bytes.len() });
    }
    if bytes.len() > expected {
        return Err(CodecError::TrailingBytes { extra: bytes.len() - expected });
    }

    let mut reader = Reader::new(bytes);
    let version = reader.byte();
    if version != PROOF_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let type_byte = reader.byte();
    let proof_type =
        ProofType::from_u8(type_byte).ok_or(CodecError::UnknownProofType(type_byte))?;
    let pre_state_root = reader.word();
    let post_state_root = reader.word();
    let block_hash = reader.word();
    let block_number = u64::from_be_bytes(reader.array());
    let output_root = reader.word();
    let _count = reader.byte();

    let signers = (0..count).map(|_| Address::from(reader.array::<SIGNER_LEN>())).collect();
    let signatures =
        (0..count).map(|_| SignatureBytes::from(reader.array::<SIGNATURE_LEN>())).collect();

    Ok(Proof {
        version,
        proof_type,
        pre_state_root,
        post_state_root,
        block_hash,
        block_number,
        output_root,
        signers,
        signatures,
    })
}

/// Cursor over a buffer whose length has already been checked.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn byte(&mut self) -> u8 {
        self.array::<1>()[0]
    }

    fn word(&mut self) -> B256 {
        B256::new(self.array())
    }
}

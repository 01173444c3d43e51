//! Validator signing identities
//!
//! Proof construction only needs an identity and a way to sign a 32-byte
//! digest, so key custody sits behind [`ValidatorSigner`]. [`LocalValidator`]
//! keeps the key in process; a remote signer or HSM implements the same trait.

use std::{fmt, str::FromStr, sync::Arc};

use alloy_primitives::{Address, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use xlayer_fp_primitives::SignatureBytes;

/// Signing backend errors
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// Key material does not parse.
    #[error("invalid validator key: {0}")]
    InvalidKey(String),
    /// The signing backend failed.
    #[error("signer {identity} failed: {message}")]
    Backend {
        /// Validator that failed
        identity: Address,
        /// Backend error
        message: String,
    },
}

/// A validator that can sign proof digests.
#[async_trait]
pub trait ValidatorSigner: Send + Sync + fmt::Debug {
    /// Address recovered from this validator's signatures.
    fn identity(&self) -> Address;

    /// Sign a 32-byte digest as-is (no message prefix). Returns `r ‖ s ‖ v`.
    async fn sign_digest(&self, digest: &B256) -> Result<SignatureBytes, SignerError>;
}

/// Validator holding a secp256k1 key in memory.
#[derive(Clone)]
pub struct LocalValidator {
    signer: PrivateKeySigner,
}

impl fmt::Debug for LocalValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalValidator").field("identity", &self.signer.address()).finish()
    }
}

impl LocalValidator {
    /// Validator from a raw 32-byte private key.
    pub fn from_bytes(key: &B256) -> Result<Self, SignerError> {
        PrivateKeySigner::from_bytes(key)
            .map(|signer| Self { signer })
            .map_err(|e| SignerError::InvalidKey(e.to_string()))
    }
}

impl FromStr for LocalValidator {
    type Err = SignerError;

    /// Parse a hex private key, with or without `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = B256::from_str(s.trim())
            .map_err(|_| SignerError::InvalidKey("expected 32-byte hex".to_string()))?;
        Self::from_bytes(&key)
    }
}

#[async_trait]
impl ValidatorSigner for LocalValidator {
    fn identity(&self) -> Address {
        self.signer.address()
    }

    async fn sign_digest(&self, digest: &B256) -> Result<SignatureBytes, SignerError> {
        let signature = self.signer.sign_hash(digest).await.map_err(|e| SignerError::Backend {
            identity: self.identity(),
            message: e.to_string(),
        })?;
        Ok(SignatureBytes::from(signature.as_bytes()))
    }
}

/// Ordered set of validators.
///
/// Order is significant: quorum selection indexes into it, and the selected
/// signers appear in the proof in the order selection returns them.
#[derive(Debug, Clone, Default)]
pub struct SignerPool {
    validators: Vec<Arc<dyn ValidatorSigner>>,
}

impl SignerPool {
    /// Pool of `validators`, in the given order.
    pub fn new(validators: Vec<Arc<dyn ValidatorSigner>>) -> Self {
        Self { validators }
    }

    /// Pool of in-process validators from hex keys, in the given order.
    pub fn from_hex_keys<I, S>(keys: I) -> Result<Self, SignerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let validators = keys
            .into_iter()
            .map(|key| {
                LocalValidator::from_str(key.as_ref())
                    .map(|v| Arc::new(v) as Arc<dyn ValidatorSigner>)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { validators })
    }

    /// Append a validator at the end of the pool.
    pub fn push(&mut self, validator: Arc<dyn ValidatorSigner>) {
        self.validators.push(validator);
    }

    /// Number of validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the pool has no validators.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validator at `index` in pool order.
    pub fn get(&self, index: usize) -> Option<&Arc<dyn ValidatorSigner>> {
        self.validators.get(index)
    }

    /// Validator addresses in pool order.
    pub fn identities(&self) -> Vec<Address> {
        self.validators.iter().map(|v| v.identity()).collect()
    }
}

//! Trusted state roots

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use alloy_primitives::B256;
use tracing::warn;
use xlayer_fp_primitives::BlockNumber;

/// Mapping from L2 block number to the state root the challenger trusts.
///
/// A missing entry means "unknown", which is distinct from any root value.
pub trait RootStore: Send + Sync + std::fmt::Debug {
    /// Insert or overwrite. Idempotent.
    fn set_trusted_state_root(&self, block: BlockNumber, root: B256);

    /// Root trusted for `block`, `None` if unknown.
    fn trusted_state_root(&self, block: BlockNumber) -> Option<B256>;

    /// Number of roots held.
    fn len(&self) -> usize;

    /// Whether no root is held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered in-memory store holding at most `retention` roots. When full, the
/// lowest block numbers are evicted first, so an insert below every held
/// block is dropped.
#[derive(Debug)]
pub struct InMemoryRootStore {
    roots: RwLock<BTreeMap<BlockNumber, B256>>,
    retention: usize,
}

impl InMemoryRootStore {
    /// Store keeping at most `retention` roots, at least one.
    pub fn new(retention: usize) -> Self {
        Self { roots: RwLock::new(BTreeMap::new()), retention: retention.max(1) }
    }
}

impl Default for InMemoryRootStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl RootStore for InMemoryRootStore {
    fn set_trusted_state_root(&self, block: BlockNumber, root: B256) {
        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        roots.insert(block, root);
        while roots.len() > self.retention {
            if let Some((evicted, _)) = roots.pop_first()
                && evicted == block
            {
                warn!(
                    l2_block_number = block,
                    retention = self.retention,
                    "Trusted root older than every retained root, dropped"
                );
            }
        }
    }

    fn trusted_state_root(&self, block: BlockNumber) -> Option<B256> {
        self.roots.read().unwrap_or_else(PoisonError::into_inner).get(&block).copied()
    }

    fn len(&self) -> usize {
        self.roots.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

use alloy_primitives::B256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    ChainError,
    rpc::{RpcClient, quantity},
};

/// Where trusted state roots come from when the store has none for a block.
#[async_trait]
pub trait TrustedRootSource: Send + Sync + std::fmt::Debug {
    /// State root of `block`, `None` if the source has not reached it yet.
    async fn state_root(&self, block: u64) -> Result<Option<B256>, ChainError>;
}

/// Trusted roots read from an L2 execution client the operator runs.
#[derive(Debug, Clone)]
pub struct L2RootFeed {
    rpc: RpcClient,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHeader {
    state_root: B256,
}

impl L2RootFeed {
    /// Feed reading block headers through `rpc`.
    pub const fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl TrustedRootSource for L2RootFeed {
    async fn state_root(&self, block: u64) -> Result<Option<B256>, ChainError> {
        let value =
            self.rpc.call_with_retry("eth_getBlockByNumber", json!([quantity(block), false])).await?;
        parse_header(value)
    }
}

fn parse_header(value: Value) -> Result<Option<B256>, ChainError> {
    if value.is_null() {
        return Ok(None);
    }
    let header: BlockHeader = serde_json::from_value(value)
        .map_err(|e| ChainError::Malformed(format!("eth_getBlockByNumber: {e}")))?;
    Ok(Some(header.state_root))
}

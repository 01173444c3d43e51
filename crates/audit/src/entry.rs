use crate::stage::{CHAIN_NAME, SERVICE_NAME, ChallengeStage};

use alloy_primitives::B256;
use std::borrow::Cow;
use xlayer_fp_primitives::{ChallengeRecord, OutputProposal};

/// Context attached to an audit row. Every field is optional; absent fields
/// are written as empty CSV cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditEntry {
    /// Oracle output index
    pub output_index: Option<u64>,
    /// L2 block the output commits to
    pub l2_block_number: Option<u64>,
    /// Dispute game identifier
    pub game_id: Option<B256>,
    /// Root claimed by the proposer
    pub claimed_root: Option<B256>,
    /// Root the challenger trusts or submitted as counter-claim
    pub trusted_root: Option<B256>,
    /// L1 transaction hash
    pub tx_hash: Option<B256>,
    /// Free-form detail, usually an error message
    pub detail: Option<String>,
}

impl AuditEntry {
    /// Entry describing an observed output proposal.
    pub const fn for_output(proposal: &OutputProposal) -> Self {
        Self {
            output_index: Some(proposal.output_index),
            l2_block_number: Some(proposal.l2_block_number),
            game_id: None,
            claimed_root: Some(proposal.state_root),
            trusted_root: None,
            tx_hash: None,
            detail: None,
        }
    }

    /// Entry describing a recorded challenge.
    pub const fn for_record(record: &ChallengeRecord) -> Self {
        Self {
            output_index: Some(record.output_index),
            l2_block_number: Some(record.l2_block_number),
            game_id: Some(record.game_id),
            claimed_root: Some(record.claimed_state_root),
            trusted_root: Some(record.trusted_claim_root),
            tx_hash: None,
            detail: None,
        }
    }

    /// Set the dispute game id.
    pub const fn with_game(mut self, game_id: B256) -> Self {
        self.game_id = Some(game_id);
        self
    }

    /// Set the trusted root.
    pub const fn with_trusted_root(mut self, root: B256) -> Self {
        self.trusted_root = Some(root);
        self
    }

    /// Set the transaction hash.
    pub const fn with_tx(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    /// Set the detail column.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Format a 32-byte hash as hexadecimal string with 0x prefix
pub(crate) fn format_hash_hex(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Format CSV line with 12 fields.
pub(crate) fn format_csv_line(
    stage: ChallengeStage,
    current_time: u128,
    entry: &AuditEntry,
) -> String {
    fn escape_csv(s: &str) -> Cow<'_, str> {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
        } else {
            Cow::Borrowed(s)
        }
    }

    let number = |n: Option<u64>| n.map(|n| n.to_string()).unwrap_or_default();
    let hash = |h: Option<B256>| h.as_ref().map(format_hash_hex).unwrap_or_default();

    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{}",
        current_time,
        escape_csv(CHAIN_NAME),
        escape_csv(SERVICE_NAME),
        stage.as_u64(),
        stage.as_str(),
        number(entry.output_index),
        number(entry.l2_block_number),
        hash(entry.game_id),
        hash(entry.claimed_root),
        hash(entry.trusted_root),
        hash(entry.tx_hash),
        escape_csv(entry.detail.as_deref().unwrap_or_default()),
    )
}

/// Get current timestamp in milliseconds since UNIX epoch
pub(crate) fn current_timestamp_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

//! Output verification against trusted roots

use std::{fmt, str::FromStr, sync::Arc};

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use tracing::warn;
use xlayer_fp_primitives::{BlockNumber, domain::placeholder_claim_root};

use crate::roots::RootStore;

/// What to conclude about a proposal for a block with no trusted root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownRootPolicy {
    /// Assume the proposal is valid. Misses fraud at blocks we have not
    /// verified yet.
    #[default]
    FailOpen,
    /// Treat the proposal as invalid until proven. Challenges anything we
    /// cannot vouch for.
    FailClosed,
}

impl UnknownRootPolicy {
    /// Name accepted by `UNKNOWN_ROOT_POLICY`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FailOpen => "fail-open",
            Self::FailClosed => "fail-closed",
        }
    }
}

impl fmt::Display for UnknownRootPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnknownRootPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-open" | "open" => Ok(Self::FailOpen),
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!("unknown root policy `{other}`")),
        }
    }
}

/// Outcome of comparing a claimed root with the trusted one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Claimed root matches the trusted one.
    Valid,
    /// Claimed root differs from the trusted one.
    Invalid {
        /// Root the challenger trusts for the block
        trusted: B256,
    },
    /// No trusted root for the block. [`StateVerifier::verify`] applies the
    /// configured [`UnknownRootPolicy`].
    Unknown,
}

/// Checks proposed roots against a [`RootStore`].
#[derive(Debug, Clone)]
pub struct StateVerifier {
    roots: Arc<dyn RootStore>,
    policy: UnknownRootPolicy,
}

impl StateVerifier {
    /// Verifier over `roots`, applying `policy` to blocks it does not hold.
    pub fn new(roots: Arc<dyn RootStore>, policy: UnknownRootPolicy) -> Self {
        Self { roots, policy }
    }

    /// Configured policy for unknown roots.
    pub const fn policy(&self) -> UnknownRootPolicy {
        self.policy
    }

    /// Record the trusted root of `block`.
    pub fn set_trusted_state_root(&self, block: BlockNumber, root: B256) {
        self.roots.set_trusted_state_root(block, root);
    }

    /// Trusted root of `block`, `None` if unknown.
    pub fn trusted_state_root(&self, block: BlockNumber) -> Option<B256> {
        self.roots.trusted_state_root(block)
    }

    /// Compare `claimed` with the trusted root of `block`. One store lookup.
    pub fn check(&self, block: BlockNumber, claimed: &B256) -> Verdict {
        match self.roots.trusted_state_root(block) {
            None => Verdict::Unknown,
            Some(trusted) if trusted == *claimed => Verdict::Valid,
            Some(trusted) => Verdict::Invalid { trusted },
        }
    }

    /// `true` if `claimed` is acceptable for `block`.
    ///
    /// Pure with respect to the store: repeated calls agree until a root for
    /// `block` is set.
    pub fn verify(&self, block: BlockNumber, claimed: &B256) -> bool {
        let verdict = self.check(block, claimed);
        if verdict == Verdict::Unknown {
            warn!(
                l2_block_number = block,
                claimed_root = %claimed,
                policy = %self.policy,
                "No trusted root for block"
            );
        }
        self.accepts(&verdict)
    }

    /// Whether a verdict already taken passes, applying the unknown-root
    /// policy without another store lookup.
    pub fn accepts(&self, verdict: &Verdict) -> bool {
        match verdict {
            Verdict::Valid => true,
            Verdict::Invalid { .. } => false,
            Verdict::Unknown => self.policy == UnknownRootPolicy::FailOpen,
        }
    }

    /// Counter-claim for a challenge at `block`: the trusted root, or a
    /// deterministic placeholder when none is known.
    pub fn claim_root(&self, block: BlockNumber, claimed: &B256) -> B256 {
        self.roots
            .trusted_state_root(block)
            .unwrap_or_else(|| placeholder_claim_root(block, claimed))
    }
}

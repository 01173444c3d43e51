//! Configuration

use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    quorum::QuorumPolicy,
    signer::{SignerError, SignerPool},
    verifier::UnknownRootPolicy,
};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("{0} is required")]
    Missing(&'static str),
    /// A variable does not parse.
    #[error("invalid {var} `{value}`: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Parse error
        reason: String,
    },
    /// A quorum threshold exceeds the validator count.
    #[error("{var}={required} exceeds the {available} configured validators")]
    QuorumUnreachable {
        /// Threshold variable name
        var: &'static str,
        /// Configured threshold
        required: usize,
        /// Configured validators
        available: usize,
    },
}

/// Hex private keys of the validator pool, in pool order. Never printed.
#[derive(Clone, Default)]
pub struct ValidatorKeys(Vec<String>);

impl ValidatorKeys {
    /// Wrap hex keys, in pool order.
    pub fn new(keys: Vec<String>) -> Self {
        Self(keys)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no key is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ValidatorKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorKeys({} redacted)", self.0.len())
    }
}

/// Challenger configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// L1 RPC URL
    pub l1_rpc: String,
    /// Trusted L2 execution client used to seed trusted roots
    pub l2_rpc: Option<String>,
    /// Dispute game factory address
    pub dispute_game_factory: Option<Address>,
    /// Output oracle address
    pub output_oracle: Option<Address>,
    /// Unlocked L1 account that posts bonds. Without one, mismatches are only
    /// reported.
    pub challenger: Option<Address>,
    /// Bond attached to `createGame`, in wei
    pub bond_amount: U256,
    /// Validator private keys, never serialized
    #[serde(skip)]
    pub validator_keys: ValidatorKeys,
    /// Proof thresholds and signer selection
    pub quorum: QuorumPolicy,
    /// Verdict for proposals at blocks without a trusted root
    pub unknown_root_policy: UnknownRootPolicy,
    /// Seconds between L1 log polls
    pub fetch_interval: u64,
    /// First L1 block to scan, latest if unset
    pub start_block: Option<u64>,
    /// Proposals handled at once
    pub max_concurrent_challenges: usize,
    /// Dispute window in seconds, used for resolution deadlines
    pub resolution_window: u64,
    /// Seconds to wait for a transaction receipt
    pub confirmation_timeout: u64,
    /// Max number of trusted roots held in memory
    pub trusted_root_retention: usize,
    /// Write the JSON audit log
    pub audit_log_enable: bool,
    /// Audit log file, a default path if unset
    pub audit_log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            l1_rpc: "http://localhost:8545".to_string(),
            l2_rpc: None,
            dispute_game_factory: None,
            output_oracle: None,
            challenger: None,
            bond_amount: U256::from(100_000_000_000_000_000u64),
            validator_keys: ValidatorKeys::default(),
            quorum: QuorumPolicy::default(),
            unknown_root_policy: UnknownRootPolicy::default(),
            fetch_interval: 10,
            start_block: None,
            max_concurrent_challenges: 4,
            resolution_window: 604_800,
            confirmation_timeout: 120,
            trusted_root_retention: 100_000,
            audit_log_enable: false,
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load from `lookup`, which maps a variable name to its value. Unset and
    /// empty variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let validator_keys = get("VALIDATOR_KEYS")
            .map(|keys| {
                keys.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            l1_rpc: get("L1_RPC").unwrap_or(defaults.l1_rpc),
            l2_rpc: get("L2_RPC"),
            dispute_game_factory: parse_opt(&get, "DISPUTE_GAME_FACTORY_ADDRESS")?,
            output_oracle: parse_opt(&get, "OUTPUT_ORACLE_ADDRESS")?,
            challenger: parse_opt(&get, "CHALLENGER_ADDRESS")?,
            bond_amount: parse_or(&get, "BOND_AMOUNT_WEI", defaults.bond_amount)?,
            validator_keys: ValidatorKeys::new(validator_keys),
            quorum: QuorumPolicy {
                fraud_threshold: parse_or(&get, "FRAUD_QUORUM", defaults.quorum.fraud_threshold)?,
                defense_threshold: parse_or(
                    &get,
                    "DEFENSE_QUORUM",
                    defaults.quorum.defense_threshold,
                )?,
                selection: parse_or(&get, "SIGNER_SELECTION", defaults.quorum.selection)?,
            },
            unknown_root_policy: parse_or(
                &get,
                "UNKNOWN_ROOT_POLICY",
                defaults.unknown_root_policy,
            )?,
            fetch_interval: parse_or(&get, "FETCH_INTERVAL", defaults.fetch_interval)?,
            start_block: parse_opt(&get, "START_BLOCK")?,
            max_concurrent_challenges: parse_or(
                &get,
                "MAX_CONCURRENT_CHALLENGES",
                defaults.max_concurrent_challenges,
            )?,
            resolution_window: parse_or(&get, "RESOLUTION_WINDOW_SECS", defaults.resolution_window)?,
            confirmation_timeout: parse_or(
                &get,
                "CONFIRMATION_TIMEOUT_SECS",
                defaults.confirmation_timeout,
            )?,
            trusted_root_retention: parse_or(
                &get,
                "TRUSTED_ROOT_RETENTION",
                defaults.trusted_root_retention,
            )?,
            audit_log_enable: get("AUDIT_LOG_ENABLE").is_some_and(|s| s == "true" || s == "1"),
            audit_log_path: get("AUDIT_LOG_PATH").map(PathBuf::from),
        })
    }

    /// Reject configurations the challenger cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispute_game_factory.is_none() {
            return Err(ConfigError::Missing("DISPUTE_GAME_FACTORY_ADDRESS"));
        }
        if self.output_oracle.is_none() {
            return Err(ConfigError::Missing("OUTPUT_ORACLE_ADDRESS"));
        }
        for (var, value) in [
            ("FETCH_INTERVAL", self.fetch_interval),
            ("RESOLUTION_WINDOW_SECS", self.resolution_window),
            ("CONFIRMATION_TIMEOUT_SECS", self.confirmation_timeout),
            ("FRAUD_QUORUM", self.quorum.fraud_threshold as u64),
            ("DEFENSE_QUORUM", self.quorum.defense_threshold as u64),
            ("MAX_CONCURRENT_CHALLENGES", self.max_concurrent_challenges as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        // An empty pool is allowed: detection and challenges still work, only
        // resolution needs signatures.
        let available = self.validator_keys.len();
        if available > 0 {
            for (var, required) in [
                ("FRAUD_QUORUM", self.quorum.fraud_threshold),
                ("DEFENSE_QUORUM", self.quorum.defense_threshold),
            ] {
                if required > available {
                    return Err(ConfigError::QuorumUnreachable { var, required, available });
                }
            }
        }
        self.signer_pool().map_err(|e| ConfigError::Invalid {
            var: "VALIDATOR_KEYS",
            value: "<redacted>".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Build the validator pool from the configured keys.
    pub fn signer_pool(&self) -> Result<SignerPool, SignerError> {
        SignerPool::from_hex_keys(&self.validator_keys.0)
    }

    /// [`Config::fetch_interval`] as a duration.
    pub const fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval)
    }

    /// [`Config::resolution_window`] as a duration.
    pub const fn resolution_window(&self) -> Duration {
        Duration::from_secs(self.resolution_window)
    }

    /// [`Config::confirmation_timeout`] as a duration.
    pub const fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout)
    }
}

fn parse_opt<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|value| {
            value.parse::<T>().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(get, var)?.unwrap_or(default))
}

//! Runtime configuration handed to the engine.
//!
//! These are plain data. Loading them from TOML or the process environment
//! is the job of `attest-config`; the engine only ever receives a value.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::outcome::ExecutionMode;

/// Sampler period used when nothing else is configured: one hour.
pub const DEFAULT_PERIOD_SECS: u64 = 60 * 60;

/// Sample root used when nothing else is configured.
pub const DEFAULT_ROOT_PATH: &str = "/tmp/contracts";

/// Settings for one contract type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSettings {
    /// When false, calls run the action and skip verification entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Width of the sampler's period bucket, in seconds. Falls back to
    /// `AttestConfig::default_period_secs` when unset.
    #[serde(default)]
    pub sample_period_secs: Option<u64>,

    /// Overrides the contract's declared default execution mode.
    #[serde(default)]
    pub mode: Option<ExecutionMode>,
}

fn default_enabled() -> bool {
    true
}

fn default_period_secs() -> u64 {
    DEFAULT_PERIOD_SECS
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_period_secs: None,
            mode: None,
        }
    }
}

/// Process-wide configuration for every contract the engine verifies.
///
/// Example in TOML:
/// ```toml
/// root_path = "/var/lib/attest"
/// default_period_secs = 3600
///
/// [contracts.SearchContract]
/// enabled = true
/// sample_period_secs = 600
/// mode = "sync"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestConfig {
    /// Directory the sampler writes snapshots under.
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Period applied to contracts without their own `sample_period_secs`.
    #[serde(default = "default_period_secs")]
    pub default_period_secs: u64,

    /// Per-contract settings keyed by contract name.
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractSettings>,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT_PATH)
}

impl Default for AttestConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            default_period_secs: DEFAULT_PERIOD_SECS,
            contracts: BTreeMap::new(),
        }
    }
}

impl AttestConfig {
    /// Settings for `contract_name`, or the defaults if it has none.
    pub fn settings_for(&self, contract_name: &str) -> ContractSettings {
        self.contracts.get(contract_name).cloned().unwrap_or_default()
    }

    /// Mutable settings for `contract_name`, created from the defaults if absent.
    pub fn settings_mut(&mut self, contract_name: &str) -> &mut ContractSettings {
        self.contracts.entry(contract_name.to_string()).or_default()
    }

    /// Whether verification is enabled for `contract_name`.
    pub fn is_enabled(&self, contract_name: &str) -> bool {
        self.contracts
            .get(contract_name)
            .map_or(true, |settings| settings.enabled)
    }

    /// The sampler period for `contract_name`, in seconds.
    pub fn period_secs_for(&self, contract_name: &str) -> u64 {
        self.contracts
            .get(contract_name)
            .and_then(|settings| settings.sample_period_secs)
            .unwrap_or(self.default_period_secs)
    }
}

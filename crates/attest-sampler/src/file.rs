//! Filesystem implementation of `Sampler`.
//!
//! `FileSampler` writes at most one snapshot per `(contract, rule, period)`
//! under a shared root directory. Different contracts and rules write into
//! disjoint subdirectories, so the only contention is between invocations
//! that hit the same key for the first time.
//!
//! The existence check and the write are two separate filesystem steps.
//! Two checkers racing on a fresh key may both write; the later write wins
//! and both snapshots describe an equally valid failing invocation. The
//! sampling budget is best-effort, not a hard limit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use attest_contracts::{
    clock::{Clock, SystemClock},
    config::DEFAULT_PERIOD_SECS,
    error::{AttestError, AttestResult},
    invocation::Invocation,
    traits::{Sampler, SnapshotFn},
};

use crate::{
    codec,
    key::{period_of, SampleKey},
};

/// What `FileSampler::read` should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleLocator {
    /// An explicit snapshot path.
    Path(PathBuf),
    /// The snapshot for `rule` in `period`, or in the current period if `None`.
    Rule { rule: String, period: Option<i64> },
}

/// Persists snapshots to `<root>/<contract>/<rule>/<period>.snapshot`.
pub struct FileSampler {
    root: PathBuf,
    contract_name: String,
    period_secs: u64,
    clock: Arc<dyn Clock>,
}

impl FileSampler {
    /// Create a sampler for `contract_name` writing under `root`, using the
    /// system clock.
    pub fn new(root: impl Into<PathBuf>, contract_name: impl Into<String>, period_secs: u64) -> Self {
        Self {
            root: root.into(),
            contract_name: contract_name.into(),
            period_secs: if period_secs == 0 { DEFAULT_PERIOD_SECS } else { period_secs },
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs
    }

    /// The period bucket the clock currently falls into.
    pub fn current_period(&self) -> i64 {
        period_of(self.clock.now(), self.period_secs)
    }

    /// Where the snapshot for `rule` lives, for `period` or the current period.
    pub fn sample_path(&self, rule: &str, period: Option<i64>) -> PathBuf {
        let period = period.unwrap_or_else(|| self.current_period());
        SampleKey::new(&self.contract_name, rule, period).path(&self.root)
    }

    /// Read the raw snapshot bytes at `path`.
    pub fn read_bytes(&self, path: &Path) -> AttestResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| AttestError::SampleReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load and decode a persisted snapshot for offline inspection.
    pub fn read<O: DeserializeOwned>(&self, locator: &SampleLocator) -> AttestResult<Invocation<O>> {
        let path = match locator {
            SampleLocator::Path(path) => path.clone(),
            SampleLocator::Rule { rule, period } => self.sample_path(rule, *period),
        };
        let bytes = self.read_bytes(&path)?;
        codec::deserialize(&bytes)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> AttestResult<()> {
        let write_failed = |e: std::io::Error| AttestError::SampleWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }
        std::fs::write(path, bytes).map_err(write_failed)
    }
}

impl Sampler for FileSampler {
    fn sample(&self, rule: &str, snapshot: &SnapshotFn<'_>) -> AttestResult<Option<PathBuf>> {
        let path = self.sample_path(rule, None);

        if path.exists() {
            debug!(
                contract = %self.contract_name,
                rule = %rule,
                path = %path.display(),
                "sample already taken this period"
            );
            return Ok(None);
        }

        let bytes = snapshot()?;
        self.write(&path, &bytes)?;

        info!(
            contract = %self.contract_name,
            rule = %rule,
            path = %path.display(),
            bytes = bytes.len(),
            "sample written"
        );
        Ok(Some(path))
    }
}

//! Sample keys and their on-disk location.
//!
//! A key is `(contract_name, rule, period)` where
//! `period = floor(unix_seconds / period_secs)`. Every invocation that lands
//! on the same key shares one file, which is what limits sampling to one
//! snapshot per rule per period.
//!
//! Layout: `<root>/<contract_name>/<rule>/<period>.snapshot`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// File extension of persisted snapshots.
pub const SNAPSHOT_EXTENSION: &str = "snapshot";

/// The period bucket `now` falls into.
///
/// A zero `period_secs` is treated as one second.
pub fn period_of(now: DateTime<Utc>, period_secs: u64) -> i64 {
    let size = i64::try_from(period_secs.max(1)).unwrap_or(i64::MAX);
    now.timestamp().div_euclid(size)
}

/// Identifies one sample slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub contract_name: String,
    pub rule: String,
    pub period: i64,
}

impl SampleKey {
    pub fn new(contract_name: impl Into<String>, rule: impl Into<String>, period: i64) -> Self {
        Self {
            contract_name: contract_name.into(),
            rule: rule.into(),
            period,
        }
    }

    /// Where this key's snapshot lives under `root`.
    ///
    /// Path separators inside the contract name or rule are replaced so a
    /// key can never escape its own directory.
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(path_segment(&self.contract_name))
            .join(path_segment(&self.rule))
            .join(format!("{}.{}", self.period, SNAPSHOT_EXTENSION))
    }
}

fn path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

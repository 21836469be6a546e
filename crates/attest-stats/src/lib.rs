//! # attest-stats
//!
//! Structured outcome records for the attest runtime.
//!
//! [`Statistics`] implements
//! [`StatisticsSink`](attest_contracts::traits::StatisticsSink): one
//! single-line `[contracts-match] <json>;` record per recorded outcome,
//! emitted at debug severity through a
//! [`LogBoundary`](attest_contracts::traits::LogBoundary). The default
//! boundary, [`TracingLog`], forwards lines to `tracing`.

pub mod record;
pub mod sink;

pub use record::{StatsRecord, LINE_PREFIX, TIME_FORMAT};
pub use sink::{Statistics, TracingLog};

// ── Tests ─────────────────────────────────────────────────────────────────────

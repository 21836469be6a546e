//! Collaborator traits the verification engine consumes.
//!
//! - `Sampler`: rate-limited persistence of invocation snapshots
//! - `StatisticsSink`: one structured record per recorded outcome
//! - `LogBoundary`: where statistics lines finally go
//!
//! The engine only talks to these traits. Default implementations live in
//! `attest-sampler` and `attest-stats`; tests substitute recording mocks.

use std::path::PathBuf;

use crate::{error::AttestResult, invocation::Meta};

/// Produces the serialized snapshot of the current invocation on demand.
///
/// The sampler only calls it when it is actually going to write.
pub type SnapshotFn<'a> = dyn Fn() -> AttestResult<Vec<u8>> + 'a;

/// Rate-limited diagnostic capture, bound to one contract.
pub trait Sampler: Send + Sync {
    /// Persist a snapshot for `rule` unless one already exists for the
    /// current period.
    ///
    /// Returns the path written, or `None` when the period's sample for
    /// `rule` already exists. `snapshot` is not called in that case.
    fn sample(&self, rule: &str, snapshot: &SnapshotFn<'_>) -> AttestResult<Option<PathBuf>>;
}

/// Structured outcome records, bound to one contract name.
pub trait StatisticsSink: Send + Sync {
    /// Emit one record for `rule`. `error` is the unexpected error's
    /// message, if any.
    fn log(&self, rule: &str, meta: &Meta, error: Option<&str>) -> AttestResult<()>;
}

/// The logging boundary statistics lines are written to.
///
/// Delivery failures are the boundary's own concern; callers never retry.
pub trait LogBoundary: Send + Sync {
    fn debug(&self, line: &str);
}

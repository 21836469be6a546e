//! Default `StatisticsSink` and `LogBoundary` implementations.
//!
//! `Statistics` formats records and hands the finished line to a
//! `LogBoundary`. It never buffers or retries: a line the boundary drops is
//! gone.

use std::sync::Arc;

use attest_contracts::{
    clock::{Clock, SystemClock},
    error::AttestResult,
    invocation::Meta,
    traits::{LogBoundary, StatisticsSink},
};

use crate::record::StatsRecord;

/// Writes statistics lines as `tracing` debug events on target `attest::stats`.
///
/// Install a subscriber with `RUST_LOG=attest::stats=debug` to see them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl LogBoundary for TracingLog {
    fn debug(&self, line: &str) {
        tracing::debug!(target: "attest::stats", "{}", line);
    }
}

/// The statistics sink for one contract.
pub struct Statistics {
    contract_name: String,
    logger: Arc<dyn LogBoundary>,
    clock: Arc<dyn Clock>,
}

impl Statistics {
    /// A sink for `contract_name` that writes through `TracingLog`.
    pub fn new(contract_name: impl Into<String>) -> Self {
        Self::with_logger(contract_name, Arc::new(TracingLog))
    }

    /// A sink for `contract_name` that writes through `logger`.
    pub fn with_logger(contract_name: impl Into<String>, logger: Arc<dyn LogBoundary>) -> Self {
        Self {
            contract_name: contract_name.into(),
            logger,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used to stamp records.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }
}

impl StatisticsSink for Statistics {
    fn log(&self, rule: &str, meta: &Meta, error: Option<&str>) -> AttestResult<()> {
        let record = StatsRecord {
            time: self.clock.now(),
            contract_name: &self.contract_name,
            rule,
            meta,
            error,
        };
        let line = record.to_line()?;
        self.logger.debug(&line);
        Ok(())
    }
}

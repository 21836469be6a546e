//! Runtime error types for the attest contract runtime.
//!
//! Contract violations (`Guarantees`, `Expectations`, `Unexpected`) carry
//! the invocation's `Meta` so the caller sees which predicates ran. The
//! remaining variants describe a broken diagnostic path or bad
//! configuration; they are operational bugs, not contract failures.

use thiserror::Error;

use crate::invocation::Meta;

/// Error raised by a predicate or a fallible wrapped action.
pub type PredicateError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a predicate returns: `Ok(true)` holds, `Ok(false)` does not.
pub type PredicateResult = Result<bool, PredicateError>;

/// The unified error type for the attest runtime.
#[derive(Debug, Error)]
pub enum AttestError {
    /// At least one guarantee returned false.
    #[error("guarantees failed for contract '{contract}' (checked: {})", .meta.checked.join(", "))]
    Guarantees { contract: String, meta: Box<Meta> },

    /// No expectation returned true.
    #[error("no expectation matched for contract '{contract}' (checked: {})", .meta.checked.join(", "))]
    Expectations { contract: String, meta: Box<Meta> },

    /// A predicate or the wrapped action raised an error during verification.
    #[error("unexpected error while verifying contract '{contract}': {source}")]
    Unexpected {
        contract: String,
        meta: Box<Meta>,
        #[source]
        source: PredicateError,
    },

    /// The sampler could not persist a snapshot.
    #[error("sample write failed at '{path}': {reason}")]
    SampleWriteFailed { path: String, reason: String },

    /// A persisted snapshot could not be read back.
    #[error("sample read failed at '{path}': {reason}")]
    SampleReadFailed { path: String, reason: String },

    /// A snapshot was read but its content is not a valid invocation.
    #[error("snapshot corrupt: {reason}")]
    SnapshotCorrupt { reason: String },

    /// A value could not be converted to or from its wire form.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The statistics sink could not build or emit a record.
    #[error("statistics write failed: {reason}")]
    StatsWriteFailed { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl AttestError {
    /// The audit trail attached to a contract violation, if this is one.
    pub fn meta(&self) -> Option<&Meta> {
        match self {
            AttestError::Guarantees { meta, .. }
            | AttestError::Expectations { meta, .. }
            | AttestError::Unexpected { meta, .. } => Some(meta),
            _ => None,
        }
    }

    /// True for the three contract-violation variants.
    pub fn is_contract_violation(&self) -> bool {
        self.meta().is_some()
    }
}

/// Convenience alias used throughout the attest crates.
pub type AttestResult<T> = Result<T, AttestError>;

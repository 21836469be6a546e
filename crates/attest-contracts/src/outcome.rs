//! Verification outcomes and execution modes.
//!
//! `Outcome` is what one run of the guarantee and expectation phases
//! produces. It is handed to the engine's completion path, which samples,
//! logs, and (in synchronous mode) turns failures into `AttestError`s.

use serde::{Deserialize, Serialize};

use crate::error::PredicateError;

/// Why an invocation failed its contract.
///
/// The string form is the rule tag used for sample paths and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A guarantee returned false.
    GuaranteeFailure,
    /// No expectation returned true.
    ExpectationFailure,
    /// A predicate or the wrapped action raised an error.
    UnexpectedError,
}

impl FailureKind {
    /// The rule tag for this failure class.
    pub fn rule(&self) -> &'static str {
        match self {
            FailureKind::GuaranteeFailure => "guarantee_failure",
            FailureKind::ExpectationFailure => "expectation_failure",
            FailureKind::UnexpectedError => "unexpected_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rule())
    }
}

/// The classified result of one verification run.
#[derive(Debug)]
pub enum Outcome {
    /// Guarantees held and an expectation was satisfied.
    ///
    /// `matched` names the expectation that satisfied the contract, or is
    /// `None` when the contract declares no expectations.
    Success { matched: Option<String> },

    /// The contract was violated or verification raised an error.
    ///
    /// `error` is only present for `FailureKind::UnexpectedError`.
    Failure {
        kind: FailureKind,
        error: Option<PredicateError>,
    },
}

impl Outcome {
    pub fn failure(kind: FailureKind) -> Self {
        Outcome::Failure { kind, error: None }
    }

    pub fn unexpected(error: PredicateError) -> Self {
        Outcome::Failure {
            kind: FailureKind::UnexpectedError,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The rule tag this outcome is recorded under, if it is recorded at all.
    ///
    /// A success without a matched expectation is not recorded.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Outcome::Success { matched } => matched.as_deref(),
            Outcome::Failure { kind, .. } => Some(kind.rule()),
        }
    }
}

/// Where verification runs relative to the caller.
///
/// In TOML and environment values this is spelled `"sync"` or `"async"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Verify inline; violations are returned to the caller.
    Sync,
    /// Verify on a background worker; the caller only gets the output.
    Async,
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(ExecutionMode::Sync),
            "async" | "asynchronous" => Ok(ExecutionMode::Async),
            other => Err(format!("unknown execution mode '{other}'")),
        }
    }
}

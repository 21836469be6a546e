//! The statistics wire format.
//!
//! Every record is one line:
//!
//! ```text
//! [contracts-match] {"time":"1990-01-01 00:00:00 UTC","contract_name":"c","rule":"r","meta":{...},"error":"..."};
//! ```
//!
//! Keys appear in exactly this order. `error` is omitted when absent.
//! Downstream parsers grep for the prefix and strip the trailing `;`, so
//! neither may change.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use attest_contracts::{
    error::{AttestError, AttestResult},
    invocation::Meta,
};

/// Marker every statistics line starts with.
pub const LINE_PREFIX: &str = "[contracts-match]";

/// Timestamp layout used in the `time` field.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One outcome record, borrowed from the caller's state.
#[derive(Debug, Serialize)]
pub struct StatsRecord<'a> {
    #[serde(serialize_with = "serialize_time")]
    pub time: DateTime<Utc>,
    pub contract_name: &'a str,
    pub rule: &'a str,
    pub meta: &'a Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl StatsRecord<'_> {
    /// Render the record as a complete wire line.
    pub fn to_line(&self) -> AttestResult<String> {
        let payload = serde_json::to_string(self).map_err(|e| AttestError::StatsWriteFailed {
            reason: format!("cannot encode record for rule '{}': {e}", self.rule),
        })?;
        Ok(format!("{LINE_PREFIX} {payload};"))
    }
}

fn serialize_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format(TIME_FORMAT))
}

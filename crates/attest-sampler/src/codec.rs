//! Snapshot codec: invocation to bytes and back.
//!
//! A snapshot is a JSON envelope:
//!
//! ```text
//! { "format": 1, "digest": "<sha256 hex>", "invocation": { ... } }
//! ```
//!
//! The digest is computed over the canonical JSON of the invocation, i.e.
//! the bytes `serde_json` produces for it as a `Value` (object keys sorted).
//! Hashing the `Value` form rather than the struct form means the reader
//! can recompute it from what it parsed, whatever the field order on disk.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use attest_contracts::{
    error::{AttestError, AttestResult},
    invocation::Invocation,
};

/// Envelope version written by this codec.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: u32,
    digest: String,
    invocation: Value,
}

/// Serialize `invocation` (input, output, meta and identity) into snapshot bytes.
pub fn serialize<O: Serialize>(invocation: &Invocation<O>) -> AttestResult<Vec<u8>> {
    let value = serde_json::to_value(invocation).map_err(|e| AttestError::Serialization {
        reason: format!("invocation is not serializable: {e}"),
    })?;
    let envelope = Envelope {
        format: FORMAT_VERSION,
        digest: digest_of(&value)?,
        invocation: value,
    };
    serde_json::to_vec(&envelope).map_err(|e| AttestError::Serialization {
        reason: format!("snapshot envelope is not serializable: {e}"),
    })
}

/// Parse snapshot bytes back into an invocation.
///
/// Fails with `SnapshotCorrupt` if the bytes are not an envelope, the format
/// is unknown, the digest does not match, or the invocation does not fit `O`.
pub fn deserialize<O: DeserializeOwned>(bytes: &[u8]) -> AttestResult<Invocation<O>> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(|e| corrupt(format!(
        "not a snapshot envelope: {e}"
    )))?;

    if envelope.format != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported snapshot format {} (expected {})",
            envelope.format, FORMAT_VERSION
        )));
    }

    let recomputed = digest_of(&envelope.invocation)?;
    if recomputed != envelope.digest {
        return Err(corrupt(format!(
            "digest mismatch: stored {}, computed {}",
            envelope.digest, recomputed
        )));
    }

    serde_json::from_value(envelope.invocation)
        .map_err(|e| corrupt(format!("invocation does not match the expected shape: {e}")))
}

/// Lowercase hex SHA-256 of the canonical JSON of `value`.
fn digest_of(value: &Value) -> AttestResult<String> {
    let canonical = serde_json::to_vec(value).map_err(|e| AttestError::Serialization {
        reason: format!("cannot canonicalize invocation: {e}"),
    })?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

fn corrupt(reason: String) -> AttestError {
    AttestError::SnapshotCorrupt { reason }
}

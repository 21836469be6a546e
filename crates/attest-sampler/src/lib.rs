//! # attest-sampler
//!
//! Rate-limited diagnostic snapshots for the attest runtime.
//!
//! ## Overview
//!
//! When a contract check is recorded, the engine asks the sampler to
//! persist the invocation. [`FileSampler`] keys every snapshot by contract,
//! rule, and time period, and writes at most one file per key. The file's
//! existence is the rate limiter. [`codec`] turns invocations into the
//! digest-protected bytes stored in those files and back.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use attest_sampler::{FileSampler, SampleLocator};
//!
//! let sampler = FileSampler::new("/tmp/contracts", "SearchContract", 3600);
//! let inv: Invocation<SearchResponse> = sampler.read(&SampleLocator::Rule {
//!     rule: "guarantee_failure".into(),
//!     period: None,
//! })?;
//! ```

pub mod codec;
pub mod file;
pub mod key;

pub use file::{FileSampler, SampleLocator};
pub use key::{period_of, SampleKey, SNAPSHOT_EXTENSION};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::path::Path;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};

    use attest_contracts::{
        clock::ManualClock,
        error::AttestError,
        invocation::{Input, Invocation},
        traits::Sampler,
    };

    use super::{codec, period_of, FileSampler, SampleKey, SampleLocator};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn frozen_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(1990, 1, 1, 10, 0, 1).unwrap(),
        ))
    }

    fn sampler(root: &Path, clock: Arc<ManualClock>) -> FileSampler {
        FileSampler::new(root, "contract_name", 3600).with_clock(clock)
    }

    fn make_invocation() -> Invocation<Value> {
        let input = Input::new()
            .arg("rust")
            .kwarg("limit", 10)
            .kwarg("filters", json!({ "lang": ["en", "de"], "ratio": 0.1 }));
        let mut inv = Invocation::new(
            "contract_name",
            input,
            Some(json!({ "statuses": [{ "id": 1, "score": 2.5e-3 }, { "id": 2 }] })),
            Utc.with_ymd_and_hms(1990, 1, 1, 10, 0, 1).unwrap(),
        );
        inv.mark_checked("response_structure");
        inv.mark_checked("empty_search");
        inv.note("tweets_count_without_user_id", 0);
        inv
    }

    // ── Period buckets and paths ──────────────────────────────────────────────

    /// 1990-01-01 10:00:01 UTC with hourly buckets is period 175330.
    #[test]
    fn test_period_bucket() {
        let now = Utc.with_ymd_and_hms(1990, 1, 1, 10, 0, 1).unwrap();
        assert_eq!(period_of(now, 3600), 175_330);
        assert_eq!(period_of(now, 0), now.timestamp());
    }

    #[test]
    fn test_period_floors_before_epoch() {
        let now = Utc.timestamp_opt(-1, 0).unwrap();
        assert_eq!(period_of(now, 3600), -1);
    }

    #[test]
    fn test_sample_path_layout() {
        let root = tempfile::tempdir().unwrap();
        let sampler = sampler(root.path(), frozen_clock());

        let path = sampler.sample_path("rule_name", None);
        assert_eq!(
            path,
            root.path().join("contract_name/rule_name/175330.snapshot")
        );
    }

    #[test]
    fn test_key_cannot_escape_root() {
        let root = Path::new("/tmp/contracts");
        let path = SampleKey::new("../evil", "a/b", 7).path(root);
        assert_eq!(path, root.join(".._evil/a_b/7.snapshot"));

        let path = SampleKey::new("c", "..", 7).path(root);
        assert_eq!(path, root.join("c/_../7.snapshot"));
    }

    // ── Sampling ──────────────────────────────────────────────────────────────

    /// The first sample in a period writes the snapshot bytes verbatim.
    #[test]
    fn test_sample_writes_snapshot() {
        let root = tempfile::tempdir().unwrap();
        let sampler = sampler(root.path(), frozen_clock());

        let path = sampler
            .sample("rule_name", &|| Ok(b"contract-content".to_vec()))
            .unwrap()
            .expect("first sample must be written");

        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"contract-content");
    }

    /// Same period → skipped without serializing; next period → new file.
    #[test]
    fn test_sample_once_per_period() {
        let root = tempfile::tempdir().unwrap();
        let clock = frozen_clock();
        let sampler = sampler(root.path(), Arc::clone(&clock));

        let first = sampler.sample("rule_name", &|| Ok(b"one".to_vec())).unwrap();
        assert!(first.is_some());

        let calls = Cell::new(0);
        clock.advance(Duration::minutes(30));
        let second = sampler
            .sample("rule_name", &|| {
                calls.set(calls.get() + 1);
                Ok(b"two".to_vec())
            })
            .unwrap();
        assert!(second.is_none(), "second sample in the same period must be skipped");
        assert_eq!(calls.get(), 0, "snapshot must not be built when skipped");
        assert_eq!(std::fs::read(first.as_ref().unwrap()).unwrap(), b"one");

        clock.advance(Duration::hours(1));
        let third = sampler.sample("rule_name", &|| Ok(b"three".to_vec())).unwrap();
        let third = third.expect("a new period must produce a new sample");
        assert_ne!(Some(&third), first.as_ref());
        assert_eq!(std::fs::read(third).unwrap(), b"three");
    }

    /// Different rules never share a slot.
    #[test]
    fn test_rules_are_independent() {
        let root = tempfile::tempdir().unwrap();
        let sampler = sampler(root.path(), frozen_clock());

        assert!(sampler.sample("guarantee_failure", &|| Ok(vec![1])).unwrap().is_some());
        assert!(sampler.sample("expectation_failure", &|| Ok(vec![2])).unwrap().is_some());
    }

    /// A failing snapshot function surfaces its error and writes nothing.
    #[test]
    fn test_snapshot_error_propagates() {
        let root = tempfile::tempdir().unwrap();
        let sampler = sampler(root.path(), frozen_clock());

        let err = sampler
            .sample("rule_name", &|| {
                Err(AttestError::Serialization {
                    reason: "nope".to_string(),
                })
            })
            .unwrap_err();

        assert!(matches!(err, AttestError::Serialization { .. }));
        assert!(!sampler.sample_path("rule_name", None).exists());
    }

    /// An unwritable root is a `SampleWriteFailed`, not a panic.
    #[test]
    fn test_unwritable_root() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let sampler = FileSampler::new(&blocker, "contract_name", 3600).with_clock(frozen_clock());
        let err = sampler.sample("rule_name", &|| Ok(vec![0])).unwrap_err();
        assert!(matches!(err, AttestError::SampleWriteFailed { .. }));
    }

    // ── Codec ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_codec_round_trip() {
        let inv = make_invocation();
        let bytes = codec::serialize(&inv).unwrap();
        let decoded: Invocation<Value> = codec::deserialize(&bytes).unwrap();

        assert_eq!(decoded, inv);
        assert_eq!(decoded.meta().checked, vec!["response_structure", "empty_search"]);
    }

    /// A note named after a fixed meta key must not break the snapshot.
    #[test]
    fn test_codec_round_trip_with_colliding_note() {
        let mut inv = make_invocation();
        inv.note("checked", "yes");

        let bytes = codec::serialize(&inv).unwrap();
        let decoded: Invocation<Value> = codec::deserialize(&bytes).unwrap();
        assert_eq!(decoded, inv);
        assert_eq!(decoded.meta().checked, vec!["response_structure", "empty_search"]);
        assert_eq!(decoded.meta().notes["note_checked"], json!("yes"));
    }

    #[test]
    fn test_codec_detects_tampering() {
        let inv = make_invocation();
        let bytes = codec::serialize(&inv).unwrap();

        let mut envelope: Value = serde_json::from_slice(&bytes).unwrap();
        envelope["invocation"]["meta"]["checked"] = json!(["forged"]);
        let tampered = serde_json::to_vec(&envelope).unwrap();

        let err = codec::deserialize::<Value>(&tampered).unwrap_err();
        match err {
            AttestError::SnapshotCorrupt { reason } => assert!(reason.contains("digest mismatch")),
            other => panic!("expected SnapshotCorrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_rejects_unknown_format() {
        let bytes = codec::serialize(&make_invocation()).unwrap();
        let mut envelope: Value = serde_json::from_slice(&bytes).unwrap();
        envelope["format"] = json!(99);

        let err = codec::deserialize::<Value>(&serde_json::to_vec(&envelope).unwrap()).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot format 99"));
    }

    #[test]
    fn test_codec_rejects_garbage() {
        let err = codec::deserialize::<Value>(b"contract-content").unwrap_err();
        assert!(matches!(err, AttestError::SnapshotCorrupt { .. }));
    }

    // ── Offline read ──────────────────────────────────────────────────────────

    /// A sampled invocation can be read back by path or by rule.
    #[test]
    fn test_read_back() {
        let root = tempfile::tempdir().unwrap();
        let sampler = sampler(root.path(), frozen_clock());
        let inv = make_invocation();

        let path = sampler
            .sample("guarantee_failure", &|| codec::serialize(&inv))
            .unwrap()
            .unwrap();

        let by_path: Invocation<Value> = sampler.read(&SampleLocator::Path(path)).unwrap();
        assert_eq!(by_path, inv);

        let by_rule: Invocation<Value> = sampler
            .read(&SampleLocator::Rule {
                rule: "guarantee_failure".to_string(),
                period: Some(175_330),
            })
            .unwrap();
        assert_eq!(by_rule, inv);
    }

    #[test]
    fn test_read_missing_sample() {
        let root = tempfile::tempdir().unwrap();
        let sampler = sampler(root.path(), frozen_clock());

        let err = sampler
            .read::<Value>(&SampleLocator::Rule {
                rule: "guarantee_failure".to_string(),
                period: None,
            })
            .unwrap_err();
        assert!(matches!(err, AttestError::SampleReadFailed { .. }));
    }
}

//! # attest-contracts
//!
//! Shared types, collaborator traits, and errors for the attest runtime.
//!
//! All crates in the workspace import from here. No verification logic
//! lives in this crate, only data definitions and the seams between crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod invocation;
pub mod outcome;
pub mod traits;

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use clock::{Clock, ManualClock};
    use config::{AttestConfig, ContractSettings, DEFAULT_PERIOD_SECS};
    use error::AttestError;
    use invocation::{Input, Invocation, Meta};
    use outcome::{ExecutionMode, FailureKind, Outcome};

    // ── Input ────────────────────────────────────────────────────────────────

    #[test]
    fn input_builder_keeps_positional_order() {
        let input = Input::new().arg("first").arg(2).kwarg("foo", true);

        assert_eq!(input.args, vec![json!("first"), json!(2)]);
        assert!(input.flag("foo"));
        assert!(!input.flag("missing"));
    }

    #[test]
    fn input_flag_ignores_non_boolean_values() {
        let input = Input::new().kwarg("foo", "yes");
        assert!(!input.flag("foo"));
        assert_eq!(input.get("foo"), Some(&json!("yes")));
    }

    // ── Invocation / Meta ────────────────────────────────────────────────────

    #[test]
    fn invocation_meta_starts_with_input_snapshot() {
        let input = Input::new().kwarg("query", "rust");
        let inv = Invocation::new("SearchContract", input.clone(), Some(1), Utc::now());

        assert_eq!(inv.meta().input, input);
        assert!(inv.meta().checked.is_empty());
        assert!(inv.meta().sample_path.is_none());
        assert_eq!(inv.output(), Some(&1));
    }

    #[test]
    fn meta_serializes_notes_flat_and_omits_missing_sample_path() {
        let mut inv: Invocation<()> = Invocation::new("c", Input::new(), None, Utc::now());
        inv.mark_checked("bar");
        inv.note("response_type", "Hash");

        let value = serde_json::to_value(inv.meta()).unwrap();
        assert_eq!(
            value,
            json!({
                "checked": ["bar"],
                "input": { "args": [], "kwargs": {} },
                "response_type": "Hash"
            })
        );
    }

    #[test]
    fn note_named_after_fixed_field_is_prefixed() {
        let mut inv: Invocation<()> = Invocation::new("c", Input::new(), None, Utc::now());
        inv.mark_checked("bar");
        inv.note("checked", "yes");
        inv.note("sample_path", 1);
        inv.note("input", json!([]));

        assert_eq!(inv.meta().checked, vec!["bar"]);
        assert!(inv.meta().sample_path.is_none());
        assert_eq!(inv.meta().notes["note_checked"], json!("yes"));
        assert_eq!(inv.meta().notes["note_sample_path"], json!(1));
        assert_eq!(inv.meta().notes["note_input"], json!([]));

        let json = serde_json::to_string(inv.meta()).unwrap();
        assert_eq!(json.matches("\"checked\"").count(), 1);
        let decoded: Meta = serde_json::from_str(&json).unwrap();
        assert_eq!(&decoded, inv.meta());
    }

    #[test]
    fn meta_round_trips_with_sample_path() {
        let mut meta = Meta::default();
        meta.checked.push("foo".to_string());
        meta.sample_path = Some("/tmp/contracts/c/foo/1.snapshot".to_string());
        meta.notes.insert("count".to_string(), json!(3));

        let json = serde_json::to_string(&meta).unwrap();
        let decoded: Meta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, decoded);
    }

    // ── Outcome ──────────────────────────────────────────────────────────────

    #[test]
    fn failure_kinds_map_to_rule_tags() {
        assert_eq!(FailureKind::GuaranteeFailure.rule(), "guarantee_failure");
        assert_eq!(FailureKind::ExpectationFailure.rule(), "expectation_failure");
        assert_eq!(FailureKind::UnexpectedError.rule(), "unexpected_error");
    }

    #[test]
    fn outcome_rule_uses_matched_expectation() {
        let matched = Outcome::Success {
            matched: Some("foo".to_string()),
        };
        assert_eq!(matched.rule(), Some("foo"));

        let vacuous = Outcome::Success { matched: None };
        assert_eq!(vacuous.rule(), None);
        assert!(vacuous.is_success());

        let failed = Outcome::failure(FailureKind::ExpectationFailure);
        assert_eq!(failed.rule(), Some("expectation_failure"));
    }

    #[test]
    fn execution_mode_parses_both_spellings() {
        assert_eq!("sync".parse::<ExecutionMode>(), Ok(ExecutionMode::Sync));
        assert_eq!("Asynchronous".parse::<ExecutionMode>(), Ok(ExecutionMode::Async));
        assert!("later".parse::<ExecutionMode>().is_err());
    }

    // ── Config ───────────────────────────────────────────────────────────────

    #[test]
    fn config_falls_back_to_defaults_for_unknown_contracts() {
        let config = AttestConfig::default();

        assert!(config.is_enabled("Unknown"));
        assert_eq!(config.period_secs_for("Unknown"), DEFAULT_PERIOD_SECS);
        assert_eq!(config.settings_for("Unknown"), ContractSettings::default());
    }

    #[test]
    fn config_period_prefers_contract_setting() {
        let mut config = AttestConfig {
            default_period_secs: 120,
            ..AttestConfig::default()
        };
        assert_eq!(config.period_secs_for("A"), 120);

        config.settings_mut("A").sample_period_secs = Some(30);
        assert_eq!(config.period_secs_for("A"), 30);
        assert_eq!(config.period_secs_for("B"), 120);
    }

    // ── Clock ────────────────────────────────────────────────────────────────

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let start = Utc.with_ymd_and_hms(1990, 1, 1, 10, 0, 1).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::hours(1));
        assert_eq!(clock.now(), start + Duration::hours(1));
    }

    // ── AttestError display messages ─────────────────────────────────────────

    #[test]
    fn error_guarantees_display_lists_checked() {
        let mut meta = Meta::default();
        meta.checked = vec!["bar".to_string()];
        let err = AttestError::Guarantees {
            contract: "Demo".to_string(),
            meta: Box::new(meta),
        };
        let msg = err.to_string();
        assert!(msg.contains("guarantees failed"));
        assert!(msg.contains("Demo"));
        assert!(msg.contains("bar"));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn error_unexpected_exposes_source() {
        let err = AttestError::Unexpected {
            contract: "Demo".to_string(),
            meta: Box::default(),
            source: "boom".into(),
        };
        assert!(err.to_string().contains("boom"));
        let source = std::error::Error::source(&err).expect("source must be kept");
        assert_eq!(source.to_string(), "boom");
    }

    #[test]
    fn error_sample_write_failed_is_not_a_violation() {
        let err = AttestError::SampleWriteFailed {
            path: "/tmp/x".to_string(),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));
        assert!(!err.is_contract_violation());
        assert!(err.meta().is_none());
    }
}

//! # attest-config
//!
//! Boundary configuration for the attest runtime.
//!
//! ## Overview
//!
//! Builds an [`AttestConfig`](attest_contracts::config::AttestConfig) from
//! defaults, an optional TOML file, and the process environment. Call it
//! once from `main` and pass the result to every engine.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! let config = attest_config::load(Some(Path::new("attest.toml")))?;
//! let engine = VerificationEngine::<SearchContract>::builder(&config).build();
//! ```

pub mod env;
pub mod loader;

pub use loader::{apply_env_vars, from_env, from_file, from_toml_str, load};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use attest_contracts::{
        config::{AttestConfig, DEFAULT_PERIOD_SECS, DEFAULT_ROOT_PATH},
        error::AttestError,
        outcome::ExecutionMode,
    };

    use crate::env::{classify, enable_var, is_enabled_value, period_var, EnvSetting};
    use crate::{apply_env_vars, from_file, from_toml_str};

    // ── 1. TOML loading ───────────────────────────────────────────────────────

    /// An empty document yields the built-in defaults.
    #[test]
    fn test_empty_toml_is_default() {
        let config = from_toml_str("").unwrap();
        assert_eq!(config, AttestConfig::default());
        assert_eq!(config.root_path, PathBuf::from(DEFAULT_ROOT_PATH));
        assert_eq!(config.default_period_secs, DEFAULT_PERIOD_SECS);
    }

    /// Per-contract tables override individual fields and keep the rest default.
    #[test]
    fn test_contract_table() {
        let toml = r#"
            root_path = "/var/lib/attest"
            default_period_secs = 900

            [contracts.SearchContract]
            enabled = false
            mode = "async"

            [contracts.BillingContract]
            sample_period_secs = 60
        "#;

        let config = from_toml_str(toml).unwrap();

        assert_eq!(config.root_path, PathBuf::from("/var/lib/attest"));
        assert!(!config.is_enabled("SearchContract"));
        assert_eq!(
            config.settings_for("SearchContract").mode,
            Some(ExecutionMode::Async)
        );
        assert_eq!(config.period_secs_for("SearchContract"), 900);
        assert!(config.is_enabled("BillingContract"));
        assert_eq!(config.period_secs_for("BillingContract"), 60);
    }

    /// Malformed TOML is a configuration error, not a panic.
    #[test]
    fn test_malformed_toml() {
        let err = from_toml_str("root_path = [").unwrap_err();
        assert!(matches!(err, AttestError::ConfigError { .. }));
    }

    /// A zero period would divide by zero when bucketing; reject it up front.
    #[test]
    fn test_zero_period_rejected() {
        let err = from_toml_str("default_period_secs = 0").unwrap_err();
        assert!(err.to_string().contains("default_period_secs"));

        let err = from_toml_str("[contracts.A]\nsample_period_secs = 0").unwrap_err();
        assert!(err.to_string().contains("contract 'A'"));
    }

    /// `from_file` reads the document from disk.
    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_period_secs = 42").unwrap();

        let config = from_file(file.path()).unwrap();
        assert_eq!(config.default_period_secs, 42);
    }

    /// A missing file names the path in the error.
    #[test]
    fn test_from_missing_file() {
        let err = from_file(std::path::Path::new("/nonexistent/attest.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/attest.toml"));
    }

    // ── 2. Environment overlay ────────────────────────────────────────────────

    /// Only explicit false-ish values disable a contract.
    #[test]
    fn test_enable_values() {
        for off in ["false", "FALSE", "0", "no", "Off", " disabled "] {
            assert!(!is_enabled_value(off), "{off:?} must disable");
        }
        for on in ["true", "1", "yes", "", "anything"] {
            assert!(is_enabled_value(on), "{on:?} must leave enabled");
        }
    }

    #[test]
    fn test_classify_variable_names() {
        assert_eq!(classify("CONTRACT_ROOT_PATH"), Some(EnvSetting::RootPath));
        assert_eq!(
            classify("ENABLE_SearchContract"),
            Some(EnvSetting::Enable { contract: "SearchContract" })
        );
        assert_eq!(
            classify("CONTRACT_SearchContract_SAMPLE_PERIOD_SIZE"),
            Some(EnvSetting::PeriodSize { contract: "SearchContract" })
        );
        assert_eq!(classify("ENABLE_"), None);
        assert_eq!(classify("CONTRACT__SAMPLE_PERIOD_SIZE"), None);
        assert_eq!(classify("PATH"), None);
        assert_eq!(enable_var("X"), "ENABLE_X");
        assert_eq!(period_var("X"), "CONTRACT_X_SAMPLE_PERIOD_SIZE");
    }

    /// Environment values override TOML values.
    #[test]
    fn test_env_overrides_toml() {
        let mut config = from_toml_str(
            r#"
            [contracts.SearchContract]
            enabled = true
            sample_period_secs = 600
            "#,
        )
        .unwrap();

        apply_env_vars(
            &mut config,
            [
                ("ENABLE_SearchContract", "false"),
                ("CONTRACT_SearchContract_SAMPLE_PERIOD_SIZE", "60"),
                ("CONTRACT_ROOT_PATH", "/srv/samples"),
                ("HOME", "/root"),
            ],
        )
        .unwrap();

        assert!(!config.is_enabled("SearchContract"));
        assert_eq!(config.period_secs_for("SearchContract"), 60);
        assert_eq!(config.root_path, PathBuf::from("/srv/samples"));
    }

    /// An unset enable flag leaves the contract enabled.
    #[test]
    fn test_unset_enable_flag_keeps_enabled() {
        let mut config = AttestConfig::default();
        apply_env_vars(&mut config, Vec::<(String, String)>::new()).unwrap();
        assert!(config.is_enabled("SearchContract"));
    }

    /// A non-numeric period is rejected with the variable name in the reason.
    #[test]
    fn test_bad_period_env() {
        let mut config = AttestConfig::default();
        let err = apply_env_vars(
            &mut config,
            [("CONTRACT_SearchContract_SAMPLE_PERIOD_SIZE", "hourly")],
        )
        .unwrap_err();

        match err {
            AttestError::ConfigError { reason } => {
                assert!(reason.contains("CONTRACT_SearchContract_SAMPLE_PERIOD_SIZE"));
                assert!(reason.contains("hourly"));
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }
}

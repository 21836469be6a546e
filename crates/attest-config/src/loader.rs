//! Configuration loading.
//!
//! Sources are layered in this order, later ones winning:
//!
//! 1. Built-in defaults (`AttestConfig::default()`)
//! 2. An optional TOML document
//! 3. The process environment (`ENABLE_*`, `CONTRACT_*`)
//!
//! Only binaries call into this module. The engine receives the resulting
//! `AttestConfig` and never reads the environment itself.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use attest_contracts::{
    config::AttestConfig,
    error::{AttestError, AttestResult},
};

use crate::env::{classify, is_enabled_value, EnvSetting};

/// Parse `s` as a TOML configuration document.
///
/// Returns `AttestError::ConfigError` if the TOML is malformed, does not
/// match the `AttestConfig` schema, or declares a zero-length period.
pub fn from_toml_str(s: &str) -> AttestResult<AttestConfig> {
    let config: AttestConfig = toml::from_str(s).map_err(|e| AttestError::ConfigError {
        reason: format!("failed to parse config TOML: {}", e),
    })?;
    validate(&config)?;
    Ok(config)
}

/// Read the file at `path` and parse it as TOML configuration.
pub fn from_file(path: &Path) -> AttestResult<AttestConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| AttestError::ConfigError {
        reason: format!("failed to read config file '{}': {}", path.display(), e),
    })?;
    from_toml_str(&contents)
}

/// Defaults overlaid with the current process environment.
pub fn from_env() -> AttestResult<AttestConfig> {
    let mut config = AttestConfig::default();
    apply_env_vars(&mut config, std::env::vars())?;
    Ok(config)
}

/// Load the optional TOML file at `path`, then overlay the process environment.
pub fn load(path: Option<&Path>) -> AttestResult<AttestConfig> {
    let mut config = match path {
        Some(path) => from_file(path)?,
        None => AttestConfig::default(),
    };
    apply_env_vars(&mut config, std::env::vars())?;
    Ok(config)
}

/// Overlay `vars` onto `config`.
///
/// Unrelated variables are ignored. A period size that is not a positive
/// integer is a `ConfigError`; the variable name is included in the reason.
pub fn apply_env_vars<I, K, V>(config: &mut AttestConfig, vars: I) -> AttestResult<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (name, value) in vars {
        let (name, value) = (name.as_ref(), value.as_ref());
        let Some(setting) = classify(name) else {
            continue;
        };

        match setting {
            EnvSetting::RootPath => {
                debug!(root_path = %value, "sample root set from environment");
                config.root_path = PathBuf::from(value);
            }
            EnvSetting::Enable { contract } => {
                let enabled = is_enabled_value(value);
                if !enabled {
                    warn!(contract = %contract, "contract verification disabled by environment");
                }
                config.settings_mut(contract).enabled = enabled;
            }
            EnvSetting::PeriodSize { contract } => {
                let period = parse_period(name, value)?;
                debug!(contract = %contract, period, "sample period set from environment");
                config.settings_mut(contract).sample_period_secs = Some(period);
            }
        }
    }
    Ok(())
}

fn parse_period(name: &str, value: &str) -> AttestResult<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(AttestError::ConfigError {
            reason: format!("{name} must be a positive integer number of seconds, got '{value}'"),
        }),
        Ok(period) => Ok(period),
    }
}

fn validate(config: &AttestConfig) -> AttestResult<()> {
    if config.default_period_secs == 0 {
        return Err(AttestError::ConfigError {
            reason: "default_period_secs must be greater than zero".to_string(),
        });
    }
    for (name, settings) in &config.contracts {
        if settings.sample_period_secs == Some(0) {
            return Err(AttestError::ConfigError {
                reason: format!("contract '{name}': sample_period_secs must be greater than zero"),
            });
        }
    }
    Ok(())
}

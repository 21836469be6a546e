//! Environment variable names and value parsing.
//!
//! Variables recognized, where `<Name>` is the contract name:
//!
//! - `ENABLE_<Name>`: a false-ish value disables the contract
//! - `CONTRACT_ROOT_PATH`: sample root directory
//! - `CONTRACT_<Name>_SAMPLE_PERIOD_SIZE`: period bucket in seconds

/// Sample root override.
pub const ROOT_PATH_VAR: &str = "CONTRACT_ROOT_PATH";

const ENABLE_PREFIX: &str = "ENABLE_";
const CONTRACT_PREFIX: &str = "CONTRACT_";
const PERIOD_SUFFIX: &str = "_SAMPLE_PERIOD_SIZE";

/// Values that explicitly switch a contract off. Compared case-insensitively.
const FALSE_VALUES: &[&str] = &["false", "0", "no", "off", "disabled"];

/// What a single environment variable configures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSetting<'a> {
    RootPath,
    Enable { contract: &'a str },
    PeriodSize { contract: &'a str },
}

/// Classify a variable name. Unrelated variables return `None`.
pub fn classify(name: &str) -> Option<EnvSetting<'_>> {
    if name == ROOT_PATH_VAR {
        return Some(EnvSetting::RootPath);
    }
    if let Some(contract) = name.strip_prefix(ENABLE_PREFIX) {
        if !contract.is_empty() {
            return Some(EnvSetting::Enable { contract });
        }
    }
    let contract = name
        .strip_prefix(CONTRACT_PREFIX)
        .and_then(|rest| rest.strip_suffix(PERIOD_SUFFIX))?;
    if contract.is_empty() {
        None
    } else {
        Some(EnvSetting::PeriodSize { contract })
    }
}

/// True unless `value` is one of the explicit false-ish spellings.
pub fn is_enabled_value(value: &str) -> bool {
    let value = value.trim();
    !FALSE_VALUES.iter().any(|f| f.eq_ignore_ascii_case(value))
}

/// The `ENABLE_*` variable name for `contract`.
pub fn enable_var(contract: &str) -> String {
    format!("{ENABLE_PREFIX}{contract}")
}

/// The `CONTRACT_*_SAMPLE_PERIOD_SIZE` variable name for `contract`.
pub fn period_var(contract: &str) -> String {
    format!("{CONTRACT_PREFIX}{contract}{PERIOD_SUFFIX}")
}

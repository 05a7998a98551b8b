//! Typed configuration models for the policy engine.

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_ARCHIVE_AGE_MINUTES, MAX_COPIES, POOL_NAME_MAX_LEN, RESERVED_POLICY_NAME,
    SIZE_CEILING_BYTES, TIME_CEILING_SECONDS,
};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard limits enforced by the validators.
    pub limits: EngineLimits,
    /// Defaults applied when optional inputs are omitted.
    pub defaults: WizardDefaults,
}

/// Hard limits enforced while validating policy input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Largest accepted size, in bytes, after unit normalisation.
    pub size_ceiling_bytes: u64,
    /// Largest accepted time value, in seconds, after unit normalisation.
    pub time_ceiling_seconds: u64,
    /// Maximum number of copies a policy may declare.
    pub max_copies: u8,
    /// Maximum length of a volume pool name.
    pub pool_name_max_len: usize,
    /// Policy name that may not be used for general policies.
    pub reserved_policy_name: String,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            size_ceiling_bytes: SIZE_CEILING_BYTES,
            time_ceiling_seconds: TIME_CEILING_SECONDS,
            max_copies: MAX_COPIES,
            pool_name_max_len: POOL_NAME_MAX_LEN,
            reserved_policy_name: RESERVED_POLICY_NAME.to_string(),
        }
    }
}

/// Defaults applied to omitted optional input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardDefaults {
    /// Archive age, in minutes, used for a blank field outside the wizard.
    pub archive_age_minutes: u64,
}

impl Default for WizardDefaults {
    fn default() -> Self {
        Self {
            archive_age_minutes: DEFAULT_ARCHIVE_AGE_MINUTES,
        }
    }
}

//! Validation helpers and parsing utilities for configuration documents.

use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{EngineConfig, EngineLimits, WizardDefaults};

const SECTION_ROOT: &str = "root";
const SECTION_LIMITS: &str = "limits";
const SECTION_DEFAULTS: &str = "defaults";

/// Parse and validate a configuration document, rejecting unknown keys.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownField`] for unexpected keys and
/// [`ConfigError::InvalidField`] for values outside their accepted range.
pub fn parse_document(value: &Value) -> ConfigResult<EngineConfig> {
    let root = ensure_object(value, SECTION_ROOT, "document")?;
    let mut config = EngineConfig::default();

    for (key, entry) in root {
        match key.as_str() {
            SECTION_LIMITS => config.limits = parse_limits(entry)?,
            SECTION_DEFAULTS => config.defaults = parse_defaults(entry)?,
            other => {
                return Err(ConfigError::UnknownField {
                    section: SECTION_ROOT.to_string(),
                    field: other.to_string(),
                });
            }
        }
    }

    Ok(config)
}

fn parse_limits(value: &Value) -> ConfigResult<EngineLimits> {
    let map = ensure_object(value, SECTION_LIMITS, "limits")?;
    let mut limits = EngineLimits::default();

    for (key, entry) in map {
        match key.as_str() {
            "size_ceiling_bytes" => {
                limits.size_ceiling_bytes = parse_u64_field(entry, SECTION_LIMITS, key, 1, u64::MAX)?;
            }
            "time_ceiling_seconds" => {
                limits.time_ceiling_seconds =
                    parse_u64_field(entry, SECTION_LIMITS, key, 1, u64::from(u32::MAX))?;
            }
            "max_copies" => {
                let copies = parse_u64_field(entry, SECTION_LIMITS, key, 1, 4)?;
                limits.max_copies = u8::try_from(copies).map_err(|_| {
                    ConfigError::invalid(
                        SECTION_LIMITS,
                        key,
                        Some(copies.to_string()),
                        "out_of_range",
                    )
                })?;
            }
            "pool_name_max_len" => {
                let len = parse_u64_field(entry, SECTION_LIMITS, key, 1, 255)?;
                limits.pool_name_max_len = usize::try_from(len).map_err(|_| {
                    ConfigError::invalid(SECTION_LIMITS, key, Some(len.to_string()), "out_of_range")
                })?;
            }
            "reserved_policy_name" => {
                limits.reserved_policy_name = parse_name_field(entry, SECTION_LIMITS, key)?;
            }
            other => {
                return Err(ConfigError::UnknownField {
                    section: SECTION_LIMITS.to_string(),
                    field: other.to_string(),
                });
            }
        }
    }

    Ok(limits)
}

fn parse_defaults(value: &Value) -> ConfigResult<WizardDefaults> {
    let map = ensure_object(value, SECTION_DEFAULTS, "defaults")?;
    let mut defaults = WizardDefaults::default();

    for (key, entry) in map {
        match key.as_str() {
            "archive_age_minutes" => {
                defaults.archive_age_minutes =
                    parse_u64_field(entry, SECTION_DEFAULTS, key, 1, u64::from(u32::MAX) / 60)?;
            }
            other => {
                return Err(ConfigError::UnknownField {
                    section: SECTION_DEFAULTS.to_string(),
                    field: other.to_string(),
                });
            }
        }
    }

    Ok(defaults)
}

pub(crate) fn ensure_object<'a>(
    value: &'a Value,
    section: &str,
    field: &str,
) -> ConfigResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ConfigError::invalid(section, field, None, "must_be_object"))
}

pub(crate) fn parse_u64_field(
    value: &Value,
    section: &str,
    field: &str,
    min: u64,
    max: u64,
) -> ConfigResult<u64> {
    let parsed = value.as_u64().ok_or_else(|| {
        ConfigError::invalid(section, field, Some(value.to_string()), "must_be_unsigned_integer")
    })?;

    if !(min..=max).contains(&parsed) {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(parsed.to_string()),
            "out_of_range",
        ));
    }

    Ok(parsed)
}

pub(crate) fn parse_name_field(value: &Value, section: &str, field: &str) -> ConfigResult<String> {
    let text = value.as_str().ok_or_else(|| {
        ConfigError::invalid(section, field, Some(value.to_string()), "must_be_string")
    })?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(section, field, None, "must_not_be_empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(trimmed.to_string()),
            "must_not_contain_whitespace",
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = parse_document(&json!({}))?;
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.limits.max_copies, 4);
        assert_eq!(config.limits.reserved_policy_name, "no_archive");
        Ok(())
    }

    #[test]
    fn overrides_are_applied() -> Result<(), Box<dyn std::error::Error>> {
        let config = parse_document(&json!({
            "limits": { "max_copies": 2, "pool_name_max_len": 24 },
            "defaults": { "archive_age_minutes": 10 }
        }))?;
        assert_eq!(config.limits.max_copies, 2);
        assert_eq!(config.limits.pool_name_max_len, 24);
        assert_eq!(config.defaults.archive_age_minutes, 10);
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_document(&json!({ "limits": { "retries": 3 } }));
        assert!(matches!(
            err,
            Err(ConfigError::UnknownField { ref section, ref field })
                if section == "limits" && field == "retries"
        ));
        assert!(matches!(
            parse_document(&json!({ "extra": true })),
            Err(ConfigError::UnknownField { .. })
        ));
    }

    #[test]
    fn out_of_range_copy_count_is_rejected() {
        let err = parse_document(&json!({ "limits": { "max_copies": 9 } }));
        assert!(matches!(
            err,
            Err(ConfigError::InvalidField { reason: "out_of_range", .. })
        ));
    }

    #[test]
    fn name_fields_reject_whitespace_and_non_strings() {
        assert!(matches!(
            parse_name_field(&json!("no archive"), "limits", "reserved_policy_name"),
            Err(ConfigError::InvalidField {
                reason: "must_not_contain_whitespace",
                ..
            })
        ));
        assert!(matches!(
            parse_name_field(&json!(7), "limits", "reserved_policy_name"),
            Err(ConfigError::InvalidField {
                reason: "must_be_string",
                ..
            })
        ));
    }

    #[test]
    fn non_object_sections_are_rejected() {
        assert!(matches!(
            parse_document(&json!({ "limits": [] })),
            Err(ConfigError::InvalidField {
                reason: "must_be_object",
                ..
            })
        ));
    }
}

//! Size and time fields expressed as a value plus a unit.
//!
//! # Design
//! - Raw form input is parsed once into `SizeValue` / `TimeValue`; callers
//!   never carry the strings past this layer.
//! - Comparisons and ceilings operate on normalised bytes or seconds in
//!   `u128`, so no multiplication can wrap.
//! - Pure functions: nothing here logs or touches the archive manager.

use std::fmt::{self, Display, Formatter};

use archpol_config::EngineLimits;
use serde::{Deserialize, Serialize};

use crate::error::{Field, FieldIssue, PolicyResult, invalid};

/// Binary size units accepted by the archiver (1 KB = 1024 B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeUnit {
    /// Bytes.
    #[serde(rename = "B")]
    Bytes,
    /// Kibibytes.
    #[serde(rename = "KB")]
    Kilobytes,
    /// Mebibytes.
    #[serde(rename = "MB")]
    Megabytes,
    /// Gibibytes.
    #[serde(rename = "GB")]
    Gigabytes,
    /// Tebibytes.
    #[serde(rename = "TB")]
    Terabytes,
    /// Pebibytes.
    #[serde(rename = "PB")]
    Petabytes,
}

impl SizeUnit {
    /// Every unit, smallest first.
    pub const ALL: [Self; 6] = [
        Self::Bytes,
        Self::Kilobytes,
        Self::Megabytes,
        Self::Gigabytes,
        Self::Terabytes,
        Self::Petabytes,
    ];

    /// Number of bytes in one unit.
    #[must_use]
    pub const fn multiplier(self) -> u64 {
        match self {
            Self::Bytes => 1,
            Self::Kilobytes => 1 << 10,
            Self::Megabytes => 1 << 20,
            Self::Gigabytes => 1 << 30,
            Self::Terabytes => 1 << 40,
            Self::Petabytes => 1 << 50,
        }
    }

    /// Canonical unit token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bytes => "B",
            Self::Kilobytes => "KB",
            Self::Megabytes => "MB",
            Self::Gigabytes => "GB",
            Self::Terabytes => "TB",
            Self::Petabytes => "PB",
        }
    }

    /// Parse a unit token case-insensitively.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(token))
    }
}

/// Time units accepted for ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
    /// Weeks.
    Weeks,
}

impl TimeUnit {
    /// Every unit, smallest first.
    pub const ALL: [Self; 5] = [
        Self::Seconds,
        Self::Minutes,
        Self::Hours,
        Self::Days,
        Self::Weeks,
    ];

    /// Number of seconds in one unit.
    #[must_use]
    pub const fn seconds(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
            Self::Weeks => 604_800,
        }
    }

    /// Single-letter suffix used by the archiver.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
            Self::Weeks => "w",
        }
    }

    /// Parse a suffix (`m`) or a name (`minutes`), case-insensitively.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Some(Self::Seconds),
            "m" | "min" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hour" | "hours" => Some(Self::Hours),
            "d" | "day" | "days" => Some(Self::Days),
            "w" | "week" | "weeks" => Some(Self::Weeks),
            _ => None,
        }
    }
}

/// A validated size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizeValue {
    value: u64,
    unit: SizeUnit,
}

impl SizeValue {
    /// Construct a size without ceiling checks.
    #[must_use]
    pub const fn new(value: u64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    /// Numeric part as entered.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Unit as entered.
    #[must_use]
    pub const fn unit(&self) -> SizeUnit {
        self.unit
    }

    /// Size normalised to bytes.
    #[must_use]
    pub const fn bytes(&self) -> u128 {
        self.value as u128 * self.unit.multiplier() as u128
    }
}

impl Display for SizeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

/// A validated duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeValue {
    value: u64,
    unit: TimeUnit,
}

impl TimeValue {
    /// Construct a duration without ceiling checks.
    #[must_use]
    pub const fn new(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Numeric part as entered.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Unit as entered.
    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Duration normalised to seconds.
    #[must_use]
    pub const fn seconds(&self) -> u128 {
        self.value as u128 * self.unit.seconds() as u128
    }
}

impl Display for TimeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

/// Validate a size field and its unit selection.
///
/// A blank optional field yields `Ok(None)`.
///
/// # Errors
///
/// `EmptyRequiredField`, `NotANumber`, `NegativeValue`, `MissingUnit`,
/// `UnknownUnit` or `RangeOverflow` on `field`.
pub fn validate_size(
    field: Field,
    raw: &str,
    unit: Option<&str>,
    required: bool,
    limits: &EngineLimits,
) -> PolicyResult<Option<SizeValue>> {
    let Some(value) = parse_quantity(field, raw, required)? else {
        return Ok(None);
    };
    let unit = parse_unit(field, unit, SizeUnit::parse)?;
    let size = SizeValue::new(value, unit);
    if size.bytes() > u128::from(limits.size_ceiling_bytes) {
        return Err(invalid(field, FieldIssue::RangeOverflow, Some(raw.trim())));
    }
    Ok(Some(size))
}

/// Check that `min <= max` after normalising both to bytes.
///
/// Either side may be absent; pairing rules stricter than that belong to the
/// caller.
///
/// # Errors
///
/// `MinGreaterThanMax` on `field` (the lower-bound field).
pub fn validate_pair(
    field: Field,
    min: Option<&SizeValue>,
    max: Option<&SizeValue>,
) -> PolicyResult<()> {
    match (min, max) {
        (Some(min), Some(max)) if min.bytes() > max.bytes() => Err(invalid(
            field,
            FieldIssue::MinGreaterThanMax,
            Some(&min.to_string()),
        )),
        _ => Ok(()),
    }
}

/// Validate a time field and its unit selection.
///
/// # Errors
///
/// Same issues as [`validate_size`], with the ceiling taken from
/// `limits.time_ceiling_seconds`.
pub fn validate_time(
    field: Field,
    raw: &str,
    unit: Option<&str>,
    required: bool,
    limits: &EngineLimits,
) -> PolicyResult<Option<TimeValue>> {
    let Some(value) = parse_quantity(field, raw, required)? else {
        return Ok(None);
    };
    let unit = parse_unit(field, unit, TimeUnit::parse)?;
    let time = TimeValue::new(value, unit);
    if time.seconds() > u128::from(limits.time_ceiling_seconds) {
        return Err(invalid(field, FieldIssue::RangeOverflow, Some(raw.trim())));
    }
    Ok(Some(time))
}

/// Validate a unitless non-negative count.
///
/// # Errors
///
/// `NotANumber`, `NegativeValue` or `RangeOverflow` on `field`.
pub fn validate_count(field: Field, raw: &str) -> PolicyResult<Option<u64>> {
    parse_quantity(field, raw, false)
}

/// Validate a percentage in `0..=100`.
///
/// # Errors
///
/// `NotANumber`, `NegativeValue` or `OutOfRange` on `field`.
pub fn validate_percent(field: Field, raw: &str) -> PolicyResult<Option<u8>> {
    let Some(value) = parse_quantity(field, raw, false)? else {
        return Ok(None);
    };
    match u8::try_from(value) {
        Ok(percent) if percent <= 100 => Ok(Some(percent)),
        _ => Err(invalid(field, FieldIssue::OutOfRange, Some(raw.trim()))),
    }
}

fn parse_quantity(field: Field, raw: &str, required: bool) -> PolicyResult<Option<u64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return if required {
            Err(invalid(field, FieldIssue::EmptyRequiredField, None))
        } else {
            Ok(None)
        };
    }

    match trimmed.parse::<i128>() {
        Ok(parsed) if parsed < 0 => Err(invalid(field, FieldIssue::NegativeValue, Some(trimmed))),
        Ok(parsed) => u64::try_from(parsed)
            .map(Some)
            .map_err(|_| invalid(field, FieldIssue::RangeOverflow, Some(trimmed))),
        Err(_) if is_integer_literal(trimmed) => {
            let issue = if trimmed.starts_with('-') {
                FieldIssue::NegativeValue
            } else {
                FieldIssue::RangeOverflow
            };
            Err(invalid(field, issue, Some(trimmed)))
        }
        Err(_) => Err(invalid(field, FieldIssue::NotANumber, Some(trimmed))),
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

fn parse_unit<U>(field: Field, unit: Option<&str>, parse: fn(&str) -> Option<U>) -> PolicyResult<U> {
    let token = unit.map(str::trim).filter(|token| !token.is_empty());
    let Some(token) = token else {
        return Err(invalid(field, FieldIssue::MissingUnit, None));
    };
    parse(token).ok_or_else(|| invalid(field, FieldIssue::UnknownUnit, Some(token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;

    fn limits() -> EngineLimits {
        EngineLimits::default()
    }

    fn issue_of<T: std::fmt::Debug>(result: PolicyResult<T>) -> Option<FieldIssue> {
        result.err().and_then(|err| err.issue())
    }

    #[test]
    fn size_units_are_binary_multiples() {
        assert_eq!(SizeUnit::Kilobytes.multiplier(), 1024);
        assert_eq!(SizeValue::new(2, SizeUnit::Megabytes).bytes(), 2 * 1024 * 1024);
        assert_eq!(SizeUnit::parse("gb"), Some(SizeUnit::Gigabytes));
        assert_eq!(SizeUnit::parse("XB"), None);
    }

    #[test]
    fn blank_sizes_respect_requiredness() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(validate_size(Field::MinSize, "  ", None, false, &limits())?, None);
        assert_eq!(
            issue_of(validate_size(Field::MinSize, "", Some("MB"), true, &limits())),
            Some(FieldIssue::EmptyRequiredField)
        );
        Ok(())
    }

    #[test]
    fn malformed_sizes_are_rejected_with_distinct_issues() {
        let limits = limits();
        assert_eq!(
            issue_of(validate_size(Field::MinSize, "12a", Some("MB"), false, &limits)),
            Some(FieldIssue::NotANumber)
        );
        assert_eq!(
            issue_of(validate_size(Field::MinSize, "-5", Some("MB"), false, &limits)),
            Some(FieldIssue::NegativeValue)
        );
        assert_eq!(
            issue_of(validate_size(Field::MinSize, "5", None, false, &limits)),
            Some(FieldIssue::MissingUnit)
        );
        assert_eq!(
            issue_of(validate_size(Field::MinSize, "5", Some("ZB"), false, &limits)),
            Some(FieldIssue::UnknownUnit)
        );
    }

    #[test]
    fn size_ceiling_is_about_7813_petabytes() -> Result<(), Box<dyn std::error::Error>> {
        let limits = limits();
        let accepted = validate_size(Field::MaxSize, "7812", Some("PB"), false, &limits)?;
        assert_eq!(accepted.map(|size| size.value()), Some(7812));
        assert_eq!(
            issue_of(validate_size(Field::MaxSize, "7813", Some("PB"), false, &limits)),
            Some(FieldIssue::RangeOverflow)
        );
        assert_eq!(
            issue_of(validate_size(
                Field::MaxSize,
                "999999999999999999999999999999999999999999",
                Some("B"),
                false,
                &limits
            )),
            Some(FieldIssue::RangeOverflow)
        );
        Ok(())
    }

    #[test]
    fn pair_ordering_compares_normalised_bytes() {
        let one_gb = SizeValue::new(1, SizeUnit::Gigabytes);
        let thousand_mb = SizeValue::new(1000, SizeUnit::Megabytes);
        assert!(validate_pair(Field::MinSize, Some(&thousand_mb), Some(&one_gb)).is_ok());
        let err = validate_pair(Field::MinSize, Some(&one_gb), Some(&thousand_mb));
        assert!(matches!(
            err,
            Err(PolicyError::InvalidField {
                field: Field::MinSize,
                issue: FieldIssue::MinGreaterThanMax,
                ..
            })
        ));
        assert!(validate_pair(Field::MinSize, Some(&one_gb), Some(&one_gb)).is_ok());
        assert!(validate_pair(Field::MinSize, None, Some(&one_gb)).is_ok());
        assert!(validate_pair(Field::MinSize, Some(&one_gb), None).is_ok());
    }

    #[test]
    fn time_fields_use_their_own_ceiling() -> Result<(), Box<dyn std::error::Error>> {
        let limits = limits();
        let four_minutes = validate_time(Field::ArchiveAge, "4", Some("minutes"), true, &limits)?;
        assert_eq!(four_minutes.map(|time| time.seconds()), Some(240));
        assert_eq!(
            issue_of(validate_time(Field::ArchiveAge, "2147483647", Some("s"), true, &limits)),
            Some(FieldIssue::RangeOverflow)
        );
        assert_eq!(
            issue_of(validate_time(Field::ArchiveAge, "4", Some("fortnight"), true, &limits)),
            Some(FieldIssue::UnknownUnit)
        );
        Ok(())
    }

    #[test]
    fn percent_and_count_helpers() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(validate_percent(Field::MinGain, "100")?, Some(100));
        assert_eq!(validate_percent(Field::MinGain, "")?, None);
        assert_eq!(
            issue_of(validate_percent(Field::MinGain, "101")),
            Some(FieldIssue::OutOfRange)
        );
        assert_eq!(validate_count(Field::StartCount, "0")?, Some(0));
        assert_eq!(
            issue_of(validate_count(Field::StartCount, "-1")),
            Some(FieldIssue::NegativeValue)
        );
        Ok(())
    }

    #[test]
    fn display_uses_archiver_suffixes() {
        assert_eq!(SizeValue::new(10, SizeUnit::Megabytes).to_string(), "10MB");
        assert_eq!(TimeValue::new(4, TimeUnit::Minutes).to_string(), "4m");
    }
}

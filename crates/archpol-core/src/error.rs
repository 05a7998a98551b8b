//! # Design
//!
//! - Provide structured, constant-message errors for policy validation.
//! - Name the offending field and a stable issue code so front ends can
//!   render errors inline next to the right input.
//! - Classify every error into the taxonomy used by callers to
//!   decide between inline messages, duplicate prompts and result pages.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use thiserror::Error;

use crate::copy::CopyState;
use crate::manager::ManagerError;

/// Result type for policy engine operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Error code reported for internal invariant violations.
pub const INTERNAL_ERROR_CODE: i32 = 8_001_234;

/// Input field an error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Policy name.
    PolicyName,
    /// Number of copies declared for the policy.
    CopyCount,
    /// Copy number addressed by a step.
    CopyNumber,
    /// Criteria starting directory.
    StartingDirectory,
    /// Criteria file name pattern.
    NamePattern,
    /// Criteria minimum size.
    MinSize,
    /// Criteria maximum size.
    MaxSize,
    /// Criteria access age.
    AccessAge,
    /// Criteria owner.
    Owner,
    /// Criteria group.
    Group,
    /// File systems the policy applies to.
    FileSystems,
    /// Copy archive age.
    ArchiveAge,
    /// Copy expiration age.
    ExpirationAge,
    /// Primary media pool.
    MediaPool,
    /// Scratch pool.
    ScratchPool,
    /// Explicit VSN expression.
    VsnExpression,
    /// Offline copy method.
    OfflineCopy,
    /// Drive count.
    Drives,
    /// Minimum size for multiple drives.
    DriveMin,
    /// Maximum size for multiple drives.
    DriveMax,
    /// Archiving start age.
    StartAge,
    /// Archiving start count.
    StartCount,
    /// Archiving start size.
    StartSize,
    /// Disk recycling high-water mark.
    RecycleHighWaterMark,
    /// Disk recycling minimum gain.
    MinGain,
    /// Recycling notification address.
    NotifyAddress,
    /// Volume pool name.
    PoolName,
}

impl Field {
    /// Stable identifier used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PolicyName => "policy_name",
            Self::CopyCount => "copy_count",
            Self::CopyNumber => "copy_number",
            Self::StartingDirectory => "starting_directory",
            Self::NamePattern => "name_pattern",
            Self::MinSize => "min_size",
            Self::MaxSize => "max_size",
            Self::AccessAge => "access_age",
            Self::Owner => "owner",
            Self::Group => "group",
            Self::FileSystems => "file_systems",
            Self::ArchiveAge => "archive_age",
            Self::ExpirationAge => "expiration_age",
            Self::MediaPool => "media_pool",
            Self::ScratchPool => "scratch_pool",
            Self::VsnExpression => "vsn_expression",
            Self::OfflineCopy => "offline_copy",
            Self::Drives => "drives",
            Self::DriveMin => "drive_min",
            Self::DriveMax => "drive_max",
            Self::StartAge => "start_age",
            Self::StartCount => "start_count",
            Self::StartSize => "start_size",
            Self::RecycleHighWaterMark => "recycle_hwm",
            Self::MinGain => "min_gain",
            Self::NotifyAddress => "notify_address",
            Self::PoolName => "pool_name",
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldIssue {
    /// Mandatory field left blank.
    EmptyRequiredField,
    /// Value is not an integer.
    NotANumber,
    /// Value is below zero.
    NegativeValue,
    /// Numeric value given without a unit.
    MissingUnit,
    /// Unit token not recognised.
    UnknownUnit,
    /// Normalised value exceeds the accepted ceiling.
    RangeOverflow,
    /// Lower bound is greater than the upper bound.
    MinGreaterThanMax,
    /// Only one side of a both-or-neither pair was given.
    PairIncomplete,
    /// Age must be strictly positive.
    InvalidAge,
    /// Value outside its accepted range.
    OutOfRange,
    /// Policy name left blank.
    EmptyPolicyName,
    /// Policy name contains whitespace.
    PolicyNameHasSpace,
    /// Policy name ends with `*`.
    PolicyNameEndsWithAsterisk,
    /// Policy name equals the reserved no-archive name.
    PolicyNameReserved,
    /// Policy name has characters outside the accepted set.
    InvalidPolicyName,
    /// Path starts with `/`.
    AbsolutePathNotAllowed,
    /// Value contains whitespace.
    ContainsWhitespace,
    /// Pattern does not compile.
    InvalidPattern,
    /// User does not exist on the server.
    UnknownUser,
    /// Group does not exist on the server.
    UnknownGroup,
    /// No file system was selected.
    NoFileSystemSelected,
    /// Notification address is malformed.
    InvalidMailAddress,
    /// Pool name has characters outside the accepted set.
    InvalidPoolName,
    /// Pool name is longer than allowed.
    PoolNameTooLong,
    /// Pool is not known for the media type.
    UnknownPool,
    /// Pool or option belongs to another media type.
    MediaTypeMismatch,
    /// Composite value could not be parsed.
    MalformedReference,
    /// Offline copy method not recognised.
    UnknownOfflineCopy,
    /// Copy number or count outside `1..=max_copies`.
    CopyNumberOutOfRange,
    /// Copy numbers are not contiguous from 1.
    MissingCopy,
    /// Copy has no media assignment.
    MissingMedia,
    /// Copy was not committed, or was reopened after committing.
    UncommittedCopy,
}

impl FieldIssue {
    /// Stable identifier used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyRequiredField => "empty_required_field",
            Self::NotANumber => "not_a_number",
            Self::NegativeValue => "negative_value",
            Self::MissingUnit => "missing_unit",
            Self::UnknownUnit => "unknown_unit",
            Self::RangeOverflow => "range_overflow",
            Self::MinGreaterThanMax => "min_greater_than_max",
            Self::PairIncomplete => "pair_incomplete",
            Self::InvalidAge => "invalid_age",
            Self::OutOfRange => "out_of_range",
            Self::EmptyPolicyName => "empty_policy_name",
            Self::PolicyNameHasSpace => "policy_name_has_space",
            Self::PolicyNameEndsWithAsterisk => "policy_name_ends_with_asterisk",
            Self::PolicyNameReserved => "policy_name_reserved",
            Self::InvalidPolicyName => "invalid_policy_name",
            Self::AbsolutePathNotAllowed => "absolute_path_not_allowed",
            Self::ContainsWhitespace => "contains_whitespace",
            Self::InvalidPattern => "invalid_pattern",
            Self::UnknownUser => "unknown_user",
            Self::UnknownGroup => "unknown_group",
            Self::NoFileSystemSelected => "no_file_system_selected",
            Self::InvalidMailAddress => "invalid_mail_address",
            Self::InvalidPoolName => "invalid_pool_name",
            Self::PoolNameTooLong => "pool_name_too_long",
            Self::UnknownPool => "unknown_pool",
            Self::MediaTypeMismatch => "media_type_mismatch",
            Self::MalformedReference => "malformed_reference",
            Self::UnknownOfflineCopy => "unknown_offline_copy",
            Self::CopyNumberOutOfRange => "copy_number_out_of_range",
            Self::MissingCopy => "missing_copy",
            Self::MissingMedia => "missing_media",
            Self::UncommittedCopy => "uncommitted_copy",
        }
    }
}

impl Display for FieldIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification that decides how a caller surfaces an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Inline, field-specific, blocks only the current step.
    FieldValidation,
    /// The user must change a name or criteria.
    Duplicate,
    /// The archive manager did not complete the operation.
    BackendFailure,
    /// A value the engine should already have validated was malformed.
    InternalInvariant,
}

/// Errors produced by the policy engine.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A field failed validation.
    #[error("invalid value for '{field}': {issue}")]
    InvalidField {
        /// Field that failed validation.
        field: Field,
        /// Reason for the failure.
        issue: FieldIssue,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Policy name already exists on the server.
    #[error("policy name already exists")]
    DuplicatePolicyName {
        /// Conflicting name.
        name: String,
    },
    /// Criteria overlap an existing policy's criteria.
    #[error("criteria duplicate an existing policy")]
    DuplicateCriteria {
        /// Explanation returned by the archive manager.
        criteria: String,
        /// Policy owning the conflicting criteria.
        policy: String,
    },
    /// Volume pool name already exists, regardless of media type.
    #[error("volume pool name already exists")]
    DuplicatePoolName {
        /// Conflicting name.
        name: String,
    },
    /// The archive manager failed.
    #[error("archive manager operation failed")]
    Backend {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying manager error.
        source: ManagerError,
    },
    /// A copy step was applied before its prerequisites.
    #[error("copy step applied out of order")]
    InvalidTransition {
        /// Copy number addressed.
        copy: u8,
        /// State the copy was in.
        state: CopyState,
        /// Step that was attempted.
        step: &'static str,
    },
    /// A previously validated value could not be interpreted.
    #[error("internal invariant violated")]
    Internal {
        /// Operation that detected the violation.
        operation: &'static str,
        /// Detail for logs.
        detail: String,
    },
}

impl PolicyError {
    /// Taxonomy class for this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidField { .. } => ErrorClass::FieldValidation,
            Self::DuplicatePolicyName { .. }
            | Self::DuplicateCriteria { .. }
            | Self::DuplicatePoolName { .. } => ErrorClass::Duplicate,
            Self::Backend { .. } => ErrorClass::BackendFailure,
            Self::InvalidTransition { .. } | Self::Internal { .. } => {
                ErrorClass::InternalInvariant
            }
        }
    }

    /// Field the error is attached to, if any.
    #[must_use]
    pub const fn field(&self) -> Option<Field> {
        match self {
            Self::InvalidField { field, .. } => Some(*field),
            Self::DuplicatePolicyName { .. } => Some(Field::PolicyName),
            Self::DuplicatePoolName { .. } => Some(Field::PoolName),
            _ => None,
        }
    }

    /// Field issue, for field validation errors.
    #[must_use]
    pub const fn issue(&self) -> Option<FieldIssue> {
        match self {
            Self::InvalidField { issue, .. } => Some(*issue),
            _ => None,
        }
    }
}

pub(crate) fn invalid(field: Field, issue: FieldIssue, value: Option<&str>) -> PolicyError {
    PolicyError::InvalidField {
        field,
        issue,
        value: value.map(str::to_string),
    }
}

pub(crate) fn backend(operation: &'static str, source: ManagerError) -> PolicyError {
    PolicyError::Backend { operation, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_field_exposes_field_and_issue() {
        let err = invalid(Field::MinSize, FieldIssue::MinGreaterThanMax, Some("100"));
        assert_eq!(err.class(), ErrorClass::FieldValidation);
        assert_eq!(err.field(), Some(Field::MinSize));
        assert_eq!(err.issue(), Some(FieldIssue::MinGreaterThanMax));
        assert_eq!(
            err.to_string(),
            "invalid value for 'min_size': min_greater_than_max"
        );
    }

    #[test]
    fn duplicates_and_backend_errors_are_classified() {
        let dup = PolicyError::DuplicatePoolName {
            name: "pool1".into(),
        };
        assert_eq!(dup.class(), ErrorClass::Duplicate);
        assert_eq!(dup.field(), Some(Field::PoolName));
        assert!(dup.issue().is_none());

        let failure = backend(
            "create_archive_policy",
            ManagerError::Failure {
                code: 30_001,
                message: "archiver busy".into(),
            },
        );
        assert_eq!(failure.class(), ErrorClass::BackendFailure);
        assert!(failure.field().is_none());
    }

    #[test]
    fn transitions_are_internal_invariants() {
        let err = PolicyError::InvalidTransition {
            copy: 2,
            state: CopyState::Uninitialized,
            step: "set_media",
        };
        assert_eq!(err.class(), ErrorClass::InternalInvariant);
    }
}

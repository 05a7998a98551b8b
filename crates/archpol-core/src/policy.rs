//! Policy naming, request assembly and submission.
//!
//! # Design
//! - `PolicyBuilder` is the only way to obtain a `PolicyCreationRequest`;
//!   the request is immutable once built.
//! - Name checks run in a fixed order so the first reported issue is stable.
//! - Backend warnings are submission outcomes, not errors.

use serde::Serialize;
use tracing::{info, warn};

use archpol_config::EngineLimits;

use crate::context::EngineContext;
use crate::copy::CopyDescriptor;
use crate::criteria::PolicyCriteria;
use crate::error::{Field, FieldIssue, PolicyError, PolicyResult, backend, invalid};
use crate::manager::{ArchiveManager, ManagerError};

/// Code reported when the manager fails without one of its own.
pub const UNKNOWN_BACKEND_CODE: i32 = -1;

/// Kind of archive policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Policy with archive copies.
    General,
    /// The reserved policy that excludes files from archiving.
    NoArchive,
}

/// Validate a new general policy name against the naming rules and the
/// existing policies. Returns the trimmed name.
///
/// # Errors
///
/// `EmptyPolicyName`, `PolicyNameHasSpace`, `PolicyNameEndsWithAsterisk`,
/// `PolicyNameReserved`, `InvalidPolicyName` or `DuplicatePolicyName`, in that
/// order.
pub fn validate_policy_name(
    name: &str,
    existing: &[String],
    limits: &EngineLimits,
) -> PolicyResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid(Field::PolicyName, FieldIssue::EmptyPolicyName, None));
    }
    let issue = if name.chars().any(char::is_whitespace) {
        Some(FieldIssue::PolicyNameHasSpace)
    } else if name.ends_with('*') {
        Some(FieldIssue::PolicyNameEndsWithAsterisk)
    } else if name == limits.reserved_policy_name {
        Some(FieldIssue::PolicyNameReserved)
    } else if !is_identifier(name) {
        Some(FieldIssue::InvalidPolicyName)
    } else {
        None
    };
    if let Some(issue) = issue {
        return Err(invalid(Field::PolicyName, issue, Some(name)));
    }
    if existing.iter().any(|policy| policy == name) {
        return Err(PolicyError::DuplicatePolicyName {
            name: name.to_string(),
        });
    }
    Ok(name.to_string())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Assembles a creation request from validated parts.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    name: String,
    description: String,
    kind: PolicyKind,
    copy_count: u8,
}

impl PolicyBuilder {
    /// Start a general policy declaring `copy_count` copies.
    ///
    /// # Errors
    ///
    /// Name errors from [`validate_policy_name`].
    pub fn general(
        name: &str,
        copy_count: u8,
        existing: &[String],
        limits: &EngineLimits,
    ) -> PolicyResult<Self> {
        Ok(Self {
            name: validate_policy_name(name, existing, limits)?,
            description: String::new(),
            kind: PolicyKind::General,
            copy_count,
        })
    }

    /// Start the reserved no-archive policy.
    ///
    /// # Errors
    ///
    /// `DuplicatePolicyName` when it already exists.
    pub fn no_archive(existing: &[String], limits: &EngineLimits) -> PolicyResult<Self> {
        let name = limits.reserved_policy_name.clone();
        if existing.contains(&name) {
            return Err(PolicyError::DuplicatePolicyName { name });
        }
        Ok(Self {
            name,
            description: String::new(),
            kind: PolicyKind::NoArchive,
            copy_count: 0,
        })
    }

    /// Attach a free-form description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Policy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Policy kind.
    #[must_use]
    pub const fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Check copies and file systems, ask the manager for duplicate
    /// criteria, and freeze the request.
    ///
    /// Copies are taken in number order and must be exactly `1..=n`, where
    /// `n` is the declared copy count.
    ///
    /// # Errors
    ///
    /// `NoFileSystemSelected`, `MissingCopy`, `CopyNumberOutOfRange`,
    /// `MissingMedia`, `OutOfRange` on
    /// the copy count for a no-archive policy with copies,
    /// `DuplicateCriteria`, or a backend error from the duplicate lookup.
    pub fn build(
        self,
        criteria: PolicyCriteria,
        mut copies: Vec<CopyDescriptor>,
        file_systems: &[String],
        manager: &dyn ArchiveManager,
    ) -> PolicyResult<PolicyCreationRequest> {
        let file_systems: Vec<String> = file_systems
            .iter()
            .map(|fs| fs.trim())
            .filter(|fs| !fs.is_empty())
            .map(str::to_string)
            .collect();
        if file_systems.is_empty() {
            return Err(invalid(
                Field::FileSystems,
                FieldIssue::NoFileSystemSelected,
                None,
            ));
        }

        copies.sort_by_key(CopyDescriptor::number);
        match self.kind {
            PolicyKind::NoArchive if !copies.is_empty() => {
                return Err(invalid(
                    Field::CopyCount,
                    FieldIssue::OutOfRange,
                    Some(&copies.len().to_string()),
                ));
            }
            PolicyKind::NoArchive => {}
            PolicyKind::General => check_copies(&copies, self.copy_count)?,
        }

        let check = manager
            .find_duplicate_criteria(&criteria, &file_systems, false)
            .map_err(|source| backend("find_duplicate_criteria", source))?;
        if check.duplicate {
            return Err(PolicyError::DuplicateCriteria {
                criteria: check.explanation.unwrap_or_default(),
                policy: check.conflicting_policy.unwrap_or_default(),
            });
        }

        for copy in &mut copies {
            copy.mark_for_save();
        }
        Ok(PolicyCreationRequest {
            name: self.name,
            description: self.description,
            kind: self.kind,
            criteria,
            copies,
            file_systems,
        })
    }
}

fn check_copies(copies: &[CopyDescriptor], declared: u8) -> PolicyResult<()> {
    if let Some(extra) = copies.iter().find(|copy| copy.number().get() > declared) {
        return Err(invalid(
            Field::CopyNumber,
            FieldIssue::CopyNumberOutOfRange,
            Some(&extra.number().to_string()),
        ));
    }
    for expected in 1..=declared {
        let copy = copies
            .get(usize::from(expected - 1))
            .filter(|copy| copy.number().get() == expected)
            .ok_or_else(|| {
                invalid(
                    Field::CopyNumber,
                    FieldIssue::MissingCopy,
                    Some(&expected.to_string()),
                )
            })?;
        if copy.media().is_none() {
            return Err(invalid(
                Field::MediaPool,
                FieldIssue::MissingMedia,
                Some(&expected.to_string()),
            ));
        }
    }
    Ok(())
}

/// Immutable policy creation request handed to the archive manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyCreationRequest {
    name: String,
    description: String,
    kind: PolicyKind,
    criteria: PolicyCriteria,
    copies: Vec<CopyDescriptor>,
    file_systems: Vec<String>,
}

impl PolicyCreationRequest {
    /// Policy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Policy kind.
    #[must_use]
    pub const fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// File-selection criteria.
    #[must_use]
    pub const fn criteria(&self) -> &PolicyCriteria {
        &self.criteria
    }

    /// Copies, ordered by copy number.
    #[must_use]
    pub fn copies(&self) -> &[CopyDescriptor] {
        &self.copies
    }

    /// File systems the policy applies to.
    #[must_use]
    pub fn file_systems(&self) -> &[String] {
        &self.file_systems
    }
}

/// How the archive manager answered a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The policy was created.
    Created,
    /// The policy was created with caveats.
    Warning {
        /// Warning messages.
        messages: Vec<String>,
    },
    /// The policy was not created.
    Failed {
        /// Manager error code.
        code: i32,
        /// Manager message.
        message: String,
    },
}

/// Hand a request to the manager. Never retries.
pub fn submit(
    request: &PolicyCreationRequest,
    manager: &dyn ArchiveManager,
    ctx: &EngineContext,
) -> SubmitOutcome {
    let outcome = match manager.create_archive_policy(request) {
        Ok(()) => SubmitOutcome::Created,
        Err(ManagerError::Warning { messages } | ManagerError::MultiMessage { messages }) => {
            SubmitOutcome::Warning { messages }
        }
        Err(ManagerError::Failure { code, message }) => SubmitOutcome::Failed { code, message },
        Err(err @ (ManagerError::Unavailable { .. } | ManagerError::Unsupported { .. })) => {
            SubmitOutcome::Failed {
                code: UNKNOWN_BACKEND_CODE,
                message: err.to_string(),
            }
        }
    };

    match &outcome {
        SubmitOutcome::Created => {
            info!(policy = request.name(), copies = request.copies().len(), "archive policy created");
            ctx.metrics().inc_policy_submission("created");
        }
        SubmitOutcome::Warning { messages } => {
            warn!(policy = request.name(), ?messages, "archive policy created with warnings");
            ctx.metrics().inc_policy_submission("warning");
        }
        SubmitOutcome::Failed { code, message } => {
            warn!(policy = request.name(), code, message = %message, "archive policy rejected");
            ctx.metrics().inc_policy_submission("failed");
        }
    }
    outcome
}

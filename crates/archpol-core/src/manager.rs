//! Contract for the external archive manager.
//!
//! # Design
//! - One manager instance is bound to one server; callers construct it for
//!   the server they administer.
//! - Calls are synchronous and blocking. The engine never retries.
//! - Optional operations default to an `Unsupported` error so read-only
//!   backends only implement the listing calls.

use thiserror::Error;

use crate::criteria::PolicyCriteria;
use crate::media::MediaType;
use crate::policy::PolicyCreationRequest;
use crate::pool::VsnPool;

/// Errors reported by the archive manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The operation did not complete.
    #[error("archive manager failure")]
    Failure {
        /// Manager error code.
        code: i32,
        /// Manager message.
        message: String,
    },
    /// Several sub-operations failed.
    #[error("archive manager reported multiple failures")]
    MultiMessage {
        /// One message per failed sub-operation.
        messages: Vec<String>,
    },
    /// The operation succeeded with caveats.
    #[error("archive manager reported warnings")]
    Warning {
        /// Warning messages.
        messages: Vec<String>,
    },
    /// A backing component (for example the catalog daemon) is down.
    #[error("archive manager component unavailable")]
    Unavailable {
        /// Component that could not be reached.
        component: String,
    },
    /// The manager does not implement the operation.
    #[error("operation not supported by this archive manager")]
    Unsupported {
        /// Operation that was requested.
        operation: &'static str,
    },
}

/// Result of a duplicate-criteria lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateCheck {
    /// Whether an existing policy already has matching criteria.
    pub duplicate: bool,
    /// Label of the conflicting criteria (for example `Criteria2`).
    pub explanation: Option<String>,
    /// Name of the policy holding the conflicting criteria.
    pub conflicting_policy: Option<String>,
}

impl DuplicateCheck {
    /// No conflict found.
    #[must_use]
    pub const fn unique() -> Self {
        Self {
            duplicate: false,
            explanation: None,
            conflicting_policy: None,
        }
    }
}

/// Archive manager for a single server.
pub trait ArchiveManager {
    /// Media types with configured devices.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager cannot be queried.
    fn available_media_types(&self) -> Result<Vec<MediaType>, ManagerError>;

    /// Every defined volume pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool catalog cannot be read.
    fn vsn_pools(&self) -> Result<Vec<VsnPool>, ManagerError>;

    /// Names of all archive policies.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager cannot be queried.
    fn policy_names(&self) -> Result<Vec<String>, ManagerError>;

    /// Whether `name` is a known user.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn is_valid_user(&self, name: &str) -> Result<bool, ManagerError>;

    /// Whether `name` is a known group.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn is_valid_group(&self, name: &str) -> Result<bool, ManagerError>;

    /// Check whether `criteria` already exist on any of `file_systems`.
    ///
    /// `is_update` skips the policy being edited.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn find_duplicate_criteria(
        &self,
        criteria: &PolicyCriteria,
        file_systems: &[String],
        is_update: bool,
    ) -> Result<DuplicateCheck, ManagerError>;

    /// Create an archive policy.
    ///
    /// # Errors
    ///
    /// Returns `Warning` when the policy was created with caveats, and any
    /// other variant when it was not created.
    fn create_archive_policy(&self, request: &PolicyCreationRequest) -> Result<(), ManagerError> {
        let _ = request;
        Err(ManagerError::Unsupported {
            operation: "create_archive_policy",
        })
    }

    /// Create a volume pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool was not created.
    fn create_vsn_pool(
        &self,
        name: &str,
        media_type: MediaType,
        expression: &str,
    ) -> Result<(), ManagerError> {
        let _ = (name, media_type, expression);
        Err(ManagerError::Unsupported {
            operation: "create_vsn_pool",
        })
    }
}

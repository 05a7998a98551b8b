//! In-memory archive manager with failure injection.

use std::cell::RefCell;
use std::collections::HashMap;

use archpol_core::{
    ArchiveManager, DuplicateCheck, ManagerError, MediaType, PolicyCreationRequest,
    PolicyCriteria, VsnPool,
};

/// Manager operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `available_media_types`.
    MediaTypes,
    /// `vsn_pools`.
    VsnPools,
    /// `policy_names`.
    PolicyNames,
    /// `is_valid_user`.
    IsValidUser,
    /// `is_valid_group`.
    IsValidGroup,
    /// `find_duplicate_criteria`.
    FindDuplicateCriteria,
    /// `create_archive_policy`.
    CreatePolicy,
    /// `create_vsn_pool`.
    CreatePool,
}

/// Criteria already attached to a policy on the fake server.
#[derive(Debug, Clone)]
pub struct CriteriaEntry {
    /// Owning policy.
    pub policy: String,
    /// Label reported in duplicate explanations.
    pub label: String,
    /// The criteria.
    pub criteria: PolicyCriteria,
    /// File systems the criteria apply to.
    pub file_systems: Vec<String>,
}

/// Archive manager backed by in-memory state.
///
/// Created policies and pools are recorded and become visible to later
/// listing calls. A `Warning` injected for a create operation still records
/// the created object.
#[derive(Debug, Default)]
pub struct MockArchiveManager {
    media_types: Vec<MediaType>,
    users: Vec<String>,
    groups: Vec<String>,
    failures: HashMap<Operation, ManagerError>,
    pools: RefCell<Vec<VsnPool>>,
    policies: RefCell<Vec<String>>,
    criteria: RefCell<Vec<CriteriaEntry>>,
    created: RefCell<Vec<PolicyCreationRequest>>,
}

impl MockArchiveManager {
    /// Empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Media types reported as available.
    #[must_use]
    pub fn with_media_types(mut self, media_types: &[MediaType]) -> Self {
        self.media_types = media_types.to_vec();
        self
    }

    /// Add an existing pool.
    #[must_use]
    pub fn with_pool(self, pool: VsnPool) -> Self {
        self.pools.borrow_mut().push(pool);
        self
    }

    /// Add an existing policy name.
    #[must_use]
    pub fn with_policy(self, name: &str) -> Self {
        self.policies.borrow_mut().push(name.to_string());
        self
    }

    /// Add a known user.
    #[must_use]
    pub fn with_user(mut self, name: &str) -> Self {
        self.users.push(name.to_string());
        self
    }

    /// Add a known group.
    #[must_use]
    pub fn with_group(mut self, name: &str) -> Self {
        self.groups.push(name.to_string());
        self
    }

    /// Attach criteria to an existing policy.
    #[must_use]
    pub fn with_criteria(self, entry: CriteriaEntry) -> Self {
        self.criteria.borrow_mut().push(entry);
        self
    }

    /// Make `operation` fail with `error` on every call.
    #[must_use]
    pub fn failing(mut self, operation: Operation, error: ManagerError) -> Self {
        self.failures.insert(operation, error);
        self
    }

    /// Requests accepted by `create_archive_policy`.
    #[must_use]
    pub fn created_policies(&self) -> Vec<PolicyCreationRequest> {
        self.created.borrow().clone()
    }

    /// Current pools, including created ones.
    #[must_use]
    pub fn pools(&self) -> Vec<VsnPool> {
        self.pools.borrow().clone()
    }

    fn check(&self, operation: Operation) -> Result<(), ManagerError> {
        self.failures.get(&operation).cloned().map_or(Ok(()), Err)
    }

    fn check_create(&self, operation: Operation) -> Result<Option<ManagerError>, ManagerError> {
        match self.failures.get(&operation) {
            None => Ok(None),
            Some(warning @ ManagerError::Warning { .. }) => Ok(Some(warning.clone())),
            Some(err) => Err(err.clone()),
        }
    }
}

impl ArchiveManager for MockArchiveManager {
    fn available_media_types(&self) -> Result<Vec<MediaType>, ManagerError> {
        self.check(Operation::MediaTypes)?;
        Ok(self.media_types.clone())
    }

    fn vsn_pools(&self) -> Result<Vec<VsnPool>, ManagerError> {
        self.check(Operation::VsnPools)?;
        Ok(self.pools())
    }

    fn policy_names(&self) -> Result<Vec<String>, ManagerError> {
        self.check(Operation::PolicyNames)?;
        Ok(self.policies.borrow().clone())
    }

    fn is_valid_user(&self, name: &str) -> Result<bool, ManagerError> {
        self.check(Operation::IsValidUser)?;
        Ok(self.users.iter().any(|user| user == name))
    }

    fn is_valid_group(&self, name: &str) -> Result<bool, ManagerError> {
        self.check(Operation::IsValidGroup)?;
        Ok(self.groups.iter().any(|group| group == name))
    }

    fn find_duplicate_criteria(
        &self,
        criteria: &PolicyCriteria,
        file_systems: &[String],
        _is_update: bool,
    ) -> Result<DuplicateCheck, ManagerError> {
        self.check(Operation::FindDuplicateCriteria)?;
        let entries = self.criteria.borrow();
        let conflict = entries.iter().find(|entry| {
            entry.criteria == *criteria && entry.file_systems.iter().any(|fs| file_systems.contains(fs))
        });
        Ok(conflict.map_or_else(DuplicateCheck::unique, |entry| DuplicateCheck {
            duplicate: true,
            explanation: Some(entry.label.clone()),
            conflicting_policy: Some(entry.policy.clone()),
        }))
    }

    fn create_archive_policy(&self, request: &PolicyCreationRequest) -> Result<(), ManagerError> {
        let warning = self.check_create(Operation::CreatePolicy)?;
        self.policies.borrow_mut().push(request.name().to_string());
        let label = format!("Criteria{}", self.criteria.borrow().len() + 1);
        self.criteria.borrow_mut().push(CriteriaEntry {
            policy: request.name().to_string(),
            label,
            criteria: request.criteria().clone(),
            file_systems: request.file_systems().to_vec(),
        });
        self.created.borrow_mut().push(request.clone());
        warning.map_or(Ok(()), Err)
    }

    fn create_vsn_pool(
        &self,
        name: &str,
        media_type: MediaType,
        expression: &str,
    ) -> Result<(), ManagerError> {
        let warning = self.check_create(Operation::CreatePool)?;
        self.pools
            .borrow_mut()
            .push(VsnPool::new(name, media_type, expression));
        warning.map_or(Ok(()), Err)
    }
}

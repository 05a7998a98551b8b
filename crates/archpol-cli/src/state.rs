//! Server snapshot standing in for a live archive manager, plus CLI errors.
//!
//! # Design
//! - The snapshot is a JSON document listing media types, pools, users,
//!   groups and policies (with their criteria in form-input shape).
//! - Criteria are validated once when the snapshot is indexed so duplicate
//!   checks compare normalised values.
//! - Mutations only reach disk through `SnapshotManager::save`.

use std::cell::RefCell;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use archpol_core::{
    ArchiveManager, CriteriaInput, DuplicateCheck, EngineContext, ErrorClass, ManagerError,
    MediaType, PolicyCreationRequest, PolicyCriteria, PolicyError, VsnPool,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Error type used throughout the CLI.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<PolicyError> for CliError {
    fn from(err: PolicyError) -> Self {
        match err.class() {
            ErrorClass::FieldValidation | ErrorClass::Duplicate => {
                Self::Validation(describe_policy_error(&err))
            }
            ErrorClass::BackendFailure | ErrorClass::InternalInvariant => {
                Self::Failure(anyhow::Error::new(err))
            }
        }
    }
}

fn describe_policy_error(err: &PolicyError) -> String {
    match err {
        PolicyError::InvalidField {
            field,
            issue,
            value: Some(value),
        } => format!("{field}: {issue} ('{value}')"),
        PolicyError::InvalidField { field, issue, .. } => format!("{field}: {issue}"),
        PolicyError::DuplicatePolicyName { name } => format!("policy '{name}' already exists"),
        PolicyError::DuplicateCriteria { criteria, policy } => {
            format!("criteria duplicate {criteria} of policy '{policy}'")
        }
        PolicyError::DuplicatePoolName { name } => format!("volume pool '{name}' already exists"),
        other => other.to_string(),
    }
}

/// Engine context and server snapshot shared by command handlers.
pub(crate) struct AppContext {
    pub(crate) engine: EngineContext,
    pub(crate) manager: SnapshotManager,
    pub(crate) state_path: Option<PathBuf>,
}

impl AppContext {
    /// Write the snapshot back when one was loaded from disk.
    pub(crate) fn persist(&self) -> CliResult<()> {
        match &self.state_path {
            Some(path) => self.manager.save(path),
            None => {
                debug!("no state snapshot given; changes are not persisted");
                Ok(())
            }
        }
    }
}

/// Serialized server state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerState {
    pub(crate) media_types: Vec<MediaType>,
    pub(crate) pools: Vec<VsnPool>,
    pub(crate) users: Vec<String>,
    pub(crate) groups: Vec<String>,
    pub(crate) policies: Vec<PolicyRecord>,
}

/// A policy as stored in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PolicyRecord {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) file_systems: Vec<String>,
    #[serde(default)]
    pub(crate) criteria: Vec<CriteriaInput>,
}

struct IndexedCriteria {
    policy: String,
    label: String,
    criteria: PolicyCriteria,
    file_systems: Vec<String>,
}

/// Archive manager backed by a [`ServerState`].
pub(crate) struct SnapshotManager {
    state: RefCell<ServerState>,
    criteria: RefCell<Vec<IndexedCriteria>>,
}

impl SnapshotManager {
    pub(crate) fn new(state: ServerState) -> Self {
        Self {
            state: RefCell::new(state),
            criteria: RefCell::new(Vec::new()),
        }
    }

    /// Read a snapshot; no path means an empty server.
    pub(crate) fn load(path: Option<&Path>) -> CliResult<Self> {
        let Some(path) = path else {
            debug!("no state snapshot given; starting from an empty server");
            return Ok(Self::new(ServerState::default()));
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .map_err(CliError::failure)?;
        let state: ServerState = serde_json::from_str(&raw).map_err(|err| {
            CliError::validation(format!("{} is not a valid snapshot: {err}", path.display()))
        })?;
        info!(path = %path.display(), pools = state.pools.len(), policies = state.policies.len(), "loaded server snapshot");
        Ok(Self::new(state))
    }

    /// Validate stored criteria so later duplicate checks compare normalised
    /// values.
    pub(crate) fn index(&self, ctx: &EngineContext) -> CliResult<()> {
        let policies = self.state.borrow().policies.clone();
        let mut indexed = Vec::new();
        for policy in policies {
            for input in &policy.criteria {
                let criteria = input.validate(self, ctx).map_err(|err| {
                    CliError::validation(format!(
                        "snapshot policy '{}' has invalid criteria: {}",
                        policy.name,
                        describe_policy_error(&err)
                    ))
                })?;
                indexed.push(IndexedCriteria {
                    policy: policy.name.clone(),
                    label: format!("Criteria{}", indexed.len() + 1),
                    criteria,
                    file_systems: policy.file_systems.clone(),
                });
            }
        }
        *self.criteria.borrow_mut() = indexed;
        Ok(())
    }

    pub(crate) fn save(&self, path: &Path) -> CliResult<()> {
        let text = serde_json::to_string_pretty(&*self.state.borrow())
            .map_err(|err| CliError::failure(anyhow!("failed to encode snapshot: {err}")))?;
        fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))
            .map_err(CliError::failure)?;
        info!(path = %path.display(), "saved server snapshot");
        Ok(())
    }

}

impl ArchiveManager for SnapshotManager {
    fn available_media_types(&self) -> Result<Vec<MediaType>, ManagerError> {
        Ok(self.state.borrow().media_types.clone())
    }

    fn vsn_pools(&self) -> Result<Vec<VsnPool>, ManagerError> {
        Ok(self.state.borrow().pools.clone())
    }

    fn policy_names(&self) -> Result<Vec<String>, ManagerError> {
        Ok(self
            .state
            .borrow()
            .policies
            .iter()
            .map(|policy| policy.name.clone())
            .collect())
    }

    fn is_valid_user(&self, name: &str) -> Result<bool, ManagerError> {
        Ok(self.state.borrow().users.iter().any(|user| user == name))
    }

    fn is_valid_group(&self, name: &str) -> Result<bool, ManagerError> {
        Ok(self.state.borrow().groups.iter().any(|group| group == name))
    }

    fn find_duplicate_criteria(
        &self,
        criteria: &PolicyCriteria,
        file_systems: &[String],
        _is_update: bool,
    ) -> Result<DuplicateCheck, ManagerError> {
        let indexed = self.criteria.borrow();
        let conflict = indexed.iter().find(|entry| {
            entry.criteria == *criteria
                && entry.file_systems.iter().any(|fs| file_systems.contains(fs))
        });
        Ok(conflict.map_or_else(DuplicateCheck::unique, |entry| DuplicateCheck {
            duplicate: true,
            explanation: Some(entry.label.clone()),
            conflicting_policy: Some(entry.policy.clone()),
        }))
    }

    fn create_archive_policy(&self, request: &PolicyCreationRequest) -> Result<(), ManagerError> {
        let mut state = self.state.borrow_mut();
        state.policies.push(PolicyRecord {
            name: request.name().to_string(),
            file_systems: request.file_systems().to_vec(),
            criteria: vec![CriteriaInput::from(request.criteria())],
        });
        let mut indexed = self.criteria.borrow_mut();
        let label = format!("Criteria{}", indexed.len() + 1);
        indexed.push(IndexedCriteria {
            policy: request.name().to_string(),
            label,
            criteria: request.criteria().clone(),
            file_systems: request.file_systems().to_vec(),
        });
        Ok(())
    }

    fn create_vsn_pool(
        &self,
        name: &str,
        media_type: MediaType,
        expression: &str,
    ) -> Result<(), ManagerError> {
        self.state
            .borrow_mut()
            .pools
            .push(VsnPool::new(name, media_type, expression));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archpol_config::EngineConfig;
    use archpol_core::error::{Field, FieldIssue};
    use archpol_telemetry::Metrics;
    use std::io::Write;
    use tempfile::NamedTempFile;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const SNAPSHOT: &str = r#"{
        "media_types": [100, 202],
        "pools": [{"name": "lto_a", "media_type": 202, "members": "VOL000-VOL099"}],
        "users": ["root"],
        "groups": ["staff"],
        "policies": [
            {"name": "logs", "file_systems": ["samfs1"], "criteria": [{"starting_dir": "logs", "owner": "root"}]}
        ]
    }"#;

    fn ctx() -> Result<EngineContext, Box<dyn std::error::Error>> {
        Ok(EngineContext::new(EngineConfig::default(), Metrics::new()?))
    }

    #[test]
    fn policy_errors_map_to_exit_codes() {
        let field: CliError = PolicyError::InvalidField {
            field: Field::MinSize,
            issue: FieldIssue::MinGreaterThanMax,
            value: Some("100MB".into()),
        }
        .into();
        assert_eq!(field.exit_code(), 2);
        assert_eq!(field.display_message(), "min_size: min_greater_than_max ('100MB')");

        let backend: CliError = PolicyError::Backend {
            operation: "policy_names",
            source: ManagerError::Unavailable {
                component: "catalog".into(),
            },
        }
        .into();
        assert_eq!(backend.exit_code(), 3);
    }

    #[test]
    fn snapshot_round_trips_through_disk() -> TestResult {
        let mut file = NamedTempFile::new()?;
        file.write_all(SNAPSHOT.as_bytes())?;
        let manager = SnapshotManager::load(Some(file.path()))?;
        manager.index(&ctx()?)?;
        assert_eq!(manager.policy_names()?, vec!["logs".to_string()]);
        assert_eq!(manager.available_media_types()?, vec![MediaType::DISK, MediaType::LTO]);

        manager.create_vsn_pool("lto_b", MediaType::LTO, "VOL100-VOL199")?;
        manager.save(file.path())?;
        let reloaded = SnapshotManager::load(Some(file.path()))?;
        assert_eq!(reloaded.vsn_pools()?.len(), 2);
        Ok(())
    }

    #[test]
    fn indexed_criteria_detect_duplicates() -> TestResult {
        let ctx = ctx()?;
        let manager = SnapshotManager::new(serde_json::from_str(SNAPSHOT)?);
        manager.index(&ctx)?;
        let criteria = CriteriaInput {
            starting_dir: "logs".into(),
            owner: "root".into(),
            ..CriteriaInput::default()
        }
        .validate(&manager, &ctx)?;
        let check = manager.find_duplicate_criteria(&criteria, &["samfs1".into()], false)?;
        assert!(check.duplicate);
        assert_eq!(check.conflicting_policy.as_deref(), Some("logs"));
        assert!(
            !manager
                .find_duplicate_criteria(&criteria, &["samfs9".into()], false)?
                .duplicate
        );
        Ok(())
    }

    #[test]
    fn malformed_snapshot_is_a_validation_error() -> TestResult {
        let mut file = NamedTempFile::new()?;
        file.write_all(br#"{"pools": 3}"#)?;
        let err = SnapshotManager::load(Some(file.path())).err();
        assert!(matches!(err, Some(CliError::Validation(_))));
        Ok(())
    }
}

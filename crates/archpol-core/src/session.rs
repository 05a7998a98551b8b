//! Wizard session state: identity, criteria, file systems and the copy map.
//!
//! # Design
//! - The caller owns the session; every step takes `&mut self`, so one
//!   session has one writer.
//! - The copy map creates a default slot the first time a copy number is
//!   addressed (archive age 4 minutes, never expires, no reservation).
//! - Field errors are returned to the step that caused them and leave the
//!   session unchanged. Only `finish` produces a `WizardOutcome`.
//! - `finish` submits only when every declared copy is present and
//!   committed.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::context::EngineContext;
use crate::copy::{CopyDescriptor, CopyNumber, CopySlot, CopyState, EntryMode};
use crate::criteria::{CriteriaInput, PolicyCriteria};
use crate::error::{
    ErrorClass, Field, FieldIssue, INTERNAL_ERROR_CODE, PolicyError, PolicyResult, backend,
    invalid,
};
use crate::manager::{ArchiveManager, ManagerError};
use crate::policy::{
    PolicyBuilder, PolicyCreationRequest, PolicyKind, SubmitOutcome, UNKNOWN_BACKEND_CODE, submit,
    validate_policy_name,
};
use crate::pool::PoolCatalog;

/// Name, description and copy count captured on the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyIdentity {
    name: String,
    description: String,
    copy_count: u8,
}

impl PolicyIdentity {
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

    /// Declared number of copies.
    #[must_use]
    pub const fn copy_count(&self) -> u8 {
        self.copy_count
    }
}

/// Result page shown when the wizard finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WizardOutcome {
    /// Policy created.
    Success {
        /// Created policy.
        policy: String,
    },
    /// Policy created with caveats.
    Warning {
        /// Created policy.
        policy: String,
        /// Warning messages.
        messages: Vec<String>,
    },
    /// Policy not created; the session is kept for correction.
    Failure {
        /// Manager or internal error code.
        code: i32,
        /// Message for the result page.
        message: String,
    },
}

/// State of one policy wizard.
pub struct WizardSession {
    ctx: EngineContext,
    mode: EntryMode,
    kind: PolicyKind,
    identity: Option<PolicyIdentity>,
    criteria: Option<PolicyCriteria>,
    file_systems: Vec<String>,
    copies: BTreeMap<CopyNumber, CopySlot>,
    catalog: Option<PoolCatalog>,
}

impl WizardSession {
    /// Empty session.
    #[must_use]
    pub const fn new(ctx: EngineContext, mode: EntryMode) -> Self {
        Self {
            ctx,
            mode,
            kind: PolicyKind::General,
            identity: None,
            criteria: None,
            file_systems: Vec::new(),
            copies: BTreeMap::new(),
            catalog: None,
        }
    }

    /// Engine context.
    #[must_use]
    pub const fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Entry mode the session was opened in.
    #[must_use]
    pub const fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Kind of policy being built.
    #[must_use]
    pub const fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Identity, once captured.
    #[must_use]
    pub const fn identity(&self) -> Option<&PolicyIdentity> {
        self.identity.as_ref()
    }

    /// Criteria, once captured.
    #[must_use]
    pub const fn criteria(&self) -> Option<&PolicyCriteria> {
        self.criteria.as_ref()
    }

    /// File systems the policy will apply to.
    #[must_use]
    pub fn file_systems(&self) -> &[String] {
        &self.file_systems
    }

    /// Capture the name, description and copy count of a general policy.
    /// Copies numbered above the new count are dropped.
    ///
    /// # Errors
    ///
    /// Policy name errors, `EmptyRequiredField`/`NotANumber`/`OutOfRange` on
    /// the copy count, or a backend error when policy names cannot be listed.
    pub fn set_identity(
        &mut self,
        name: &str,
        description: &str,
        copy_count: &str,
        manager: &dyn ArchiveManager,
    ) -> PolicyResult<()> {
        let existing = manager
            .policy_names()
            .map_err(|source| backend("policy_names", source))?;
        let (name, copy_count) = validate_policy_name(name, &existing, self.ctx.limits())
            .and_then(|name| {
                self.parse_copy_count(copy_count)
                    .map(|count| (name, count))
            })
            .inspect_err(|err| self.ctx.record(err))?;

        self.copies.retain(|number, _| number.get() <= copy_count);
        self.kind = PolicyKind::General;
        self.identity = Some(PolicyIdentity {
            name,
            description: description.trim().to_string(),
            copy_count,
        });
        debug!(copy_count, "policy identity captured");
        Ok(())
    }

    fn parse_copy_count(&self, raw: &str) -> PolicyResult<u8> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid(Field::CopyCount, FieldIssue::EmptyRequiredField, None));
        }
        let count: i64 = trimmed
            .parse()
            .map_err(|_| invalid(Field::CopyCount, FieldIssue::NotANumber, Some(trimmed)))?;
        u8::try_from(count)
            .ok()
            .filter(|count| (1..=self.ctx.limits().max_copies).contains(count))
            .ok_or_else(|| invalid(Field::CopyCount, FieldIssue::OutOfRange, Some(trimmed)))
    }

    /// Switch the session to the reserved no-archive policy. Copies are
    /// discarded.
    ///
    /// # Errors
    ///
    /// `DuplicatePolicyName` when the no-archive policy already exists, or a
    /// backend error when policy names cannot be listed.
    pub fn start_no_archive(
        &mut self,
        description: &str,
        manager: &dyn ArchiveManager,
    ) -> PolicyResult<()> {
        let existing = manager
            .policy_names()
            .map_err(|source| backend("policy_names", source))?;
        let builder = PolicyBuilder::no_archive(&existing, self.ctx.limits())?;
        self.copies.clear();
        self.kind = PolicyKind::NoArchive;
        self.identity = Some(PolicyIdentity {
            name: builder.name().to_string(),
            description: description.trim().to_string(),
            copy_count: 0,
        });
        Ok(())
    }

    /// Validate and capture the criteria.
    ///
    /// # Errors
    ///
    /// Criteria validation errors.
    pub fn set_criteria(
        &mut self,
        input: &CriteriaInput,
        manager: &dyn ArchiveManager,
    ) -> PolicyResult<()> {
        self.criteria = Some(input.validate(manager, &self.ctx)?);
        Ok(())
    }

    /// Capture the file systems the policy applies to.
    ///
    /// # Errors
    ///
    /// `NoFileSystemSelected` when the list has no non-blank entry.
    pub fn set_file_systems<I, S>(&mut self, file_systems: I) -> PolicyResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selected: Vec<String> = file_systems
            .into_iter()
            .map(|fs| fs.as_ref().trim().to_string())
            .filter(|fs| !fs.is_empty())
            .collect();
        if selected.is_empty() {
            let err = invalid(Field::FileSystems, FieldIssue::NoFileSystemSelected, None);
            self.ctx.record(&err);
            return Err(err);
        }
        self.file_systems = selected;
        Ok(())
    }

    /// Load (or reload) the pool catalog used by media steps.
    ///
    /// # Errors
    ///
    /// `DuplicatePoolName` when the manager reports colliding pools.
    pub fn load_catalog(&mut self, manager: &dyn ArchiveManager) -> PolicyResult<&PoolCatalog> {
        let catalog = PoolCatalog::load(manager, &self.ctx)?;
        Ok(&*self.catalog.insert(catalog))
    }

    /// Catalog loaded by [`WizardSession::load_catalog`].
    #[must_use]
    pub const fn catalog(&self) -> Option<&PoolCatalog> {
        self.catalog.as_ref()
    }

    /// Slot for a copy, created with defaults on first access.
    ///
    /// # Errors
    ///
    /// `CopyNumberOutOfRange` when the number exceeds the configured maximum
    /// or the declared copy count.
    pub fn copy_mut(&mut self, number: u8) -> PolicyResult<&mut CopySlot> {
        let number = self.copy_number(number)?;
        let defaults = self.ctx.defaults();
        Ok(self
            .copies
            .entry(number)
            .or_insert_with(|| CopySlot::new(number, defaults)))
    }

    /// Run one assembler step against a copy slot, creating the slot on
    /// first access. The step sees the engine context and the pool catalog.
    /// Before [`WizardSession::load_catalog`] runs the step gets
    /// [`PoolCatalog::unavailable`] and the session catalog stays unset.
    ///
    /// # Errors
    ///
    /// `CopyNumberOutOfRange`, or whatever the step returns.
    pub fn update_copy<T, F>(&mut self, number: u8, step: F) -> PolicyResult<T>
    where
        F: FnOnce(&mut CopySlot, &EngineContext, &PoolCatalog) -> PolicyResult<T>,
    {
        let number = self.copy_number(number)?;
        let placeholder;
        let catalog = match &self.catalog {
            Some(catalog) => catalog,
            None => {
                debug!(copy = %number, "pool catalog not loaded; using an unavailable catalog");
                placeholder = PoolCatalog::unavailable();
                &placeholder
            }
        };
        let defaults = self.ctx.defaults();
        let slot = self
            .copies
            .entry(number)
            .or_insert_with(|| CopySlot::new(number, defaults));
        step(slot, &self.ctx, catalog)
    }

    /// Slot for a copy, if it has been addressed.
    #[must_use]
    pub fn copy(&self, number: u8) -> Option<&CopySlot> {
        CopyNumber::new(number, self.ctx.limits())
            .ok()
            .and_then(|number| self.copies.get(&number))
    }

    /// Addressed copies in number order.
    pub fn copies(&self) -> impl Iterator<Item = &CopySlot> + '_ {
        self.copies.values()
    }

    fn copy_number(&self, number: u8) -> PolicyResult<CopyNumber> {
        let declared = self
            .identity
            .as_ref()
            .map_or(self.ctx.limits().max_copies, PolicyIdentity::copy_count);
        let out_of_range = || {
            invalid(
                Field::CopyNumber,
                FieldIssue::CopyNumberOutOfRange,
                Some(&number.to_string()),
            )
        };
        if self.kind == PolicyKind::NoArchive || number > declared {
            return Err(out_of_range());
        }
        CopyNumber::new(number, self.ctx.limits())
    }

    /// Discard everything captured so far.
    pub fn cancel(&mut self) {
        self.kind = PolicyKind::General;
        self.identity = None;
        self.criteria = None;
        self.file_systems.clear();
        self.copies.clear();
        self.catalog = None;
        debug!("wizard session cleared");
    }

    /// Build and submit the policy.
    ///
    /// Success and warnings clear the session. Manager failures and internal
    /// errors are reported as `WizardOutcome::Failure` and keep the session
    /// for correction.
    ///
    /// # Errors
    ///
    /// Field and duplicate errors from the build, so the front end can send
    /// the user back to the offending page. A copy that is not committed is
    /// `UncommittedCopy` on the copy number.
    pub fn finish(&mut self, manager: &dyn ArchiveManager) -> PolicyResult<WizardOutcome> {
        let request = match self.build_request(manager) {
            Ok(request) => request,
            Err(err) => return self.failure(err),
        };

        let outcome = match submit(&request, manager, &self.ctx) {
            SubmitOutcome::Created => WizardOutcome::Success {
                policy: request.name().to_string(),
            },
            SubmitOutcome::Warning { messages } => WizardOutcome::Warning {
                policy: request.name().to_string(),
                messages,
            },
            SubmitOutcome::Failed { code, message } => {
                return Ok(WizardOutcome::Failure { code, message });
            }
        };
        info!(policy = request.name(), "wizard finished");
        self.cancel();
        Ok(outcome)
    }

    fn build_request(
        &self,
        manager: &dyn ArchiveManager,
    ) -> PolicyResult<PolicyCreationRequest> {
        let identity = self.identity.as_ref().ok_or_else(|| PolicyError::Internal {
            operation: "finish",
            detail: "policy identity was never captured".to_string(),
        })?;
        let criteria = self.criteria.clone().ok_or_else(|| PolicyError::Internal {
            operation: "finish",
            detail: "criteria were never captured".to_string(),
        })?;
        let builder = match self.kind {
            PolicyKind::General => PolicyBuilder::general(
                identity.name(),
                identity.copy_count(),
                &manager
                    .policy_names()
                    .map_err(|source| backend("policy_names", source))?,
                self.ctx.limits(),
            )?,
            PolicyKind::NoArchive => PolicyBuilder::no_archive(
                &manager
                    .policy_names()
                    .map_err(|source| backend("policy_names", source))?,
                self.ctx.limits(),
            )?,
        }
        .description(identity.description());

        if let Some(open) = self
            .copies
            .values()
            .find(|slot| slot.state() != CopyState::Committed)
        {
            let number = open.descriptor().number();
            debug!(copy = %number, state = ?open.state(), "copy not committed");
            let err = invalid(
                Field::CopyNumber,
                FieldIssue::UncommittedCopy,
                Some(&number.to_string()),
            );
            self.ctx.record(&err);
            return Err(err);
        }
        let copies: Vec<CopyDescriptor> = self
            .copies
            .values()
            .map(|slot| slot.descriptor().clone())
            .collect();
        builder
            .build(criteria, copies, &self.file_systems, manager)
            .inspect_err(|err| self.ctx.record(err))
    }

    fn failure(&self, err: PolicyError) -> PolicyResult<WizardOutcome> {
        match err.class() {
            ErrorClass::FieldValidation | ErrorClass::Duplicate => Err(err),
            ErrorClass::BackendFailure => {
                let (code, message) = match &err {
                    PolicyError::Backend {
                        source: ManagerError::Failure { code, message },
                        ..
                    } => (*code, message.clone()),
                    PolicyError::Backend { source, .. } => {
                        (UNKNOWN_BACKEND_CODE, source.to_string())
                    }
                    _ => (UNKNOWN_BACKEND_CODE, err.to_string()),
                };
                self.ctx.metrics().inc_policy_submission("failed");
                Ok(WizardOutcome::Failure { code, message })
            }
            ErrorClass::InternalInvariant => {
                error!(error = ?err, "wizard session invariant violated");
                Ok(WizardOutcome::Failure {
                    code: INTERNAL_ERROR_CODE,
                    message: err.to_string(),
                })
            }
        }
    }
}

//! File-selection criteria of an archive policy.

use globset::Glob;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::EngineContext;
use crate::error::{Field, FieldIssue, PolicyResult, backend, invalid};
use crate::manager::ArchiveManager;
use crate::units::{SizeValue, TimeValue, validate_pair, validate_size, validate_time};

/// Syntax of the file name pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Regular expression (the archiver's native form).
    #[default]
    Regex,
    /// Shell glob.
    Glob,
}

/// Raw criteria form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct CriteriaInput {
    pub starting_dir: String,
    pub name_pattern: String,
    pub pattern_kind: PatternKind,
    pub min_size: String,
    pub min_size_unit: Option<String>,
    pub max_size: String,
    pub max_size_unit: Option<String>,
    pub access_age: String,
    pub access_age_unit: Option<String>,
    pub owner: String,
    pub group: String,
}

/// Validated criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyCriteria {
    starting_dir: String,
    name_pattern: Option<String>,
    pattern_kind: PatternKind,
    min_size: Option<SizeValue>,
    max_size: Option<SizeValue>,
    access_age: Option<TimeValue>,
    owner: Option<String>,
    group: Option<String>,
}

impl CriteriaInput {
    /// Validate every criteria field, consulting the manager for owner and
    /// group existence.
    ///
    /// # Errors
    ///
    /// The first field error encountered, in form order, or a backend error
    /// when a user or group lookup fails.
    pub fn validate(
        &self,
        manager: &dyn ArchiveManager,
        ctx: &EngineContext,
    ) -> PolicyResult<PolicyCriteria> {
        self.validate_fields(manager, ctx)
            .inspect_err(|err| ctx.record(err))
    }

    fn validate_fields(
        &self,
        manager: &dyn ArchiveManager,
        ctx: &EngineContext,
    ) -> PolicyResult<PolicyCriteria> {
        let limits = ctx.limits();
        let starting_dir = validate_starting_dir(&self.starting_dir)?;
        let name_pattern = validate_pattern(&self.name_pattern, self.pattern_kind)?;

        let min_size = validate_size(
            Field::MinSize,
            &self.min_size,
            self.min_size_unit.as_deref(),
            false,
            limits,
        )?;
        let max_size = validate_size(
            Field::MaxSize,
            &self.max_size,
            self.max_size_unit.as_deref(),
            false,
            limits,
        )?;
        validate_pair(Field::MinSize, min_size.as_ref(), max_size.as_ref())?;

        let access_age = validate_time(
            Field::AccessAge,
            &self.access_age,
            self.access_age_unit.as_deref(),
            false,
            limits,
        )?;
        if access_age.is_some_and(|age| age.value() == 0) {
            return Err(invalid(
                Field::AccessAge,
                FieldIssue::InvalidAge,
                Some(self.access_age.trim()),
            ));
        }

        let owner = account(Field::Owner, &self.owner)?;
        if let Some(owner) = &owner {
            let known = manager
                .is_valid_user(owner)
                .map_err(|source| backend("is_valid_user", source))?;
            if !known {
                return Err(invalid(Field::Owner, FieldIssue::UnknownUser, Some(owner)));
            }
        }
        let group = account(Field::Group, &self.group)?;
        if let Some(group) = &group {
            let known = manager
                .is_valid_group(group)
                .map_err(|source| backend("is_valid_group", source))?;
            if !known {
                return Err(invalid(Field::Group, FieldIssue::UnknownGroup, Some(group)));
            }
        }

        debug!(starting_dir = %starting_dir, "criteria accepted");
        Ok(PolicyCriteria {
            starting_dir,
            name_pattern,
            pattern_kind: self.pattern_kind,
            min_size,
            max_size,
            access_age,
            owner,
            group,
        })
    }
}

impl From<&PolicyCriteria> for CriteriaInput {
    /// Repopulate a form from accepted criteria.
    fn from(criteria: &PolicyCriteria) -> Self {
        let size = |size: Option<SizeValue>| {
            size.map_or((String::new(), None), |size| {
                (size.value().to_string(), Some(size.unit().as_str().to_string()))
            })
        };
        let (min_size, min_size_unit) = size(criteria.min_size);
        let (max_size, max_size_unit) = size(criteria.max_size);
        let (access_age, access_age_unit) = criteria.access_age.map_or((String::new(), None), |age| {
            (age.value().to_string(), Some(age.unit().as_str().to_string()))
        });
        Self {
            starting_dir: criteria.starting_dir.clone(),
            name_pattern: criteria.name_pattern.clone().unwrap_or_default(),
            pattern_kind: criteria.pattern_kind,
            min_size,
            min_size_unit,
            max_size,
            max_size_unit,
            access_age,
            access_age_unit,
            owner: criteria.owner.clone().unwrap_or_default(),
            group: criteria.group.clone().unwrap_or_default(),
        }
    }
}

fn validate_starting_dir(raw: &str) -> PolicyResult<String> {
    let dir = raw.trim();
    if dir.is_empty() {
        return Err(invalid(
            Field::StartingDirectory,
            FieldIssue::EmptyRequiredField,
            None,
        ));
    }
    if dir.chars().any(char::is_whitespace) {
        return Err(invalid(
            Field::StartingDirectory,
            FieldIssue::ContainsWhitespace,
            Some(dir),
        ));
    }
    if dir.starts_with('/') {
        return Err(invalid(
            Field::StartingDirectory,
            FieldIssue::AbsolutePathNotAllowed,
            Some(dir),
        ));
    }
    Ok(dir.to_string())
}

fn validate_pattern(raw: &str, kind: PatternKind) -> PolicyResult<Option<String>> {
    let pattern = raw.trim();
    if pattern.is_empty() {
        return Ok(None);
    }
    if pattern.chars().any(char::is_whitespace) {
        return Err(invalid(
            Field::NamePattern,
            FieldIssue::ContainsWhitespace,
            Some(pattern),
        ));
    }
    let compiles = match kind {
        PatternKind::Regex => Regex::new(pattern).is_ok(),
        PatternKind::Glob => Glob::new(pattern).is_ok(),
    };
    if !compiles {
        return Err(invalid(
            Field::NamePattern,
            FieldIssue::InvalidPattern,
            Some(pattern),
        ));
    }
    Ok(Some(pattern.to_string()))
}

fn account(field: Field, raw: &str) -> PolicyResult<Option<String>> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid(field, FieldIssue::ContainsWhitespace, Some(name)));
    }
    Ok(Some(name.to_string()))
}

impl PolicyCriteria {
    /// Relative directory the criteria apply beneath.
    #[must_use]
    pub fn starting_dir(&self) -> &str {
        &self.starting_dir
    }

    /// File name pattern.
    #[must_use]
    pub fn name_pattern(&self) -> Option<&str> {
        self.name_pattern.as_deref()
    }

    /// Syntax of [`PolicyCriteria::name_pattern`].
    #[must_use]
    pub const fn pattern_kind(&self) -> PatternKind {
        self.pattern_kind
    }

    /// Lower size bound.
    #[must_use]
    pub const fn min_size(&self) -> Option<SizeValue> {
        self.min_size
    }

    /// Upper size bound.
    #[must_use]
    pub const fn max_size(&self) -> Option<SizeValue> {
        self.max_size
    }

    /// Access age.
    #[must_use]
    pub const fn access_age(&self) -> Option<TimeValue> {
        self.access_age
    }

    /// `(value, unit seconds)` for the manager; `(-1, -1)` when unset.
    #[must_use]
    pub fn access_age_raw(&self) -> (i64, i64) {
        self.access_age.map_or((-1, -1), |age| {
            (
                i64::try_from(age.value()).unwrap_or(i64::MAX),
                i64::try_from(age.unit().seconds()).unwrap_or(i64::MAX),
            )
        })
    }

    /// Owning user.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Owning group.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

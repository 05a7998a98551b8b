//! Volume pools: naming rules, media-type partitioning and pool references.
//!
//! # Design
//! - Pool names are unique per server regardless of media type; both
//!   partitioning and pool creation reject collisions.
//! - Every partition bucket starts with a `NoneSelected` sentinel so an empty
//!   bucket is observable rather than an error.
//! - The semicolon/comma boundary form (`"202=NOVAL,pool1;100=NOVAL"`) is
//!   only produced and consumed by `PoolPartition::encode` / `decode`.
//! - A catalog that cannot be loaded degrades to empty instead of failing
//!   the step.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display, Formatter};

use archpol_config::EngineLimits;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::EngineContext;
use crate::error::{Field, FieldIssue, PolicyError, PolicyResult, backend, invalid};
use crate::manager::{ArchiveManager, ManagerError};
use crate::media::MediaType;

/// Pool expression meaning "any available volume of the media type".
pub const ANY_VOLUME: &str = ".";
/// Alternate spelling of [`ANY_VOLUME`] accepted from front ends.
pub const ANY_VOLUME_TOKEN: &str = "*";
/// Sentinel entry at the head of every encoded bucket.
pub const NO_VALUE: &str = "NOVAL";

/// A named, media-homogeneous collection of volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VsnPool {
    name: String,
    media_type: MediaType,
    #[serde(default)]
    members: String,
}

impl VsnPool {
    /// Construct a pool description.
    #[must_use]
    pub fn new(name: impl Into<String>, media_type: MediaType, members: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            media_type,
            members: members.into(),
        }
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Media type shared by every volume in the pool.
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// VSN expression describing the members.
    #[must_use]
    pub fn members(&self) -> &str {
        &self.members
    }
}

/// One selectable entry in a media-type bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolChoice {
    /// Leading "none selected" sentinel.
    NoneSelected,
    /// A named pool.
    Pool(String),
}

/// Pools grouped by media type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolPartition {
    buckets: BTreeMap<MediaType, Vec<PoolChoice>>,
}

/// Group pools into one bucket per media type.
///
/// Every available media type gets a bucket, and so does the media type of
/// any pool even if it is not listed as available.
///
/// # Errors
///
/// `DuplicatePoolName` when two pools share a name.
pub fn partition(pools: &[VsnPool], media_types: &[MediaType]) -> PolicyResult<PoolPartition> {
    let mut partition = PoolPartition::default();
    for media_type in media_types {
        partition.bucket_mut(*media_type);
    }
    let mut seen = HashMap::new();
    for pool in pools {
        partition.insert(&mut seen, pool.name(), pool.media_type())?;
    }
    Ok(partition)
}

impl PoolPartition {
    fn bucket_mut(&mut self, media_type: MediaType) -> &mut Vec<PoolChoice> {
        self.buckets
            .entry(media_type)
            .or_insert_with(|| vec![PoolChoice::NoneSelected])
    }

    fn insert<'a>(
        &mut self,
        seen: &mut HashMap<&'a str, MediaType>,
        name: &'a str,
        media_type: MediaType,
    ) -> PolicyResult<()> {
        if seen.insert(name, media_type).is_some() {
            return Err(PolicyError::DuplicatePoolName {
                name: name.to_string(),
            });
        }
        self.bucket_mut(media_type)
            .push(PoolChoice::Pool(name.to_string()));
        Ok(())
    }

    /// Media types with a bucket, in code order.
    pub fn media_types(&self) -> impl Iterator<Item = MediaType> + '_ {
        self.buckets.keys().copied()
    }

    /// Choices for a media type, sentinel first; empty if the media type is unknown.
    #[must_use]
    pub fn choices(&self, media_type: MediaType) -> &[PoolChoice] {
        self.buckets.get(&media_type).map_or(&[], Vec::as_slice)
    }

    /// Pool names for a media type, without the sentinel.
    #[must_use]
    pub fn pool_names(&self, media_type: MediaType) -> Vec<&str> {
        self.choices(media_type)
            .iter()
            .filter_map(|choice| match choice {
                PoolChoice::Pool(name) => Some(name.as_str()),
                PoolChoice::NoneSelected => None,
            })
            .collect()
    }

    /// True when no pool exists for the media type; front ends offer to
    /// create one.
    #[must_use]
    pub fn is_empty_for(&self, media_type: MediaType) -> bool {
        self.pool_names(media_type).is_empty()
    }

    /// Media type of a named pool.
    #[must_use]
    pub fn media_type_of(&self, name: &str) -> Option<MediaType> {
        self.buckets.iter().find_map(|(media_type, choices)| {
            choices
                .iter()
                .any(|choice| matches!(choice, PoolChoice::Pool(pool) if pool == name))
                .then_some(*media_type)
        })
    }

    /// Total entries across all buckets, sentinels included.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Encode as `"code=NOVAL,pool1,pool2;code=NOVAL"`.
    #[must_use]
    pub fn encode(&self) -> String {
        self.buckets
            .iter()
            .map(|(media_type, choices)| {
                let entries: Vec<&str> = choices
                    .iter()
                    .map(|choice| match choice {
                        PoolChoice::NoneSelected => NO_VALUE,
                        PoolChoice::Pool(name) => name.as_str(),
                    })
                    .collect();
                format!("{}={}", media_type.code(), entries.join(","))
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Decode the form produced by [`PoolPartition::encode`].
    ///
    /// # Errors
    ///
    /// `MalformedReference` on the media pool field for a malformed bucket,
    /// and `DuplicatePoolName` when a name appears twice.
    pub fn decode(raw: &str) -> PolicyResult<Self> {
        let mut partition = Self::default();
        let mut seen = HashMap::new();
        for bucket in raw.split(';').map(str::trim).filter(|b| !b.is_empty()) {
            let malformed = || invalid(Field::MediaPool, FieldIssue::MalformedReference, Some(bucket));
            let (code, entries) = bucket.split_once('=').ok_or_else(malformed)?;
            let media_type = code
                .trim()
                .parse::<i32>()
                .map(MediaType::from_code)
                .map_err(|_| malformed())?;
            let mut entries = entries.split(',').map(str::trim);
            if entries.next() != Some(NO_VALUE) {
                return Err(malformed());
            }
            partition.bucket_mut(media_type);
            for name in entries {
                if name.is_empty() {
                    return Err(malformed());
                }
                partition.insert(&mut seen, name, media_type)?;
            }
        }
        Ok(partition)
    }
}

/// Pools a copy writes to: a wildcard, or a primary plus optional scratch pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSelection {
    pool_names: Vec<String>,
    any_volume: bool,
}

impl PoolSelection {
    /// Any available volume of the media type.
    #[must_use]
    pub const fn any_volume() -> Self {
        Self {
            pool_names: Vec::new(),
            any_volume: true,
        }
    }

    /// Named pools in order.
    #[must_use]
    pub const fn named(pool_names: Vec<String>) -> Self {
        Self {
            pool_names,
            any_volume: false,
        }
    }

    /// Whether this is the wildcard selection.
    #[must_use]
    pub const fn is_any_volume(&self) -> bool {
        self.any_volume
    }

    /// Named pools in order.
    #[must_use]
    pub fn pool_names(&self) -> &[String] {
        &self.pool_names
    }

    /// Primary pool.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.pool_names.first().map(String::as_str)
    }

    /// Scratch (overflow) pool.
    #[must_use]
    pub fn scratch(&self) -> Option<&str> {
        self.pool_names.get(1).map(String::as_str)
    }
}

impl Display for PoolSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.any_volume {
            f.write_str(ANY_VOLUME)
        } else {
            f.write_str(&self.pool_names.join(","))
        }
    }
}

/// Interpret a pool expression: `.` (or `*`) for any volume, otherwise a
/// comma-joined list whose first entry is the primary pool and second, if
/// present, the scratch pool.
///
/// # Errors
///
/// `EmptyRequiredField` for a blank expression, `MalformedReference` for
/// blank, whitespace-containing or repeated entries.
pub fn resolve_pool_reference(expression: &str) -> PolicyResult<PoolSelection> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(invalid(Field::MediaPool, FieldIssue::EmptyRequiredField, None));
    }
    if trimmed == ANY_VOLUME || trimmed == ANY_VOLUME_TOKEN {
        return Ok(PoolSelection::any_volume());
    }

    let mut names: Vec<String> = Vec::new();
    for entry in trimmed.split(',').map(str::trim) {
        if entry.is_empty()
            || entry.chars().any(char::is_whitespace)
            || names.iter().any(|name| name == entry)
        {
            return Err(invalid(
                Field::MediaPool,
                FieldIssue::MalformedReference,
                Some(trimmed),
            ));
        }
        names.push(entry.to_string());
    }
    Ok(PoolSelection::named(names))
}

/// Validate a new pool name.
///
/// # Errors
///
/// `EmptyRequiredField`, `ContainsWhitespace`, `InvalidPoolName` (leading
/// digit or a character other than letters, digits, `_`, `.`, `-`) or
/// `PoolNameTooLong`.
pub fn validate_pool_name(name: &str, limits: &EngineLimits) -> PolicyResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid(Field::PoolName, FieldIssue::EmptyRequiredField, None));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid(Field::PoolName, FieldIssue::ContainsWhitespace, Some(name)));
    }
    let starts_with_digit = name.chars().next().is_some_and(|c| c.is_ascii_digit());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if starts_with_digit || !valid_chars {
        return Err(invalid(Field::PoolName, FieldIssue::InvalidPoolName, Some(name)));
    }
    if name.chars().count() > limits.pool_name_max_len {
        return Err(invalid(Field::PoolName, FieldIssue::PoolNameTooLong, Some(name)));
    }
    Ok(())
}

/// Explicit volume list or range assigned to a pool or a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VsnExpression {
    /// A single VSN or VSN pattern.
    Single(String),
    /// Inclusive range of equal-length VSNs.
    Range {
        /// First VSN.
        start: String,
        /// Last VSN.
        end: String,
    },
    /// Explicit list.
    List(Vec<String>),
}

impl VsnExpression {
    /// Build from start/end inputs. Either side alone is the whole
    /// expression.
    ///
    /// # Errors
    ///
    /// `EmptyRequiredField` when both are blank, `MalformedReference` when
    /// the range is inverted, mixed-length or contains whitespace.
    pub fn from_range(start: &str, end: &str) -> PolicyResult<Self> {
        let (start, end) = (start.trim(), end.trim());
        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(invalid(
                Field::VsnExpression,
                FieldIssue::EmptyRequiredField,
                None,
            )),
            (false, true) => Ok(Self::Single(vsn_token(start)?.to_string())),
            (true, false) => Ok(Self::Single(vsn_token(end)?.to_string())),
            (false, false) => {
                let (start, end) = (vsn_token(start)?, vsn_token(end)?);
                if start.len() != end.len() || start > end {
                    return Err(invalid(
                        Field::VsnExpression,
                        FieldIssue::MalformedReference,
                        Some(&format!("{start}-{end}")),
                    ));
                }
                Ok(Self::Range {
                    start: start.to_string(),
                    end: end.to_string(),
                })
            }
        }
    }

    /// Parse `A-B`, `A,B,C` or a single token.
    ///
    /// # Errors
    ///
    /// Same issues as [`VsnExpression::from_range`].
    pub fn parse(raw: &str) -> PolicyResult<Self> {
        let trimmed = raw.trim();
        if trimmed.contains(',') {
            let entries = trimmed
                .split(',')
                .map(|entry| vsn_token(entry.trim()).map(str::to_string))
                .collect::<PolicyResult<Vec<_>>>()?;
            return Ok(Self::List(entries));
        }
        match trimmed.split_once('-') {
            Some((start, end)) if is_plain_vsn(start) && is_plain_vsn(end) => {
                Self::from_range(start, end)
            }
            _ => Self::from_range(trimmed, ""),
        }
    }
}

impl Display for VsnExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(vsn) => f.write_str(vsn),
            Self::Range { start, end } => write!(f, "{start}-{end}"),
            Self::List(vsns) => f.write_str(&vsns.join(",")),
        }
    }
}

fn is_plain_vsn(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric())
}

fn vsn_token(token: &str) -> PolicyResult<&str> {
    if token.is_empty() || token.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(invalid(
            Field::VsnExpression,
            FieldIssue::MalformedReference,
            Some(token),
        ));
    }
    Ok(token)
}

/// A validated, not yet created, pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDraft {
    name: String,
    media_type: MediaType,
    members: VsnExpression,
}

impl PoolDraft {
    /// Validate a new pool against the naming rules and the existing pools.
    ///
    /// # Errors
    ///
    /// Name validation errors, VSN expression errors, or `DuplicatePoolName`
    /// when any existing pool already uses the name, whatever its media type.
    pub fn validate(
        name: &str,
        media_type: MediaType,
        members: &str,
        existing: &[VsnPool],
        limits: &EngineLimits,
    ) -> PolicyResult<Self> {
        validate_pool_name(name, limits)?;
        let name = name.trim();
        if existing.iter().any(|pool| pool.name() == name) {
            return Err(PolicyError::DuplicatePoolName {
                name: name.to_string(),
            });
        }
        let members = VsnExpression::parse(members)?;
        Ok(Self {
            name: name.to_string(),
            media_type,
            members,
        })
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Media type of the pool.
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Member expression.
    #[must_use]
    pub const fn members(&self) -> &VsnExpression {
        &self.members
    }
}

/// Validate and create a pool through the manager.
///
/// # Errors
///
/// Validation errors from [`PoolDraft::validate`], or a backend error when
/// the existing pools cannot be listed or the creation fails. A manager
/// warning counts as success.
pub fn create_pool(
    manager: &dyn ArchiveManager,
    ctx: &EngineContext,
    name: &str,
    media_type: MediaType,
    members: &str,
) -> PolicyResult<PoolDraft> {
    let existing = manager
        .vsn_pools()
        .map_err(|source| backend("vsn_pools", source))?;
    let draft = PoolDraft::validate(name, media_type, members, &existing, ctx.limits())
        .inspect_err(|err| ctx.record(err))?;

    match manager.create_vsn_pool(draft.name(), draft.media_type(), &draft.members().to_string()) {
        Ok(()) => {}
        Err(ManagerError::Warning { messages }) => {
            warn!(pool = draft.name(), ?messages, "volume pool created with warnings");
        }
        Err(source) => return Err(backend("create_vsn_pool", source)),
    }
    ctx.metrics().inc_pool_created();
    info!(pool = draft.name(), media_type = %draft.media_type(), "volume pool created");
    Ok(draft)
}

/// Pools and media types as seen by one wizard session.
#[derive(Debug, Clone, Default)]
pub struct PoolCatalog {
    partition: PoolPartition,
    pools: Vec<VsnPool>,
    degraded: bool,
}

impl PoolCatalog {
    /// Build a catalog from known pools and media types.
    ///
    /// # Errors
    ///
    /// `DuplicatePoolName` when two pools share a name.
    pub fn from_parts(pools: Vec<VsnPool>, media_types: &[MediaType]) -> PolicyResult<Self> {
        let partition = partition(&pools, media_types)?;
        Ok(Self {
            partition,
            pools,
            degraded: false,
        })
    }

    /// Empty catalog flagged as degraded, for steps that run before the
    /// manager has been read. Any-volume assignments still pass; named pools
    /// fail with `UnknownPool`.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }

    /// Load the catalog from the manager. If media types or pools cannot be
    /// listed the catalog degrades to what could be read.
    ///
    /// # Errors
    ///
    /// `DuplicatePoolName` when the manager reports two pools with one name.
    pub fn load(manager: &dyn ArchiveManager, ctx: &EngineContext) -> PolicyResult<Self> {
        let mut degraded = false;
        let media_types = manager.available_media_types().unwrap_or_else(|err| {
            warn!(error = %err, "media types unavailable; continuing without them");
            degraded = true;
            Vec::new()
        });
        let pools = manager.vsn_pools().unwrap_or_else(|err| {
            warn!(error = %err, "volume pools unavailable; continuing with an empty catalog");
            degraded = true;
            Vec::new()
        });
        if degraded {
            ctx.metrics().inc_pool_catalog_degraded();
        }
        let mut catalog = Self::from_parts(pools, &media_types)?;
        catalog.degraded = degraded;
        Ok(catalog)
    }

    /// Media-type partition.
    #[must_use]
    pub const fn partition(&self) -> &PoolPartition {
        &self.partition
    }

    /// All pools.
    #[must_use]
    pub fn pools(&self) -> &[VsnPool] {
        &self.pools
    }

    /// Whether the manager could not be fully read.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Check that `name` is a pool of `media_type`.
    ///
    /// # Errors
    ///
    /// `UnknownPool` or `MediaTypeMismatch` on `field`.
    pub fn check_pool(&self, field: Field, name: &str, media_type: MediaType) -> PolicyResult<()> {
        match self.partition.media_type_of(name) {
            None => Err(invalid(field, FieldIssue::UnknownPool, Some(name))),
            Some(found) if found != media_type => {
                Err(invalid(field, FieldIssue::MediaTypeMismatch, Some(name)))
            }
            Some(_) => Ok(()),
        }
    }
}

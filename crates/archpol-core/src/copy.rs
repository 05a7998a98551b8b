//! Per-copy parameter assembly.
//!
//! # Design
//! - Each copy number owns a `CopySlot`: a state plus the descriptor being
//!   assembled. Steps validate everything first and only then replace the
//!   descriptor, so a rejected step leaves the slot untouched.
//! - States only move forward; `revisit` drops back to `AgeSet` while keeping
//!   every captured value.
//! - Disk copies never carry a reservation method.
//! - Tape and disk option sets are distinct types selected by the copy kind.

use std::fmt::{self, Display, Formatter};

use archpol_config::{EngineLimits, WizardDefaults};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::EngineContext;
use crate::error::{Field, FieldIssue, PolicyError, PolicyResult, invalid};
use crate::media::MediaType;
use crate::pool::{PoolCatalog, PoolSelection, VsnExpression};
use crate::reservation::ReservationMethod;
use crate::units::{
    SizeValue, TimeUnit, TimeValue, validate_count, validate_pair, validate_percent,
    validate_size, validate_time,
};

/// Copy number in `1..=max_copies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CopyNumber(u8);

impl CopyNumber {
    /// Validate a copy number against the configured maximum.
    ///
    /// # Errors
    ///
    /// `CopyNumberOutOfRange` on the copy number field.
    pub fn new(number: u8, limits: &EngineLimits) -> PolicyResult<Self> {
        if number == 0 || number > limits.max_copies {
            return Err(invalid(
                Field::CopyNumber,
                FieldIssue::CopyNumberOutOfRange,
                Some(&number.to_string()),
            ));
        }
        Ok(Self(number))
    }

    /// Numeric value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Display for CopyNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// When archived copies expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    /// Copies never expire.
    Never,
    /// Copies expire after the given age.
    After(TimeValue),
}

impl Expiration {
    /// `(value, unit seconds)` as stored by the archiver; `(-1, -1)` for never.
    #[must_use]
    pub fn as_raw(&self) -> (i64, i64) {
        match self {
            Self::Never => (-1, -1),
            Self::After(age) => (
                i64::try_from(age.value()).unwrap_or(i64::MAX),
                i64::try_from(age.unit().seconds()).unwrap_or(i64::MAX),
            ),
        }
    }
}

/// Which options page a copy routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyKind {
    /// Disk archiving.
    DiskBase,
    /// Removable media archiving.
    TapeBase,
}

impl CopyKind {
    /// Tag for a media type.
    #[must_use]
    pub const fn for_media(media_type: MediaType) -> Self {
        if media_type.is_disk() {
            Self::DiskBase
        } else {
            Self::TapeBase
        }
    }
}

/// Where a copy's volumes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAssignment {
    /// Volume pools (or any volume).
    Pools(PoolSelection),
    /// Explicit VSN map expression.
    Vsns(VsnExpression),
}

/// Media type plus assignment for a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyMedia {
    media_type: MediaType,
    assignment: MediaAssignment,
}

impl CopyMedia {
    /// Media type.
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Pool or VSN assignment.
    #[must_use]
    pub const fn assignment(&self) -> &MediaAssignment {
        &self.assignment
    }
}

/// How offline files are archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflineCopy {
    /// Copy directly from the offline volume.
    Direct,
    /// Stage the next file while archiving the current one.
    StageAhead,
    /// Stage every file before archiving.
    StageAll,
}

impl OfflineCopy {
    fn parse(raw: &str) -> PolicyResult<Option<Self>> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(None),
            "direct" => Ok(Some(Self::Direct)),
            "stageahead" => Ok(Some(Self::StageAhead)),
            "stageall" => Ok(Some(Self::StageAll)),
            _ => Err(invalid(
                Field::OfflineCopy,
                FieldIssue::UnknownOfflineCopy,
                Some(raw.trim()),
            )),
        }
    }
}

/// Size window for splitting a copy across drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveLimits {
    /// Files smaller than this use one drive.
    pub min: SizeValue,
    /// Upper bound for multi-drive archiving.
    pub max: SizeValue,
}

/// Options for copies on removable media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeCopyOptions {
    /// Offline copy method.
    pub offline_copy: Option<OfflineCopy>,
    /// Number of drives.
    pub drives: Option<u64>,
    /// Multi-drive size window.
    pub drive_limits: Option<DriveLimits>,
    /// Start archiving once the oldest file reaches this age.
    pub start_age: Option<TimeValue>,
    /// Start archiving once this many files are pending.
    pub start_count: Option<u64>,
    /// Start archiving once this much data is pending.
    pub start_size: Option<SizeValue>,
}

/// Options for disk copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCopyOptions {
    /// Offline copy method.
    pub offline_copy: Option<OfflineCopy>,
    /// Start archiving once the oldest file reaches this age.
    pub start_age: Option<TimeValue>,
    /// Start archiving once this many files are pending.
    pub start_count: Option<u64>,
    /// Start archiving once this much data is pending.
    pub start_size: Option<SizeValue>,
    /// Recycle once usage passes this percentage.
    pub recycle_hwm: Option<u8>,
    /// Minimum percentage gain before a volume is recycled.
    pub min_gain: Option<u8>,
    /// Address notified when recycling runs.
    pub notify_address: Option<String>,
}

/// Options by copy kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOptions {
    /// Removable media options.
    Tape(TapeCopyOptions),
    /// Disk options.
    Disk(DiskCopyOptions),
}

impl CopyOptions {
    const fn kind(&self) -> CopyKind {
        match self {
            Self::Tape(_) => CopyKind::TapeBase,
            Self::Disk(_) => CopyKind::DiskBase,
        }
    }
}

/// Raw options form input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct CopyOptionsInput {
    pub offline_copy: String,
    pub drives: String,
    pub drive_min: String,
    pub drive_min_unit: Option<String>,
    pub drive_max: String,
    pub drive_max_unit: Option<String>,
    pub start_age: String,
    pub start_age_unit: Option<String>,
    pub start_count: String,
    pub start_size: String,
    pub start_size_unit: Option<String>,
    pub recycle_hwm: String,
    pub min_gain: String,
    pub notify_address: String,
}

impl CopyOptionsInput {
    /// Validate the options for a copy of `kind`.
    ///
    /// # Errors
    ///
    /// Field errors for malformed values, `PairIncomplete` when only one drive
    /// limit is given, and `MediaTypeMismatch` for options of the other kind.
    pub fn validate(&self, kind: CopyKind, limits: &EngineLimits) -> PolicyResult<CopyOptions> {
        let offline_copy = OfflineCopy::parse(&self.offline_copy)?;
        let start_age = validate_time(
            Field::StartAge,
            &self.start_age,
            self.start_age_unit.as_deref(),
            false,
            limits,
        )?;
        let start_count = validate_count(Field::StartCount, &self.start_count)?;
        let start_size = validate_size(
            Field::StartSize,
            &self.start_size,
            self.start_size_unit.as_deref(),
            false,
            limits,
        )?;

        match kind {
            CopyKind::TapeBase => {
                reject_present(Field::RecycleHighWaterMark, &self.recycle_hwm)?;
                reject_present(Field::MinGain, &self.min_gain)?;
                reject_present(Field::NotifyAddress, &self.notify_address)?;
                Ok(CopyOptions::Tape(TapeCopyOptions {
                    offline_copy,
                    drives: validate_count(Field::Drives, &self.drives)?,
                    drive_limits: self.drive_limits(limits)?,
                    start_age,
                    start_count,
                    start_size,
                }))
            }
            CopyKind::DiskBase => {
                reject_present(Field::Drives, &self.drives)?;
                reject_present(Field::DriveMin, &self.drive_min)?;
                reject_present(Field::DriveMax, &self.drive_max)?;
                Ok(CopyOptions::Disk(DiskCopyOptions {
                    offline_copy,
                    start_age,
                    start_count,
                    start_size,
                    recycle_hwm: validate_percent(Field::RecycleHighWaterMark, &self.recycle_hwm)?,
                    min_gain: validate_percent(Field::MinGain, &self.min_gain)?,
                    notify_address: validate_mail_address(&self.notify_address)?,
                }))
            }
        }
    }

    fn drive_limits(&self, limits: &EngineLimits) -> PolicyResult<Option<DriveLimits>> {
        let min = validate_size(
            Field::DriveMin,
            &self.drive_min,
            self.drive_min_unit.as_deref(),
            false,
            limits,
        )?;
        let max = validate_size(
            Field::DriveMax,
            &self.drive_max,
            self.drive_max_unit.as_deref(),
            false,
            limits,
        )?;
        match (min, max) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(invalid(Field::DriveMax, FieldIssue::PairIncomplete, None)),
            (None, Some(_)) => Err(invalid(Field::DriveMin, FieldIssue::PairIncomplete, None)),
            (Some(min), Some(max)) => {
                validate_pair(Field::DriveMin, Some(&min), Some(&max))?;
                Ok(Some(DriveLimits { min, max }))
            }
        }
    }
}

fn reject_present(field: Field, raw: &str) -> PolicyResult<()> {
    if raw.trim().is_empty() {
        Ok(())
    } else {
        Err(invalid(field, FieldIssue::MediaTypeMismatch, Some(raw.trim())))
    }
}

fn validate_mail_address(raw: &str) -> PolicyResult<Option<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let valid = trimmed.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.split('.').count() >= 2
            && domain.split('.').all(|label| !label.is_empty())
    }) && !trimmed.chars().any(char::is_whitespace);
    if valid {
        Ok(Some(trimmed.to_string()))
    } else {
        Err(invalid(
            Field::NotifyAddress,
            FieldIssue::InvalidMailAddress,
            Some(trimmed),
        ))
    }
}

/// Normalised parameters of one archive copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyDescriptor {
    number: CopyNumber,
    archive_age: TimeValue,
    expiration: Expiration,
    media: Option<CopyMedia>,
    kind: CopyKind,
    reservation: ReservationMethod,
    ignore_recycle: bool,
    options: Option<CopyOptions>,
    will_be_saved: bool,
}

impl CopyDescriptor {
    /// Default-constructed descriptor for a copy seen for the first time:
    /// default archive age, never expires, no media, no reservation.
    #[must_use]
    pub const fn new(number: CopyNumber, defaults: &WizardDefaults) -> Self {
        Self {
            number,
            archive_age: TimeValue::new(defaults.archive_age_minutes, TimeUnit::Minutes),
            expiration: Expiration::Never,
            media: None,
            kind: CopyKind::TapeBase,
            reservation: ReservationMethod::NONE,
            ignore_recycle: false,
            options: None,
            will_be_saved: false,
        }
    }

    /// Copy number.
    #[must_use]
    pub const fn number(&self) -> CopyNumber {
        self.number
    }

    /// Archive age.
    #[must_use]
    pub const fn archive_age(&self) -> TimeValue {
        self.archive_age
    }

    /// Expiration.
    #[must_use]
    pub const fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// Media assignment, once set.
    #[must_use]
    pub const fn media(&self) -> Option<&CopyMedia> {
        self.media.as_ref()
    }

    /// Options page routing tag.
    #[must_use]
    pub const fn kind(&self) -> CopyKind {
        self.kind
    }

    /// Reservation method.
    #[must_use]
    pub const fn reservation(&self) -> ReservationMethod {
        self.reservation
    }

    /// Whether the recycler ignores this copy.
    #[must_use]
    pub const fn ignore_recycle(&self) -> bool {
        self.ignore_recycle
    }

    /// Kind-specific options, once set.
    #[must_use]
    pub const fn options(&self) -> Option<&CopyOptions> {
        self.options.as_ref()
    }

    /// Whether the copy is marked for persistence.
    #[must_use]
    pub const fn will_be_saved(&self) -> bool {
        self.will_be_saved
    }

    pub(crate) const fn mark_for_save(&mut self) {
        self.will_be_saved = true;
    }
}

/// Assembly progress of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyState {
    /// Nothing captured yet.
    Uninitialized,
    /// Archive age (and expiration) captured.
    AgeSet,
    /// Media assigned.
    MediaAssigned,
    /// Reservation captured.
    ReservationSet,
    /// Ready for submission.
    Committed,
}

/// Whether blank mandatory fields fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    /// Interactive wizard: mandatory fields must be filled in.
    Wizard,
    /// Direct edits: blank fields take their defaults.
    Direct,
}

/// One entry in the session copy map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySlot {
    state: CopyState,
    descriptor: CopyDescriptor,
}

impl CopySlot {
    /// Fresh slot holding a default descriptor.
    #[must_use]
    pub const fn new(number: CopyNumber, defaults: &WizardDefaults) -> Self {
        Self {
            state: CopyState::Uninitialized,
            descriptor: CopyDescriptor::new(number, defaults),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CopyState {
        self.state
    }

    /// Descriptor assembled so far.
    #[must_use]
    pub const fn descriptor(&self) -> &CopyDescriptor {
        &self.descriptor
    }

    /// Capture the archive age. Always re-enters `AgeSet`.
    ///
    /// # Errors
    ///
    /// `EmptyRequiredField` for a blank age in wizard mode, `InvalidAge` for
    /// zero, and the unit/range errors of [`validate_time`].
    pub fn set_archive_age(
        &mut self,
        raw: &str,
        unit: Option<&str>,
        mode: EntryMode,
        ctx: &EngineContext,
    ) -> PolicyResult<()> {
        let required = mode == EntryMode::Wizard;
        let age = validate_time(Field::ArchiveAge, raw, unit, required, ctx.limits())
            .and_then(|age| match age {
                Some(age) if age.value() == 0 => {
                    Err(invalid(Field::ArchiveAge, FieldIssue::InvalidAge, Some(raw.trim())))
                }
                Some(age) => Ok(age),
                None => Ok(TimeValue::new(
                    ctx.defaults().archive_age_minutes,
                    TimeUnit::Minutes,
                )),
            })
            .inspect_err(|err| ctx.record(err))?;

        let mut next = self.descriptor.clone();
        next.archive_age = age;
        self.descriptor = next;
        self.state = CopyState::AgeSet;
        Ok(())
    }

    /// Capture the expiration age; blank means never.
    ///
    /// # Errors
    ///
    /// `InvalidAge` for zero, unit/range errors, or `InvalidTransition`
    /// before the archive age is set.
    pub fn set_expiration(
        &mut self,
        raw: &str,
        unit: Option<&str>,
        ctx: &EngineContext,
    ) -> PolicyResult<()> {
        self.require(CopyState::AgeSet, "set_expiration")?;
        let expiration = validate_time(Field::ExpirationAge, raw, unit, false, ctx.limits())
            .and_then(|age| match age {
                Some(age) if age.value() == 0 => Err(invalid(
                    Field::ExpirationAge,
                    FieldIssue::InvalidAge,
                    Some(raw.trim()),
                )),
                Some(age) => Ok(Expiration::After(age)),
                None => Ok(Expiration::Never),
            })
            .inspect_err(|err| ctx.record(err))?;

        let mut next = self.descriptor.clone();
        next.expiration = expiration;
        self.replace(next, CopyState::AgeSet);
        Ok(())
    }

    /// Assign media. The copy kind follows the media type, and disk copies
    /// lose any reservation.
    ///
    /// # Errors
    ///
    /// `UnknownPool` / `MediaTypeMismatch` for pools not in `catalog` under
    /// `media_type`, or `InvalidTransition` before the archive age is set.
    pub fn set_media(
        &mut self,
        media_type: MediaType,
        assignment: MediaAssignment,
        enable_recycling: bool,
        catalog: &PoolCatalog,
        ctx: &EngineContext,
    ) -> PolicyResult<()> {
        self.require(CopyState::AgeSet, "set_media")?;
        if let MediaAssignment::Pools(selection) = &assignment {
            let fields = [Field::MediaPool, Field::ScratchPool];
            for (name, field) in selection.pool_names().iter().zip(fields) {
                catalog
                    .check_pool(field, name, media_type)
                    .inspect_err(|err| ctx.record(err))?;
            }
        }

        let kind = CopyKind::for_media(media_type);
        let mut next = self.descriptor.clone();
        next.media = Some(CopyMedia {
            media_type,
            assignment,
        });
        next.kind = kind;
        next.ignore_recycle = !enable_recycling;
        if kind == CopyKind::DiskBase {
            next.reservation = ReservationMethod::NONE;
        }
        if next.options.as_ref().is_some_and(|options| options.kind() != kind) {
            next.options = None;
        }
        self.replace(next, CopyState::MediaAssigned);
        debug!(copy = %self.descriptor.number, media_type = %media_type, ?kind, "media assigned");
        Ok(())
    }

    /// Capture the reservation code. Disk copies always store none.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` before media is assigned.
    pub fn set_reservation(&mut self, code: i32) -> PolicyResult<()> {
        self.require(CopyState::MediaAssigned, "set_reservation")?;
        let method = match self.descriptor.kind {
            CopyKind::DiskBase => {
                if code > 0 {
                    debug!(copy = %self.descriptor.number, code, "reservation ignored for disk copy");
                }
                ReservationMethod::NONE
            }
            CopyKind::TapeBase => ReservationMethod::decode(code),
        };
        let mut next = self.descriptor.clone();
        next.reservation = method;
        self.replace(next, CopyState::ReservationSet);
        Ok(())
    }

    /// Restricted reservation input used when a single copy is added to an
    /// existing policy: reserve by volume set, or nothing.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` before media is assigned.
    pub fn set_reservation_toggle(&mut self, reserve_set: bool) -> PolicyResult<()> {
        self.set_reservation(ReservationMethod::from_set_toggle(reserve_set).encode())
    }

    /// Capture kind-specific options.
    ///
    /// # Errors
    ///
    /// Option validation errors, or `InvalidTransition` before media is
    /// assigned.
    pub fn set_options(&mut self, input: &CopyOptionsInput, ctx: &EngineContext) -> PolicyResult<()> {
        self.require(CopyState::MediaAssigned, "set_options")?;
        let options = input
            .validate(self.descriptor.kind, ctx.limits())
            .inspect_err(|err| ctx.record(err))?;
        let mut next = self.descriptor.clone();
        next.options = Some(options);
        self.replace(next, CopyState::MediaAssigned);
        Ok(())
    }

    /// Step back to `AgeSet`, keeping every captured value.
    pub fn revisit(&mut self) {
        if self.state > CopyState::AgeSet {
            self.state = CopyState::AgeSet;
        }
    }

    /// Mark the copy ready for submission.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` before media is assigned.
    pub fn commit(&mut self) -> PolicyResult<()> {
        self.require(CopyState::MediaAssigned, "commit")?;
        self.state = CopyState::Committed;
        Ok(())
    }

    fn require(&self, minimum: CopyState, step: &'static str) -> PolicyResult<()> {
        if self.state < minimum {
            return Err(PolicyError::InvalidTransition {
                copy: self.descriptor.number.get(),
                state: self.state,
                step,
            });
        }
        Ok(())
    }

    fn replace(&mut self, descriptor: CopyDescriptor, reached: CopyState) {
        self.descriptor = descriptor;
        self.state = self.state.max(reached);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{VsnPool, resolve_pool_reference};
    use crate::reservation::{ATTRIBUTE_GROUP, RESERVE_FS};
    use archpol_config::EngineConfig;
    use archpol_telemetry::Metrics;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn ctx() -> Result<EngineContext, Box<dyn std::error::Error>> {
        Ok(EngineContext::new(EngineConfig::default(), Metrics::new()?))
    }

    fn slot(number: u8) -> Result<CopySlot, Box<dyn std::error::Error>> {
        let config = EngineConfig::default();
        Ok(CopySlot::new(
            CopyNumber::new(number, &config.limits)?,
            &config.defaults,
        ))
    }

    fn catalog() -> Result<PoolCatalog, Box<dyn std::error::Error>> {
        Ok(PoolCatalog::from_parts(
            vec![
                VsnPool::new("lto_a", MediaType::LTO, "VOL000-VOL099"),
                VsnPool::new("scratch", MediaType::LTO, "VOL100-VOL199"),
                VsnPool::new("disk_a", MediaType::DISK, "disk01"),
            ],
            &[MediaType::LTO, MediaType::DISK],
        )?)
    }

    #[test]
    fn copy_numbers_are_bounded() {
        let limits = EngineLimits::default();
        assert!(CopyNumber::new(1, &limits).is_ok());
        assert!(CopyNumber::new(4, &limits).is_ok());
        assert!(CopyNumber::new(0, &limits).is_err());
        assert!(CopyNumber::new(5, &limits).is_err());
    }

    #[test]
    fn archive_age_zero_is_rejected_in_every_mode() -> TestResult {
        let ctx = ctx()?;
        for mode in [EntryMode::Wizard, EntryMode::Direct] {
            let mut slot = slot(1)?;
            let err = slot.set_archive_age("0", Some("m"), mode, &ctx);
            assert_eq!(err.err().and_then(|e| e.issue()), Some(FieldIssue::InvalidAge));
            assert_eq!(slot.state(), CopyState::Uninitialized);
        }
        Ok(())
    }

    #[test]
    fn blank_archive_age_defaults_only_outside_the_wizard() -> TestResult {
        let ctx = ctx()?;
        let mut wizard = slot(1)?;
        assert_eq!(
            wizard
                .set_archive_age("", None, EntryMode::Wizard, &ctx)
                .err()
                .and_then(|e| e.issue()),
            Some(FieldIssue::EmptyRequiredField)
        );

        let mut direct = slot(1)?;
        direct.set_archive_age("", None, EntryMode::Direct, &ctx)?;
        assert_eq!(
            direct.descriptor().archive_age(),
            TimeValue::new(4, TimeUnit::Minutes)
        );
        assert_eq!(direct.state(), CopyState::AgeSet);
        Ok(())
    }

    #[test]
    fn expiration_blank_means_never() -> TestResult {
        let ctx = ctx()?;
        let mut slot = slot(1)?;
        slot.set_archive_age("10", Some("m"), EntryMode::Wizard, &ctx)?;
        slot.set_expiration("", None, &ctx)?;
        assert_eq!(slot.descriptor().expiration().as_raw(), (-1, -1));
        slot.set_expiration("2", Some("w"), &ctx)?;
        assert_eq!(slot.descriptor().expiration().as_raw(), (2, 604_800));
        assert!(slot.set_expiration("0", Some("d"), &ctx).is_err());
        assert_eq!(slot.descriptor().expiration().as_raw(), (2, 604_800));
        Ok(())
    }

    #[test]
    fn steps_before_prerequisites_are_transitions_errors() -> TestResult {
        let ctx = ctx()?;
        let mut slot = slot(2)?;
        let selection = resolve_pool_reference("lto_a")?;
        let err = slot.set_media(
            MediaType::LTO,
            MediaAssignment::Pools(selection),
            true,
            &catalog()?,
            &ctx,
        );
        assert!(matches!(
            err,
            Err(PolicyError::InvalidTransition {
                copy: 2,
                state: CopyState::Uninitialized,
                step: "set_media"
            })
        ));
        assert!(matches!(
            slot.set_reservation(RESERVE_FS),
            Err(PolicyError::InvalidTransition { .. })
        ));
        assert!(matches!(
            slot.set_reservation_toggle(true),
            Err(PolicyError::InvalidTransition {
                step: "set_reservation",
                ..
            })
        ));
        assert!(slot.commit().is_err());
        assert_eq!(ctx.metrics().snapshot().validation_failures_total, 0);
        Ok(())
    }

    #[test]
    fn disk_media_forces_no_reservation() -> TestResult {
        let ctx = ctx()?;
        let catalog = catalog()?;
        let mut slot = slot(1)?;
        slot.set_archive_age("4", Some("m"), EntryMode::Wizard, &ctx)?;
        slot.set_media(
            MediaType::LTO,
            MediaAssignment::Pools(resolve_pool_reference("lto_a,scratch")?),
            true,
            &catalog,
            &ctx,
        )?;
        slot.set_reservation(RESERVE_FS | i32::from(ATTRIBUTE_GROUP))?;
        assert!(slot.descriptor().reservation().reserve_fs());
        assert_eq!(slot.descriptor().kind(), CopyKind::TapeBase);

        slot.revisit();
        slot.set_media(
            MediaType::DISK,
            MediaAssignment::Pools(resolve_pool_reference("disk_a")?),
            false,
            &catalog,
            &ctx,
        )?;
        assert_eq!(slot.descriptor().kind(), CopyKind::DiskBase);
        assert!(slot.descriptor().reservation().is_none());
        assert!(slot.descriptor().ignore_recycle());

        slot.set_reservation(RESERVE_FS)?;
        assert!(slot.descriptor().reservation().is_none());
        Ok(())
    }

    #[test]
    fn pools_must_exist_for_the_media_type() -> TestResult {
        let ctx = ctx()?;
        let catalog = catalog()?;
        let mut slot = slot(1)?;
        slot.set_archive_age("4", Some("m"), EntryMode::Wizard, &ctx)?;
        let err = slot.set_media(
            MediaType::LTO,
            MediaAssignment::Pools(resolve_pool_reference("lto_a,disk_a")?),
            true,
            &catalog,
            &ctx,
        );
        assert!(matches!(
            err,
            Err(PolicyError::InvalidField {
                field: Field::ScratchPool,
                issue: FieldIssue::MediaTypeMismatch,
                ..
            })
        ));
        assert!(slot.descriptor().media().is_none());
        assert_eq!(slot.state(), CopyState::AgeSet);

        slot.set_media(
            MediaType::AIT,
            MediaAssignment::Pools(PoolSelection::any_volume()),
            true,
            &catalog,
            &ctx,
        )?;
        assert_eq!(slot.state(), CopyState::MediaAssigned);
        Ok(())
    }

    #[test]
    fn revisit_keeps_later_values() -> TestResult {
        let ctx = ctx()?;
        let mut slot = slot(1)?;
        slot.set_archive_age("4", Some("m"), EntryMode::Wizard, &ctx)?;
        slot.set_media(
            MediaType::LTO,
            MediaAssignment::Vsns(VsnExpression::from_range("VOL000", "VOL009")?),
            true,
            &catalog()?,
            &ctx,
        )?;
        slot.set_reservation(0x21)?;
        slot.commit()?;
        assert_eq!(slot.state(), CopyState::Committed);

        slot.revisit();
        assert_eq!(slot.state(), CopyState::AgeSet);
        assert!(slot.descriptor().media().is_some());
        assert_eq!(slot.descriptor().reservation().encode(), 0x21);
        assert!(slot.commit().is_err());

        slot.set_archive_age("8", Some("h"), EntryMode::Wizard, &ctx)?;
        assert_eq!(slot.state(), CopyState::AgeSet);
        assert_eq!(slot.descriptor().reservation().encode(), 0x21);
        Ok(())
    }

    #[test]
    fn tape_options_enforce_drive_pairing() -> TestResult {
        let limits = EngineLimits::default();
        let mut input = CopyOptionsInput {
            drives: "2".into(),
            drive_min: "10".into(),
            drive_min_unit: Some("GB".into()),
            ..CopyOptionsInput::default()
        };
        assert!(matches!(
            input.validate(CopyKind::TapeBase, &limits),
            Err(PolicyError::InvalidField {
                field: Field::DriveMax,
                issue: FieldIssue::PairIncomplete,
                ..
            })
        ));

        input.drive_max = "5".into();
        input.drive_max_unit = Some("GB".into());
        assert!(matches!(
            input.validate(CopyKind::TapeBase, &limits),
            Err(PolicyError::InvalidField {
                field: Field::DriveMin,
                issue: FieldIssue::MinGreaterThanMax,
                ..
            })
        ));

        input.drive_max = "50".into();
        input.offline_copy = "stageahead".into();
        let CopyOptions::Tape(options) = input.validate(CopyKind::TapeBase, &limits)? else {
            return Err("expected tape options".into());
        };
        assert_eq!(options.drives, Some(2));
        assert_eq!(options.offline_copy, Some(OfflineCopy::StageAhead));
        assert!(options.drive_limits.is_some());
        Ok(())
    }

    #[test]
    fn disk_options_validate_recycling_fields() -> TestResult {
        let limits = EngineLimits::default();
        let mut input = CopyOptionsInput {
            recycle_hwm: "95".into(),
            min_gain: "50".into(),
            notify_address: "ops@example.com".into(),
            ..CopyOptionsInput::default()
        };
        let CopyOptions::Disk(options) = input.validate(CopyKind::DiskBase, &limits)? else {
            return Err("expected disk options".into());
        };
        assert_eq!(options.recycle_hwm, Some(95));
        assert_eq!(options.notify_address.as_deref(), Some("ops@example.com"));

        input.notify_address = "ops@localhost".into();
        assert_eq!(
            input
                .validate(CopyKind::DiskBase, &limits)
                .err()
                .and_then(|e| e.issue()),
            Some(FieldIssue::InvalidMailAddress)
        );

        input.notify_address.clear();
        input.drives = "1".into();
        assert!(matches!(
            input.validate(CopyKind::DiskBase, &limits),
            Err(PolicyError::InvalidField {
                field: Field::Drives,
                issue: FieldIssue::MediaTypeMismatch,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn unknown_offline_copy_is_rejected() {
        let input = CopyOptionsInput {
            offline_copy: "teleport".into(),
            ..CopyOptionsInput::default()
        };
        assert_eq!(
            input
                .validate(CopyKind::TapeBase, &EngineLimits::default())
                .err()
                .and_then(|e| e.issue()),
            Some(FieldIssue::UnknownOfflineCopy)
        );
    }

    #[test]
    fn options_of_the_other_kind_are_dropped_on_media_change() -> TestResult {
        let ctx = ctx()?;
        let catalog = catalog()?;
        let mut slot = slot(1)?;
        slot.set_archive_age("4", Some("m"), EntryMode::Wizard, &ctx)?;
        slot.set_media(
            MediaType::LTO,
            MediaAssignment::Pools(resolve_pool_reference("lto_a")?),
            true,
            &catalog,
            &ctx,
        )?;
        slot.set_options(
            &CopyOptionsInput {
                drives: "2".into(),
                ..CopyOptionsInput::default()
            },
            &ctx,
        )?;
        assert!(slot.descriptor().options().is_some());
        slot.set_media(
            MediaType::DISK,
            MediaAssignment::Pools(resolve_pool_reference("disk_a")?),
            true,
            &catalog,
            &ctx,
        )?;
        assert!(slot.descriptor().options().is_none());
        Ok(())
    }
}

//! Default limits applied when no configuration document overrides them.
//!
//! # Design
//! - Keep the archive manager's hard limits in one place so the engine and
//!   the configuration loader agree on them.
//! - Size and time ceilings mirror what the archiver can represent.

/// Largest accepted size in bytes: 8,000,000 TB (about 7813 PB).
pub const SIZE_CEILING_BYTES: u64 = 8_000_000 * (1 << 40);
/// Largest accepted time value, in seconds.
pub const TIME_CEILING_SECONDS: u64 = 2_147_483_646;
/// Maximum number of archive copies per policy.
pub const MAX_COPIES: u8 = 4;
/// Maximum length of a volume pool name.
pub const POOL_NAME_MAX_LEN: usize = 16;
/// Policy name reserved for the "do not archive" policy.
pub const RESERVED_POLICY_NAME: &str = "no_archive";
/// Archive age applied outside the wizard when the field is left blank.
pub const DEFAULT_ARCHIVE_AGE_MINUTES: u64 = 4;
/// Environment variable naming a configuration document to load.
pub const CONFIG_PATH_ENV: &str = "ARCHPOL_CONFIG";

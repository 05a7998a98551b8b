#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Validation engine for archive policy criteria and copies.
//!
//! Layout: `units.rs` (size/time fields), `reservation.rs` (reservation code
//! packing), `media.rs` (device types and pool references), `pool.rs` (pool
//! naming, partitioning, catalog), `copy.rs` (per-copy assembler),
//! `criteria.rs` and `policy.rs` (criteria, naming, request assembly,
//! submission), `session.rs` (wizard state), `manager.rs` (archive manager
//! contract), `context.rs` (limits and metrics), `error.rs` (taxonomy).

pub mod context;
pub mod copy;
pub mod criteria;
pub mod error;
pub mod manager;
pub mod media;
pub mod policy;
pub mod pool;
pub mod reservation;
pub mod session;
pub mod units;

pub use context::EngineContext;
pub use copy::{
    CopyDescriptor, CopyKind, CopyNumber, CopyOptions, CopyOptionsInput, CopySlot, CopyState,
    EntryMode, Expiration, MediaAssignment,
};
pub use criteria::{CriteriaInput, PatternKind, PolicyCriteria};
pub use error::{ErrorClass, Field, FieldIssue, INTERNAL_ERROR_CODE, PolicyError, PolicyResult};
pub use manager::{ArchiveManager, DuplicateCheck, ManagerError};
pub use media::{MediaType, PoolReference};
pub use policy::{
    PolicyBuilder, PolicyCreationRequest, PolicyKind, SubmitOutcome, submit, validate_policy_name,
};
pub use pool::{
    PoolCatalog, PoolPartition, PoolSelection, VsnExpression, VsnPool, create_pool, partition,
    resolve_pool_reference, validate_pool_name,
};
pub use reservation::ReservationMethod;
pub use session::{WizardOutcome, WizardSession};
pub use units::{SizeUnit, SizeValue, TimeUnit, TimeValue, validate_pair, validate_size, validate_time};

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

//! Engine limits and defaults for archive policy validation.
//!
//! Layout: `model.rs` (typed limits and defaults), `defaults.rs` (built-in
//! values), `validate.rs` (strict document parsing), `loader.rs` (file and
//! environment loading).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_env, load_from_path};
pub use model::{EngineConfig, EngineLimits, WizardDefaults};
pub use validate::parse_document;

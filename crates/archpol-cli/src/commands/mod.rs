//! Command handlers grouped by concern.

pub(crate) mod policy;
pub(crate) mod pools;
pub(crate) mod reservation;
pub(crate) mod units;

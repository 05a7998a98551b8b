//! Sample pools, managers and contexts.

use anyhow::Result;
use archpol_config::EngineConfig;
use archpol_core::{CriteriaInput, EngineContext, MediaType, VsnPool};
use archpol_telemetry::Metrics;

use crate::mocks::MockArchiveManager;

/// Context with default limits and a fresh metrics registry.
///
/// # Errors
///
/// Returns an error if the metrics registry cannot be created.
pub fn engine_context() -> Result<EngineContext> {
    Ok(EngineContext::new(EngineConfig::default(), Metrics::new()?))
}

/// Pools on the sample server: two LTO pools, one disk pool and a generic
/// tape pool named `pool1`.
#[must_use]
pub fn sample_pools() -> Vec<VsnPool> {
    vec![
        VsnPool::new("lto_a", MediaType::LTO, "VOL000-VOL099"),
        VsnPool::new("lto_b", MediaType::LTO, "VOL100-VOL199"),
        VsnPool::new("disk_a", MediaType::DISK, "disk01"),
        VsnPool::new("pool1", MediaType::TAPE, "TP0000-TP0009"),
    ]
}

/// Manager holding [`sample_pools`], one policy named `logs`, user `root`
/// and group `staff`.
#[must_use]
pub fn sample_manager() -> MockArchiveManager {
    sample_pools()
        .into_iter()
        .fold(MockArchiveManager::new(), MockArchiveManager::with_pool)
        .with_media_types(&[MediaType::DISK, MediaType::TAPE, MediaType::LTO, MediaType::AIT])
        .with_policy("logs")
        .with_user("root")
        .with_group("staff")
}

/// Criteria input selecting everything beneath `starting_dir`.
#[must_use]
pub fn criteria_input(starting_dir: &str) -> CriteriaInput {
    CriteriaInput {
        starting_dir: starting_dir.to_string(),
        ..CriteriaInput::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archpol_core::ArchiveManager;

    #[test]
    fn sample_manager_lists_fixture_state() -> Result<()> {
        let manager = sample_manager();
        assert_eq!(manager.vsn_pools()?.len(), sample_pools().len());
        assert_eq!(manager.policy_names()?, vec!["logs".to_string()]);
        assert!(manager.is_valid_user("root")?);
        assert!(!manager.is_valid_group("wheel")?);
        Ok(())
    }
}

use archpol_core::pool::PoolDraft;
use archpol_core::{ArchiveManager, PoolCatalog, create_pool};
use tracing::info;

use crate::cli::{OutputFormat, PoolCreateArgs};
use crate::output::{PartitionReport, PoolReport, render_partition, render_pool};
use crate::state::{AppContext, CliError, CliResult};

pub(crate) fn handle_pool_partition(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let catalog = PoolCatalog::load(&ctx.manager, &ctx.engine)?;
    render_partition(
        &PartitionReport {
            degraded: catalog.is_degraded(),
            encoded: catalog.partition().encode(),
            partition: catalog.partition(),
        },
        format,
    )
}

pub(crate) fn handle_pool_create(
    ctx: &AppContext,
    args: &PoolCreateArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let draft = if args.dry_run {
        let existing = ctx
            .manager
            .vsn_pools()
            .map_err(|err| CliError::failure(anyhow::Error::new(err)))?;
        PoolDraft::validate(
            &args.name,
            args.media_type,
            &args.members,
            &existing,
            ctx.engine.limits(),
        )
        .inspect_err(|err| ctx.engine.record(err))?
    } else {
        let draft = create_pool(
            &ctx.manager,
            &ctx.engine,
            &args.name,
            args.media_type,
            &args.members,
        )?;
        ctx.persist()?;
        draft
    };
    info!(pool = draft.name(), dry_run = args.dry_run, "pool command finished");

    render_pool(
        &PoolReport {
            name: draft.name().to_string(),
            media_type: draft.media_type().to_string(),
            members: draft.members().to_string(),
            created: !args.dry_run,
        },
        format,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ServerState, SnapshotManager};
    use archpol_config::EngineConfig;
    use archpol_core::{EngineContext, MediaType, VsnPool};
    use archpol_telemetry::Metrics;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn app(state_path: Option<std::path::PathBuf>) -> Result<AppContext, Box<dyn std::error::Error>> {
        let state = ServerState {
            media_types: vec![MediaType::DISK, MediaType::LTO],
            pools: vec![VsnPool::new("lto_a", MediaType::LTO, "VOL000-VOL099")],
            ..ServerState::default()
        };
        Ok(AppContext {
            engine: EngineContext::new(EngineConfig::default(), Metrics::new()?),
            manager: SnapshotManager::new(state),
            state_path,
        })
    }

    fn args(name: &str, media_type: MediaType, members: &str, dry_run: bool) -> PoolCreateArgs {
        PoolCreateArgs {
            name: name.into(),
            media_type,
            members: members.into(),
            dry_run,
        }
    }

    #[test]
    fn created_pool_is_persisted() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("server.json");
        let ctx = app(Some(path.clone()))?;
        handle_pool_create(&ctx, &args("disk_a", MediaType::DISK, "disk01", false), OutputFormat::Json)?;

        let reloaded = SnapshotManager::load(Some(&path))?;
        assert!(reloaded.vsn_pools()?.iter().any(|pool| pool.name() == "disk_a"));
        assert_eq!(ctx.engine.metrics().snapshot().pools_created_total, 1);
        Ok(())
    }

    #[test]
    fn dry_run_leaves_the_server_untouched() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("server.json");
        let ctx = app(Some(path.clone()))?;
        handle_pool_create(&ctx, &args("lto_b", MediaType::LTO, "VOL100-VOL199", true), OutputFormat::Table)?;
        assert_eq!(ctx.manager.vsn_pools()?.len(), 1);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn name_collision_across_media_is_a_validation_error() -> TestResult {
        let ctx = app(None)?;
        let err = handle_pool_create(&ctx, &args("lto_a", MediaType::DISK, "disk02", false), OutputFormat::Table);
        assert!(matches!(err, Err(CliError::Validation(ref message)) if message.contains("lto_a")));
        Ok(())
    }

    #[test]
    fn partition_lists_every_media_type() -> TestResult {
        let ctx = app(None)?;
        handle_pool_partition(&ctx, OutputFormat::Table)?;
        Ok(())
    }
}

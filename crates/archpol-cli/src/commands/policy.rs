//! Policy commands: name checks and document-driven creation.
//!
//! A policy document is replayed through a [`WizardSession`] in direct-entry
//! mode, one assembler step per document field, so every rule that guards
//! the interactive wizard also guards the document.

use std::fs;

use anyhow::{Context, anyhow};
use archpol_core::{
    ArchiveManager, CopyOptionsInput, CriteriaInput, EntryMode, MediaAssignment, MediaType,
    PolicyResult, VsnExpression, WizardOutcome, WizardSession, resolve_pool_reference,
    validate_policy_name,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::{OutputFormat, PolicyBuildArgs, PolicyNameArgs};
use crate::output::{NameReport, render_name, render_outcome};
use crate::state::{AppContext, CliError, CliResult};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    no_archive: bool,
    #[serde(default)]
    criteria: CriteriaInput,
    #[serde(default)]
    file_systems: Vec<String>,
    #[serde(default)]
    copies: Vec<CopyDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CopyDocument {
    number: u8,
    #[serde(default)]
    archive_age: String,
    #[serde(default)]
    archive_age_unit: Option<String>,
    #[serde(default)]
    expiration: String,
    #[serde(default)]
    expiration_unit: Option<String>,
    media_type: String,
    #[serde(default)]
    pools: Option<String>,
    #[serde(default)]
    vsns: Option<String>,
    #[serde(default)]
    reservation: i32,
    #[serde(default = "recycling_default")]
    recycling: bool,
    #[serde(default)]
    options: Option<CopyOptionsInput>,
}

const fn recycling_default() -> bool {
    true
}

pub(crate) fn handle_policy_check_name(
    ctx: &AppContext,
    args: &PolicyNameArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let existing = ctx
        .manager
        .policy_names()
        .map_err(|err| CliError::failure(anyhow::Error::new(err)))?;
    let name = validate_policy_name(&args.name, &existing, ctx.engine.limits())
        .inspect_err(|err| ctx.engine.record(err))?;
    render_name(
        &NameReport {
            name,
            available: true,
        },
        format,
    )
}

pub(crate) fn handle_policy_build(
    ctx: &AppContext,
    args: &PolicyBuildArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))
        .map_err(CliError::failure)?;
    let document: PolicyDocument = serde_json::from_str(&raw).map_err(|err| {
        CliError::validation(format!("{} is not a valid policy document: {err}", args.file.display()))
    })?;

    let mut session = WizardSession::new(ctx.engine.clone(), EntryMode::Direct);
    replay(&mut session, &document, &ctx.manager)?;
    let outcome = session.finish(&ctx.manager)?;
    render_outcome(&outcome, format)?;

    match outcome {
        WizardOutcome::Failure { code, message } => Err(CliError::failure(anyhow!(
            "archive manager rejected the policy (code {code}): {message}"
        ))),
        WizardOutcome::Success { policy } | WizardOutcome::Warning { policy, .. } => {
            if args.dry_run {
                warn!(policy = %policy, "dry run; snapshot not saved");
                return Ok(());
            }
            info!(policy = %policy, "policy created");
            ctx.persist()
        }
    }
}

fn replay(
    session: &mut WizardSession,
    document: &PolicyDocument,
    manager: &dyn ArchiveManager,
) -> CliResult<()> {
    session.load_catalog(manager)?;
    if document.no_archive {
        if !document.copies.is_empty() {
            return Err(CliError::validation(
                "a no_archive policy cannot declare copies",
            ));
        }
        session.start_no_archive(&document.description, manager)?;
    } else {
        let name = document
            .name
            .as_deref()
            .ok_or_else(|| CliError::validation("policy document needs a name"))?;
        let copy_count = document.copies.len().to_string();
        session.set_identity(name, &document.description, &copy_count, manager)?;
    }
    session.set_criteria(&document.criteria, manager)?;
    session.set_file_systems(&document.file_systems)?;

    for copy in &document.copies {
        let assignment = assignment(copy)?;
        let media_type = MediaType::parse(&copy.media_type).ok_or_else(|| {
            CliError::validation(format!(
                "copy {}: unknown media type '{}'",
                copy.number, copy.media_type
            ))
        })?;
        session.update_copy(copy.number, |slot, ctx, catalog| {
            slot.set_archive_age(
                &copy.archive_age,
                copy.archive_age_unit.as_deref(),
                EntryMode::Direct,
                ctx,
            )?;
            slot.set_expiration(&copy.expiration, copy.expiration_unit.as_deref(), ctx)?;
            slot.set_media(media_type, assignment, copy.recycling, catalog, ctx)?;
            slot.set_reservation(copy.reservation)?;
            if let Some(options) = &copy.options {
                slot.set_options(options, ctx)?;
            }
            slot.commit()
        })?;
    }
    Ok(())
}

fn assignment(copy: &CopyDocument) -> CliResult<MediaAssignment> {
    let parsed: PolicyResult<MediaAssignment> = match (&copy.pools, &copy.vsns) {
        (Some(pools), None) => resolve_pool_reference(pools).map(MediaAssignment::Pools),
        (None, Some(vsns)) => VsnExpression::parse(vsns).map(MediaAssignment::Vsns),
        _ => {
            return Err(CliError::validation(format!(
                "copy {}: give exactly one of 'pools' or 'vsns'",
                copy.number
            )));
        }
    };
    parsed.map_err(CliError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ServerState, SnapshotManager};
    use archpol_config::EngineConfig;
    use archpol_core::{EngineContext, VsnPool};
    use archpol_telemetry::Metrics;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::{NamedTempFile, TempDir};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const DOCUMENT: &str = r#"{
        "name": "daily",
        "description": "nightly archive",
        "criteria": {"starting_dir": "projects", "min_size": "1", "min_size_unit": "MB"},
        "file_systems": ["samfs1"],
        "copies": [
            {"number": 1, "archive_age": "4", "archive_age_unit": "m", "media_type": "li", "pools": "lto_a", "reservation": 32},
            {"number": 2, "media_type": "dk", "pools": "disk_a", "options": {"recycle_hwm": "90"}}
        ]
    }"#;

    fn app(state_path: Option<PathBuf>) -> Result<AppContext, Box<dyn std::error::Error>> {
        let state = ServerState {
            media_types: vec![MediaType::DISK, MediaType::LTO],
            pools: vec![
                VsnPool::new("lto_a", MediaType::LTO, "VOL000-VOL099"),
                VsnPool::new("disk_a", MediaType::DISK, "disk01"),
            ],
            users: vec!["root".into()],
            ..ServerState::default()
        };
        let engine = EngineContext::new(EngineConfig::default(), Metrics::new()?);
        let manager = SnapshotManager::new(state);
        manager.index(&engine)?;
        Ok(AppContext {
            engine,
            manager,
            state_path,
        })
    }

    fn document(body: &str) -> Result<NamedTempFile, Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(body.as_bytes())?;
        Ok(file)
    }

    fn build(file: &NamedTempFile, dry_run: bool) -> PolicyBuildArgs {
        PolicyBuildArgs {
            file: file.path().to_path_buf(),
            dry_run,
        }
    }

    #[test]
    fn document_creates_and_persists_policy() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("server.json");
        let ctx = app(Some(path.clone()))?;
        let file = document(DOCUMENT)?;
        handle_policy_build(&ctx, &build(&file, false), OutputFormat::Json)?;

        let reloaded = SnapshotManager::load(Some(&path))?;
        assert_eq!(reloaded.policy_names()?, vec!["daily".to_string()]);
        assert_eq!(ctx.engine.metrics().snapshot().policies_created_total, 1);
        Ok(())
    }

    #[test]
    fn same_document_twice_is_a_duplicate_name() -> TestResult {
        let ctx = app(None)?;
        let file = document(DOCUMENT)?;
        handle_policy_build(&ctx, &build(&file, true), OutputFormat::Table)?;
        let err = handle_policy_build(&ctx, &build(&file, true), OutputFormat::Table);
        assert!(matches!(err, Err(CliError::Validation(ref message)) if message.contains("already exists")));
        Ok(())
    }

    #[test]
    fn copy_gap_is_reported() -> TestResult {
        let ctx = app(None)?;
        let file = document(
            r#"{"name": "gap", "criteria": {"starting_dir": "a"}, "file_systems": ["samfs1"],
                "copies": [{"number": 2, "media_type": "li", "pools": "lto_a"}]}"#,
        )?;
        let err = handle_policy_build(&ctx, &build(&file, true), OutputFormat::Table);
        assert!(matches!(err, Err(CliError::Validation(ref message)) if message.starts_with("copy_number")));
        Ok(())
    }

    #[test]
    fn pools_and_vsns_are_exclusive() -> TestResult {
        let ctx = app(None)?;
        let file = document(
            r#"{"name": "both", "criteria": {"starting_dir": "a"}, "file_systems": ["samfs1"],
                "copies": [{"number": 1, "media_type": "li", "pools": "lto_a", "vsns": "VOL000"}]}"#,
        )?;
        let err = handle_policy_build(&ctx, &build(&file, true), OutputFormat::Table);
        assert!(matches!(err, Err(CliError::Validation(ref message)) if message.contains("exactly one")));
        Ok(())
    }

    #[test]
    fn pool_of_another_media_type_is_rejected() -> TestResult {
        let ctx = app(None)?;
        let file = document(
            r#"{"name": "mixed", "criteria": {"starting_dir": "a"}, "file_systems": ["samfs1"],
                "copies": [{"number": 1, "media_type": "li", "pools": "disk_a"}]}"#,
        )?;
        let err = handle_policy_build(&ctx, &build(&file, true), OutputFormat::Table);
        assert!(matches!(err, Err(CliError::Validation(ref message)) if message.contains("media_type_mismatch")));
        Ok(())
    }

    #[test]
    fn no_archive_document_takes_no_copies() -> TestResult {
        let ctx = app(None)?;
        let file = document(r#"{"no_archive": true, "criteria": {"starting_dir": "tmp"}, "file_systems": ["samfs1"]}"#)?;
        handle_policy_build(&ctx, &build(&file, true), OutputFormat::Table)?;
        assert!(ctx.manager.policy_names()?.contains(&"no_archive".to_string()));
        Ok(())
    }

    #[test]
    fn check_name_reports_reserved_names() -> TestResult {
        let ctx = app(None)?;
        handle_policy_check_name(&ctx, &PolicyNameArgs { name: "weekly".into() }, OutputFormat::Table)?;
        let err = handle_policy_check_name(&ctx, &PolicyNameArgs { name: "no_archive".into() }, OutputFormat::Table);
        assert!(matches!(err, Err(CliError::Validation(ref message)) if message.contains("policy_name_reserved")));
        Ok(())
    }
}

use archpol_core::error::{Field, FieldIssue, PolicyError};
use archpol_core::{validate_pair, validate_size, validate_time};

use crate::cli::{AgeArgs, OutputFormat, SizeArgs};
use crate::output::{AgeReport, SizeReport, render_age, render_size};
use crate::state::{AppContext, CliResult};

pub(crate) fn handle_size_check(
    ctx: &AppContext,
    args: &SizeArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let limits = ctx.engine.limits();
    let check = || {
        let min = validate_size(Field::MinSize, &args.value, args.unit.as_deref(), true, limits)?
            .ok_or_else(|| missing(Field::MinSize))?;
        let max = match &args.max {
            Some(raw) => validate_size(Field::MaxSize, raw, args.max_unit.as_deref(), false, limits)?,
            None => None,
        };
        validate_pair(Field::MinSize, Some(&min), max.as_ref())?;
        Ok::<_, PolicyError>((min, max))
    };
    let (min, max) = check().inspect_err(|err| ctx.engine.record(err))?;

    render_size(
        &SizeReport {
            value: min.to_string(),
            bytes: min.bytes(),
            max: max.map(|max| max.to_string()),
            max_bytes: max.map(|max| max.bytes()),
        },
        format,
    )
}

pub(crate) fn handle_time_check(
    ctx: &AppContext,
    args: &AgeArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let age = validate_time(
        Field::AccessAge,
        &args.value,
        args.unit.as_deref(),
        true,
        ctx.engine.limits(),
    )
    .and_then(|age| age.ok_or_else(|| missing(Field::AccessAge)))
    .inspect_err(|err| ctx.engine.record(err))?;

    render_age(
        &AgeReport {
            value: age.to_string(),
            seconds: age.seconds(),
        },
        format,
    )
}

fn missing(field: Field) -> PolicyError {
    PolicyError::InvalidField {
        field,
        issue: FieldIssue::EmptyRequiredField,
        value: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CliError, ServerState, SnapshotManager};
    use archpol_config::EngineConfig;
    use archpol_core::EngineContext;
    use archpol_telemetry::Metrics;

    fn app() -> Result<AppContext, Box<dyn std::error::Error>> {
        Ok(AppContext {
            engine: EngineContext::new(EngineConfig::default(), Metrics::new()?),
            manager: SnapshotManager::new(ServerState::default()),
            state_path: None,
        })
    }

    fn size(value: &str, unit: Option<&str>, max: Option<&str>, max_unit: Option<&str>) -> SizeArgs {
        SizeArgs {
            value: value.into(),
            unit: unit.map(Into::into),
            max: max.map(Into::into),
            max_unit: max_unit.map(Into::into),
        }
    }

    #[test]
    fn ordered_bounds_pass() -> Result<(), Box<dyn std::error::Error>> {
        let ctx = app()?;
        handle_size_check(&ctx, &size("1", Some("GB"), Some("2048"), Some("MB")), OutputFormat::Json)?;
        Ok(())
    }

    #[test]
    fn inverted_bounds_are_validation_errors() -> Result<(), Box<dyn std::error::Error>> {
        let ctx = app()?;
        let err = handle_size_check(&ctx, &size("3", Some("GB"), Some("2"), Some("GB")), OutputFormat::Table);
        assert!(matches!(err, Err(ref e @ CliError::Validation(_)) if e.exit_code() == 2));
        assert_eq!(ctx.engine.metrics().snapshot().validation_failures_total, 1);
        Ok(())
    }

    #[test]
    fn missing_unit_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let ctx = app()?;
        let err = handle_time_check(
            &ctx,
            &AgeArgs {
                value: "4".into(),
                unit: None,
            },
            OutputFormat::Table,
        );
        assert!(matches!(err, Err(CliError::Validation(ref message)) if message.contains("missing_unit")));
        Ok(())
    }
}

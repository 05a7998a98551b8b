//! Output renderers and report shapes for CLI commands.

use anyhow::anyhow;
use archpol_core::{PoolPartition, WizardOutcome};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::state::{CliError, CliResult};

#[derive(Debug, Serialize)]
pub(crate) struct SizeReport {
    pub(crate) value: String,
    pub(crate) bytes: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_bytes: Option<u128>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AgeReport {
    pub(crate) value: String,
    pub(crate) seconds: u128,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReservationReport {
    pub(crate) code: i32,
    pub(crate) method: String,
    pub(crate) attribute: u8,
    pub(crate) reserve_set: bool,
    pub(crate) reserve_fs: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PartitionReport<'a> {
    pub(crate) degraded: bool,
    pub(crate) encoded: String,
    pub(crate) partition: &'a PoolPartition,
}

#[derive(Debug, Serialize)]
pub(crate) struct PoolReport {
    pub(crate) name: String,
    pub(crate) media_type: String,
    pub(crate) members: String,
    pub(crate) created: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct NameReport {
    pub(crate) name: String,
    pub(crate) available: bool,
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_size(report: &SizeReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("size: {} ({} bytes)", report.value, report.bytes);
            if let (Some(max), Some(bytes)) = (&report.max, report.max_bytes) {
                println!("max: {max} ({bytes} bytes)");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_age(report: &AgeReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => println!("age: {} ({} seconds)", report.value, report.seconds),
    }
    Ok(())
}

pub(crate) fn render_reservation(report: &ReservationReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("code: {}", report.code);
            println!("method: {}", report.method);
            println!("attribute: {:#04x}", report.attribute);
            println!("reserve set: {}", yes_no(report.reserve_set));
            println!("reserve fs: {}", yes_no(report.reserve_fs));
        }
    }
    Ok(())
}

pub(crate) fn render_partition(report: &PartitionReport<'_>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            if report.degraded {
                println!("warning: pool catalog is incomplete");
            }
            println!("{:<6} POOLS", "MEDIA");
            for media_type in report.partition.media_types() {
                let names = report.partition.pool_names(media_type);
                let pools = if names.is_empty() {
                    "-".to_string()
                } else {
                    names.join(", ")
                };
                println!("{:<6} {pools}", media_type.to_string());
            }
        }
    }
    Ok(())
}

pub(crate) fn render_pool(report: &PoolReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            let verb = if report.created { "created" } else { "valid" };
            println!(
                "pool {} ({}) {verb}: {}",
                report.name, report.media_type, report.members
            );
        }
    }
    Ok(())
}

pub(crate) fn render_name(report: &NameReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => println!("policy name '{}' is available", report.name),
    }
    Ok(())
}

pub(crate) fn render_outcome(outcome: &WizardOutcome, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(outcome)?,
        OutputFormat::Table => match outcome {
            WizardOutcome::Success { policy } => println!("policy '{policy}' created"),
            WizardOutcome::Warning { policy, messages } => {
                println!("policy '{policy}' created with warnings:");
                for message in messages {
                    println!("  - {message}");
                }
            }
            WizardOutcome::Failure { code, message } => {
                println!("policy not created (code {code}): {message}");
            }
        },
    }
    Ok(())
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_report_omits_absent_bound() -> Result<(), Box<dyn std::error::Error>> {
        let report = SizeReport {
            value: "10MB".into(),
            bytes: 10 << 20,
            max: None,
            max_bytes: None,
        };
        let json = serde_json::to_value(&report)?;
        assert_eq!(json["bytes"], 10_485_760);
        assert!(json.get("max").is_none());
        Ok(())
    }

    #[test]
    fn outcome_serializes_with_tag() -> Result<(), Box<dyn std::error::Error>> {
        let outcome = WizardOutcome::Failure {
            code: 30_012,
            message: "catalog locked".into(),
        };
        let json = serde_json::to_value(&outcome)?;
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["code"], 30_012);
        Ok(())
    }
}

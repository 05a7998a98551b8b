//! Command-line entry point for validating archive policies against a server
//! snapshot.

use std::path::PathBuf;

use anyhow::anyhow;
use archpol_config::{EngineConfig, load_from_env, load_from_path};
use archpol_core::{EngineContext, MediaType};
use archpol_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info_span};
use uuid::Uuid;

use crate::commands::policy::{handle_policy_build, handle_policy_check_name};
use crate::commands::pools::{handle_pool_create, handle_pool_partition};
use crate::commands::reservation::{handle_reservation_decode, handle_reservation_encode};
use crate::commands::units::{handle_size_check, handle_time_check};
use crate::state::{AppContext, CliError, CliResult, SnapshotManager};

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command and returns the
/// process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli
            .log_format
            .as_deref()
            .map_or_else(LogFormat::infer, LogFormat::from_name),
        build_sha: build_sha(),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging unavailable: {err}");
    }

    let span = info_span!("archpol", trace_id = %trace_id, command = command_label(&cli.command));
    let _entered = span.enter();

    let result = AppContext::from_cli(&cli).and_then(|ctx| dispatch(cli.command, cli.output, &ctx));
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

impl AppContext {
    fn from_cli(cli: &Cli) -> CliResult<Self> {
        let config = load_config(cli.config.as_ref())?;
        let metrics = Metrics::new().map_err(|err| {
            CliError::failure(anyhow!("failed to create metrics registry: {err}"))
        })?;
        let engine = EngineContext::new(config, metrics);
        let manager = SnapshotManager::load(cli.state.as_deref())?;
        manager.index(&engine)?;
        Ok(Self {
            engine,
            manager,
            state_path: cli.state.clone(),
        })
    }
}

fn load_config(path: Option<&PathBuf>) -> CliResult<EngineConfig> {
    let loaded = match path {
        Some(path) => load_from_path(path),
        None => load_from_env(),
    };
    loaded.map_err(|err| CliError::failure(anyhow::Error::new(err).context("failed to load configuration")))
}

fn dispatch(command: Command, format: OutputFormat, ctx: &AppContext) -> CliResult<()> {
    debug!(state = ?ctx.state_path, "dispatching command");
    match command {
        Command::Size(args) => handle_size_check(ctx, &args, format),
        Command::Age(args) => handle_time_check(ctx, &args, format),
        Command::Reservation(reservation) => match reservation {
            ReservationCommand::Decode(args) => handle_reservation_decode(&args, format),
            ReservationCommand::Encode(args) => handle_reservation_encode(&args, format),
        },
        Command::Pools(pools) => match pools {
            PoolCommand::Partition => handle_pool_partition(ctx, format),
            PoolCommand::Create(args) => handle_pool_create(ctx, &args, format),
        },
        Command::Policy(policy) => match policy {
            PolicyCommand::CheckName(args) => handle_policy_check_name(ctx, &args, format),
            PolicyCommand::Build(args) => handle_policy_build(ctx, &args, format),
        },
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Size(_) => "size",
        Command::Age(_) => "age",
        Command::Reservation(ReservationCommand::Decode(_)) => "reservation_decode",
        Command::Reservation(ReservationCommand::Encode(_)) => "reservation_encode",
        Command::Pools(PoolCommand::Partition) => "pools_partition",
        Command::Pools(PoolCommand::Create(_)) => "pools_create",
        Command::Policy(PolicyCommand::CheckName(_)) => "policy_check_name",
        Command::Policy(PolicyCommand::Build(_)) => "policy_build",
    }
}

#[derive(Parser)]
#[command(
    name = "archpol",
    about = "Validate archive policy criteria and copies against a server snapshot"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "ARCHPOL_STATE",
        help = "JSON snapshot of the archive server (pools, policies, users, groups)"
    )]
    state: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Engine configuration document (defaults to ARCHPOL_CONFIG or built-in limits)"
    )]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "ARCHPOL_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    #[arg(long, global = true, env = "ARCHPOL_LOG_FORMAT")]
    log_format: Option<String>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a size, optionally against an upper bound.
    Size(SizeArgs),
    /// Validate an age.
    Age(AgeArgs),
    #[command(subcommand)]
    Reservation(ReservationCommand),
    #[command(subcommand)]
    Pools(PoolCommand),
    #[command(subcommand)]
    Policy(PolicyCommand),
}

#[derive(Subcommand)]
enum ReservationCommand {
    /// Unpack a stored reservation code.
    Decode(ReservationDecodeArgs),
    /// Pack reservation components into a code.
    Encode(ReservationEncodeArgs),
}

#[derive(Subcommand)]
enum PoolCommand {
    /// Group pools by media type.
    Partition,
    /// Validate and create a volume pool.
    Create(PoolCreateArgs),
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Check a proposed policy name.
    CheckName(PolicyNameArgs),
    /// Run a policy document through the wizard and create it.
    Build(PolicyBuildArgs),
}

#[derive(Args)]
pub(crate) struct SizeArgs {
    #[arg(help = "Size value", allow_hyphen_values = true)]
    pub(crate) value: String,
    #[arg(long, help = "Unit of the value (B, KB, MB, GB, TB, PB)")]
    pub(crate) unit: Option<String>,
    #[arg(long, allow_hyphen_values = true, help = "Upper bound to compare against")]
    pub(crate) max: Option<String>,
    #[arg(long, help = "Unit of the upper bound")]
    pub(crate) max_unit: Option<String>,
}

#[derive(Args)]
pub(crate) struct AgeArgs {
    #[arg(help = "Age value", allow_hyphen_values = true)]
    pub(crate) value: String,
    #[arg(long, help = "Unit of the value (s, m, h, d, w)")]
    pub(crate) unit: Option<String>,
}

#[derive(Args)]
pub(crate) struct ReservationDecodeArgs {
    #[arg(allow_hyphen_values = true)]
    pub(crate) code: i32,
}

#[derive(Args)]
pub(crate) struct ReservationEncodeArgs {
    #[arg(
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=15),
        help = "Attribute class bits (1 directory, 2 user, 4 group)"
    )]
    pub(crate) attribute: u8,
    #[arg(long, help = "Reserve by volume set")]
    pub(crate) set: bool,
    #[arg(long, help = "Reserve by file system")]
    pub(crate) fs: bool,
}

#[derive(Args)]
pub(crate) struct PoolCreateArgs {
    pub(crate) name: String,
    #[arg(value_parser = parse_media_type, help = "Media mnemonic (li, dk) or numeric code")]
    pub(crate) media_type: MediaType,
    #[arg(help = "Members: a VSN, a range A-B or a list A,B,C")]
    pub(crate) members: String,
    #[arg(long, help = "Validate without creating the pool")]
    pub(crate) dry_run: bool,
}

#[derive(Args)]
pub(crate) struct PolicyNameArgs {
    pub(crate) name: String,
}

#[derive(Args)]
pub(crate) struct PolicyBuildArgs {
    #[arg(short = 'f', long = "file", help = "Policy document (JSON)")]
    pub(crate) file: PathBuf,
    #[arg(long, help = "Validate every step but do not save the snapshot")]
    pub(crate) dry_run: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn parse_media_type(raw: &str) -> Result<MediaType, String> {
    MediaType::parse(raw).ok_or_else(|| format!("unknown media type '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parses_global_options_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from([
            "archpol",
            "size",
            "10",
            "--unit",
            "MB",
            "--output",
            "json",
            "--state",
            "/tmp/server.json",
        ])?;
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/server.json")));
        assert_eq!(cli.log_level, DEFAULT_LOG_LEVEL);
        assert!(matches!(cli.command, Command::Size(ref args) if args.unit.as_deref() == Some("MB")));
        Ok(())
    }

    #[test]
    fn negative_values_reach_the_validators() -> TestResult {
        let cli = Cli::try_parse_from(["archpol", "reservation", "decode", "-1"])?;
        assert!(matches!(
            cli.command,
            Command::Reservation(ReservationCommand::Decode(ReservationDecodeArgs { code: -1 }))
        ));
        let cli = Cli::try_parse_from(["archpol", "size", "-5"])?;
        assert!(matches!(cli.command, Command::Size(ref args) if args.value == "-5"));
        Ok(())
    }

    #[test]
    fn attribute_bits_are_bounded() {
        assert!(
            Cli::try_parse_from(["archpol", "reservation", "encode", "--attribute", "16"]).is_err()
        );
    }

    #[test]
    fn pool_media_type_accepts_mnemonics_and_codes() -> TestResult {
        let cli = Cli::try_parse_from(["archpol", "pools", "create", "p1", "li", "VOL000"])?;
        assert!(matches!(
            cli.command,
            Command::Pools(PoolCommand::Create(ref args)) if args.media_type == MediaType::LTO
        ));
        let cli = Cli::try_parse_from(["archpol", "pools", "create", "p1", "100", "disk01", "--dry-run"])?;
        assert!(matches!(
            cli.command,
            Command::Pools(PoolCommand::Create(ref args)) if args.media_type == MediaType::DISK && args.dry_run
        ));
        assert!(Cli::try_parse_from(["archpol", "pools", "create", "p1", "zz", "VOL000"]).is_err());
        Ok(())
    }

    #[test]
    fn command_labels_are_stable() -> TestResult {
        let cli = Cli::try_parse_from(["archpol", "policy", "build", "-f", "policy.json"])?;
        assert_eq!(command_label(&cli.command), "policy_build");
        Ok(())
    }
}

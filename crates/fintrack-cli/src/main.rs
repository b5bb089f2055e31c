// crates/fintrack-cli/src/main.rs
// ============================================================================
// Module: Fintrack CLI Entry Point
// Description: Operator commands for the replicated Fintrack store.
// Purpose: Run startup, integrity checks, recovery, migration, and health.
// Dependencies: clap, fintrack-config, fintrack-store-sqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `fintrack` drives the store lifecycle from the command line. Every command
//! loads `fintrack.toml` (or `--config` / `FINTRACK_CONFIG`), prints a JSON
//! report on stdout, and exits non-zero when the operation did not succeed.
//! Audit events go to the sink chosen in the `[audit]` section.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use fintrack_config::FintrackConfig;
use fintrack_store_sqlite::ReplicaSlot;
use fintrack_store_sqlite::StorageContext;
use fintrack_store_sqlite::ensure_schema;
use fintrack_store_sqlite::verify_path;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fintrack", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to fintrack.toml or `FINTRACK_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate, verify, and recover the store as the application would.
    Startup,
    /// Run an integrity check on the primary or one replica.
    Check(SlotArgs),
    /// Replace the primary with a copy of a healthy replica.
    Recover(RecoverArgs),
    /// Ensure the schema on every store and seed defaults.
    Migrate,
    /// Print a health snapshot as JSON.
    Health,
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Fintrack configuration file.
    Validate,
}

/// Optional replica selector.
#[derive(Args, Debug)]
struct SlotArgs {
    /// Replica slot to check instead of the primary.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=2))]
    replica: Option<u8>,
}

/// Required replica selector for recovery.
#[derive(Args, Debug)]
struct RecoverArgs {
    /// Replica slot to promote.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=2))]
    replica: u8,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message shown to the operator.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = FintrackConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    match cli.command {
        Commands::Startup => command_startup(&config),
        Commands::Check(args) => command_check(&config, &args),
        Commands::Recover(args) => command_recover(&config, &args),
        Commands::Migrate => command_migrate(&config),
        Commands::Health => command_health(&config),
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(&config),
    }
}

// ============================================================================
// SECTION: Store Commands
// ============================================================================

/// Opens the storage context described by `config`.
fn open_context(config: &FintrackConfig) -> CliResult<StorageContext> {
    let audit = config.audit_sink().map_err(|err| CliError::new(err.to_string()))?;
    StorageContext::open(config.store_config(), audit)
        .map_err(|err| CliError::new(format!("failed to open store: {err}")))
}

/// Executes `startup`.
fn command_startup(config: &FintrackConfig) -> CliResult<ExitCode> {
    let mut ctx = open_context(config)?;
    let report = ctx.startup().map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    write_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `check`; never creates a missing file.
fn command_check(config: &FintrackConfig, args: &SlotArgs) -> CliResult<ExitCode> {
    let store = config.store_config();
    let path = match args.replica {
        Some(number) => store.replica_path(parse_slot(number)?),
        None => store.path.clone(),
    };
    let verdict = verify_path(&path, &store);
    write_json(&verdict)?;
    Ok(exit_for(verdict.ok))
}

/// Output of `recover`.
#[derive(Debug, Serialize)]
struct RecoverOutput {
    /// Replica slot that was requested.
    replica: ReplicaSlot,
    /// Whether the primary was replaced.
    restored: bool,
}

/// Executes `recover`.
fn command_recover(config: &FintrackConfig, args: &RecoverArgs) -> CliResult<ExitCode> {
    let slot = parse_slot(args.replica)?;
    let ctx = open_context(config)?;
    let restored = ctx
        .restore_from_replica(slot)
        .map_err(|err| CliError::new(format!("restore from replica {slot} failed: {err}")))?;
    write_json(&RecoverOutput {
        replica: slot,
        restored,
    })?;
    Ok(exit_for(restored))
}

/// Executes `migrate`.
fn command_migrate(config: &FintrackConfig) -> CliResult<ExitCode> {
    let ctx = open_context(config)?;
    let report = ensure_schema(&ctx);
    write_json(&report)?;
    Ok(exit_for(report.is_clean()))
}

/// Executes `health`.
fn command_health(config: &FintrackConfig) -> CliResult<ExitCode> {
    let ctx = open_context(config)?;
    let _ = ctx.verify_integrity(None);
    write_json(&ctx.health())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `config validate`; loading already validated the file.
fn command_config_validate(config: &FintrackConfig) -> CliResult<ExitCode> {
    let source = config
        .source
        .as_ref()
        .map_or_else(|| "<defaults>".to_string(), |path| path.display().to_string());
    write_stdout_line(&format!("config ok: {source}"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Maps a slot number to a [`ReplicaSlot`].
fn parse_slot(number: u8) -> CliResult<ReplicaSlot> {
    ReplicaSlot::from_number(number).map_err(|err| CliError::new(err.to_string()))
}

/// Success when `ok`, failure otherwise.
fn exit_for(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes `value` to stdout as pretty JSON.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

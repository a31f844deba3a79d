//! # ggshield
//!
//! CLI front-end: argument parsing, logging setup and the command
//! dispatch. The scanning logic lives in the library crates; commands
//! here only wire configuration, client and reporters together.

mod commands;
mod context;

use clap::{Args, Parser, Subcommand};
use ggshield_core::{Error, ExitCode};
use tracing_subscriber::EnvFilter;

pub use context::ContextObj;

#[derive(Parser)]
#[command(
    name = "ggshield",
    version,
    about = "Detect secrets in your source code and git history"
)]
struct Cli {
    /// Print verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Send debug logs to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Commands to work with secrets.
    #[command(subcommand)]
    Secret(SecretCommand),

    /// Show the monthly quota of the workspace.
    Quota(commands::quota::QuotaArgs),
}

#[derive(Subcommand)]
enum SecretCommand {
    /// Scan a source for secrets.
    #[command(subcommand)]
    Scan(ScanCommand),
}

#[derive(Subcommand)]
enum ScanCommand {
    /// Scan files or directories.
    Path(commands::path::PathArgs),

    /// Scan every commit of a repository.
    Repo(commands::repo::RepoArgs),

    /// Scan staged changes as a pre-commit git hook.
    PreCommit(commands::precommit::PreCommitArgs),

    /// Scan pushed commits as a pre-push git hook.
    PrePush(commands::prepush::PrePushArgs),

    /// Scan received commits as a pre-receive git hook.
    PreReceive(commands::prereceive::PreReceiveArgs),

    /// Internal: scan child of the pre-receive hook.
    #[command(name = "prereceive-worker", hide = true)]
    PreReceiveWorker(commands::worker::WorkerArgs),
}

/// Options shared by every `secret scan` subcommand.
#[derive(Args, Clone)]
pub struct SecretScanArgs {
    /// Show secrets in plaintext instead of hiding them.
    #[arg(long)]
    show_secrets: bool,

    /// Always return a 0 (non-error) status code, even if incidents are
    /// found.
    #[arg(long)]
    exit_zero: bool,

    /// Do not scan paths that match the specified glob-like patterns.
    #[arg(long, value_name = "PATTERNS")]
    exclude: Vec<String>,

    /// Ignore secrets already known by the GitGuardian dashboard.
    #[arg(long)]
    ignore_known_secrets: bool,

    /// Exclude results from a detector.
    #[arg(short = 'b', long = "banlist-detector", value_name = "DETECTOR")]
    banlist_detectors: Vec<String>,

    /// Do not ignore any secret; the ignore reason is shown as well.
    #[arg(long)]
    all_secrets: bool,

    /// Display full details about the dashboard incident if one is found
    /// (JSON and SARIF formats only). Requires the 'incidents:read' scope.
    #[arg(long)]
    with_incident_details: bool,

    /// Identifier of the custom source in GitGuardian. If used, incidents
    /// will be created and visible on the dashboard. Requires the
    /// 'scan:create-incidents' scope.
    #[arg(long, value_name = "UUID")]
    source_uuid: Option<String>,

    /// Format to show the output.
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: String,

    /// Redirect ggshield output to PATH.
    #[arg(short, long, value_name = "PATH")]
    output: Option<std::path::PathBuf>,
}

/// Entry point; returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let outcome = match cli.command {
        Command::Secret(SecretCommand::Scan(scan)) => match scan {
            ScanCommand::Path(args) => commands::path::handle(args, cli.verbose),
            ScanCommand::Repo(args) => commands::repo::handle(args, cli.verbose),
            ScanCommand::PreCommit(args) => commands::precommit::handle(args, cli.verbose),
            ScanCommand::PrePush(args) => commands::prepush::handle(args, cli.verbose),
            ScanCommand::PreReceive(args) => commands::prereceive::handle(args, cli.verbose),
            ScanCommand::PreReceiveWorker(args) => commands::worker::handle(args),
        },
        Command::Quota(args) => commands::quota::handle(args),
    };

    match outcome {
        Ok(code) => code.code(),
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code().code()
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Apply `--exit-zero`: a failed scan still exits 0 when asked to.
pub(crate) fn apply_exit_zero(code: ExitCode, exit_zero: bool) -> ExitCode {
    if exit_zero && code == ExitCode::ScanFoundProblems {
        ExitCode::Success
    } else {
        code
    }
}

pub(crate) type CommandResult = Result<ExitCode, Error>;

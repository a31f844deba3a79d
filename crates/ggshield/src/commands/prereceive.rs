//! Handler for `ggshield secret scan pre-receive`.
//!
//! The scan itself runs in a child process (a re-exec of the current
//! binary with the hidden `prereceive-worker` subcommand) so a hard
//! wall-clock timeout can be enforced: killing a thread would leave the
//! blocking HTTP request in flight, killing the process does not.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use clap::Args;
use ggshield_core::{Error, ExitCode, ScanMode};
use ggshield_git::hooks::{
    get_breakglass_option, get_prereceive_timeout, parse_prereceive_stdin, PreReceiveInput,
};
use ggshield_git::get_list_commit_sha;

use crate::commands::common;
use crate::commands::worker::WorkerPayload;
use crate::{CommandResult, SecretScanArgs};

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Args, Clone)]
pub struct PreReceiveArgs {
    /// Arguments passed by git to the hook.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    prereceive_args: Vec<String>,

    #[command(flatten)]
    scan: SecretScanArgs,
}

pub fn handle(args: PreReceiveArgs, verbose: bool) -> CommandResult {
    let ctx = common::make_context(&args.scan, verbose)?;

    if get_breakglass_option() {
        eprintln!("SKIP: breakglass detected. Skipping GitGuardian pre-receive hook.");
        return Ok(ExitCode::Success);
    }

    let mut stdin = String::new();
    std::io::stdin()
        .read_to_string(&mut stdin)
        .map_err(Error::from)?;
    let (before, after) = match parse_prereceive_stdin(&stdin)? {
        PreReceiveInput::NothingToScan(message) => {
            eprintln!("{message}");
            return Ok(ExitCode::Success);
        }
        PreReceiveInput::Range { old, new } => (old, new),
    };

    let max_commits = ctx.config.max_commits_for_hook;
    let range = format!("{before}...{after}");
    let mut commit_list =
        get_list_commit_sha(&range, Some(max_commits + 1)).map_err(Error::from)?;
    if commit_list.is_empty() {
        return Err(Error::Usage(format!(
            "Unable to get commit range.\n  before: {before}\n  after: {after}"
        )));
    }
    if commit_list.len() > max_commits {
        eprintln!("Too many commits. Scanning last {max_commits} commits\n");
        commit_list = commit_list.split_off(commit_list.len() - max_commits);
    }
    if verbose {
        eprintln!("Commits to scan: {}", commit_list.len());
    }

    let payload = WorkerPayload {
        commit_list,
        config: ctx.config.clone(),
        mode: ScanMode::PreReceive.as_str().to_string(),
        gitlab_web_ui: std::env::var("GL_PROTOCOL").as_deref() == Ok("web"),
    };

    run_scan_child(&payload)
}

/// Spawn the worker, enforce the timeout, map its exit code.
fn run_scan_child(payload: &WorkerPayload) -> CommandResult {
    let exe = std::env::current_exe().map_err(Error::from)?;
    let mut child = Command::new(exe)
        .args(["secret", "scan", "prereceive-worker"])
        .stdin(Stdio::piped())
        .spawn()
        .map_err(Error::from)?;

    let serialized = serde_json::to_string(payload)
        .map_err(|err| Error::Unexpected(err.to_string()))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(serialized.as_bytes()).map_err(Error::from)?;
        // Closing stdin lets the worker start.
    }

    let timeout = Duration::from_secs_f64(get_prereceive_timeout());
    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().map_err(Error::from)? {
            break status;
        }
        if Instant::now() >= deadline {
            eprintln!("\nPre-receive hook took too long");
            let _ = child.kill();
            let _ = child.wait();
            // Never block legitimate pushes on server overload.
            return Ok(ExitCode::Success);
        }
        std::thread::sleep(CHILD_POLL_INTERVAL);
    };

    let code = ExitCode::from_code(status.code().unwrap_or(ExitCode::UnexpectedError.code()));
    // A top-level abort in the child (server not responding, quota
    // reached, any unexpected failure) must not block legitimate pushes.
    if code == ExitCode::UnexpectedError {
        eprintln!("\nGitGuardian could not complete the scan. Skipping checks.");
        return Ok(ExitCode::Success);
    }
    Ok(code)
}

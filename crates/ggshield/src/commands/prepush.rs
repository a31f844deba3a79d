//! Handler for `ggshield secret scan pre-push`.

use std::io::Read;

use clap::Args;
use ggshield_core::{Error, ExitCode, ScanContext, ScanMode, EMPTY_SHA};
use ggshield_git::hooks::{
    collect_commits_from_precommit_env, collect_commits_from_stdin, user_requested_skip,
    PrePushRefs, OUTDATED_HOOK_MESSAGE,
};
use ggshield_git::get_list_commit_sha;
use ggshield_secret::{check_client_api_key, default_scan_threads, repo, ClientChunkScanner};

use crate::commands::common;
use crate::{apply_exit_zero, CommandResult, SecretScanArgs};

#[derive(Args, Clone)]
pub struct PrePushArgs {
    /// Arguments passed by git to the hook: `<remote name> <remote url>`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    prepush_args: Vec<String>,

    #[command(flatten)]
    scan: SecretScanArgs,
}

/// Resolve the ref pair to scan: the pre-commit framework environment
/// wins, stdin otherwise.
fn collect_commits_refs(prepush_args: &[String]) -> Result<PrePushRefs, Error> {
    if let Some(refs) = collect_commits_from_precommit_env() {
        return Ok(refs);
    }
    let remote_name = match prepush_args.first() {
        Some(remote) => remote.as_str(),
        None => {
            eprintln!("{OUTDATED_HOOK_MESSAGE}");
            "origin"
        }
    };
    let mut stdin = String::new();
    std::io::stdin()
        .read_to_string(&mut stdin)
        .map_err(Error::from)?;
    collect_commits_from_stdin(&stdin, remote_name).map_err(Error::from)
}

pub fn handle(args: PrePushArgs, verbose: bool) -> CommandResult {
    if user_requested_skip() {
        eprintln!("Skipping ggshield hook based on SKIP environment variable.");
        return Ok(ExitCode::Success);
    }

    let mut ctx = common::make_context(&args.scan, verbose)?;

    let PrePushRefs { local, remote } = collect_commits_refs(&args.prepush_args)?;
    if local == EMPTY_SHA {
        eprintln!("Deletion event or nothing to scan.");
        return Ok(ExitCode::Success);
    }
    if local == remote {
        eprintln!("Pushed branch does not contain any new commit.");
        return Ok(ExitCode::Success);
    }

    let max_commits = ctx.config.max_commits_for_hook;
    let range = format!("{remote}...{local}");
    let mut commit_list =
        get_list_commit_sha(&range, Some(max_commits + 1)).map_err(Error::from)?;
    if commit_list.is_empty() {
        return Err(Error::Usage(format!(
            "Unable to get commit range.\n  before: {remote}\n  after: {local}\nAre you using the pre-push hook without the pre-commit framework?"
        )));
    }
    if commit_list.len() > max_commits {
        eprintln!("Too many commits. Scanning last {max_commits} commits");
        commit_list = commit_list.split_off(commit_list.len() - max_commits);
    }
    if verbose {
        eprintln!("Commits to scan: {}", commit_list.len());
    }

    let client = common::create_client_from_env()?;
    check_client_api_key(&client, &ctx.config.secret)?;
    ctx.set_client(client.clone());
    ctx.set_cache(common::create_cache());

    let scan_context = ScanContext::new(ScanMode::PrePush, "ggshield secret scan pre-push");
    let chunk_scanner = std::sync::Arc::new(ClientChunkScanner::new(
        client.clone(),
        ctx.config.secret.source_uuid.clone(),
    ));
    let exclusion_regexes = ctx.exclusion_regexes.clone();
    let secret_config = ctx.config.secret.clone();
    let mut scan = repo::scan_commit_range(
        chunk_scanner,
        ctx.cache_mut(),
        &commit_list,
        &exclusion_regexes,
        &secret_config,
        &scan_context,
        default_scan_threads(),
    )?;

    let handler = common::create_output_handler(&ctx, &scan, Some(&client));
    let code = handler.process_scan(&mut scan)?;
    if code == ExitCode::ScanFoundProblems {
        eprintln!("{}", client.remediation_messages().pre_push);
    }
    Ok(apply_exit_zero(code, ctx.config.exit_zero))
}

//! Handler for `ggshield secret scan repo`.

use std::path::PathBuf;

use clap::Args;
use ggshield_core::{Error, ScanContext, ScanMode};
use ggshield_git::{get_list_commit_sha, is_git_dir};
use ggshield_secret::{check_client_api_key, default_scan_threads, repo, ClientChunkScanner};

use crate::commands::common;
use crate::{apply_exit_zero, CommandResult, SecretScanArgs};

#[derive(Args, Clone)]
pub struct RepoArgs {
    /// Path to the repository to scan.
    repo_path: PathBuf,

    #[command(flatten)]
    scan: SecretScanArgs,
}

pub fn handle(args: RepoArgs, verbose: bool) -> CommandResult {
    let mut ctx = common::make_context(&args.scan, verbose)?;

    if !is_git_dir(&args.repo_path) {
        return Err(Error::Usage(format!(
            "{} is not a git repository",
            args.repo_path.display()
        )));
    }
    // Commit enumeration and patch fetching run relative to the target
    // repository.
    std::env::set_current_dir(&args.repo_path).map_err(Error::from)?;

    let commit_list = get_list_commit_sha("--all", None).map_err(Error::from)?;
    if verbose {
        eprintln!("Commits to scan: {}", commit_list.len());
    }

    let client = common::create_client_from_env()?;
    check_client_api_key(&client, &ctx.config.secret)?;
    ctx.set_client(client.clone());
    ctx.set_cache(common::create_cache());

    let scan_context = ScanContext::new(ScanMode::Repo, "ggshield secret scan repo")
        .with_target_path(args.repo_path.clone());
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
    Ok(apply_exit_zero(code, ctx.config.exit_zero))
}

//! Handler for `ggshield secret scan pre-commit`.

use clap::Args;
use ggshield_core::{ScanContext, ScanMode};
use ggshield_git::hooks::user_requested_skip;
use ggshield_git::{check_git_dir, git, Commit};
use ggshield_scannable::{PlainTextScannerUI, Scannable};
use ggshield_secret::{
    check_client_api_key, default_scan_threads, ClientChunkScanner, SecretScanCollection,
    SecretScanner,
};

use crate::commands::common;
use crate::{apply_exit_zero, CommandResult, SecretScanArgs};

#[derive(Args, Clone)]
pub struct PreCommitArgs {
    /// When scanning a merge commit, skip files that were not modified by
    /// the merge (assumes the merged commits are secret free).
    #[arg(long)]
    skip_unchanged_merge_files: bool,

    /// Arguments passed by git to the hook.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    precommit_args: Vec<String>,

    #[command(flatten)]
    scan: SecretScanArgs,
}

/// True when `MERGE_HEAD` exists, meaning a merge with conflicts is being
/// committed.
fn is_merge_with_conflict() -> bool {
    git(&["rev-parse", "--verify", "-q", "MERGE_HEAD"], None).is_ok()
}

/// True when the reflog action says a no-conflict merge is in progress.
fn is_merge_without_conflict() -> bool {
    reflog_action()
        .split(' ')
        .next()
        .is_some_and(|action| action == "merge")
}

/// The branch that was merged, recovered from the reflog action
/// (`merge <branch>`).
fn merge_branch_from_reflog() -> String {
    reflog_action()
        .rsplit(' ')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn reflog_action() -> String {
    std::env::var("GIT_REFLOG_ACTION").unwrap_or_default()
}

pub fn handle(args: PreCommitArgs, verbose: bool) -> CommandResult {
    if user_requested_skip() {
        eprintln!("Skipping ggshield hook based on SKIP environment variable.");
        return Ok(ggshield_core::ExitCode::Success);
    }

    let mut ctx = common::make_context(&args.scan, verbose)?;
    let cwd = std::env::current_dir().map_err(ggshield_core::Error::from)?;
    check_git_dir(&cwd).map_err(ggshield_core::Error::from)?;

    let client = common::create_client_from_env()?;
    check_client_api_key(&client, &ctx.config.secret)?;
    ctx.set_client(client.clone());
    ctx.set_cache(common::create_cache());

    let scan_context = ScanContext::new(ScanMode::PreCommit, "ggshield secret scan pre-commit")
        .with_target_path(cwd);

    let commit = if args.skip_unchanged_merge_files && is_merge_with_conflict() {
        Commit::from_merge(ctx.exclusion_regexes.clone(), None, None)
    } else if args.skip_unchanged_merge_files && is_merge_without_conflict() {
        let merge_branch = merge_branch_from_reflog();
        Commit::from_merge(ctx.exclusion_regexes.clone(), Some(merge_branch.as_str()), None)
    } else {
        Commit::from_staged(ctx.exclusion_regexes.clone(), None)
    }
    .map_err(ggshield_core::Error::from)?;

    let files: Vec<Box<dyn Scannable>> = commit
        .get_files()
        .map_err(ggshield_core::Error::from)?
        .into_iter()
        .map(|scannable| Box::new(scannable) as Box<dyn Scannable>)
        .collect();

    let scanner = SecretScanner::new(
        std::sync::Arc::new(ClientChunkScanner::new(
            client.clone(),
            ctx.config.secret.source_uuid.clone(),
        )),
        &scan_context,
        ctx.config.secret.clone(),
    );
    let mut ui = PlainTextScannerUI;
    let results = scanner.scan(files, &mut ui, ctx.cache_mut(), default_scan_threads())?;

    let mut collection = SecretScanCollection::new_results("cached", "pre-commit", results);
    let handler = common::create_output_handler(&ctx, &collection, Some(&client));
    let code = handler.process_scan(&mut collection)?;
    if code == ggshield_core::ExitCode::ScanFoundProblems {
        eprintln!("{}", client.remediation_messages().pre_commit);
    }
    Ok(apply_exit_zero(code, ctx.config.exit_zero))
}

//! Handler for `ggshield secret scan path`.

use std::path::{Path, PathBuf};

use clap::Args;
use ggshield_core::{Error, ScanContext, ScanMode};
use ggshield_exclude::ExclusionRegexes;
use ggshield_git::{git_ls, is_git_dir};
use ggshield_scannable::{is_path_binary, File, PlainTextScannerUI, Scannable};
use ggshield_secret::{
    check_client_api_key, default_scan_threads, ClientChunkScanner, SecretScanCollection,
    SecretScanner,
};
use ignore::WalkBuilder;

use crate::commands::common;
use crate::{apply_exit_zero, CommandResult, SecretScanArgs};

#[derive(Args, Clone)]
pub struct PathArgs {
    /// Files or directories to scan.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Scan directory recursively.
    #[arg(short, long)]
    recursive: bool,

    /// Confirm automatically.
    #[arg(short, long)]
    yes: bool,

    /// Ignore that the folder is a git repository.
    #[arg(long)]
    ignore_git: bool,

    #[command(flatten)]
    scan: SecretScanArgs,
}

/// Expand the command-line paths into the set of files to scan, applying
/// exclusions and dropping binary files by extension.
fn get_filepaths(
    paths: &[PathBuf],
    exclusion_regexes: &ExclusionRegexes,
    recursive: bool,
    ignore_git: bool,
) -> Result<Vec<PathBuf>, Error> {
    let mut targets = Vec::new();
    for path in paths {
        if path.is_file() {
            targets.push(path.clone());
        } else if path.is_dir() {
            if !recursive {
                return Err(Error::Usage(format!(
                    "{} is a directory. Use --recursive to scan directories.",
                    path.display()
                )));
            }
            if !ignore_git && is_git_dir(path) {
                for tracked in git_ls(path).map_err(Error::from)? {
                    push_candidate(&mut targets, path.join(tracked), exclusion_regexes);
                }
            } else {
                for entry in walk(path) {
                    push_candidate(&mut targets, entry, exclusion_regexes);
                }
            }
        } else {
            return Err(Error::Usage(format!("{} does not exist.", path.display())));
        }
    }
    targets.sort();
    targets.dedup();
    Ok(targets)
}

fn walk(root: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .collect()
}

fn push_candidate(
    targets: &mut Vec<PathBuf>,
    path: PathBuf,
    exclusion_regexes: &ExclusionRegexes,
) {
    if !path.is_file() {
        return;
    }
    if exclusion_regexes.is_excluded(&path) {
        return;
    }
    targets.push(path);
}

pub fn handle(args: PathArgs, verbose: bool) -> CommandResult {
    let mut ctx = common::make_context(&args.scan, verbose)?;

    let filepaths = get_filepaths(
        &args.paths,
        &ctx.exclusion_regexes,
        args.recursive,
        args.ignore_git,
    )?;

    let mut files: Vec<Box<dyn Scannable>> = Vec::new();
    for path in filepaths {
        if is_path_binary(&path) {
            if verbose {
                eprintln!("ignoring binary file: {}", path.display());
            }
            continue;
        }
        files.push(Box::new(File::new(path)));
    }

    if verbose {
        for file in &files {
            eprintln!("- {}", file.filename());
        }
    }

    let client = common::create_client_from_env()?;
    check_client_api_key(&client, &ctx.config.secret)?;
    ctx.set_client(client.clone());
    ctx.set_cache(common::create_cache());

    let scan_context = ScanContext::new(ScanMode::Path, "ggshield secret scan path")
        .with_target_path(std::env::current_dir().map_err(Error::from)?);
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

    let id = args
        .paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let mut collection = SecretScanCollection::new_results(id, "path_scan", results);
    let handler = common::create_output_handler(&ctx, &collection, Some(&client));
    let code = handler.process_scan(&mut collection)?;
    Ok(apply_exit_zero(code, ctx.config.exit_zero))
}

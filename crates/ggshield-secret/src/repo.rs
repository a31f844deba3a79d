//! Commit-range scanning: batches commits so each batch stays under the
//! per-request document cap, scans batches in parallel, and maps file
//! results back to their commit through `commit://` URLs.

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;
use std::sync::Arc;

use ggshield_cache::Cache;
use ggshield_core::config::SecretConfig;
use ggshield_core::{Error, ScanContext};
use ggshield_exclude::ExclusionRegexes;
use ggshield_git::Commit;
use ggshield_scannable::{Scannable, VoidScannerUI};
use threadpool::ThreadPool;
use tracing::debug;

use crate::collection::{Results, SecretScanCollection};
use crate::scanner::{ChunkScanner, SecretScanner};

/// Outer worker pool size for commit batches.
const BATCH_WORKERS: usize = 4;

/// Group commits into batches whose total file count stays under
/// `batch_max_size`. A single commit bigger than the cap still gets its
/// own batch.
pub fn get_commits_by_batch(commits: Vec<Commit>, batch_max_size: usize) -> Vec<Vec<Commit>> {
    let mut batches = Vec::new();
    let mut batch: Vec<Commit> = Vec::new();
    let mut current_count = 0usize;

    for commit in commits {
        let num_files = commit.info.paths.len();
        if current_count + num_files < batch_max_size {
            batch.push(commit);
            current_count += num_files;
        } else {
            if !batch.is_empty() {
                batches.push(std::mem::take(&mut batch));
            }
            current_count = num_files;
            batch.push(commit);
        }
    }
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}

/// Scan the files of a batch of commits and build one sub-collection per
/// commit, with per-commit attribution.
///
/// A batch-level failure becomes the `errors` of every commit of the
/// batch; a quota failure aborts instead.
fn scan_commits_content(
    commits: &[Commit],
    scanner: &SecretScanner,
    scan_threads: usize,
) -> Result<Vec<SecretScanCollection>, Error> {
    let mut cache = Cache::in_memory();
    let mut ui = VoidScannerUI::default();

    let results = (|| -> Result<Results, Error> {
        let mut files: Vec<Box<dyn Scannable>> = Vec::new();
        for commit in commits {
            for scannable in commit.get_files().map_err(Error::from)? {
                files.push(Box::new(scannable));
            }
        }
        scanner.scan(files, &mut ui, &mut cache, scan_threads)
    })();

    let results = match results {
        Ok(results) => results,
        Err(err @ Error::QuotaLimitReached(_)) => return Err(err),
        Err(err @ Error::Auth(_)) => return Err(err),
        Err(err) => Results::from_error(&err),
    };

    let mut results_by_url: HashMap<String, crate::collection::FileResult> = results
        .results
        .into_iter()
        .map(|result| (result.url.clone(), result))
        .collect();

    let mut scans = Vec::new();
    for commit in commits {
        let commit_results: Vec<_> = commit
            .urls()
            .iter()
            .filter_map(|url| results_by_url.remove(url))
            .collect();
        let mut collection = SecretScanCollection::new_results(
            commit.sha.clone().unwrap_or_else(|| "unknown".to_string()),
            "commit",
            Results {
                results: commit_results,
                errors: results.errors.clone(),
            },
        );
        collection.optional_header = Some(commit.optional_header());
        collection.extra_info = Some(BTreeMap::from([
            ("author".to_string(), commit.info.author.clone()),
            ("email".to_string(), commit.info.email.clone()),
            ("date".to_string(), commit.info.date.clone()),
        ]));
        scans.push(collection);
    }
    Ok(scans)
}

/// Scan every commit of a range.
///
/// Returns the nested collection (`commit-range` -> one `commit` scan per
/// sha). Batches run on an outer worker pool; one batch failing does not
/// stop the others, except for quota and authentication failures which
/// abort the whole scan.
#[allow(clippy::too_many_arguments)]
pub fn scan_commit_range(
    chunk_scanner: Arc<dyn ChunkScanner>,
    cache: &mut Cache,
    commit_list: &[String],
    exclusion_regexes: &ExclusionRegexes,
    secret_config: &SecretConfig,
    scan_context: &ScanContext,
    scan_threads: usize,
) -> Result<SecretScanCollection, Error> {
    let max_documents = chunk_scanner.preferences().maximum_documents_per_scan;

    let mut commits = Vec::new();
    for sha in commit_list {
        commits.push(
            Commit::from_sha(sha.clone(), exclusion_regexes.clone(), None)
                .map_err(Error::from)?,
        );
    }
    let batches = get_commits_by_batch(commits, max_documents);
    debug!(
        commits = commit_list.len(),
        batches = batches.len(),
        "scanning commit range"
    );

    let pool = ThreadPool::new(BATCH_WORKERS.min(batches.len()).max(1));
    let (sender, receiver) = mpsc::channel();
    let batch_count = batches.len();

    for (index, batch) in batches.into_iter().enumerate() {
        let sender = sender.clone();
        let scanner = SecretScanner::new(
            Arc::clone(&chunk_scanner),
            scan_context,
            secret_config.clone(),
        );
        pool.execute(move || {
            let outcome = scan_commits_content(&batch, &scanner, scan_threads);
            let _ = sender.send((index, outcome));
        });
    }
    drop(sender);

    let mut indexed: Vec<(usize, Vec<SecretScanCollection>)> = Vec::new();
    let mut fatal: Option<Error> = None;
    for (index, outcome) in receiver.iter().take(batch_count) {
        match outcome {
            Ok(scans) => indexed.push((index, scans)),
            // Remember the abort but drain remaining batches first so the
            // pool threads never block on a closed channel.
            Err(err) => fatal = Some(err),
        }
    }
    if let Some(err) = fatal {
        return Err(err);
    }

    // Deterministic order: by batch index, i.e. by sha order of the range.
    indexed.sort_by_key(|(index, _)| *index);
    let scans: Vec<SecretScanCollection> = indexed
        .into_iter()
        .flat_map(|(_, scans)| scans)
        .collect();

    // The cache is written only from the orchestrating thread, after all
    // chunks completed.
    cache.purge();
    for scan in &scans {
        if let Some(results) = &scan.results {
            for result in &results.results {
                for secret in &result.secrets {
                    cache.add_found_secret(
                        &secret.detector_display_name,
                        secret.ignore_sha(),
                        &result.filename,
                    );
                }
            }
        }
    }
    if let Err(err) = cache.save() {
        debug!(error = %err, "could not save cache");
    }

    Ok(SecretScanCollection::new_scans(
        scan_context.command_id.clone(),
        "commit-range",
        scans,
    ))
}

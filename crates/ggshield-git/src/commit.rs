//! Lazy view of one git revision (or of the staging area).
//!
//! Construction only reads the raw header, to know which paths the commit
//! touches; patch content is fetched when the files are iterated, in
//! batches of `GG_MAX_DOCS_PER_COMMIT` paths per `git show` invocation so
//! huge commits do not blow OS argv limits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ggshield_core::env_utils::getenv_usize;
use ggshield_exclude::ExclusionRegexes;
use ggshield_scannable::StringScannable;
use thiserror::Error;

use crate::patch::{
    create_commit_url, parse_patch, PatchHeader, PatchParseError, DIFF_EMPTY_COMMIT_INFO_BLOCK,
    HEADER_COMMON_ARGS, PATCH_COMMON_ARGS, PATCH_PREFIX, STAGED_PREFIX,
};
use crate::shell::{git, GitError};

const MAX_DOCS_PER_COMMIT_VAR: &str = "GG_MAX_DOCS_PER_COMMIT";
const DEFAULT_MAX_DOCS_PER_COMMIT: usize = 20;

#[derive(Error, Debug)]
pub enum CommitError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Could not parse patch{}: {source}", sha_suffix(.sha))]
    PatchParse {
        sha: Option<String>,
        source: PatchParseError,
    },
}

fn sha_suffix(sha: &Option<String>) -> String {
    match sha {
        Some(sha) => format!(" (sha: {sha})"),
        None => String::new(),
    }
}

impl From<CommitError> for ggshield_core::Error {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Git(git) => git.into(),
            patch => ggshield_core::Error::Unexpected(patch.to_string()),
        }
    }
}

/// Author, date and touched paths of a commit, parsed from its raw header.
#[derive(Debug, Clone, Default)]
pub struct CommitInformation {
    pub author: String,
    pub email: String,
    pub date: String,
    /// Paths in raw-header order.
    pub paths: Vec<PathBuf>,
    /// new path -> old path, for renames and copies.
    pub renames: BTreeMap<PathBuf, PathBuf>,
}

impl CommitInformation {
    /// Parse a header generated with [`HEADER_COMMON_ARGS`].
    ///
    /// A merge commit produces one `\0commit `-separated block per parent
    /// (because of `-m`); the commit info comes from the first block and
    /// the file lists of every block are concatenated, in order. A path
    /// touched relative to several parents appears once per parent, like
    /// its content will when the files are enumerated.
    pub fn from_patch_header(header: &str) -> Result<Self, PatchParseError> {
        let mut author_email_date = None;
        let mut paths = Vec::new();
        let mut renames = BTreeMap::new();

        for block in header.split("\0commit ") {
            let parsed = PatchHeader::from_string(block)?;
            if author_email_date.is_none() {
                author_email_date = Some(parse_info_block(&parsed.info).ok_or_else(|| {
                    PatchParseError::MissingCommitInfo(parsed.info.clone())
                })?);
            }
            for file_info in parsed.files {
                if let Some(old_path) = file_info.old_path {
                    renames.insert(file_info.path.clone(), old_path);
                }
                paths.push(file_info.path);
            }
        }

        let (author, email, date) = author_email_date
            .ok_or_else(|| PatchParseError::MissingCommitInfo(header.to_string()))?;
        Ok(Self {
            author,
            email,
            date,
            paths,
            renames,
        })
    }

    pub fn from_staged(cwd: Option<&Path>) -> Result<Self, CommitError> {
        let mut args = vec!["diff", "--staged"];
        args.extend_from_slice(HEADER_COMMON_ARGS);
        let output = git(&args, cwd)?;
        if output.is_empty() {
            // No staged changes.
            return Ok(Self::default());
        }
        let header = format!("{DIFF_EMPTY_COMMIT_INFO_BLOCK}{output}");
        Self::from_patch_header(&header).map_err(|source| CommitError::PatchParse {
            sha: None,
            source,
        })
    }

    pub fn from_sha(sha: &str, cwd: Option<&Path>) -> Result<Self, CommitError> {
        let mut args = vec!["show", sha];
        args.extend_from_slice(HEADER_COMMON_ARGS);
        let header = git(&args, cwd)?;
        Self::from_patch_header(&header).map_err(|source| CommitError::PatchParse {
            sha: Some(sha.to_string()),
            source,
        })
    }

    fn from_diff(args: &[&str], cwd: Option<&Path>) -> Result<Self, CommitError> {
        let mut full_args = args.to_vec();
        full_args.extend_from_slice(HEADER_COMMON_ARGS);
        let output = git(&full_args, cwd)?;
        if output.is_empty() {
            return Ok(Self::default());
        }
        let header = format!("{DIFF_EMPTY_COMMIT_INFO_BLOCK}{output}");
        Self::from_patch_header(&header).map_err(|source| CommitError::PatchParse {
            sha: None,
            source,
        })
    }
}

/// Parse `Author: NAME <EMAIL>` and `Date: ...` out of the info block.
fn parse_info_block(info: &str) -> Option<(String, String, String)> {
    let mut author = None;
    let mut email = None;
    let mut date = None;
    for line in info.lines() {
        if let Some(rest) = line.strip_prefix("Author:") {
            let open = rest.find('<')?;
            let close = rest.rfind('>')?;
            author = Some(rest[..open].trim().to_string());
            email = Some(rest[open + 1..close].to_string());
        } else if let Some(rest) = line.strip_prefix("Date:") {
            date = Some(rest.trim().to_string());
        }
        if author.is_some() && date.is_some() {
            break;
        }
    }
    Some((author?, email?, date?))
}

/// Where a [`Commit`]'s patch content comes from.
#[derive(Debug, Clone)]
pub enum CommitSource {
    /// `git show <sha>`, batched over the commit's paths.
    Sha(String),
    /// `git diff --cached`.
    Staged,
    /// `git diff HEAD <ref>`: only the files modified by a merge itself.
    /// The ref is `MERGE_HEAD` in a conflicted merge, the merged branch
    /// tip otherwise.
    Merge(String),
    /// An in-memory patch, mostly for tests and stdin scanning.
    Patch(String),
}

/// A lazy stream of scannables out of one revision.
pub struct Commit {
    pub sha: Option<String>,
    pub info: CommitInformation,
    source: CommitSource,
    exclusion_regexes: ExclusionRegexes,
    cwd: Option<PathBuf>,
}

impl Commit {
    pub fn from_sha(
        sha: impl Into<String>,
        exclusion_regexes: ExclusionRegexes,
        cwd: Option<&Path>,
    ) -> Result<Self, CommitError> {
        let sha = sha.into();
        let info = CommitInformation::from_sha(&sha, cwd)?;
        Ok(Self {
            source: CommitSource::Sha(sha.clone()),
            sha: Some(sha),
            info,
            exclusion_regexes,
            cwd: cwd.map(Path::to_path_buf),
        })
    }

    pub fn from_staged(
        exclusion_regexes: ExclusionRegexes,
        cwd: Option<&Path>,
    ) -> Result<Self, CommitError> {
        let info = CommitInformation::from_staged(cwd)?;
        Ok(Self {
            sha: None,
            info,
            source: CommitSource::Staged,
            exclusion_regexes,
            cwd: cwd.map(Path::to_path_buf),
        })
    }

    /// Commit covering only the files modified by the merge being
    /// committed. `merged_ref` defaults to `MERGE_HEAD` (conflicted
    /// merge); pass the merged branch tip for the no-conflict path.
    pub fn from_merge(
        exclusion_regexes: ExclusionRegexes,
        merged_ref: Option<&str>,
        cwd: Option<&Path>,
    ) -> Result<Self, CommitError> {
        let merged_ref = merged_ref.unwrap_or("MERGE_HEAD").to_string();
        let info = CommitInformation::from_diff(&["diff", "HEAD", merged_ref.as_str()], cwd)?;
        Ok(Self {
            sha: None,
            info,
            source: CommitSource::Merge(merged_ref),
            exclusion_regexes,
            cwd: cwd.map(Path::to_path_buf),
        })
    }

    pub fn from_patch(
        patch: impl Into<String>,
        exclusion_regexes: ExclusionRegexes,
    ) -> Result<Self, CommitError> {
        let patch = patch.into();
        let info = CommitInformation::from_patch_header(&patch).map_err(|source| {
            CommitError::PatchParse { sha: None, source }
        })?;
        Ok(Self {
            sha: None,
            info,
            source: CommitSource::Patch(patch),
            exclusion_regexes,
            cwd: None,
        })
    }

    /// The prefix used in this commit's URLs.
    fn url_prefix(&self) -> &str {
        match &self.source {
            CommitSource::Sha(sha) => sha,
            CommitSource::Patch(_) => PATCH_PREFIX,
            CommitSource::Staged | CommitSource::Merge(_) => STAGED_PREFIX,
        }
    }

    /// URLs of every file of the commit, without reading any content.
    pub fn urls(&self) -> Vec<String> {
        let sha = match &self.source {
            CommitSource::Sha(sha) => Some(sha.as_str()),
            CommitSource::Patch(_) => Some(PATCH_PREFIX),
            _ => None,
        };
        self.info
            .paths
            .iter()
            .map(|path| create_commit_url(sha, path))
            .collect()
    }

    /// Header shown above this commit's findings in text reports.
    pub fn optional_header(&self) -> String {
        format!(
            "\ncommit {}\nAuthor: {} <{}>\nDate: {}\n",
            self.sha.as_deref().unwrap_or("unknown"),
            self.info.author,
            self.info.email,
            self.info.date
        )
    }

    /// Parse the patch into files and extract the changes for each one.
    ///
    /// For sha-backed commits the patch is fetched in batches so sha order
    /// is kept while bounding each `git show` invocation.
    pub fn get_files(&self) -> Result<Vec<StringScannable>, CommitError> {
        let prefix = self.url_prefix().to_string();
        let cwd = self.cwd.as_deref();
        let wrap = |source: PatchParseError, sha: Option<String>| CommitError::PatchParse {
            sha,
            source,
        };

        match &self.source {
            CommitSource::Sha(sha) => {
                let batch_size =
                    getenv_usize(MAX_DOCS_PER_COMMIT_VAR, DEFAULT_MAX_DOCS_PER_COMMIT).max(1);
                let mut files = Vec::new();
                for batch in self.info.paths.chunks(batch_size) {
                    let paths: Vec<String> = batch
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect();
                    let mut args = vec!["show", sha.as_str()];
                    args.extend_from_slice(PATCH_COMMON_ARGS);
                    args.push("--");
                    args.extend(paths.iter().map(String::as_str));
                    let patch = git(&args, cwd)?;
                    files.extend(
                        parse_patch(&prefix, &patch, &self.exclusion_regexes)
                            .map_err(|e| wrap(e, Some(sha.clone())))?,
                    );
                }
                Ok(files)
            }
            CommitSource::Staged => {
                let mut args = vec!["diff", "--cached"];
                args.extend_from_slice(PATCH_COMMON_ARGS);
                let patch = git(&args, cwd)?;
                parse_patch(&prefix, &patch, &self.exclusion_regexes)
                    .map_err(|e| wrap(e, None))
            }
            CommitSource::Merge(merged_ref) => {
                let mut args = vec!["diff", "HEAD", merged_ref.as_str()];
                args.extend_from_slice(PATCH_COMMON_ARGS);
                let patch = git(&args, cwd)?;
                parse_patch(&prefix, &patch, &self.exclusion_regexes)
                    .map_err(|e| wrap(e, None))
            }
            CommitSource::Patch(patch) => parse_patch(&prefix, patch, &self.exclusion_regexes)
                .map_err(|e| wrap(e, None)),
        }
    }
}

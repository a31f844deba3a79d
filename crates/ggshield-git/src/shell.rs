//! Thin process-level wrapper around the `git` executable.
//!
//! Every invocation forces `LANG=C`, captures both output streams and
//! enforces a wall-clock timeout. Failure, timeout and "dubious ownership"
//! are distinct error kinds so callers can map them to the right exit
//! codes.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use ggshield_core::Filemode;
use thiserror::Error;
use tracing::debug;

/// Default timeout for ordinary git commands.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(45);

/// `ls-files --recurse-submodules` on a large repository can legitimately
/// take much longer.
const LS_FILES_TIMEOUT: Duration = Duration::from_secs(600);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Error, Debug)]
pub enum GitError {
    #[error("unable to find git executable in PATH")]
    ExecutableNotFound,

    #[error("rejecting git executable in CWD not in PATH")]
    UntrustedExecutable,

    #[error("Not a git directory.")]
    NotAGitDirectory,

    #[error("Not a git reference: {0}.")]
    InvalidGitRef(String),

    #[error("Command \"git {command}\" timed out")]
    CommandTimeout { command: String },

    #[error(
        "Git command failed because of a dubious ownership in repository.\n\
         If you still want to run ggshield, make sure you mark \
         the current repository as safe for git with:\n   \
         git config --global --add safe.directory <YOUR_REPO>"
    )]
    DubiousOwnership,

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<GitError> for ggshield_core::Error {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotAGitDirectory | GitError::InvalidGitRef(_) => {
                ggshield_core::Error::Usage(err.to_string())
            }
            other => ggshield_core::Error::Unexpected(other.to_string()),
        }
    }
}

enum GitLookup {
    Found(PathBuf),
    NotFound,
    Untrusted,
}

/// Locate `git` once. A binary discovered in the current working directory
/// that is not on `PATH` is rejected, so a hostile repository cannot smuggle
/// its own `git`.
fn get_git_path() -> Result<&'static Path, GitError> {
    static GIT_PATH: OnceLock<GitLookup> = OnceLock::new();
    let cached = GIT_PATH.get_or_init(|| {
        let Some(git_path) = find_in_path("git") else {
            return GitLookup::NotFound;
        };
        let git_path = absolute(&git_path);
        let cwd = std::env::current_dir().unwrap_or_default();
        let path_entries: Vec<PathBuf> = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).map(|p| absolute(&p)).collect())
            .unwrap_or_default();
        if git_path.parent() == Some(cwd.as_path()) && !path_entries.contains(&cwd) {
            return GitLookup::Untrusted;
        }
        debug!(path = %git_path.display(), "found git");
        GitLookup::Found(git_path)
    });
    match cached {
        GitLookup::Found(path) => Ok(path.as_path()),
        GitLookup::NotFound => Err(GitError::ExecutableNotFound),
        GitLookup::Untrusted => Err(GitError::UntrustedExecutable),
    }
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Run git with the default timeout, returning trimmed stdout.
pub fn git(args: &[&str], cwd: Option<&Path>) -> Result<String, GitError> {
    git_with_timeout(args, COMMAND_TIMEOUT, cwd)
}

/// Run git with an explicit timeout.
pub fn git_with_timeout(
    args: &[&str],
    timeout: Duration,
    cwd: Option<&Path>,
) -> Result<String, GitError> {
    let program = get_git_path()?;
    debug!(command = %args.join(" "), "git");

    let mut command = Command::new(program);
    command
        .args(args)
        .env("LANG", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let mut child = command.spawn()?;

    // Drain both pipes on their own threads so a chatty command cannot
    // deadlock against a full pipe buffer while we poll for exit.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GitError::CommandTimeout {
                command: args.join(" "),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    let stderr = String::from_utf8_lossy(&stderr);
    if !stderr.is_empty() {
        debug!(stderr = %stderr.trim_end(), "git stderr");
    }

    if !status.success() {
        if stderr.contains("detected dubious ownership in repository") {
            return Err(GitError::DubiousOwnership);
        }
        return Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&stdout).trim_end().to_string())
}

pub fn is_git_dir(wd: &Path) -> bool {
    git(&["rev-parse", "--git-dir"], Some(wd)).is_ok()
}

pub fn is_git_working_tree(wd: &Path) -> bool {
    git(&["rev-parse", "--show-toplevel"], Some(wd)).is_ok()
}

pub fn check_git_dir(wd: &Path) -> Result<(), GitError> {
    if is_git_dir(wd) {
        Ok(())
    } else {
        Err(GitError::NotAGitDirectory)
    }
}

/// Root of the repository: the working tree top-level, or the `.git`
/// directory itself during a pre-receive quarantine.
pub fn get_git_root(wd: &Path) -> Result<PathBuf, GitError> {
    check_git_dir(wd)?;
    if let Ok(top_level) = git(&["rev-parse", "--show-toplevel"], Some(wd)) {
        return Ok(PathBuf::from(top_level));
    }
    let root = git(&["rev-parse", "--git-dir"], Some(wd))?;
    Ok(absolute(Path::new(&root)))
}

/// True when `ref` resolves to a commit.
pub fn is_valid_git_commit_ref(reference: &str, wd: Option<&Path>) -> bool {
    let peeled = format!("{reference}^{{commit}}");
    git(&["cat-file", "-e", &peeled], wd).is_ok()
}

pub fn check_git_ref(reference: &str, wd: &Path) -> Result<(), GitError> {
    check_git_dir(wd)?;
    if is_valid_git_commit_ref(reference, Some(wd)) {
        Ok(())
    } else {
        Err(GitError::InvalidGitRef(reference.to_string()))
    }
}

/// List commit SHAs of a range, oldest first.
///
/// `max_count` keeps the *end* of the list: asking for 3 returns
/// `[HEAD~2, HEAD~1, HEAD]`. A range that does not resolve returns an
/// empty list, except for the `A~1...B` case where `A` exists but has no
/// parent, which returns `A` and its descendants.
pub fn get_list_commit_sha(commit_range: &str, max_count: Option<usize>) -> Result<Vec<String>, GitError> {
    let mut args: Vec<String> = vec!["rev-list".to_string(), "--reverse".to_string()];
    args.extend(commit_range.split_whitespace().map(str::to_string));
    if let Some(count) = max_count {
        args.push("--max-count".to_string());
        args.push(count.to_string());
    }
    // Makes rev-list print "bad revision" instead of telling the range is
    // ambiguous.
    args.push("--".to_string());

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    match git(&arg_refs, None) {
        Ok(output) => Ok(output.lines().map(str::to_string).filter(|s| !s.is_empty()).collect()),
        Err(GitError::CommandFailed { stderr, .. }) => {
            if stderr.contains("bad revision") && commit_range.contains("~1..") {
                // We got asked to list commits for A~1...B. If A~1 does not
                // exist but A does, return A and its descendants until B.
                if let Some((a_ref, remaining)) = commit_range.split_once("~1") {
                    if !is_valid_git_commit_ref(&format!("{a_ref}~1"), None)
                        && is_valid_git_commit_ref(a_ref, None)
                    {
                        let mut commits = vec![a_ref.to_string()];
                        commits.extend(get_list_commit_sha(
                            &format!("{a_ref}{remaining}"),
                            None,
                        )?);
                        return Ok(commits);
                    }
                }
            }
            Ok(Vec::new())
        }
        Err(other) => Err(other),
    }
}

/// All file paths indexed at a given reference.
pub fn get_filepaths_from_ref(reference: &str, wd: &Path) -> Result<Vec<PathBuf>, GitError> {
    check_git_ref(reference, wd)?;
    let output = git(
        &["ls-tree", "--name-only", "--full-name", "-r", reference],
        Some(wd),
    )?;
    Ok(output.lines().map(PathBuf::from).collect())
}

/// All file paths in the index.
pub fn get_staged_filepaths(wd: &Path) -> Result<Vec<PathBuf>, GitError> {
    let output = git(&["ls-files", "--full-name", "-c"], Some(wd))?;
    Ok(output.lines().map(PathBuf::from).collect())
}

/// Tracked files, recursing into submodules.
pub fn git_ls(wd: &Path) -> Result<Vec<PathBuf>, GitError> {
    let output = git_with_timeout(
        &["ls-files", "--recurse-submodules"],
        LS_FILES_TIMEOUT,
        Some(wd),
    )?;
    Ok(output.lines().map(PathBuf::from).collect())
}

/// Show a file as stored at `reference` (the empty string denotes the
/// index).
pub fn read_git_file(reference: &str, path: &Path, wd: &Path) -> Result<String, GitError> {
    let spec = format!("{reference}:{}", posix(path));
    git(&["show", &spec], Some(wd))
}

/// Rename-aware map of modified paths since `ref`, against `current_ref`
/// (HEAD by default) or the index when `staged` is set.
pub fn get_diff_files_status(
    reference: &str,
    staged: bool,
    similarity: u8,
    wd: &Path,
    current_ref: Option<&str>,
) -> Result<BTreeMap<PathBuf, Filemode>, GitError> {
    debug_assert!(similarity <= 100);
    let current_ref = current_ref.unwrap_or("HEAD");

    check_git_ref(reference, wd)?;
    if !staged {
        check_git_ref(current_ref, wd)?;
    }
    if reference == "HEAD" && !staged {
        return Ok(BTreeMap::new());
    }

    let is_working_tree = is_git_working_tree(wd);
    let similarity_arg = format!("-M{similarity}%");
    let mut args: Vec<&str> = vec![
        if is_working_tree { "diff" } else { "diff-tree" },
        &similarity_arg,
        "--name-status",
        "-z",
        "--diff-filter=ADMTR",
    ];
    if staged && is_working_tree {
        args.push("--staged");
    }
    if !is_working_tree {
        args.push(current_ref);
    }
    args.push(reference);

    let patch = git(&args, Some(wd))?;
    Ok(parse_name_status_patch(&patch))
}

fn parse_name_status_patch(patch: &str) -> BTreeMap<PathBuf, Filemode> {
    let parts: Vec<&str> = patch.split('\0').collect();
    let mut statuses = BTreeMap::new();
    let mut index = 0;
    while index + 1 < parts.len() {
        let status = parts[index];
        let mut path = parts[index + 1];
        if status.is_empty() || path.is_empty() {
            break;
        }
        let mode = match status.chars().next() {
            Some('A') => Filemode::New,
            Some('D') => Filemode::Delete,
            Some('M') | Some('T') => Filemode::Modify,
            Some('R') => Filemode::Rename,
            _ => Filemode::Unknown,
        };
        if mode == Filemode::Rename {
            // Renames carry two paths: source then destination. The
            // destination is the one callers care about.
            if let Some(&destination) = parts.get(index + 2) {
                path = destination;
                index += 1;
            }
        }
        statuses.insert(PathBuf::from(path), mode);
        index += 2;
    }
    statuses
}

fn posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_status_patch_parses_pairs() {
        let patch = "M\0src/app.py\0A\0new.txt\0D\0gone.txt\0";
        let statuses = parse_name_status_patch(patch);
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[Path::new("src/app.py")], Filemode::Modify);
        assert_eq!(statuses[Path::new("new.txt")], Filemode::New);
        assert_eq!(statuses[Path::new("gone.txt")], Filemode::Delete);
    }

    #[test]
    fn name_status_patch_handles_renames_with_two_paths() {
        let patch = "R100\0old_name.txt\0new_name.txt\0M\0other.txt\0";
        let statuses = parse_name_status_patch(patch);
        assert_eq!(statuses[Path::new("new_name.txt")], Filemode::Rename);
        assert_eq!(statuses[Path::new("other.txt")], Filemode::Modify);
        assert!(!statuses.contains_key(Path::new("old_name.txt")));
    }

    #[test]
    fn git_errors_map_to_core_errors() {
        let err: ggshield_core::Error = GitError::NotAGitDirectory.into();
        assert_eq!(err.exit_code(), ggshield_core::ExitCode::UsageError);
        let err: ggshield_core::Error = GitError::InvalidGitRef("nope".into()).into();
        assert_eq!(err.exit_code(), ggshield_core::ExitCode::UsageError);
        let err: ggshield_core::Error = GitError::DubiousOwnership.into();
        assert_eq!(err.exit_code(), ggshield_core::ExitCode::UnexpectedError);
    }
}

//! Ref arithmetic and environment parsing for the git hooks.
//!
//! The drivers in the CLI crate feed stdin/env content into these
//! functions and turn the returned ref pairs into commit lists.

use ggshield_core::env_utils::getenv_f64;
use ggshield_core::EMPTY_SHA;
use tracing::debug;

use crate::shell::{git, is_valid_git_commit_ref, GitError};

/// GitHub kills every pre-receive hook after 5 s with an error. We
/// anticipate with a smaller budget so we control the return code.
pub const PRERECEIVE_TIMEOUT_SECONDS: f64 = 4.5;

/// Shown when the installed pre-push hook forwards no arguments.
pub const OUTDATED_HOOK_MESSAGE: &str = "The installed pre-push hook did not pass its command-line arguments to ggshield. This can cause the hook to fail if the name of the remote you are pushing to is not \"origin\".

This can happen if the hook has been created manually or by an old version of ggshield. To fix it, edit the hook so it forwards its arguments:

    ggshield secret scan pre-push \"$@\"
";

/// Wall-clock budget for the pre-receive scan child process.
pub fn get_prereceive_timeout() -> f64 {
    getenv_f64("GITGUARDIAN_TIMEOUT", PRERECEIVE_TIMEOUT_SECONDS)
}

/// True when a `breakglass` push option was passed
/// (`git push -o breakglass`).
pub fn get_breakglass_option() -> bool {
    let Ok(raw_count) = std::env::var("GIT_PUSH_OPTION_COUNT") else {
        return false;
    };
    let Ok(count) = raw_count.trim().parse::<usize>() else {
        return false;
    };
    (0..count).any(|index| {
        std::env::var(format!("GIT_PUSH_OPTION_{index}")).as_deref() == Ok("breakglass")
    })
}

/// True when the `SKIP` variable of the pre-commit framework lists
/// `ggshield`.
pub fn user_requested_skip() -> bool {
    let Ok(skip) = std::env::var("SKIP") else {
        return false;
    };
    skip.split(',')
        .any(|hook| hook.trim().eq_ignore_ascii_case("ggshield"))
}

/// First local-only commit of the branch `commit` sits on, or `None` when
/// the branch contains no new commit.
///
/// `not_in` is the rev-list exclusion: `--remotes=<name>` for pre-push,
/// `--branches` for pre-receive.
pub fn find_branch_start(commit: &str, not_in: &str) -> Result<Option<String>, GitError> {
    // Note: `--remotes` MUST be passed with a `=`: `--remotes origin`
    // fails where `--remotes=origin` works.
    let output = git(
        &["rev-list", commit, "--topo-order", "--reverse", "--not", not_in],
        None,
    )?;
    Ok(output.lines().next().map(str::to_string))
}

/// Refs to scan for a pre-push event, `(local_ref, remote_ref)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrePushRefs {
    pub local: String,
    pub remote: String,
}

/// Parse the pre-push stdin payload
/// (`<local_ref> <local_sha> <remote_ref> <remote_sha>` per line).
///
/// Only the first line is honored for now; pushing several branches at
/// once scans the first one.
pub fn collect_commits_from_stdin(
    stdin: &str,
    remote_name: &str,
) -> Result<PrePushRefs, GitError> {
    let input = stdin.trim();
    if input.is_empty() {
        // Happens when there is nothing to push.
        return Ok(PrePushRefs {
            local: EMPTY_SHA.to_string(),
            remote: EMPTY_SHA.to_string(),
        });
    }

    let line = input.lines().next().unwrap_or_default();
    debug!(line, "pre-push stdin");
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [_, local_sha, _, remote_sha] = fields[..] else {
        return Err(GitError::CommandFailed {
            command: "pre-push".to_string(),
            stderr: format!("invalid pre-push input: {line:?}"),
        });
    };

    if is_valid_git_commit_ref(remote_sha, None) {
        // Pushing to an existing branch.
        return Ok(PrePushRefs {
            local: local_sha.to_string(),
            remote: remote_sha.to_string(),
        });
    }

    // Pushing to a new branch: walk back to the first commit not on the
    // remote and use its parent as the old ref.
    let not_in = format!("--remotes={remote_name}");
    match find_branch_start(local_sha, &not_in)? {
        Some(start_commit) => Ok(PrePushRefs {
            local: local_sha.to_string(),
            remote: format!("{start_commit}~1"),
        }),
        None => Ok(PrePushRefs {
            local: local_sha.to_string(),
            remote: local_sha.to_string(),
        }),
    }
}

/// Refs provided by the pre-commit framework environment, if any.
pub fn collect_commits_from_precommit_env() -> Option<PrePushRefs> {
    // pre-commit framework <2.2.0
    let legacy = (
        std::env::var("PRE_COMMIT_SOURCE"),
        std::env::var("PRE_COMMIT_ORIGIN"),
    );
    if let (Ok(local), Ok(remote)) = legacy {
        return Some(PrePushRefs { local, remote });
    }
    // pre-commit framework >=2.2.0
    let current = (
        std::env::var("PRE_COMMIT_FROM_REF"),
        std::env::var("PRE_COMMIT_TO_REF"),
    );
    if let (Ok(local), Ok(remote)) = current {
        return Some(PrePushRefs { local, remote });
    }
    None
}

/// What a pre-receive stdin line amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreReceiveInput {
    /// `(old_ref, new_ref)` to scan.
    Range { old: String, new: String },
    /// Deletion event or branch without new commits: nothing to scan.
    NothingToScan(String),
}

/// Parse the pre-receive stdin payload (`<old> <new> <ref>` per line).
///
/// The received `<old>` sha is ignored on purpose: on a force-push it
/// refers to rewritten history and must not define the scan boundary. The
/// branch start is recomputed against all existing branches instead.
pub fn parse_prereceive_stdin(stdin: &str) -> Result<PreReceiveInput, ggshield_core::Error> {
    let input = stdin.trim();
    if input.is_empty() {
        return Err(ggshield_core::Error::Unexpected(format!(
            "Invalid input arguments: '{input}'"
        )));
    }

    let line = input.lines().next().unwrap_or_default();
    debug!(line, "pre-receive stdin");
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [_old_sha, new_sha, _reference] = fields[..] else {
        return Err(ggshield_core::Error::Unexpected(format!(
            "Invalid input arguments: '{line}'"
        )));
    };

    if new_sha == EMPTY_SHA {
        return Ok(PreReceiveInput::NothingToScan(
            "Deletion event or nothing to scan.".to_string(),
        ));
    }

    let old_sha = match find_branch_start(new_sha, "--branches")
        .map_err(ggshield_core::Error::from)?
    {
        // Branch with no new commit.
        None => new_sha.to_string(),
        Some(start_commit) => format!("{start_commit}~1"),
    };

    if old_sha == new_sha {
        return Ok(PreReceiveInput::NothingToScan(
            "Pushed branch does not contain any new commit.".to_string(),
        ));
    }

    Ok(PreReceiveInput::Range {
        old: old_sha,
        new: new_sha.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate the process environment, so each uses its own
    // variable names where possible and restores state afterwards.

    #[test]
    fn breakglass_is_detected() {
        std::env::remove_var("GIT_PUSH_OPTION_COUNT");
        assert!(!get_breakglass_option());

        std::env::set_var("GIT_PUSH_OPTION_COUNT", "2");
        std::env::set_var("GIT_PUSH_OPTION_0", "ci.skip");
        std::env::set_var("GIT_PUSH_OPTION_1", "breakglass");
        assert!(get_breakglass_option());

        std::env::set_var("GIT_PUSH_OPTION_1", "other");
        assert!(!get_breakglass_option());

        std::env::remove_var("GIT_PUSH_OPTION_COUNT");
        std::env::remove_var("GIT_PUSH_OPTION_0");
        std::env::remove_var("GIT_PUSH_OPTION_1");
    }

    #[test]
    fn skip_env_var_matches_ggshield_entry() {
        std::env::remove_var("SKIP");
        assert!(!user_requested_skip());

        std::env::set_var("SKIP", "foo,ggshield,bar");
        assert!(user_requested_skip());

        std::env::set_var("SKIP", "foo, GGShield ,bar");
        assert!(user_requested_skip());

        std::env::set_var("SKIP", "ggshield-push");
        assert!(!user_requested_skip());

        std::env::remove_var("SKIP");
    }

    #[test]
    fn empty_prepush_stdin_means_nothing_to_push() {
        let refs = collect_commits_from_stdin("", "origin").unwrap();
        assert_eq!(refs.local, EMPTY_SHA);
        assert_eq!(refs.remote, EMPTY_SHA);
        let refs = collect_commits_from_stdin("  \n", "origin").unwrap();
        assert_eq!(refs.local, EMPTY_SHA);
    }

    #[test]
    fn malformed_prepush_stdin_is_rejected() {
        assert!(collect_commits_from_stdin("too few fields", "origin").is_err());
    }

    #[test]
    fn prereceive_empty_stdin_is_an_error() {
        assert!(parse_prereceive_stdin("").is_err());
    }

    #[test]
    fn prereceive_deletion_is_nothing_to_scan() {
        let line = format!("aabbcc {EMPTY_SHA} refs/heads/topic");
        match parse_prereceive_stdin(&line).unwrap() {
            PreReceiveInput::NothingToScan(message) => {
                assert!(message.contains("Deletion"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn default_prereceive_timeout_stays_under_provider_limit() {
        std::env::remove_var("GITGUARDIAN_TIMEOUT");
        let timeout = get_prereceive_timeout();
        assert!(timeout < 5.0);
        std::env::set_var("GITGUARDIAN_TIMEOUT", "2.5");
        assert_eq!(get_prereceive_timeout(), 2.5);
        std::env::remove_var("GITGUARDIAN_TIMEOUT");
    }
}

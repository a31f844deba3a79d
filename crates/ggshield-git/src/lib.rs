//! # ggshield-git
//!
//! Everything that touches the `git` executable.
//!
//! ## What belongs here
//! * The process-level wrapper (timeouts, LANG=C, error mapping)
//! * Raw header and patch parsing, including merge handling
//! * The lazy [`Commit`] model and its file enumeration
//! * Ref arithmetic for the git hooks
//!
//! ## What does NOT belong here
//! * Chunking and API dispatch (see `ggshield-secret`)

mod commit;
pub mod hooks;
mod patch;
mod shell;

pub use commit::{Commit, CommitError, CommitInformation, CommitSource};
pub use patch::{
    convert_multiparent_patch, create_commit_url, parse_patch, PatchFileInfo, PatchHeader,
    PatchParseError, HEADER_COMMON_ARGS, PATCH_COMMON_ARGS, PATCH_PREFIX, STAGED_PREFIX,
};
pub use shell::{
    check_git_dir, check_git_ref, get_diff_files_status, get_filepaths_from_ref, get_git_root,
    get_list_commit_sha, get_staged_filepaths, git, git_ls, git_with_timeout, is_git_dir,
    is_git_working_tree, is_valid_git_commit_ref, read_git_file, GitError, COMMAND_TIMEOUT,
};

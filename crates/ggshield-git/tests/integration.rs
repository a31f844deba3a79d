//! Integration tests running against real temporary repositories.

use std::path::{Path, PathBuf};
use std::process::Command;

use ggshield_core::Filemode;
use ggshield_exclude::ExclusionRegexes;
use ggshield_git::{
    get_diff_files_status, get_list_commit_sha, get_staged_filepaths, is_git_dir, read_git_file,
    Commit,
};
use ggshield_scannable::Scannable;
use tempfile::TempDir;

fn run_git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .env("GIT_AUTHOR_NAME", "Test Author")
        .env("GIT_AUTHOR_EMAIL", "author@example.com")
        .env("GIT_COMMITTER_NAME", "Test Author")
        .env("GIT_COMMITTER_EMAIL", "author@example.com")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init", "-q", "-b", "main"]);
    run_git(dir.path(), &["config", "user.email", "author@example.com"]);
    run_git(dir.path(), &["config", "user.name", "Test Author"]);
    dir
}

fn commit_file(repo: &Path, name: &str, content: &str, message: &str) -> String {
    std::fs::write(repo.join(name), content).unwrap();
    run_git(repo, &["add", name]);
    run_git(repo, &["commit", "-q", "-m", message]);
    run_git(repo, &["rev-parse", "HEAD"])
}

#[test]
fn is_git_dir_detects_repositories() {
    let repo = init_repo();
    assert!(is_git_dir(repo.path()));
    let plain = tempfile::tempdir().unwrap();
    assert!(!is_git_dir(plain.path()));
}

#[test]
fn commit_from_sha_reads_header_and_files() {
    let repo = init_repo();
    let sha = commit_file(
        repo.path(),
        "config.yml",
        "token: 368ac3edf9e850d1c0ff9d6c526496f8237ddf91\n",
        "add config",
    );

    let commit = Commit::from_sha(
        sha.clone(),
        ExclusionRegexes::default(),
        Some(repo.path()),
    )
    .unwrap();
    assert_eq!(commit.sha.as_deref(), Some(sha.as_str()));
    assert_eq!(commit.info.author, "Test Author");
    assert_eq!(commit.info.email, "author@example.com");
    assert_eq!(commit.info.paths, vec![PathBuf::from("config.yml")]);
    assert_eq!(commit.urls(), vec![format!("commit://{sha}/config.yml")]);

    let mut files = commit.get_files().unwrap();
    assert_eq!(files.len(), 1);
    let content = files[0].content().unwrap();
    assert!(content.starts_with("@@"));
    assert!(content.contains("+token: 368ac3edf9e850d1c0ff9d6c526496f8237ddf91"));
    assert_eq!(files[0].filemode(), Filemode::New);
}

#[test]
fn commit_from_sha_respects_exclusions() {
    let repo = init_repo();
    std::fs::write(repo.path().join("kept.txt"), "kept\n").unwrap();
    std::fs::write(repo.path().join("dropped.env"), "secret\n").unwrap();
    run_git(repo.path(), &["add", "."]);
    run_git(repo.path(), &["commit", "-q", "-m", "two files"]);
    let sha = run_git(repo.path(), &["rev-parse", "HEAD"]);

    let exclusion = ExclusionRegexes::from_patterns(["*.env"]).unwrap();
    let commit = Commit::from_sha(sha, exclusion, Some(repo.path())).unwrap();
    let files = commit.get_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path(), Path::new("kept.txt"));
}

#[test]
fn staged_commit_sees_the_index() {
    let repo = init_repo();
    commit_file(repo.path(), "base.txt", "base\n", "base");
    std::fs::write(repo.path().join("staged.txt"), "password=hunter2\n").unwrap();
    run_git(repo.path(), &["add", "staged.txt"]);

    let commit = Commit::from_staged(ExclusionRegexes::default(), Some(repo.path())).unwrap();
    assert_eq!(commit.sha, None);
    assert_eq!(commit.info.paths, vec![PathBuf::from("staged.txt")]);
    assert_eq!(commit.urls(), vec!["commit://staged/staged.txt".to_string()]);

    let mut files = commit.get_files().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].content().unwrap().contains("+password=hunter2"));

    let staged = get_staged_filepaths(repo.path()).unwrap();
    assert!(staged.contains(&PathBuf::from("staged.txt")));
}

#[test]
fn empty_staging_area_yields_no_files() {
    let repo = init_repo();
    commit_file(repo.path(), "base.txt", "base\n", "base");
    let commit = Commit::from_staged(ExclusionRegexes::default(), Some(repo.path())).unwrap();
    assert!(commit.info.paths.is_empty());
    assert!(commit.get_files().unwrap().is_empty());
}

#[test]
fn batched_file_enumeration_keeps_all_files() {
    let repo = init_repo();
    for i in 0..7 {
        std::fs::write(repo.path().join(format!("f{i}.txt")), format!("line {i}\n")).unwrap();
    }
    run_git(repo.path(), &["add", "."]);
    run_git(repo.path(), &["commit", "-q", "-m", "many files"]);
    let sha = run_git(repo.path(), &["rev-parse", "HEAD"]);

    // Force tiny batches so several `git show` invocations happen.
    std::env::set_var("GG_MAX_DOCS_PER_COMMIT", "2");
    let commit = Commit::from_sha(sha, ExclusionRegexes::default(), Some(repo.path())).unwrap();
    let files = commit.get_files().unwrap();
    std::env::remove_var("GG_MAX_DOCS_PER_COMMIT");

    assert_eq!(files.len(), 7);
    // sha order is kept
    let paths: Vec<String> = files
        .iter()
        .map(|f| f.path().display().to_string())
        .collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn diff_files_status_maps_modes() {
    let repo = init_repo();
    commit_file(repo.path(), "kept.txt", "one\n", "first");
    let first = run_git(repo.path(), &["rev-parse", "HEAD"]);

    std::fs::write(repo.path().join("kept.txt"), "one\ntwo\n").unwrap();
    std::fs::write(repo.path().join("added.txt"), "new\n").unwrap();
    run_git(repo.path(), &["add", "."]);
    run_git(repo.path(), &["commit", "-q", "-m", "second"]);

    let statuses = get_diff_files_status(&first, false, 100, repo.path(), None).unwrap();
    assert_eq!(statuses[Path::new("kept.txt")], Filemode::Modify);
    assert_eq!(statuses[Path::new("added.txt")], Filemode::New);
}

#[test]
fn rev_list_returns_oldest_first_and_truncates_from_the_end() {
    let repo = init_repo();
    let mut shas = Vec::new();
    for i in 0..4 {
        shas.push(commit_file(
            repo.path(),
            &format!("f{i}.txt"),
            &format!("{i}\n"),
            &format!("commit {i}"),
        ));
    }

    let original_dir = std::env::current_dir().unwrap();
    std::env::set_current_dir(repo.path()).unwrap();
    let all = get_list_commit_sha(&format!("{}...{}", shas[0], shas[3]), None).unwrap();
    let last_two = get_list_commit_sha(&format!("{}...{}", shas[0], shas[3]), Some(2)).unwrap();
    let bogus = get_list_commit_sha("no-such-ref...HEAD", None).unwrap();
    std::env::set_current_dir(original_dir).unwrap();

    assert_eq!(all, shas[1..].to_vec());
    assert_eq!(last_two, shas[2..].to_vec());
    assert!(bogus.is_empty());
}

#[test]
fn read_git_file_shows_ref_content() {
    let repo = init_repo();
    commit_file(repo.path(), "a.txt", "alpha\n", "add a");
    let sha = run_git(repo.path(), &["rev-parse", "HEAD"]);

    let content = read_git_file(&sha, Path::new("a.txt"), repo.path()).unwrap();
    assert_eq!(content, "alpha");

    // The empty string denotes the index.
    std::fs::write(repo.path().join("staged.txt"), "staged\n").unwrap();
    run_git(repo.path(), &["add", "staged.txt"]);
    let content = read_git_file("", Path::new("staged.txt"), repo.path()).unwrap();
    assert_eq!(content, "staged");
}

#[test]
fn merge_commit_parses_with_one_diff_per_parent() {
    let repo = init_repo();
    commit_file(repo.path(), "base.txt", "base\n", "base");

    run_git(repo.path(), &["checkout", "-q", "-b", "topic"]);
    commit_file(repo.path(), "topic.txt", "topic secret\n", "topic work");
    run_git(repo.path(), &["checkout", "-q", "main"]);
    commit_file(repo.path(), "main.txt", "main work\n", "main work");
    run_git(repo.path(), &["merge", "-q", "--no-ff", "-m", "merge topic", "topic"]);
    let merge_sha = run_git(repo.path(), &["rev-parse", "HEAD"]);

    let commit = Commit::from_sha(
        merge_sha,
        ExclusionRegexes::default(),
        Some(repo.path()),
    )
    .unwrap();
    // -m shows one diff per parent: both sides' files appear
    let paths: Vec<String> = commit
        .get_files()
        .unwrap()
        .iter()
        .map(|f| f.path().display().to_string())
        .collect();
    assert!(paths.contains(&"topic.txt".to_string()));
    assert!(paths.contains(&"main.txt".to_string()));
}

//! Parsing of raw headers and patches produced by
//! `git show -m --raw -z --patch`.
//!
//! `-m` splits merge commits into one single-parent diff per parent, `-z`
//! NUL-delimits raw entries so any filename is supported, and `--raw`
//! prefixes the patch with one status line per touched file.

use std::path::{Path, PathBuf};

use ggshield_core::Filemode;
use ggshield_exclude::ExclusionRegexes;
use ggshield_scannable::StringScannable;
use thiserror::Error;

/// Used instead of the SHA in commit URLs for staged changes.
pub const STAGED_PREFIX: &str = "staged";

/// Used instead of the SHA in commit URLs for files created from a patch.
pub const PATCH_PREFIX: &str = "patch";

/// Arguments passed to `git show` and `git diff` to get parsable headers.
pub const HEADER_COMMON_ARGS: &[&str] = &["--raw", "-z", "-m"];

/// Arguments passed to `git show` and `git diff` to get parsable patches.
pub const PATCH_COMMON_ARGS: &[&str] = &["--raw", "-z", "-m", "--patch"];

/// Inserted before the patch by commands generating patches from the
/// staging area, where there is no commit info yet.
pub const DIFF_EMPTY_COMMIT_INFO_BLOCK: &str = "Author:   <>\nDate:  \n:";

#[derive(Error, Debug)]
pub enum PatchParseError {
    #[error("Can't parse header line {line}: unknown status {status}")]
    UnknownStatus { line: String, status: String },

    #[error("Can't parse header line {0}")]
    MalformedHeaderLine(String),

    #[error("Failed to extract commit info from `{0}`")]
    MissingCommitInfo(String),
}

/// Commit URL of a file, `commit://<sha-or-prefix>/<path>`.
pub fn create_commit_url(sha: Option<&str>, path: &Path) -> String {
    let prefix = sha.unwrap_or(STAGED_PREFIX);
    format!("commit://{prefix}/{}", posix(path))
}

fn posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Information about one file modified by a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFileInfo {
    /// `None` unless the file was renamed or copied.
    pub old_path: Option<PathBuf>,
    pub path: PathBuf,
    pub mode: Filemode,
}

impl PatchFileInfo {
    /// Parse a file line of the raw patch header.
    ///
    /// For a non-merge commit the prefix is
    /// `:old_perm new_perm old_sha new_sha status_and_score`; a two-parent
    /// commit doubles the perm/sha columns and starts with `::`. Only the
    /// status letters matter here: one letter per parent, combined with
    /// merge semantics by [`Filemode::from_status_letters`].
    pub fn from_string(line: &str) -> Result<Self, PatchParseError> {
        let trimmed = line.trim_end_matches('\0');
        let mut fields = trimmed.split('\0');
        let prefix = fields
            .next()
            .ok_or_else(|| PatchParseError::MalformedHeaderLine(line.to_string()))?;
        let path = fields
            .next()
            .ok_or_else(|| PatchParseError::MalformedHeaderLine(line.to_string()))?;
        let rest: Vec<&str> = fields.collect();

        let (old_path, new_path) = if let Some(new_path) = rest.first() {
            // A second path means a rename: the first path is the old name.
            (Some(PathBuf::from(path)), PathBuf::from(new_path))
        } else {
            (None, PathBuf::from(path))
        };

        let status = prefix
            .rsplit(' ')
            .next()
            .unwrap_or("")
            .trim_end_matches(|c: char| c.is_ascii_digit());
        let mode = Filemode::from_status_letters(status).ok_or_else(|| {
            PatchParseError::UnknownStatus {
                line: line.to_string(),
                status: status.to_string(),
            }
        })?;

        Ok(Self {
            old_path,
            path: new_path,
            mode,
        })
    }
}

/// Semi-parsed patch header: the commit info block stays raw, the file
/// lines are parsed.
#[derive(Debug, Clone)]
pub struct PatchHeader {
    /// Commit author, date and message, unparsed.
    pub info: String,
    pub files: Vec<PatchFileInfo>,
}

impl PatchHeader {
    pub fn from_string(header: &str) -> Result<Self, PatchParseError> {
        let mut parts = split_header_lines(header).into_iter();
        let info = parts.next().unwrap_or_default().to_string();
        let files = parts
            .map(PatchFileInfo::from_string)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { info, files })
    }
}

/// Split a raw header on `\n:` / `\0:` boundaries, consuming the colon.
fn split_header_lines(header: &str) -> Vec<&str> {
    let bytes = header.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if (bytes[i] == b'\n' || bytes[i] == b'\0') && bytes[i + 1] == b':' {
            parts.push(&header[start..i]);
            start = i + 2;
            i += 2;
        } else {
            i += 1;
        }
    }
    parts.push(&header[start..]);
    parts
}

/// Parse a patch generated with [`PATCH_COMMON_ARGS`] into scannables.
///
/// A merge commit patch actually contains one single-parent pseudo-commit
/// per parent (because of `-m`), each introduced by `\0commit `. For each
/// file the content sent to scanning is the patch body from the first hunk
/// header on, without the extended headers (`old mode`, `--- a/...`).
pub fn parse_patch(
    url_prefix: &str,
    patch: &str,
    exclusion_regexes: &ExclusionRegexes,
) -> Result<Vec<StringScannable>, PatchParseError> {
    let mut scannables = Vec::new();

    for commit in patch.split("\0commit ") {
        let Some((header_str, rest)) = commit.split_once("\0diff ") else {
            // No diff, carry on to next commit.
            continue;
        };

        let header = PatchHeader::from_string(header_str)?;
        let diffs = split_diffs(rest);

        for (file_info, diff) in header.files.iter().zip(diffs) {
            if exclusion_regexes.is_excluded(&file_info.path) {
                continue;
            }

            // Skip the extended headers: the scanned document starts at
            // the first hunk header.
            let Some(end_of_headers) = diff.find("\n@@") else {
                // No content (pure rename, permission change...).
                continue;
            };
            let content = &diff[end_of_headers + 1..];
            let content = if content.starts_with("@@@") {
                convert_multiparent_patch(content, 0)
            } else {
                content.to_string()
            };

            scannables.push(
                StringScannable::new(
                    create_commit_url(Some(url_prefix), &file_info.path),
                    content,
                    file_info.mode,
                )
                .with_path(file_info.path.clone()),
            );
        }
    }

    Ok(scannables)
}

/// Split the text following the first `\0diff ` into one body per file.
fn split_diffs(rest: &str) -> Vec<&str> {
    // Subsequent files start with "diff " at the beginning of a line; diff
    // body lines always carry a marker so the pattern cannot appear inside
    // a hunk.
    rest.split("\ndiff ").collect()
}

/// Rewrite a combined (multi-parent) diff body into a single-parent diff
/// relative to the given parent.
///
/// Combined diffs carry one marker column per parent and `@@@`-style hunk
/// headers with one from-range per parent. Keeping the chosen parent's
/// column yields the same diff `git show -m` would produce for it.
pub fn convert_multiparent_patch(content: &str, parent: usize) -> String {
    let mut parents = 1usize;
    let mut out: Vec<String> = Vec::new();

    for line in content.split('\n') {
        if line.starts_with("@@@") {
            let at_run = line.chars().take_while(|&c| c == '@').count();
            parents = at_run.saturating_sub(1).max(1);
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let from = tokens.get(1 + parent.min(parents - 1)).copied().unwrap_or("-0,0");
            let to = tokens.get(1 + parents).copied().unwrap_or("+0,0");
            let context = line.splitn(3, &"@".repeat(at_run)).nth(2).unwrap_or("");
            out.push(format!("@@ {from} {to} @@{context}"));
        } else if let Some(rest) = line.strip_prefix('\\') {
            out.push(format!("\\{rest}"));
        } else if line.len() >= parents && line.is_char_boundary(parents) {
            let (markers, rest) = line.split_at(parents);
            let marker = markers.as_bytes()[parent.min(parents - 1)];
            let marker = match marker {
                b'-' => '-',
                b'+' => '+',
                _ => ' ',
            };
            out.push(format!("{marker}{rest}"));
        } else if !line.is_empty() {
            out.push(line.to_string());
        } else {
            out.push(String::new());
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggshield_scannable::Scannable;

    #[test]
    fn file_info_parses_simple_statuses() {
        let info =
            PatchFileInfo::from_string("100644 100644 1234567 89abcde M\0src/config.py\0").unwrap();
        assert_eq!(info.path, PathBuf::from("src/config.py"));
        assert_eq!(info.old_path, None);
        assert_eq!(info.mode, Filemode::Modify);
    }

    #[test]
    fn file_info_parses_renames_with_score() {
        let info =
            PatchFileInfo::from_string("100644 100644 1234567 89abcde R100\0old.py\0new.py\0")
                .unwrap();
        assert_eq!(info.old_path, Some(PathBuf::from("old.py")));
        assert_eq!(info.path, PathBuf::from("new.py"));
        assert_eq!(info.mode, Filemode::Rename);
    }

    #[test]
    fn file_info_merge_delete_modify_is_modify() {
        let info = PatchFileInfo::from_string(
            ":100644 100644 100644 aaa bbb ccc DM\0conflicted.py\0",
        )
        .unwrap();
        assert_eq!(info.mode, Filemode::Modify);
    }

    #[test]
    fn file_info_rejects_unknown_status() {
        let err = PatchFileInfo::from_string("100644 100644 aaa bbb U\0path\0").unwrap_err();
        assert!(matches!(err, PatchParseError::UnknownStatus { .. }));
    }

    fn sample_patch() -> String {
        [
            "sha_here\nAuthor: Ada <ada@example.com>\nDate:   Tue Apr 1 11:00:00 2025 +0100\n\n    add config\n",
            ":100644 100644 1111111 2222222 M\0config.yml\0",
            ":000000 100644 0000000 3333333 A\0secrets.env\0",
            "\0diff --git a/config.yml b/config.yml\nindex 1111111..2222222 100644\n--- a/config.yml\n+++ b/config.yml\n@@ -1,1 +1,2 @@\n context\n+token: abc\n",
            "diff --git a/secrets.env b/secrets.env\nnew file mode 100644\nindex 0000000..3333333\n--- /dev/null\n+++ b/secrets.env\n@@ -0,0 +1 @@\n+KEY=value\n",
        ]
        .concat()
    }

    #[test]
    fn parse_patch_yields_one_scannable_per_file() {
        let exclusion = ExclusionRegexes::default();
        let files = parse_patch("abc123", &sample_patch(), &exclusion).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path(), Path::new("config.yml"));
        assert_eq!(files[1].path(), Path::new("secrets.env"));
    }

    #[test]
    fn parse_patch_content_starts_at_first_hunk() {
        let exclusion = ExclusionRegexes::default();
        let mut files = parse_patch("abc123", &sample_patch(), &exclusion).unwrap();
        let content = files[0].content().unwrap().to_string();
        assert!(content.starts_with("@@ -1,1 +1,2 @@"));
        assert!(content.contains("+token: abc"));
        assert!(!content.contains("--- a/config.yml"));
    }

    #[test]
    fn parse_patch_applies_exclusions() {
        let exclusion = ExclusionRegexes::from_patterns(["*.env"]).unwrap();
        let files = parse_patch("abc123", &sample_patch(), &exclusion).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), Path::new("config.yml"));
    }

    #[test]
    fn parse_patch_skips_content_free_diffs() {
        let patch = [
            "sha\nAuthor: A <a@b.c>\nDate:   now\n",
            ":100644 100644 aaa aaa R100\0old.py\0new.py\0",
            "\0diff --git a/old.py b/new.py\nsimilarity index 100%\nrename from old.py\nrename to new.py\n",
        ]
        .concat();
        let exclusion = ExclusionRegexes::default();
        let files = parse_patch("abc123", &patch, &exclusion).unwrap();
        assert!(files.is_empty());
    }

    const COMBINED: &str = "@@@ -1,3 -1,3 +1,4 @@@ fn main()\n  shared\n- removed from first\n -removed from second\n++added by merge\n";

    #[test]
    fn combined_diff_converts_to_first_parent() {
        let converted = convert_multiparent_patch(COMBINED, 0);
        let mut lines = converted.split('\n');
        assert_eq!(lines.next(), Some("@@ -1,3 +1,4 @@ fn main()"));
        assert_eq!(lines.next(), Some(" shared"));
        assert_eq!(lines.next(), Some("-removed from first"));
        assert_eq!(lines.next(), Some(" removed from second"));
        assert_eq!(lines.next(), Some("+added by merge"));
    }

    #[test]
    fn combined_diff_converts_to_second_parent() {
        let converted = convert_multiparent_patch(COMBINED, 1);
        let mut lines = converted.split('\n');
        assert_eq!(lines.next(), Some("@@ -1,3 +1,4 @@ fn main()"));
        assert_eq!(lines.next(), Some(" shared"));
        assert_eq!(lines.next(), Some(" removed from first"));
        assert_eq!(lines.next(), Some("-removed from second"));
        assert_eq!(lines.next(), Some("+added by merge"));
    }

    #[test]
    fn converted_combined_diff_parses_as_single_parent() {
        let converted = convert_multiparent_patch(COMBINED, 0);
        let lines =
            ggshield_core::lines::get_lines_from_content(&converted, Filemode::Modify);
        // hunk pseudo-line + 4 body lines
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4].content, "added by merge");
    }

    #[test]
    fn commit_urls_use_the_right_prefix() {
        assert_eq!(
            create_commit_url(Some("abc"), Path::new("a/b.py")),
            "commit://abc/a/b.py"
        );
        assert_eq!(
            create_commit_url(None, Path::new("a/b.py")),
            "commit://staged/a/b.py"
        );
    }
}

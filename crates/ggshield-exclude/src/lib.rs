//! # ggshield-exclude
//!
//! Glob-based path exclusion, used uniformly by file walkers and patch
//! parsers.
//!
//! Patterns are compiled once into a regex set; matching runs against the
//! POSIX-style string form of a path. `**` crosses directory boundaries,
//! `*` and `?` stop at them, and a pattern without separators matches any
//! path component.

use std::path::Path;

use regex::Regex;
use thiserror::Error;

/// Paths nobody wants scanned: VCS metadata, package caches, virtualenvs
/// and binary UI assets.
pub const IGNORED_DEFAULT_WILDCARDS: &[&str] = &[
    "**/.git/*/**/*", // only keep files in .git/ but not in subdirectories
    "**/.pytest_cache/**/*",
    "**/.mypy_cache/**/*",
    "**/.venv/**/*",
    "**/.eggs/**/*",
    "**/.eggs-info/**/*",
    "**/vendor/**/*",
    "**/vendors/**/*",
    "**/node_modules/**/*",
    "top-1000.txt*",
    "**/*.storyboard*",
    "**/*.xib",
    "**/*.mdx*",
    "**/*.sops",
];

#[derive(Error, Debug)]
pub enum ExcludeError {
    #[error("Invalid exclude pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A compiled set of exclusion patterns.
#[derive(Debug, Default, Clone)]
pub struct ExclusionRegexes {
    regexes: Vec<Regex>,
}

impl ExclusionRegexes {
    /// Compile user patterns plus the built-in default set.
    pub fn with_defaults<I, S>(patterns: I) -> Result<Self, ExcludeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut all: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        all.extend(IGNORED_DEFAULT_WILDCARDS.iter().map(|s| s.to_string()));
        Self::from_patterns(all)
    }

    /// Compile only the given patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, ExcludeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut regexes = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let translated = translate_glob(pattern);
            let regex = Regex::new(&translated).map_err(|err| ExcludeError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })?;
            regexes.push(regex);
        }
        Ok(Self { regexes })
    }

    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty()
    }

    /// True when the POSIX form of `path` matches any pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let posix = posix_form(path);
        self.regexes.iter().any(|r| r.is_match(&posix))
    }
}

/// Match against the exclusion set, mirroring the free-function shape used
/// by walkers and parsers.
pub fn is_filepath_excluded(path: &Path, exclusion_regexes: &ExclusionRegexes) -> bool {
    exclusion_regexes.is_excluded(path)
}

fn posix_form(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Translate one glob pattern into an unanchored-component regex.
///
/// The result matches when the pattern covers a slash-delimited slice of
/// the path, so `.git` matches `a/.git/b` but not `a.git`.
fn translate_glob(pattern: &str) -> String {
    let pattern = pattern.replace('\\', "/");
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }
    format!("(?:^|/){out}(?:$|/)")
}

//! Line model shared by the span resolver and the reporters.
//!
//! A scanned payload is either a whole file or a patch body starting at its
//! first hunk header. Patch lines carry separate pre- and post-image line
//! numbers so a match can be located on both sides of a diff.

use crate::types::Filemode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCategory {
    Addition,
    Data,
    Deletion,
    Empty,
}

/// One line of a scanned payload.
///
/// - `content`: line text without its diff marker
/// - `category`: addition / deletion / untouched, `None` for special lines
/// - `pre_index`: line number in the pre-image (or the file line number)
/// - `post_index`: line number in the post-image (patches only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub content: String,
    pub category: Option<LineCategory>,
    pub pre_index: Option<u64>,
    pub post_index: Option<u64>,
}

impl Line {
    pub fn new(
        content: impl Into<String>,
        category: Option<LineCategory>,
        pre_index: Option<u64>,
        post_index: Option<u64>,
    ) -> Self {
        Self {
            content: content.into(),
            category,
            pre_index,
            post_index,
        }
    }

    /// The displayed line number: pre-image when present, post-image for
    /// added lines.
    pub fn display_index(&self) -> Option<u64> {
        self.pre_index.or(self.post_index)
    }
}

/// Split a payload into [`Line`]s. The payload is treated as a patch
/// whenever it was not read straight from the filesystem.
pub fn get_lines_from_content(content: &str, filemode: Filemode) -> Vec<Line> {
    if filemode == Filemode::File {
        get_lines_from_file(content)
    } else {
        get_lines_from_patch(content, filemode)
    }
}

fn get_lines_from_file(content: &str) -> Vec<Line> {
    content
        .split('\n')
        .enumerate()
        .map(|(index, line)| {
            Line::new(
                line,
                Some(LineCategory::Data),
                Some(index as u64 + 1),
                None,
            )
        })
        .collect()
}

/// Parsed `@@ -<pre>[,n] +<post>[,m] @@[ context]` hunk header.
struct HunkHeader {
    pre_index: u64,
    post_index: u64,
}

fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let rest = line.strip_prefix("@@ -")?;
    let (pre_part, rest) = rest.split_once(" +")?;
    let (post_part, rest) = rest.split_once(" @@")?;
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    let pre_index = pre_part.split(',').next()?.parse().ok()?;
    let post_index = post_part.split(',').next()?.parse().ok()?;
    Some(HunkHeader {
        pre_index,
        post_index,
    })
}

fn get_lines_from_patch(content: &str, filemode: Filemode) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut pre_index: u64 = 0;
    let mut post_index: u64 = 0;

    for line in content.split('\n') {
        let mut chars = line.chars();
        let line_type = chars.next();
        let rest: &str = chars.as_str();

        match line_type {
            Some(' ') => {
                pre_index += 1;
                post_index += 1;
                lines.push(Line::new(rest, None, Some(pre_index), Some(post_index)));
            }
            Some('@') => {
                let Some(header) = parse_hunk_header(line) else {
                    continue;
                };
                pre_index = header.pre_index;
                post_index = header.post_index;
                if matches!(filemode, Filemode::New | Filemode::Delete) {
                    pre_index = 1;
                    post_index = 1;
                }
                // The hunk header has no diff marker but the span resolver
                // charges one marker byte per line, so the stored content
                // drops one character to keep offsets consistent.
                let cut = line.char_indices().last().map_or(0, |(i, _)| i);
                let content = &line[..cut];
                pre_index -= 1;
                post_index -= 1;
                lines.push(Line::new(content, Some(LineCategory::Empty), None, None));
            }
            Some('+') => {
                post_index += 1;
                lines.push(Line::new(
                    rest,
                    Some(LineCategory::Addition),
                    None,
                    Some(post_index),
                ));
            }
            Some('-') => {
                pre_index += 1;
                lines.push(Line::new(
                    rest,
                    Some(LineCategory::Deletion),
                    Some(pre_index),
                    None,
                ));
            }
            Some('\\') => {
                // "\ No newline at end of file": no indices to track.
                lines.push(Line::new(rest, None, None, None));
            }
            _ => {}
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "@@ -1,2 +1,3 @@\n context\n-removed\n+added one\n+added two";

    #[test]
    fn file_lines_are_numbered_from_one() {
        let lines = get_lines_from_content("a\nb\nc", Filemode::File);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].pre_index, Some(1));
        assert_eq!(lines[2].pre_index, Some(3));
        assert!(lines
            .iter()
            .all(|l| l.category == Some(LineCategory::Data)));
    }

    #[test]
    fn patch_lines_track_pre_and_post_indices() {
        let lines = get_lines_from_content(PATCH, Filemode::Modify);
        assert_eq!(lines.len(), 5);
        // hunk header pseudo-line
        assert_eq!(lines[0].category, Some(LineCategory::Empty));
        assert_eq!(lines[0].content, "@@ -1,2 +1,3 @");
        // context line advances both sides
        assert_eq!(lines[1].pre_index, Some(1));
        assert_eq!(lines[1].post_index, Some(1));
        // deletion advances only the pre side
        assert_eq!(lines[2].category, Some(LineCategory::Deletion));
        assert_eq!(lines[2].pre_index, Some(2));
        assert_eq!(lines[2].post_index, None);
        // additions advance only the post side
        assert_eq!(lines[3].post_index, Some(2));
        assert_eq!(lines[4].post_index, Some(3));
        assert_eq!(lines[4].content, "added two");
    }

    #[test]
    fn new_file_patch_starts_at_line_one() {
        let patch = "@@ -0,0 +1,2 @@\n+first\n+second";
        let lines = get_lines_from_content(patch, Filemode::New);
        assert_eq!(lines[1].post_index, Some(1));
        assert_eq!(lines[2].post_index, Some(2));
    }

    #[test]
    fn hunk_header_with_context_is_parsed() {
        let header = parse_hunk_header("@@ -12,3 +14,4 @@ fn main() {").unwrap();
        assert_eq!(header.pre_index, 12);
        assert_eq!(header.post_index, 14);
        assert!(parse_hunk_header("@@@ -1,2 -3,4 +5,6 @@@").is_none());
    }

    #[test]
    fn no_newline_marker_keeps_offsets() {
        let patch = "@@ -1 +1 @@\n-old\n+new\n\\ No newline at end of file";
        let lines = get_lines_from_content(patch, Filemode::Modify);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3].content, " No newline at end of file");
        assert_eq!(lines[3].category, None);
    }
}

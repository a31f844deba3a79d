//! Maps API byte offsets back to line/column spans.

use ggshield_api::models::Match;

use crate::lines::Line;

/// Start and end of a match in a payload, located by line.
///
/// `line_index_*` index into the payload's line list; `column_index_*` are
/// byte positions within those lines, start inclusive, end exclusive. All
/// indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub line_index_start: usize,
    pub line_index_end: usize,
    pub column_index_start: usize,
    pub column_index_end: usize,
}

impl MatchSpan {
    /// Resolve a [`Match`] against the lines of the payload it was found
    /// in.
    ///
    /// Offsets returned by the API are relative to the exact payload sent.
    /// Each payload line costs `content length + 1` bytes, plus one more in
    /// a patch because the leading diff marker is part of the payload but
    /// not of the displayed content.
    ///
    /// Returns `None` when the match carries no offsets or points past the
    /// payload.
    pub fn from_match(m: &Match, lines: &[Line], is_patch: bool) -> Option<MatchSpan> {
        let index_start = m.index_start?;
        let index_end = m.index_end?;
        let marker = usize::from(is_patch);

        let mut index = 0usize;
        let mut line_index = 0usize;
        let mut len_line = lines.first()?.content.len() + 1 + marker;

        // Walk to the line containing the start of the match.
        while index_start >= index + len_line {
            index += len_line;
            line_index += 1;
            len_line = lines.get(line_index)?.content.len() + 1 + marker;
        }
        let line_index_start = line_index;
        let column_index_start = index_start.saturating_sub(index + marker);

        // Continue to the line containing the end.
        while index_end > index + len_line {
            index += len_line;
            line_index += 1;
            len_line = lines.get(line_index)?.content.len() + 1 + marker;
        }

        Some(MatchSpan {
            line_index_start,
            line_index_end: line_index,
            column_index_start,
            column_index_end: index_end - index - marker + 1,
        })
    }
}

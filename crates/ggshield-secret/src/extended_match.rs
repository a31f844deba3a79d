//! A match augmented with pre/post-image line numbers, so reports can
//! locate it on both sides of a diff.

use ggshield_api::models::Match;
use ggshield_core::filter::censor_string;
use ggshield_core::lines::Line;
use ggshield_core::match_span::MatchSpan;

#[derive(Debug, Clone)]
pub struct ExtendedMatch {
    /// Matched text. Replaced in place by [`ExtendedMatch::censor`].
    pub match_text: String,
    pub match_type: String,
    /// Line/column location within the scanned payload.
    pub span: MatchSpan,
    /// Displayed start/end line numbers, 0-based for files.
    pub line_start: u64,
    pub line_end: u64,
    pub pre_line_start: Option<u64>,
    pub pre_line_end: Option<u64>,
    pub post_line_start: Option<u64>,
    pub post_line_end: Option<u64>,
}

impl ExtendedMatch {
    /// Resolve a server match against the payload lines.
    ///
    /// When the match carries no usable offsets (which a well-behaved
    /// server never sends), the location degrades to the first line rather
    /// than dropping the match.
    pub fn from_match(m: &Match, lines: &[Line], is_patch: bool) -> Self {
        let span = MatchSpan::from_match(m, lines, is_patch).unwrap_or(MatchSpan {
            line_index_start: 0,
            line_index_end: 0,
            column_index_start: 0,
            column_index_end: m.match_text.len(),
        });

        let patch_shift = i64::from(is_patch) - 1;
        let line_start = lines
            .get(span.line_index_start)
            .and_then(Line::display_index)
            .unwrap_or(1);
        let line_end = lines
            .get(span.line_index_end)
            .and_then(Line::display_index)
            .unwrap_or(1);

        let (pre_line_start, post_line_start) = match lines.get(span.line_index_start) {
            Some(line) => (line.pre_index, line.post_index),
            None => (None, None),
        };
        let (pre_line_end, post_line_end) = match lines.get(span.line_index_end) {
            Some(line) => (line.pre_index, line.post_index),
            None => (None, None),
        };

        Self {
            match_text: m.match_text.clone(),
            match_type: m.match_type.clone(),
            span,
            line_start: (line_start as i64 + patch_shift).max(0) as u64,
            line_end: (line_end as i64 + patch_shift).max(0) as u64,
            pre_line_start,
            pre_line_end,
            post_line_start,
            post_line_end,
        }
    }

    /// Redact the matched text in place, keeping its length and shape.
    pub fn censor(&mut self) {
        self.match_text = censor_string(&self.match_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggshield_core::lines::get_lines_from_content;
    use ggshield_core::Filemode;

    #[test]
    fn file_match_lines_are_zero_based() {
        let content = "first\nsecret=abc\nlast";
        let lines = get_lines_from_content(content, Filemode::File);
        let start = content.find("abc").unwrap();
        let m = Match::new("abc", "apikey").with_indices(start, start + 2);
        let extended = ExtendedMatch::from_match(&m, &lines, false);
        assert_eq!(extended.line_start, 1);
        assert_eq!(extended.line_end, 1);
        assert_eq!(extended.pre_line_start, Some(2));
        assert_eq!(extended.post_line_start, None);
    }

    #[test]
    fn patch_addition_tracks_post_image_line() {
        let content = "@@ -1,1 +1,2 @@\n context\n+secret=abc";
        let lines = get_lines_from_content(content, Filemode::Modify);
        let start = content.find("abc").unwrap();
        let m = Match::new("abc", "apikey").with_indices(start, start + 2);
        let extended = ExtendedMatch::from_match(&m, &lines, true);
        assert_eq!(extended.pre_line_start, None);
        assert_eq!(extended.post_line_start, Some(2));
        // patches keep the 1-based display number
        assert_eq!(extended.line_start, 2);
    }

    #[test]
    fn censor_changes_text_but_not_location() {
        let content = "token=368ac3edf9e850d1c0ff9d6c526496f8237ddf91";
        let lines = get_lines_from_content(content, Filemode::File);
        let m = Match::new(
            "368ac3edf9e850d1c0ff9d6c526496f8237ddf91",
            "apikey",
        )
        .with_indices(6, 45);
        let mut extended = ExtendedMatch::from_match(&m, &lines, false);
        let span = extended.span;
        extended.censor();
        assert_eq!(extended.span, span);
        assert_eq!(extended.match_text.len(), 40);
        assert!(extended.match_text.contains('*'));
    }
}

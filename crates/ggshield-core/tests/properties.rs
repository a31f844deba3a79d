use ggshield_api::models::Match;
use ggshield_core::filter::{censor_string, ignore_sha_of_matches};
use ggshield_core::lines::get_lines_from_content;
use ggshield_core::match_span::MatchSpan;
use ggshield_core::Filemode;
use proptest::prelude::*;

fn match_entry() -> impl Strategy<Value = Match> {
    ("[ -~]{1,40}", "[a-z_]{1,12}").prop_map(|(text, kind)| Match::new(text, kind))
}

proptest! {
    #[test]
    fn ignore_sha_is_order_independent(mut matches in prop::collection::vec(match_entry(), 1..6), seed in 0u64..1000) {
        let reference = ignore_sha_of_matches(&matches);
        // cheap deterministic shuffle
        let len = matches.len();
        for i in 0..len {
            let j = ((seed as usize) + i * 7) % len;
            matches.swap(i, j);
        }
        prop_assert_eq!(ignore_sha_of_matches(&matches), reference);
    }

    #[test]
    fn ignore_sha_is_stable_across_calls(matches in prop::collection::vec(match_entry(), 1..6)) {
        prop_assert_eq!(
            ignore_sha_of_matches(&matches),
            ignore_sha_of_matches(&matches)
        );
    }

    #[test]
    fn ignore_sha_is_hex_encoded_sha256(matches in prop::collection::vec(match_entry(), 1..4)) {
        let sha = ignore_sha_of_matches(&matches);
        prop_assert_eq!(sha.len(), 64);
        prop_assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn censoring_preserves_char_length(text in "\\PC{0,200}") {
        let censored = censor_string(&text);
        prop_assert_eq!(censored.chars().count(), text.chars().count());
    }

    #[test]
    fn censoring_long_secrets_hides_something(text in "[a-zA-Z0-9]{10,100}") {
        let censored = censor_string(&text);
        prop_assert!(censored.contains('*'));
        prop_assert_ne!(censored, text);
    }

    #[test]
    fn span_round_trips_single_line_file_matches(
        prefix in "[a-z ]{0,30}",
        needle in "[A-Za-z0-9]{4,40}",
        suffix in "[a-z ]{0,30}",
        lines_before in 0usize..5,
    ) {
        let mut content = String::new();
        for i in 0..lines_before {
            content.push_str(&format!("line number {i}\n"));
        }
        let line = format!("{prefix}{needle}{suffix}");
        content.push_str(&line);

        let start = content.len() - line.len() + prefix.len();
        let end = start + needle.len() - 1;
        let m = Match::new(needle.clone(), "generic").with_indices(start, end);
        let lines = get_lines_from_content(&content, Filemode::File);
        let span = MatchSpan::from_match(&m, &lines, false).unwrap();

        prop_assert_eq!(span.line_index_start, lines_before);
        prop_assert_eq!(span.line_index_end, lines_before);
        let extracted =
            &lines[span.line_index_start].content[span.column_index_start..span.column_index_end];
        prop_assert_eq!(extracted, needle);
    }
}

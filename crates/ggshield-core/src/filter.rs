//! Ignore-sha computation, censoring, and ignored-match classification.

use std::collections::HashSet;

use ggshield_api::models::{Match, PolicyBreak};
use sha2::{Digest, Sha256};

use crate::config::IgnoredMatch;

/// Stable fingerprint of a policy break's match set.
///
/// SHA-256 of the concatenation of `"<match>,<match_type>"` for every
/// match, sorted by match type. Shuffling the match list does not change
/// the sha, so the value can be used in configuration to mute a known
/// detection.
pub fn get_ignore_sha(policy_break: &PolicyBreak) -> String {
    ignore_sha_of_matches(&policy_break.matches)
}

pub fn ignore_sha_of_matches(matches: &[Match]) -> String {
    let mut sorted: Vec<&Match> = matches.iter().collect();
    sorted.sort_by(|a, b| a.match_type.cmp(&b.match_type));

    let mut hasher = Sha256::new();
    for m in sorted {
        hasher.update(m.match_text.as_bytes());
        hasher.update(b",");
        hasher.update(m.match_type.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// True when a policy break is muted by the configured ignored matches:
/// either its ignore-sha is listed, or every one of its match plaintexts
/// is.
pub fn is_in_ignored_matches(policy_break: &PolicyBreak, ignored: &[IgnoredMatch]) -> bool {
    let ignored_set: HashSet<&str> = ignored.iter().map(|m| m.match_text.as_str()).collect();
    if ignored_set.is_empty() {
        return false;
    }
    if ignored_set.contains(get_ignore_sha(policy_break).as_str()) {
        return true;
    }
    !policy_break.matches.is_empty()
        && policy_break
            .matches
            .iter()
            .all(|m| ignored_set.contains(m.match_text.as_str()))
}

/// Censor a string, revealing only its first and last fifth.
///
/// Alphanumeric characters in between become `*`; punctuation and
/// newlines survive so multi-line keys keep their shape and the censored
/// text has the same length as the original.
pub fn censor_string(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let privy_len = len / 5;

    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i < privy_len || i >= len - privy_len {
                c
            } else if c.is_ascii_alphanumeric() {
                '*'
            } else {
                c
            }
        })
        .collect()
}

/// Censored form of a match value.
pub fn censor_match(m: &Match) -> String {
    censor_string(&m.match_text)
}

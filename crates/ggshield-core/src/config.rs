//! Resolved configuration records.
//!
//! File and CLI parsing happen upstream; the pipeline only ever sees these
//! structs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Default number of commits scanned by the hook drivers when a range is
/// longer.
pub const DEFAULT_MAX_COMMITS_FOR_HOOK: usize = 50;

/// A known detection muted by configuration, identified either by its
/// ignore-sha or by the raw matched string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredMatch {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "match")]
    pub match_text: String,
}

impl IgnoredMatch {
    pub fn new(name: impl Into<String>, match_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            match_text: match_text.into(),
        }
    }
}

/// Secret-scanning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretConfig {
    pub show_secrets: bool,
    pub ignore_known_secrets: bool,
    pub with_incident_details: bool,
    /// Keep ignored secrets in the results, annotated with their ignore
    /// reason, instead of dropping them.
    pub all_secrets: bool,
    pub source_uuid: Option<String>,
    pub ignored_matches: Vec<IgnoredMatch>,
    pub ignored_detectors: BTreeSet<String>,
    pub ignored_paths: BTreeSet<String>,
    pub prereceive_remediation_message: Option<String>,
}

impl SecretConfig {
    /// JSON summary of the settings, sent as the `scan_options` telemetry
    /// header. Never includes user data, only flags and counts.
    pub fn dump_for_monitoring(&self) -> String {
        serde_json::json!({
            "show_secrets": self.show_secrets,
            "ignore_known_secrets": self.ignore_known_secrets,
            "with_incident_details": self.with_incident_details,
            "all_secrets": self.all_secrets,
            "has_source_uuid": self.source_uuid.is_some(),
            "ignored_matches_count": self.ignored_matches.len(),
            "ignored_detectors_count": self.ignored_detectors.len(),
            "ignored_paths_count": self.ignored_paths.len(),
        })
        .to_string()
    }
}

/// The full resolved configuration handed to commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub verbose: bool,
    pub exit_zero: bool,
    pub max_commits_for_hook: usize,
    pub secret: SecretConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            exit_zero: false,
            max_commits_for_hook: DEFAULT_MAX_COMMITS_FOR_HOOK,
            secret: SecretConfig::default(),
        }
    }
}

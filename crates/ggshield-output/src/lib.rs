//! # ggshield-output
//!
//! Reporters turning a [`SecretScanCollection`] into one of the supported
//! serializations, sharing a single exit-code mapping.

mod gitlab_webui;
mod json;
mod sarif;
mod text;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ggshield_api::models::SecretIncident;
use ggshield_core::ExitCode;
use ggshield_secret::SecretScanCollection;

pub use gitlab_webui::GitLabWebUiOutputHandler;
pub use json::JsonOutputHandler;
pub use sarif::SarifOutputHandler;
pub use text::TextOutputHandler;

/// Serialization picked by `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

/// Settings shared by every reporter.
#[derive(Debug, Default, Clone)]
pub struct OutputContext {
    pub show_secrets: bool,
    pub verbose: bool,
    pub ignore_known_secrets: bool,
    pub secrets_engine_version: Option<String>,
    /// Dashboard incidents fetched upstream when `--with-incident-details`
    /// is set, keyed by incident URL.
    pub incident_details: BTreeMap<String, SecretIncident>,
    /// Redirect the report to this file instead of stdout.
    pub output: Option<PathBuf>,
    /// Write to stderr rather than stdout (GitLab Web UI).
    pub use_stderr: bool,
}

/// A reporter serializes the collection; writing and exit-code mapping are
/// shared.
pub trait SecretOutputHandler {
    fn serialize_scan(&self, scan: &SecretScanCollection) -> String;

    fn context(&self) -> &OutputContext;

    /// Serialize, write to the configured destination and map the exit
    /// code. Matches are censored in place first unless `show_secrets` is
    /// set.
    fn process_scan(&self, scan: &mut SecretScanCollection) -> Result<ExitCode, ggshield_core::Error> {
        if !self.context().show_secrets {
            for result in scan.all_results_mut() {
                result.censor();
            }
        }
        let report = self.serialize_scan(scan);
        write_report(&report, self.context())?;
        Ok(exit_code_for(scan))
    }
}

/// The exit-code contract shared by every serialization.
pub fn exit_code_for(scan: &SecretScanCollection) -> ExitCode {
    if scan.total_secrets_count() > 0 {
        ExitCode::ScanFoundProblems
    } else {
        ExitCode::Success
    }
}

fn write_report(report: &str, context: &OutputContext) -> Result<(), ggshield_core::Error> {
    match &context.output {
        Some(path) => write_file(path, report),
        None => {
            if context.use_stderr {
                eprintln!("{report}");
            } else {
                println!("{report}");
            }
            Ok(())
        }
    }
}

fn write_file(path: &Path, report: &str) -> Result<(), ggshield_core::Error> {
    std::fs::write(path, report).map_err(|err| {
        ggshield_core::Error::Unexpected(format!("could not write {}: {err}", path.display()))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use ggshield_api::models::{DiffKind, Match, PolicyBreak, ScanResult};
    use ggshield_core::config::SecretConfig;
    use ggshield_core::Filemode;
    use ggshield_secret::{FileResult, Results, ScannedDocument, SecretScanCollection};
    use std::path::PathBuf;

    pub const GITHUB_TOKEN: &str = "368ac3edf9e850d1c0ff9d6c526496f8237ddf91";
    pub const GITHUB_TOKEN_SHA: &str =
        "2b5840babacb6f089ddcce1fe5a56b803f8b1f636c6f44cdbf14b0c77a194c93";

    pub fn policy_break() -> PolicyBreak {
        PolicyBreak {
            break_type: "GitHub Token".to_string(),
            policy: "Secrets detection".to_string(),
            validity: Some("valid".to_string()),
            known_secret: false,
            incident_url: None,
            detector_name: Some("github_token".to_string()),
            detector_group_name: Some("github".to_string()),
            documentation_url: None,
            matches: vec![Match::new(GITHUB_TOKEN, "apikey").with_indices(29, 68)],
            diff_kind: Some(DiffKind::Addition),
            is_excluded: false,
            exclude_reason: None,
            is_vaulted: false,
            vault_type: None,
            vault_name: None,
            vault_path: None,
            vault_path_count: None,
        }
    }

    pub fn single_result_collection() -> SecretScanCollection {
        let content = format!("@@ -0,0 +1 @@\n+github_token: {GITHUB_TOKEN}");
        let document = ScannedDocument {
            url: "commit://staged/config.yml".to_string(),
            filename: "commit://staged/config.yml".to_string(),
            path: PathBuf::from("config.yml"),
            filemode: Filemode::New,
            utf8_encoded_size: content.len(),
            content,
        };
        let scan_result = ScanResult {
            policy_break_count: 1,
            policies: vec!["Secrets detection".to_string()],
            policy_breaks: vec![policy_break()],
        };
        let result =
            FileResult::from_scan_result(&document, &scan_result, &SecretConfig::default());
        SecretScanCollection::new_results(
            "cached",
            "pre-commit",
            Results {
                results: vec![result],
                errors: Vec::new(),
            },
        )
    }
}

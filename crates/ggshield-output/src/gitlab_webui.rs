//! Terse reporter for GitLab Web UI, which only shows lines starting with
//! `GL-HOOK-ERR`.
//!
//! See <https://docs.gitlab.com/ee/administration/server_hooks.html#custom-error-messages>

use std::collections::BTreeSet;

use ggshield_core::filter::censor_string;
use ggshield_secret::{Secret, SecretScanCollection};

use crate::{OutputContext, SecretOutputHandler};

pub struct GitLabWebUiOutputHandler {
    pub context: OutputContext,
}

impl SecretOutputHandler for GitLabWebUiOutputHandler {
    fn serialize_scan(&self, scan: &SecretScanCollection) -> String {
        let secrets: Vec<&Secret> = scan
            .all_results()
            .iter()
            .flat_map(|result| result.secrets.iter())
            .collect();
        if secrets.is_empty() {
            return String::new();
        }

        // A set so the same incident is not reported twice when the secret
        // appears in both the old and the new version of a document.
        let formatted: BTreeSet<String> = secrets.iter().map(|s| format_secret(s)).collect();
        let break_count = formatted.len();
        let summary = if self.context.ignore_known_secrets {
            format!("{break_count} new {}", pluralize("incident", break_count))
        } else {
            format!("{break_count} {}", pluralize("incident", break_count))
        };

        // One line only: GitLab Web IDE renders newlines as "<br>".
        format!(
            "GL-HOOK-ERR: ggshield found {summary} in these changes: {}. The commit has been rejected.",
            formatted.into_iter().collect::<Vec<_>>().join(", ")
        )
    }

    fn context(&self) -> &OutputContext {
        &self.context
    }
}

impl GitLabWebUiOutputHandler {
    pub fn new(mut context: OutputContext) -> Self {
        context.use_stderr = true;
        Self { context }
    }
}

/// `PayPal OAuth2 Keys (Validity: Valid, id: "aa****bb")`
fn format_secret(secret: &Secret) -> String {
    let matches: Vec<String> = secret
        .matches
        .iter()
        .map(|m| format!("{}: \"{}\"", m.match_type, censor_string(&m.match_text)))
        .collect();
    format!(
        "{} (Validity: {}, {})",
        secret.detector_display_name,
        secret.validity.as_deref().unwrap_or("unknown"),
        matches.join(", ")
    )
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

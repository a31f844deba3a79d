//! Request and response payloads exchanged with the API.
//!
//! Field names mirror the wire format; a few use `rename` because the JSON
//! key is a Rust keyword (`match`, `type`).

use serde::{Deserialize, Serialize};

/// One document of a multi-content scan request.
///
/// The API rejects filenames longer than 256 characters, callers truncate
/// before building a `Document`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub filename: String,
    pub document: String,
}

/// A detected match inside a document, with byte offsets relative to the
/// exact payload that was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    #[serde(rename = "match")]
    pub match_text: String,
    #[serde(rename = "type")]
    pub match_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_end: Option<usize>,
}

impl Match {
    pub fn new(match_text: impl Into<String>, match_type: impl Into<String>) -> Self {
        Self {
            match_text: match_text.into(),
            match_type: match_type.into(),
            line_start: None,
            line_end: None,
            index_start: None,
            index_end: None,
        }
    }

    pub fn with_indices(mut self, start: usize, end: usize) -> Self {
        self.index_start = Some(start);
        self.index_end = Some(end);
        self
    }
}

/// Whether a policy break was introduced, removed or merely present in the
/// scanned change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Addition,
    Deletion,
    Context,
}

/// A server-reported detection, before client-side classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyBreak {
    #[serde(rename = "type")]
    pub break_type: String,
    pub policy: String,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default)]
    pub known_secret: bool,
    #[serde(default)]
    pub incident_url: Option<String>,
    #[serde(default)]
    pub detector_name: Option<String>,
    #[serde(default)]
    pub detector_group_name: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
    pub matches: Vec<Match>,
    #[serde(default)]
    pub diff_kind: Option<DiffKind>,
    #[serde(default)]
    pub is_excluded: bool,
    #[serde(default)]
    pub exclude_reason: Option<String>,
    #[serde(default)]
    pub is_vaulted: bool,
    #[serde(default)]
    pub vault_type: Option<String>,
    #[serde(default)]
    pub vault_name: Option<String>,
    #[serde(default)]
    pub vault_path: Option<String>,
    #[serde(default)]
    pub vault_path_count: Option<u32>,
}

/// Scan verdict for a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub policy_break_count: usize,
    #[serde(default)]
    pub policies: Vec<String>,
    pub policy_breaks: Vec<PolicyBreak>,
}

impl ScanResult {
    pub fn has_policy_breaks(&self) -> bool {
        self.policy_break_count > 0
    }
}

/// Verdicts for every document of a chunk, in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiScanResult {
    pub scan_results: Vec<ScanResult>,
}

/// Error payload returned by the API on non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detail {
    pub detail: String,
}

/// Scan limits declared by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SecretScanPreferences {
    #[serde(default = "default_maximum_document_size")]
    pub maximum_document_size: usize,
    #[serde(default = "default_maximum_documents_per_scan")]
    pub maximum_documents_per_scan: usize,
    #[serde(default = "default_maximum_payload_size")]
    pub maximum_payload_size: usize,
}

fn default_maximum_document_size() -> usize {
    1_048_576 // 1 MiB
}

fn default_maximum_documents_per_scan() -> usize {
    20
}

fn default_maximum_payload_size() -> usize {
    2_621_440 // 2.5 MiB
}

impl Default for SecretScanPreferences {
    fn default() -> Self {
        Self {
            maximum_document_size: default_maximum_document_size(),
            maximum_documents_per_scan: default_maximum_documents_per_scan(),
            maximum_payload_size: default_maximum_payload_size(),
        }
    }
}

/// Bypass hints shown when a hook rejects a push or commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationMessages {
    #[serde(default = "default_pre_commit_message")]
    pub pre_commit: String,
    #[serde(default = "default_pre_push_message")]
    pub pre_push: String,
    #[serde(default = "default_pre_receive_message")]
    pub pre_receive: String,
}

fn default_pre_commit_message() -> String {
    "Since the secret was detected before the commit was made:\n\
     1. replace the secret with its reference (e.g. environment variable)\n\
     2. commit again"
        .to_string()
}

fn default_pre_push_message() -> String {
    "Since the secret was detected before the push BUT after the commit, you need to:\n\
     1. rewrite the git history making sure to replace the secret with its reference\n\
     2. push again"
        .to_string()
}

fn default_pre_receive_message() -> String {
    "A pre-receive hook set server side prevented you from pushing secrets.\n\
     Rewrite the git history making sure to replace the secret with its reference,\n\
     then push again."
        .to_string()
}

impl Default for RemediationMessages {
    fn default() -> Self {
        Self {
            pre_commit: default_pre_commit_message(),
            pre_push: default_pre_push_message(),
            pre_receive: default_pre_receive_message(),
        }
    }
}

/// Server metadata returned by `GET /v1/metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMetadata {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub secrets_engine_version: Option<String>,
    #[serde(default)]
    pub preferences: ServerPreferences,
    #[serde(default)]
    pub remediation_messages: Option<RemediationMessages>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ServerPreferences {
    #[serde(
        rename = "general__maximum_payload_size",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub maximum_payload_size: Option<usize>,
    #[serde(flatten)]
    pub secret_scan: SecretScanPreferencesOverride,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SecretScanPreferencesOverride {
    #[serde(
        rename = "secret__maximum_document_size",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub maximum_document_size: Option<usize>,
    #[serde(
        rename = "secret__maximum_documents_per_scan",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub maximum_documents_per_scan: Option<usize>,
}

/// Scopes attached to an API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenScope {
    #[serde(rename = "scan")]
    Scan,
    #[serde(rename = "incidents:read")]
    IncidentsRead,
    #[serde(rename = "scan:create-incidents")]
    ScanCreateIncidents,
    #[serde(other)]
    Other,
}

/// Response of `GET /v1/api_tokens/self`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTokensResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub scopes: Vec<TokenScope>,
}

impl ApiTokensResponse {
    pub fn has_scopes(&self, required: &[TokenScope]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }
}

/// Dashboard incident attached to a known secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretIncident {
    pub id: u64,
    #[serde(default)]
    pub detector_name: Option<String>,
    #[serde(default)]
    pub secret_hash: Option<String>,
    #[serde(default)]
    pub gitguardian_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignee_email: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Quota usage for the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub count: u64,
    pub limit: u64,
    pub remaining: u64,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaResponse {
    pub content: Quota,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN_RESPONSE: &str = r#"[
        {
            "policy_break_count": 1,
            "policies": ["Secrets detection"],
            "policy_breaks": [
                {
                    "type": "GitHub Token",
                    "policy": "Secrets detection",
                    "validity": "valid",
                    "known_secret": false,
                    "diff_kind": "addition",
                    "matches": [
                        {
                            "match": "368ac3edf9e850d1c0ff9d6c526496f8237ddf91",
                            "type": "apikey",
                            "index_start": 29,
                            "index_end": 69
                        }
                    ]
                }
            ]
        },
        {"policy_break_count": 0, "policies": [], "policy_breaks": []}
    ]"#;

    #[test]
    fn multi_scan_result_parses_from_array() {
        let parsed: MultiScanResult = serde_json::from_str(SCAN_RESPONSE).unwrap();
        assert_eq!(parsed.scan_results.len(), 2);
        let first = &parsed.scan_results[0];
        assert!(first.has_policy_breaks());
        let brk = &first.policy_breaks[0];
        assert_eq!(brk.break_type, "GitHub Token");
        assert_eq!(brk.diff_kind, Some(DiffKind::Addition));
        assert!(!brk.is_excluded);
        assert_eq!(brk.matches[0].match_type, "apikey");
        assert_eq!(brk.matches[0].index_start, Some(29));
    }

    #[test]
    fn document_serializes_wire_keys() {
        let doc = Document {
            filename: "config.yml".to_string(),
            document: "token: abc".to_string(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["filename"], "config.yml");
        assert_eq!(json["document"], "token: abc");
    }

    #[test]
    fn match_round_trips_the_match_keyword() {
        let m = Match::new("secret", "apikey").with_indices(3, 9);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["match"], "secret");
        assert_eq!(json["type"], "apikey");
        let back: Match = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn token_scopes_deserialize_known_and_unknown() {
        let resp: ApiTokensResponse = serde_json::from_str(
            r#"{"name": "ci", "scopes": ["scan", "scan:create-incidents", "honeytokens:read"]}"#,
        )
        .unwrap();
        assert!(resp.has_scopes(&[TokenScope::Scan, TokenScope::ScanCreateIncidents]));
        assert!(!resp.has_scopes(&[TokenScope::IncidentsRead]));
    }

    #[test]
    fn preferences_default_when_absent() {
        let meta: ServerMetadata = serde_json::from_str(r#"{"version": "2.0"}"#).unwrap();
        assert!(meta.preferences.maximum_payload_size.is_none());
        let prefs = SecretScanPreferences::default();
        assert_eq!(prefs.maximum_documents_per_scan, 20);
        assert_eq!(prefs.maximum_document_size, 1_048_576);
    }
}

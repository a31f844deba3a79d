//! Client-side projection of server verdicts: ignore classification,
//! per-file results and the nested scan collection tree.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ggshield_api::models::{DiffKind, PolicyBreak, ScanResult, SecretIncident};
use ggshield_api::{ApiError, GGClient};
use ggshield_core::config::SecretConfig;
use ggshield_core::filter::{get_ignore_sha, is_in_ignored_matches};
use ggshield_core::lines::get_lines_from_content;
use ggshield_core::Filemode;
use serde::Serialize;

use crate::extended_match::ExtendedMatch;
use crate::scanner::ScannedDocument;

/// Why a detected secret is not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreKind {
    IgnoredMatch,
    IgnoredDetector,
    KnownSecret,
    NotIntroduced,
    BackendExcluded,
}

impl IgnoreKind {
    /// Human explanation, shown in reports.
    pub fn describe(self) -> &'static str {
        match self {
            IgnoreKind::IgnoredMatch => "Match ignored via local configuration",
            IgnoreKind::IgnoredDetector => "Detector ignored via local configuration",
            IgnoreKind::KnownSecret => {
                "Secret is known in dashboard and --ignore-known-secrets is used"
            }
            IgnoreKind::NotIntroduced => "Secret was not added in this change",
            IgnoreKind::BackendExcluded => "Excluded by dashboard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoreReason {
    pub kind: IgnoreKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IgnoreReason {
    pub fn new(kind: IgnoreKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: IgnoreKind, detail: Option<String>) -> Self {
        Self { kind, detail }
    }

    pub fn to_human_readable(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{} ({detail})", self.kind.describe()),
            None => self.kind.describe().to_string(),
        }
    }
}

/// Classification order is part of the contract:
/// 1. deletion/context diff kinds were not introduced by the change;
/// 2. backend exclusions win over local ones;
/// 3. locally ignored matches;
/// 4. locally ignored detectors;
/// 5. known secrets when the corresponding flag is set.
pub fn compute_ignore_reason(
    policy_break: &PolicyBreak,
    secret_config: &SecretConfig,
) -> Option<IgnoreReason> {
    if matches!(
        policy_break.diff_kind,
        Some(DiffKind::Deletion) | Some(DiffKind::Context)
    ) {
        return Some(IgnoreReason::new(IgnoreKind::NotIntroduced));
    }
    if policy_break.is_excluded {
        return Some(IgnoreReason::with_detail(
            IgnoreKind::BackendExcluded,
            policy_break.exclude_reason.clone(),
        ));
    }
    if is_in_ignored_matches(policy_break, &secret_config.ignored_matches) {
        return Some(IgnoreReason::new(IgnoreKind::IgnoredMatch));
    }
    if secret_config
        .ignored_detectors
        .contains(&policy_break.break_type)
    {
        return Some(IgnoreReason::new(IgnoreKind::IgnoredDetector));
    }
    if secret_config.ignore_known_secrets && policy_break.known_secret {
        return Some(IgnoreReason::new(IgnoreKind::KnownSecret));
    }
    None
}

/// A classified policy break.
#[derive(Debug, Clone)]
pub struct Secret {
    pub detector_display_name: String,
    pub detector_name: Option<String>,
    pub detector_group_name: Option<String>,
    pub documentation_url: Option<String>,
    pub validity: Option<String>,
    pub known_secret: bool,
    pub incident_url: Option<String>,
    pub matches: Vec<ExtendedMatch>,
    pub ignore_reason: Option<IgnoreReason>,
    pub diff_kind: Option<DiffKind>,
    pub is_vaulted: bool,
    pub vault_type: Option<String>,
    pub vault_name: Option<String>,
    pub vault_path: Option<String>,
    pub vault_path_count: Option<u32>,
    /// Computed once from the original (uncensored) matches.
    ignore_sha: String,
}

impl Secret {
    fn from_policy_break(
        policy_break: &PolicyBreak,
        ignore_reason: Option<IgnoreReason>,
        lines: &[ggshield_core::lines::Line],
        is_patch: bool,
    ) -> Self {
        let matches = policy_break
            .matches
            .iter()
            .map(|m| ExtendedMatch::from_match(m, lines, is_patch))
            .collect();
        Self {
            detector_display_name: policy_break.break_type.clone(),
            detector_name: policy_break.detector_name.clone(),
            detector_group_name: policy_break.detector_group_name.clone(),
            documentation_url: policy_break.documentation_url.clone(),
            validity: policy_break.validity.clone(),
            known_secret: policy_break.known_secret,
            incident_url: policy_break.incident_url.clone(),
            matches,
            ignore_reason,
            diff_kind: policy_break.diff_kind,
            is_vaulted: policy_break.is_vaulted,
            vault_type: policy_break.vault_type.clone(),
            vault_name: policy_break.vault_name.clone(),
            vault_path: policy_break.vault_path.clone(),
            vault_path_count: policy_break.vault_path_count,
            ignore_sha: get_ignore_sha(policy_break),
        }
    }

    pub fn policy(&self) -> &'static str {
        "Secrets detection"
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore_reason.is_some()
    }

    /// Stable fingerprint of the match set, see
    /// [`ggshield_core::filter::get_ignore_sha`].
    pub fn ignore_sha(&self) -> &str {
        &self.ignore_sha
    }
}

/// Group secrets sharing the same ignore-sha, preserving first-seen order.
pub fn group_secrets_by_ignore_sha(secrets: &[Secret]) -> Vec<(String, Vec<&Secret>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<&Secret>> = BTreeMap::new();
    for secret in secrets {
        let sha = secret.ignore_sha().to_string();
        if !groups.contains_key(&sha) {
            order.push(sha.clone());
        }
        groups.entry(sha).or_default().push(secret);
    }
    order
        .into_iter()
        .map(|sha| {
            let group = groups.remove(&sha).unwrap_or_default();
            (sha, group)
        })
        .collect()
}

/// One scannable's verdict.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub filename: String,
    pub filemode: Filemode,
    pub path: PathBuf,
    pub url: String,
    pub secrets: Vec<Secret>,
    pub ignored_secrets_count_by_kind: BTreeMap<IgnoreKind, usize>,
}

impl FileResult {
    /// Zip a server verdict with the document it came from, classifying
    /// every policy break. Ignored secrets are dropped and counted unless
    /// `all_secrets` keeps them with their reason attached.
    pub fn from_scan_result(
        document: &ScannedDocument,
        scan_result: &ScanResult,
        secret_config: &SecretConfig,
    ) -> Self {
        let is_on_patch = document.filemode != Filemode::File;
        let lines = get_lines_from_content(&document.content, document.filemode);

        let mut secrets = Vec::new();
        let mut ignored_secrets_count_by_kind: BTreeMap<IgnoreKind, usize> = BTreeMap::new();
        for policy_break in &scan_result.policy_breaks {
            let ignore_reason = compute_ignore_reason(policy_break, secret_config);
            match ignore_reason {
                Some(reason) if !secret_config.all_secrets => {
                    *ignored_secrets_count_by_kind.entry(reason.kind).or_insert(0) += 1;
                }
                reason => {
                    secrets.push(Secret::from_policy_break(
                        policy_break,
                        reason,
                        &lines,
                        is_on_patch,
                    ));
                }
            }
        }

        Self {
            filename: document.filename.clone(),
            filemode: document.filemode,
            path: document.path.clone(),
            url: document.url.clone(),
            secrets,
            ignored_secrets_count_by_kind,
        }
    }

    pub fn is_on_patch(&self) -> bool {
        self.filemode != Filemode::File
    }

    pub fn has_secrets(&self) -> bool {
        !self.secrets.is_empty()
    }

    /// Redact every match in place.
    pub fn censor(&mut self) {
        for secret in &mut self.secrets {
            for extended_match in &mut secret.matches {
                extended_match.censor();
            }
        }
    }
}

/// A chunk-level failure: every file of the chunk is affected.
#[derive(Debug, Clone)]
pub struct ScanError {
    pub files: Vec<(String, Filemode)>,
    pub description: String,
}

/// Results and errors of one scan. Monoidal under [`Results::extend`].
#[derive(Debug, Clone, Default)]
pub struct Results {
    pub results: Vec<FileResult>,
    pub errors: Vec<ScanError>,
}

impl Results {
    /// A `Results` representing a failure unrelated to a specific file.
    pub fn from_error(error: &ggshield_core::Error) -> Self {
        Self {
            results: Vec::new(),
            errors: vec![ScanError {
                files: Vec::new(),
                description: error.to_string(),
            }],
        }
    }

    pub fn extend(&mut self, other: Results) {
        self.results.extend(other.results);
        self.errors.extend(other.errors);
    }

    pub fn has_secrets(&self) -> bool {
        self.results.iter().any(FileResult::has_secrets)
    }
}

/// Nested scan collections: a commit range scan holds one sub-collection
/// per commit, each with per-commit attribution.
#[derive(Debug, Clone)]
pub struct SecretScanCollection {
    pub id: String,
    pub scan_type: String,
    pub results: Option<Results>,
    pub scans: Option<Vec<SecretScanCollection>>,
    /// Printed above the results in text output.
    pub optional_header: Option<String>,
    /// Included in structured output (author, email, date for commits).
    pub extra_info: Option<BTreeMap<String, String>>,
}

impl SecretScanCollection {
    pub fn new_results(id: impl Into<String>, scan_type: impl Into<String>, results: Results) -> Self {
        Self {
            id: id.into(),
            scan_type: scan_type.into(),
            results: Some(results),
            scans: None,
            optional_header: None,
            extra_info: None,
        }
    }

    pub fn new_scans(
        id: impl Into<String>,
        scan_type: impl Into<String>,
        scans: Vec<SecretScanCollection>,
    ) -> Self {
        Self {
            id: id.into(),
            scan_type: scan_type.into(),
            results: None,
            scans: Some(scans),
            optional_header: None,
            extra_info: None,
        }
    }

    pub fn scans_with_results(&self) -> Vec<&SecretScanCollection> {
        self.scans
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|scan| scan.results.is_some())
            .collect()
    }

    /// All results, own and nested, depth first.
    pub fn all_results(&self) -> Vec<&FileResult> {
        let mut out = Vec::new();
        if let Some(results) = &self.results {
            out.extend(results.results.iter());
        }
        if let Some(scans) = &self.scans {
            for scan in scans {
                out.extend(scan.all_results());
            }
        }
        out
    }

    pub fn all_results_mut(&mut self) -> Vec<&mut FileResult> {
        let mut out = Vec::new();
        if let Some(results) = &mut self.results {
            out.extend(results.results.iter_mut());
        }
        if let Some(scans) = &mut self.scans {
            for scan in scans {
                out.extend(scan.all_results_mut());
            }
        }
        out
    }

    /// Sum of secrets over every leaf result.
    pub fn total_secrets_count(&self) -> usize {
        self.all_results()
            .iter()
            .map(|result| result.secrets.len())
            .sum()
    }

    /// Fetch the dashboard incident attached to every known secret, keyed
    /// by incident URL.
    pub fn incident_details(
        &self,
        client: &GGClient,
    ) -> Result<BTreeMap<String, SecretIncident>, ApiError> {
        let mut details = BTreeMap::new();
        for result in self.all_results() {
            for secret in &result.secrets {
                let Some(url) = &secret.incident_url else {
                    continue;
                };
                if details.contains_key(url) {
                    continue;
                }
                let Some(id) = url.rsplit('/').next().and_then(|id| id.parse().ok()) else {
                    continue;
                };
                let incident = client.retrieve_secret_incident(id, 0)?;
                details.insert(url.clone(), incident);
            }
        }
        Ok(details)
    }
}

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::SecretConfig;

/// How a scan was started. Sent to the API as the `mode` header for
/// telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Repo,
    Path,
    CommitRange,
    PreCommit,
    PrePush,
    PreReceive,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Repo => "repo",
            ScanMode::Path => "path",
            ScanMode::CommitRange => "commit_range",
            ScanMode::PreCommit => "pre_commit",
            ScanMode::PrePush => "pre_push",
            ScanMode::PreReceive => "pre_receive",
        }
    }
}

/// Metadata accompanying every API call of one invocation.
///
/// `command_id` is generated once per process so all chunks of a scan can
/// be correlated server side.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub scan_mode: ScanMode,
    pub command_path: String,
    pub command_id: String,
    pub target_path: Option<PathBuf>,
    pub extra_headers: HashMap<String, String>,
}

impl ScanContext {
    pub fn new(scan_mode: ScanMode, command_path: impl Into<String>) -> Self {
        Self {
            scan_mode,
            command_path: command_path.into(),
            command_id: uuid::Uuid::new_v4().to_string(),
            target_path: None,
            extra_headers: HashMap::new(),
        }
    }

    pub fn with_target_path(mut self, path: PathBuf) -> Self {
        self.target_path = Some(path);
        self
    }

    /// Headers attached to every request of this scan.
    pub fn http_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::from([
            (
                "GGShield-Version".to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            ),
            (
                "GGShield-Command-Path".to_string(),
                self.command_path.clone(),
            ),
            ("GGShield-Command-Id".to_string(), self.command_id.clone()),
            (
                "GGShield-OS-Name".to_string(),
                std::env::consts::OS.to_string(),
            ),
            (
                "GGShield-OS-Version".to_string(),
                std::env::consts::ARCH.to_string(),
            ),
            (
                "GGShield-Rust-Version".to_string(),
                env!("CARGO_PKG_RUST_VERSION").to_string(),
            ),
            ("mode".to_string(), self.scan_mode.as_str().to_string()),
        ]);
        headers.extend(self.extra_headers.clone());
        headers
    }

    /// Headers plus the `scan_options` telemetry summary of the secret
    /// configuration.
    pub fn http_headers_with_options(&self, config: &SecretConfig) -> HashMap<String, String> {
        let mut headers = self.http_headers();
        headers.insert("scan_options".to_string(), config.dump_for_monitoring());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_id_is_stable_within_a_context() {
        let ctx = ScanContext::new(ScanMode::PreCommit, "ggshield secret scan pre-commit");
        let first = ctx.http_headers();
        let second = ctx.http_headers();
        assert_eq!(
            first.get("GGShield-Command-Id"),
            second.get("GGShield-Command-Id")
        );
    }

    #[test]
    fn command_id_differs_across_contexts() {
        let a = ScanContext::new(ScanMode::Path, "ggshield secret scan path");
        let b = ScanContext::new(ScanMode::Path, "ggshield secret scan path");
        assert_ne!(a.command_id, b.command_id);
    }

    #[test]
    fn headers_carry_mode_and_command_path() {
        let ctx = ScanContext::new(ScanMode::PrePush, "ggshield secret scan pre-push");
        let headers = ctx.http_headers();
        assert_eq!(headers.get("mode").map(String::as_str), Some("pre_push"));
        assert_eq!(
            headers.get("GGShield-Command-Path").map(String::as_str),
            Some("ggshield secret scan pre-push")
        );
        assert!(headers.contains_key("GGShield-Version"));
    }

    #[test]
    fn scan_options_header_is_added() {
        let ctx = ScanContext::new(ScanMode::Repo, "ggshield secret scan repo");
        let headers = ctx.http_headers_with_options(&SecretConfig::default());
        assert!(headers.get("scan_options").unwrap().contains("all_secrets"));
    }
}

//! Human-oriented text reporter.

use std::fmt::Write;

use ggshield_secret::{
    group_secrets_by_ignore_sha, FileResult, IgnoreKind, SecretScanCollection,
};

use crate::{OutputContext, SecretOutputHandler};

pub struct TextOutputHandler {
    pub context: OutputContext,
}

impl SecretOutputHandler for TextOutputHandler {
    fn serialize_scan(&self, scan: &SecretScanCollection) -> String {
        let mut out = String::new();
        self.write_collection(&mut out, scan);

        let total = scan.total_secrets_count();
        if total == 0 {
            push_line(&mut out, "No secrets have been found");
        }
        out.trim_end().to_string()
    }

    fn context(&self) -> &OutputContext {
        &self.context
    }
}

impl TextOutputHandler {
    pub fn new(context: OutputContext) -> Self {
        Self { context }
    }

    fn write_collection(&self, out: &mut String, scan: &SecretScanCollection) {
        if let Some(results) = &scan.results {
            let mut header_written = false;
            for result in &results.results {
                if !self.should_display(result) {
                    continue;
                }
                if !header_written {
                    if let Some(header) = &scan.optional_header {
                        out.push_str(header);
                    }
                    header_written = true;
                }
                self.write_result(out, result);
            }
            for error in &results.errors {
                push_line(out, &format!("Error: {}", error.description));
                for (filename, _) in &error.files {
                    push_line(out, &format!("- {filename}"));
                }
            }
        }
        if let Some(scans) = &scan.scans {
            for inner in scans {
                self.write_collection(out, inner);
            }
        }
    }

    fn should_display(&self, result: &FileResult) -> bool {
        if result.has_secrets() {
            return true;
        }
        self.context.verbose && !result.ignored_secrets_count_by_kind.is_empty()
    }

    fn write_result(&self, out: &mut String, result: &FileResult) {
        let groups = group_secrets_by_ignore_sha(&result.secrets);
        push_line(
            out,
            &format!(
                "\n> {}: {} incident{} detected ({})",
                result.filename,
                groups.len(),
                plural(groups.len()),
                result.filemode.describe(),
            ),
        );

        for (ignore_sha, secrets) in &groups {
            let first = secrets[0];
            push_line(
                out,
                &format!(
                    "\n>> Secret detected: {}\n   Validity: {}\n   Occurrences: {}\n   Known by GitGuardian dashboard: {}\n   Secret SHA: {ignore_sha}",
                    first.detector_display_name,
                    translate_validity(first.validity.as_deref()),
                    secrets.len(),
                    if first.known_secret { "YES" } else { "NO" },
                ),
            );
            if let Some(incident_url) = &first.incident_url {
                push_line(out, &format!("   Incident URL: {incident_url}"));
            }
            if let Some(reason) = &first.ignore_reason {
                push_line(out, &format!("   Ignored: {}", reason.to_human_readable()));
            }

            for secret in secrets {
                for m in &secret.matches {
                    let location = if result.is_on_patch() {
                        match (m.pre_line_start, m.post_line_start) {
                            (Some(pre), _) => format!("line {pre} (pre-image)"),
                            (None, Some(post)) => format!("line {post}"),
                            (None, None) => "unknown line".to_string(),
                        }
                    } else {
                        format!("line {}", m.line_start + 1)
                    };
                    push_line(
                        out,
                        &format!("   {}: \"{}\" ({location})", m.match_type, m.match_text),
                    );
                }
            }
        }

        if self.context.verbose {
            for (kind, count) in &result.ignored_secrets_count_by_kind {
                push_line(
                    out,
                    &format!("   {count} ignored: {}", describe_kind(*kind)),
                );
            }
        }
    }
}

fn describe_kind(kind: IgnoreKind) -> &'static str {
    kind.describe()
}

fn translate_validity(validity: Option<&str>) -> &'static str {
    match validity {
        Some("valid") => "Valid",
        Some("invalid") => "Invalid",
        Some("failed_to_check") => "Failed to check",
        Some("no_checker") => "No checker",
        _ => "Unknown",
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn push_line(out: &mut String, line: &str) {
    let _ = writeln!(out, "{line}");
}

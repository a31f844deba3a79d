//! SARIF 2.1.0 reporter: one result per secret, one related location per
//! match, the ignore-sha as a partial fingerprint.

use serde_json::{json, Map, Value};

use ggshield_core::match_span::MatchSpan;
use ggshield_secret::{ExtendedMatch, Secret, SecretScanCollection};

use crate::{OutputContext, SecretOutputHandler};

const SCHEMA_URL: &str =
    "https://docs.oasis-open.org/sarif/sarif/v2.1.0/errata01/os/schemas/sarif-schema-2.1.0.json";

pub struct SarifOutputHandler {
    pub context: OutputContext,
}

impl SecretOutputHandler for SarifOutputHandler {
    fn serialize_scan(&self, scan: &SecretScanCollection) -> String {
        let mut results = Vec::new();
        for result in scan.all_results() {
            for secret in &result.secrets {
                results.push(self.result_value(&result.url, secret));
            }
        }

        json!({
            "version": "2.1.0",
            "$schema": SCHEMA_URL,
            "runs": [{
                "tool": {
                    "driver": {
                        "organization": "GitGuardian",
                        "name": "ggshield",
                        "informationUri": "https://github.com/GitGuardian/ggshield",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "extensions": [{
                        "name": "secret",
                        "version": self.context.secrets_engine_version,
                    }],
                },
                "results": results,
            }],
        })
        .to_string()
    }

    fn context(&self) -> &OutputContext {
        &self.context
    }
}

impl SarifOutputHandler {
    pub fn new(context: OutputContext) -> Self {
        Self { context }
    }

    fn result_value(&self, url: &str, secret: &Secret) -> Value {
        let matches_inline: Vec<String> = secret
            .matches
            .iter()
            .enumerate()
            .map(|(id, m)| format!("[{}]({id})", m.match_type))
            .collect();
        let message = format!(
            "Secret detected: {}.\nMatches: {}",
            secret.detector_display_name,
            matches_inline.join(", ")
        );

        let mut markdown = match &secret.documentation_url {
            Some(documentation_url) => format!(
                "Secret detected: [{}]({documentation_url})",
                secret.detector_display_name
            ),
            None => format!("Secret detected: {}", secret.detector_display_name),
        };
        if secret.is_vaulted {
            markdown.push_str("\nSecret found in vault: Yes");
            if secret.vault_path_count.is_some() {
                markdown.push_str(&format!(
                    "\nVault Type: {}\nVault Name: {}\nSecret Path: {}",
                    secret.vault_type.as_deref().unwrap_or(""),
                    secret.vault_name.as_deref().unwrap_or(""),
                    secret.vault_path.as_deref().unwrap_or(""),
                ));
            }
        } else {
            markdown.push_str("\nSecret found in vault: No");
        }
        let matches_list: Vec<String> = secret
            .matches
            .iter()
            .enumerate()
            .map(|(id, m)| format!("- [{}]({id})", m.match_type))
            .collect();
        markdown.push_str(&format!("\nMatches:\n{}", matches_list.join("\n")));

        let mut object = Map::new();
        object.insert("ruleId".to_string(), json!(secret.detector_display_name));
        object.insert("level".to_string(), json!("error"));
        object.insert(
            "message".to_string(),
            json!({"text": message, "markdown": markdown}),
        );
        object.insert(
            "locations".to_string(),
            json!([location_value(url, &covering_span(&secret.matches))]),
        );
        object.insert(
            "relatedLocations".to_string(),
            json!(secret
                .matches
                .iter()
                .enumerate()
                .map(|(id, m)| related_location_value(url, id, m))
                .collect::<Vec<Value>>()),
        );
        object.insert(
            "partialFingerprints".to_string(),
            json!({"secret/v1": secret.ignore_sha()}),
        );
        if let Some(incident_url) = &secret.incident_url {
            object.insert("hostedViewerUri".to_string(), json!(incident_url));
            if let Some(details) = self.context.incident_details.get(incident_url) {
                object.insert(
                    "properties".to_string(),
                    json!({"incidentDetails": details}),
                );
            }
        }
        Value::Object(object)
    }
}

/// A span from the start of the first match to the end of the last one.
fn covering_span(matches: &[ExtendedMatch]) -> MatchSpan {
    let start = matches
        .iter()
        .map(|m| (m.span.line_index_start, m.span.column_index_start))
        .min()
        .unwrap_or((0, 0));
    let end = matches
        .iter()
        .map(|m| (m.span.line_index_end, m.span.column_index_end))
        .max()
        .unwrap_or((0, 0));
    MatchSpan {
        line_index_start: start.0,
        line_index_end: end.0,
        column_index_start: start.1,
        column_index_end: end.1,
    }
}

fn location_value(url: &str, span: &MatchSpan) -> Value {
    json!({"physicalLocation": physical_location_value(url, span)})
}

fn related_location_value(url: &str, id: usize, m: &ExtendedMatch) -> Value {
    json!({
        "id": id,
        "physicalLocation": physical_location_value(url, &m.span),
        "message": {"text": m.match_type},
    })
}

fn physical_location_value(url: &str, span: &MatchSpan) -> Value {
    json!({
        "artifactLocation": {"uri": url},
        "region": {
            "startLine": span.line_index_start + 1,
            "startColumn": span.column_index_start + 1,
            "endLine": span.line_index_end + 1,
            "endColumn": span.column_index_end + 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{single_result_collection, GITHUB_TOKEN_SHA};

    #[test]
    fn sarif_report_has_one_result_per_secret() {
        let handler = SarifOutputHandler::new(OutputContext {
            secrets_engine_version: Some("2.100.0".to_string()),
            ..OutputContext::default()
        });
        let scan = single_result_collection();
        let value: Value = serde_json::from_str(&handler.serialize_scan(&scan)).unwrap();

        assert_eq!(value["version"], "2.1.0");
        let run = &value["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "ggshield");
        assert_eq!(run["tool"]["extensions"][0]["version"], "2.100.0");

        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result["ruleId"], "GitHub Token");
        assert_eq!(result["level"], "error");
        assert_eq!(result["partialFingerprints"]["secret/v1"], GITHUB_TOKEN_SHA);

        let related = result["relatedLocations"].as_array().unwrap();
        assert_eq!(related.len(), 1);
        let region = &related[0]["physicalLocation"]["region"];
        // 1-based in SARIF
        assert_eq!(region["startLine"], 2);
        assert!(region["startColumn"].as_u64().unwrap() >= 1);
        assert_eq!(
            related[0]["physicalLocation"]["artifactLocation"]["uri"],
            "commit://staged/config.yml"
        );
    }

    #[test]
    fn empty_scan_has_no_results() {
        let handler = SarifOutputHandler::new(OutputContext::default());
        let scan = ggshield_secret::SecretScanCollection::new_scans("id", "commit-range", vec![]);
        let value: Value = serde_json::from_str(&handler.serialize_scan(&scan)).unwrap();
        assert_eq!(value["runs"][0]["results"].as_array().unwrap().len(), 0);
    }
}

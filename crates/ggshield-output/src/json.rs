//! JSON reporter: incidents grouped by ignore-sha, nested scans mirrored
//! as nested objects.

use serde_json::{json, Map, Value};

use ggshield_secret::{
    ExtendedMatch, FileResult, ScanError, Secret, SecretScanCollection,
};

use crate::{OutputContext, SecretOutputHandler};

pub struct JsonOutputHandler {
    pub context: OutputContext,
}

impl SecretOutputHandler for JsonOutputHandler {
    fn serialize_scan(&self, scan: &SecretScanCollection) -> String {
        let value = self.scan_value(scan, true);
        value.to_string()
    }

    fn context(&self) -> &OutputContext {
        &self.context
    }
}

impl JsonOutputHandler {
    pub fn new(context: OutputContext) -> Self {
        Self { context }
    }

    fn scan_value(&self, scan: &SecretScanCollection, top: bool) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), json!(scan.id));
        object.insert("type".to_string(), json!(scan.scan_type));
        let mut total_incidents = 0usize;
        let mut total_occurrences = 0usize;

        if let Some(extra_info) = &scan.extra_info {
            object.insert("extra_info".to_string(), json!(extra_info));
        }
        if top {
            if let Some(version) = &self.context.secrets_engine_version {
                object.insert("secrets_engine_version".to_string(), json!(version));
            }
        }

        if let Some(results) = &scan.results {
            let mut result_values = Vec::new();
            for result in &results.results {
                let (value, incidents, occurrences) = self.result_value(result);
                result_values.push(value);
                total_incidents += incidents;
                total_occurrences += occurrences;
            }
            if !result_values.is_empty() {
                object.insert("entities_with_incidents".to_string(), json!(result_values));
            }
            if !results.errors.is_empty() {
                let errors: Vec<Value> = results.errors.iter().map(error_value).collect();
                object.insert("errors".to_string(), json!(errors));
            }
        }

        if let Some(_scans) = &scan.scans {
            let mut scan_values = Vec::new();
            for inner in scan.scans_with_results() {
                let value = self.scan_value(inner, false);
                total_incidents += value["total_incidents"].as_u64().unwrap_or(0) as usize;
                total_occurrences += value["total_occurrences"].as_u64().unwrap_or(0) as usize;
                scan_values.push(value);
            }
            if !scan_values.is_empty() {
                object.insert("scans".to_string(), json!(scan_values));
            }
        }

        object.insert("total_incidents".to_string(), json!(total_incidents));
        object.insert("total_occurrences".to_string(), json!(total_occurrences));
        Value::Object(object)
    }

    /// Returns the serialized result plus its incident and occurrence
    /// counts.
    fn result_value(&self, result: &FileResult) -> (Value, usize, usize) {
        let groups = ggshield_secret::group_secrets_by_ignore_sha(&result.secrets);
        let total_incidents = groups.len();
        let mut total_occurrences = 0usize;

        let mut incidents = Vec::new();
        for (ignore_sha, secrets) in &groups {
            let value = self.incident_value(ignore_sha, secrets);
            total_occurrences += secrets.len();
            incidents.push(value);
        }

        let value = json!({
            "filename": result.path.display().to_string(),
            "mode": result.filemode.as_name(),
            "incidents": incidents,
            "total_incidents": total_incidents,
            "total_occurrences": total_occurrences,
        });
        (value, total_incidents, total_occurrences)
    }

    fn incident_value(&self, ignore_sha: &str, secrets: &[&Secret]) -> Value {
        let first = secrets[0];
        let mut object = Map::new();
        object.insert("policy".to_string(), json!(first.policy()));
        object.insert("type".to_string(), json!(first.detector_display_name));
        object.insert("ignore_sha".to_string(), json!(ignore_sha));
        object.insert("total_occurrences".to_string(), json!(secrets.len()));
        object.insert(
            "incident_url".to_string(),
            json!(first.incident_url.clone().unwrap_or_default()),
        );
        object.insert("known_secret".to_string(), json!(first.known_secret));
        if let Some(documentation_url) = &first.documentation_url {
            object.insert("detector_documentation".to_string(), json!(documentation_url));
        }
        if let Some(validity) = &first.validity {
            object.insert("validity".to_string(), json!(validity));
        }
        if first.known_secret {
            if let Some(url) = &first.incident_url {
                if let Some(details) = self.context.incident_details.get(url) {
                    object.insert("incident_details".to_string(), json!(details));
                }
            }
        }
        if let Some(reason) = &first.ignore_reason {
            object.insert("ignore_reason".to_string(), json!(reason));
        }
        if first.is_vaulted {
            object.insert("secret_vaulted".to_string(), json!(true));
            if first.vault_path.is_some() {
                object.insert("vault_type".to_string(), json!(first.vault_type));
                object.insert("vault_name".to_string(), json!(first.vault_name));
                object.insert("vault_path".to_string(), json!(first.vault_path));
                object.insert("vault_path_count".to_string(), json!(first.vault_path_count));
            }
        }

        let mut occurrences = Vec::new();
        for secret in secrets {
            for m in &secret.matches {
                occurrences.push(match_value(m));
            }
        }
        object.insert("occurrences".to_string(), json!(occurrences));
        Value::Object(object)
    }
}

fn match_value(m: &ExtendedMatch) -> Value {
    let mut object = Map::new();
    object.insert("match".to_string(), json!(m.match_text));
    object.insert("type".to_string(), json!(m.match_type));
    object.insert("line_start".to_string(), json!(m.line_start));
    object.insert("line_end".to_string(), json!(m.line_end));
    object.insert("index_start".to_string(), json!(m.span.column_index_start));
    object.insert("index_end".to_string(), json!(m.span.column_index_end));
    if let (Some(start), Some(end)) = (m.pre_line_start, m.pre_line_end) {
        object.insert("pre_line_start".to_string(), json!(start));
        object.insert("pre_line_end".to_string(), json!(end));
    }
    if let (Some(start), Some(end)) = (m.post_line_start, m.post_line_end) {
        object.insert("post_line_start".to_string(), json!(start));
        object.insert("post_line_end".to_string(), json!(end));
    }
    Value::Object(object)
}

fn error_value(error: &ScanError) -> Value {
    json!({
        "files": error
            .files
            .iter()
            .map(|(filename, filemode)| {
                json!({"filename": filename, "mode": filemode.as_name()})
            })
            .collect::<Vec<Value>>(),
        "description": error.description,
    })
}

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::ApiError;
use crate::models::{
    ApiTokensResponse, Detail, Document, MultiScanResult, QuotaResponse, RemediationMessages,
    SecretIncident, SecretScanPreferences, ServerMetadata,
};

/// Default SaaS endpoint, overridable with `GITGUARDIAN_API_URL`.
pub const DEFAULT_API_URL: &str = "https://api.gitguardian.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to build a [`GGClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            user_agent: format!("ggshield/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Blocking client for the GitGuardian API.
///
/// The client is `Sync`: scan worker threads share one instance and issue
/// blocking requests concurrently. Server metadata is fetched once via
/// [`GGClient::read_metadata`] and cached behind a lock.
#[derive(Debug)]
pub struct GGClient {
    http: Client,
    base_url: String,
    api_key: String,
    metadata: RwLock<Option<ServerMetadata>>,
}

impl GGClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        if config.api_key.is_empty() {
            return Err(ApiError::Auth);
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            metadata: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn apply_headers(
        &self,
        mut request: RequestBuilder,
        extra_headers: &HashMap<String, String>,
    ) -> RequestBuilder {
        request = request.header("Authorization", format!("Token {}", self.api_key));
        for (name, value) in extra_headers {
            request = request.header(name, value);
        }
        request
    }

    /// Fetch `/metadata`, caching server preferences and remediation
    /// messages. Also serves as the authentication check: a 401 here means
    /// the API key is invalid.
    pub fn read_metadata(&self) -> Result<(), ApiError> {
        let request = self.apply_headers(self.http.get(self.url("metadata")), &HashMap::new());
        let response = request.send()?;
        let body = Self::check_response(response)?;
        let metadata: ServerMetadata = serde_json::from_str(&body)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        debug!(
            version = metadata.version.as_deref().unwrap_or("?"),
            "server metadata read"
        );
        *self.metadata.write().expect("metadata lock poisoned") = Some(metadata);
        Ok(())
    }

    /// Scan limits, combining server-declared values with defaults.
    pub fn secret_scan_preferences(&self) -> SecretScanPreferences {
        let mut prefs = SecretScanPreferences::default();
        if let Some(metadata) = self.metadata.read().expect("metadata lock poisoned").as_ref() {
            if let Some(size) = metadata.preferences.maximum_payload_size {
                prefs.maximum_payload_size = size;
            }
            if let Some(size) = metadata.preferences.secret_scan.maximum_document_size {
                prefs.maximum_document_size = size;
            }
            if let Some(count) = metadata.preferences.secret_scan.maximum_documents_per_scan {
                prefs.maximum_documents_per_scan = count;
            }
        }
        prefs
    }

    pub fn secrets_engine_version(&self) -> Option<String> {
        self.metadata
            .read()
            .expect("metadata lock poisoned")
            .as_ref()
            .and_then(|m| m.secrets_engine_version.clone())
    }

    pub fn remediation_messages(&self) -> RemediationMessages {
        self.metadata
            .read()
            .expect("metadata lock poisoned")
            .as_ref()
            .and_then(|m| m.remediation_messages.clone())
            .unwrap_or_default()
    }

    /// Scan a chunk of documents. `all_secrets` asks the server to return
    /// even backend-excluded policy breaks so classification stays client
    /// side.
    pub fn multi_content_scan(
        &self,
        documents: &[Document],
        extra_headers: &HashMap<String, String>,
        all_secrets: bool,
    ) -> Result<MultiScanResult, ApiError> {
        let mut request = self.http.post(self.url("multiscan")).json(documents);
        if all_secrets {
            request = request.query(&[("all_secrets", "true")]);
        }
        let request = self.apply_headers(request, extra_headers);
        debug!(documents = documents.len(), "dispatching scan chunk");
        let body = Self::check_response(request.send()?)?;
        serde_json::from_str(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    /// Scan a chunk and create dashboard incidents for findings, attached
    /// to the given custom source. Requires the `scan:create-incidents`
    /// scope.
    pub fn scan_and_create_incidents(
        &self,
        documents: &[Document],
        source_uuid: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<MultiScanResult, ApiError> {
        let request = self
            .http
            .post(self.url("scan/create-incidents"))
            .query(&[("source_uuid", source_uuid)])
            .json(documents);
        let request = self.apply_headers(request, extra_headers);
        debug!(
            documents = documents.len(),
            source_uuid, "dispatching scan chunk (create incidents)"
        );
        let body = Self::check_response(request.send()?)?;
        serde_json::from_str(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    /// Describe the current token, used for scope checks.
    pub fn api_tokens(&self) -> Result<ApiTokensResponse, ApiError> {
        let request =
            self.apply_headers(self.http.get(self.url("api_tokens/self")), &HashMap::new());
        let body = Self::check_response(request.send()?)?;
        serde_json::from_str(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    pub fn retrieve_secret_incident(
        &self,
        incident_id: u64,
        with_occurrences: u32,
    ) -> Result<SecretIncident, ApiError> {
        let request = self
            .http
            .get(self.url(&format!("incidents/secrets/{incident_id}")))
            .query(&[("with_occurrences", with_occurrences.to_string())]);
        let request = self.apply_headers(request, &HashMap::new());
        let body = Self::check_response(request.send()?)?;
        serde_json::from_str(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    pub fn quota_overview(&self) -> Result<QuotaResponse, ApiError> {
        let request = self.apply_headers(self.http.get(self.url("quotas")), &HashMap::new());
        let body = Self::check_response(request.send()?)?;
        serde_json::from_str(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    /// Map an HTTP response to the error taxonomy, returning the body text
    /// on success.
    fn check_response(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text()?;
        if status.is_success() {
            return Ok(body);
        }
        let detail = parse_detail(&body);
        debug!(status = status.as_u16(), detail = %detail, "API error response");
        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Auth),
            StatusCode::FORBIDDEN => {
                if detail.to_lowercase().contains("quota") {
                    Err(ApiError::QuotaLimitReached(detail))
                } else {
                    Err(ApiError::MissingScopes(detail))
                }
            }
            status if status.is_server_error() => Err(ApiError::ServerUnavailable(detail)),
            status => Err(ApiError::Server {
                status: status.as_u16(),
                detail,
            }),
        }
    }
}

fn parse_detail(body: &str) -> String {
    match serde_json::from_str::<Detail>(body) {
        Ok(detail) => detail.detail,
        Err(_) if body.is_empty() => "no error detail".to_string(),
        Err(_) => body.to_string(),
    }
}

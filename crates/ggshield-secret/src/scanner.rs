//! Chunk scheduler and scanner core.
//!
//! Scannables are sliced into chunks under three caps (documents per
//! request, per-document size, total payload size), dispatched on a worker
//! pool, and zipped back position-by-position with the verdicts. UI calls
//! are serialized on the orchestrating thread.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use ggshield_api::models::{Document, MultiScanResult, SecretScanPreferences, TokenScope};
use ggshield_api::{ApiError, GGClient};
use ggshield_cache::Cache;
use ggshield_core::config::SecretConfig;
use ggshield_core::env_utils::getenv_usize;
use ggshield_core::{Error, Filemode, ScanContext};
use ggshield_scannable::{Scannable, ScannableError, ScannerUI};
use threadpool::ThreadPool;
use tracing::debug;

use crate::collection::{FileResult, Results, ScanError};

/// Hard cap on scan threads, so powerful machines do not hammer the API.
pub const SCAN_THREADS_CAP: usize = 4;

/// The API rejects filenames longer than this; keep the tail, which holds
/// the actual file name.
const API_PATH_MAX_LENGTH: usize = 256;

/// Reserved for request metadata when packing documents against the
/// payload cap.
const SIZE_METADATA_OVERHEAD: usize = 10 * 1024;

/// Default worker count: available parallelism, capped.
pub fn default_scan_threads() -> usize {
    num_cpus::get().clamp(1, SCAN_THREADS_CAP)
}

/// A document prepared for scanning, with everything needed to build its
/// result afterwards.
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    pub url: String,
    pub filename: String,
    pub path: PathBuf,
    pub filemode: Filemode,
    pub content: String,
    pub utf8_encoded_size: usize,
}

/// The seam between the scheduler and the API: one blocking call per
/// chunk. Implemented by [`ClientChunkScanner`] for real scans and by test
/// doubles.
pub trait ChunkScanner: Send + Sync {
    fn scan_chunk(
        &self,
        documents: &[Document],
        extra_headers: &HashMap<String, String>,
    ) -> Result<MultiScanResult, ApiError>;

    fn preferences(&self) -> SecretScanPreferences;

    fn secrets_engine_version(&self) -> Option<String>;
}

/// Dispatches chunks to the GitGuardian API. With a `source_uuid` the
/// scan-and-create-incidents endpoint is used, otherwise the plain
/// multi-content scan with `all_secrets=true` (classification stays client
/// side).
pub struct ClientChunkScanner {
    client: Arc<GGClient>,
    source_uuid: Option<String>,
}

impl ClientChunkScanner {
    pub fn new(client: Arc<GGClient>, source_uuid: Option<String>) -> Self {
        Self {
            client,
            source_uuid,
        }
    }
}

impl ChunkScanner for ClientChunkScanner {
    fn scan_chunk(
        &self,
        documents: &[Document],
        extra_headers: &HashMap<String, String>,
    ) -> Result<MultiScanResult, ApiError> {
        match &self.source_uuid {
            Some(source_uuid) => {
                self.client
                    .scan_and_create_incidents(documents, source_uuid, extra_headers)
            }
            None => self.client.multi_content_scan(documents, extra_headers, true),
        }
    }

    fn preferences(&self) -> SecretScanPreferences {
        self.client.secret_scan_preferences()
    }

    fn secrets_engine_version(&self) -> Option<String> {
        self.client.secrets_engine_version()
    }
}

/// Token scopes a scan needs for the given configuration.
pub fn required_token_scopes(secret_config: &SecretConfig) -> Vec<TokenScope> {
    let mut scopes = vec![TokenScope::Scan];
    if secret_config.with_incident_details {
        scopes.push(TokenScope::IncidentsRead);
    }
    if secret_config.source_uuid.is_some() {
        scopes.push(TokenScope::ScanCreateIncidents);
    }
    scopes
}

/// Authentication check plus scope assertion, done once at startup.
pub fn check_client_api_key(client: &GGClient, secret_config: &SecretConfig) -> Result<(), Error> {
    client.read_metadata().map_err(Error::from)?;
    let scopes = required_token_scopes(secret_config);
    if scopes.len() > 1 {
        let token = client.api_tokens().map_err(Error::from)?;
        if !token.has_scopes(&scopes) {
            return Err(Error::MissingScopes(
                "the API token does not have the scopes this command requires".to_string(),
            ));
        }
    }
    Ok(())
}

/// Scans a stream of scannables with multiple threads.
pub struct SecretScanner {
    chunk_scanner: Arc<dyn ChunkScanner>,
    secret_config: SecretConfig,
    headers: HashMap<String, String>,
}

impl SecretScanner {
    pub fn new(
        chunk_scanner: Arc<dyn ChunkScanner>,
        scan_context: &ScanContext,
        secret_config: SecretConfig,
    ) -> Self {
        let headers = scan_context.http_headers_with_options(&secret_config);
        Self {
            chunk_scanner,
            secret_config,
            headers,
        }
    }

    /// Run the scan on at most `scan_threads` workers, reporting progress
    /// through `scanner_ui` and recording found secrets into `cache`.
    ///
    /// Chunk failures become [`ScanError`] entries and do not abort
    /// sibling chunks; authentication and quota failures abort the whole
    /// scan.
    pub fn scan(
        &self,
        files: impl IntoIterator<Item = Box<dyn Scannable>>,
        scanner_ui: &mut dyn ScannerUI,
        cache: &mut Cache,
        scan_threads: usize,
    ) -> Result<Results, Error> {
        let chunks = self.build_chunks(files, scanner_ui);
        debug!(chunks = chunks.len(), scan_threads, "dispatching scan");

        cache.purge();

        let completed = self.dispatch(chunks, scan_threads);

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (chunk, outcome) in completed {
            let urls: Vec<String> = chunk.iter().map(|doc| doc.url.clone()).collect();
            scanner_ui.on_scanned(&urls);

            let scan = match outcome {
                Ok(scan) => scan,
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    errors.push(ScanError {
                        files: chunk
                            .iter()
                            .map(|doc| (doc.filename.clone(), doc.filemode))
                            .collect(),
                        description: err.to_string(),
                    });
                    continue;
                }
            };

            if scan.scan_results.len() != chunk.len() {
                errors.push(ScanError {
                    files: chunk
                        .iter()
                        .map(|doc| (doc.filename.clone(), doc.filemode))
                        .collect(),
                    description: format!(
                        "server returned {} results for {} documents",
                        scan.scan_results.len(),
                        chunk.len()
                    ),
                });
                continue;
            }

            // Result i of the chunk corresponds to document i, regardless
            // of thread completion order.
            for (document, scan_result) in chunk.iter().zip(&scan.scan_results) {
                let result =
                    FileResult::from_scan_result(document, scan_result, &self.secret_config);
                for secret in &result.secrets {
                    cache.add_found_secret(
                        &secret.detector_display_name,
                        secret.ignore_sha(),
                        &document.filename,
                    );
                }
                results.push(result);
            }
        }

        if let Err(err) = cache.save() {
            debug!(error = %err, "could not save cache");
        }
        Ok(Results { results, errors })
    }

    /// Slice the scannables into chunks respecting the three caps. Skips
    /// (oversize, undecodable, empty) are reported through the UI and do
    /// not make it into any chunk.
    fn build_chunks(
        &self,
        files: impl IntoIterator<Item = Box<dyn Scannable>>,
        scanner_ui: &mut dyn ScannerUI,
    ) -> Vec<Vec<ScannedDocument>> {
        let preferences = self.chunk_scanner.preferences();
        let maximum_document_size =
            getenv_usize("GG_MAX_DOC_SIZE", preferences.maximum_document_size);
        let maximum_documents_per_scan =
            getenv_usize("GG_MAX_DOCS", preferences.maximum_documents_per_scan).max(1);
        let max_payload_size = preferences
            .maximum_payload_size
            .saturating_sub(SIZE_METADATA_OVERHEAD);
        debug!(
            maximum_document_size,
            maximum_documents_per_scan, max_payload_size, "chunking limits"
        );

        let mut chunks: Vec<Vec<ScannedDocument>> = Vec::new();
        let mut chunk: Vec<ScannedDocument> = Vec::new();
        let mut chunk_size = 0usize;

        for mut scannable in files {
            match scannable.is_longer_than(maximum_document_size) {
                Ok(true) => {
                    scanner_ui.on_skipped(
                        scannable.as_ref(),
                        &format!("content is over {maximum_document_size} bytes"),
                    );
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    scanner_ui.on_skipped(scannable.as_ref(), &skip_reason(&err));
                    continue;
                }
            }

            let document = match self.prepare_document(scannable.as_mut()) {
                Ok(Some(document)) => document,
                Ok(None) => {
                    // Empty content, skip silently.
                    scanner_ui.on_skipped(scannable.as_ref(), "");
                    continue;
                }
                Err(err) => {
                    scanner_ui.on_skipped(scannable.as_ref(), &skip_reason(&err));
                    continue;
                }
            };

            if chunk.len() == maximum_documents_per_scan
                || chunk_size + document.utf8_encoded_size > max_payload_size
            {
                if !chunk.is_empty() {
                    chunks.push(std::mem::take(&mut chunk));
                }
                chunk_size = 0;
            }
            chunk_size += document.utf8_encoded_size;
            chunk.push(document);
        }
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        chunks
    }

    fn prepare_document(
        &self,
        scannable: &mut dyn Scannable,
    ) -> Result<Option<ScannedDocument>, ScannableError> {
        let utf8_encoded_size = scannable.utf8_encoded_size()?;
        let content = scannable.content()?;
        if content.is_empty() {
            return Ok(None);
        }
        let content = content.to_string();
        Ok(Some(ScannedDocument {
            url: scannable.url(),
            filename: scannable.filename(),
            path: scannable.path().to_path_buf(),
            filemode: scannable.filemode(),
            content,
            utf8_encoded_size,
        }))
    }

    /// Run every chunk on the pool, collecting them in completion order.
    #[allow(clippy::type_complexity)]
    fn dispatch(
        &self,
        chunks: Vec<Vec<ScannedDocument>>,
        scan_threads: usize,
    ) -> Vec<(Vec<ScannedDocument>, Result<MultiScanResult, ApiError>)> {
        if chunks.is_empty() {
            return Vec::new();
        }
        let pool = ThreadPool::new(scan_threads.max(1));
        let (sender, receiver) = mpsc::channel();
        let chunk_count = chunks.len();

        for chunk in chunks {
            let sender = sender.clone();
            let chunk_scanner = Arc::clone(&self.chunk_scanner);
            let headers = self.headers.clone();
            pool.execute(move || {
                let documents: Vec<Document> = chunk
                    .iter()
                    .map(|doc| Document {
                        filename: tail(&doc.filename, API_PATH_MAX_LENGTH),
                        document: doc.content.clone(),
                    })
                    .collect();
                let outcome = chunk_scanner.scan_chunk(&documents, &headers);
                // The receiver only hangs up on an early return, which
                // drops the whole scan anyway.
                let _ = sender.send((chunk, outcome));
            });
        }
        drop(sender);

        receiver.iter().take(chunk_count).collect()
    }
}

fn skip_reason(err: &ScannableError) -> String {
    match err {
        ScannableError::Decode => "can't detect encoding".to_string(),
        ScannableError::NonSeekable => "file cannot be seeked".to_string(),
        ScannableError::Io(io) => io.to_string(),
    }
}

/// Keep the last `max_length` characters of a filename, where the actual
/// name lives.
fn tail(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }
    let mut start = text.len() - max_length;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggshield_api::models::ScanResult;
    use ggshield_core::ScanMode;
    use ggshield_scannable::{StringScannable, VoidScannerUI};
    use std::sync::Mutex;

    /// Test double recording every chunk it receives and returning empty
    /// verdicts (or a scripted failure).
    struct FakeChunkScanner {
        preferences: SecretScanPreferences,
        chunks: Mutex<Vec<Vec<Document>>>,
        fail_with: Option<fn() -> ApiError>,
    }

    impl FakeChunkScanner {
        fn new(preferences: SecretScanPreferences) -> Self {
            Self {
                preferences,
                chunks: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn failing(preferences: SecretScanPreferences, fail_with: fn() -> ApiError) -> Self {
            Self {
                preferences,
                chunks: Mutex::new(Vec::new()),
                fail_with: Some(fail_with),
            }
        }
    }

    impl ChunkScanner for FakeChunkScanner {
        fn scan_chunk(
            &self,
            documents: &[Document],
            _extra_headers: &HashMap<String, String>,
        ) -> Result<MultiScanResult, ApiError> {
            self.chunks.lock().unwrap().push(documents.to_vec());
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(MultiScanResult {
                scan_results: documents
                    .iter()
                    .map(|_| ScanResult {
                        policy_break_count: 0,
                        policies: Vec::new(),
                        policy_breaks: Vec::new(),
                    })
                    .collect(),
            })
        }

        fn preferences(&self) -> SecretScanPreferences {
            self.preferences
        }

        fn secrets_engine_version(&self) -> Option<String> {
            Some("2.0.0".to_string())
        }
    }

    fn scannable(name: &str, content: &str) -> Box<dyn Scannable> {
        Box::new(StringScannable::new(
            format!("file://{name}"),
            content,
            Filemode::File,
        ))
    }

    fn scanner(chunk_scanner: Arc<dyn ChunkScanner>) -> SecretScanner {
        let context = ScanContext::new(ScanMode::Path, "ggshield secret scan path");
        SecretScanner::new(chunk_scanner, &context, SecretConfig::default())
    }

    fn preferences(max_docs: usize, max_doc_size: usize, max_payload: usize) -> SecretScanPreferences {
        SecretScanPreferences {
            maximum_document_size: max_doc_size,
            maximum_documents_per_scan: max_docs,
            maximum_payload_size: max_payload,
        }
    }

    #[test]
    fn twenty_five_documents_make_two_chunks_and_25_results() {
        let fake = Arc::new(FakeChunkScanner::new(preferences(20, 1000, 100_000 + SIZE_METADATA_OVERHEAD)));
        let scanner = scanner(fake.clone() as Arc<dyn ChunkScanner>);
        let files = (0..25).map(|i| scannable(&format!("f{i}"), "content"));
        let mut ui = VoidScannerUI::default();
        let mut cache = Cache::in_memory();
        let results = scanner
            .scan(files, &mut ui, &mut cache, 2)
            .unwrap();

        assert_eq!(results.results.len(), 25);
        assert!(results.errors.is_empty());
        let chunks = fake.chunks.lock().unwrap();
        assert_eq!(chunks.len(), 2);
        let mut sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![5, 20]);
    }

    #[test]
    fn payload_cap_splits_chunks() {
        // payload cap of overhead + 10 bytes: two 6-byte docs cannot share
        // a chunk
        let fake = Arc::new(FakeChunkScanner::new(preferences(
            20,
            1000,
            SIZE_METADATA_OVERHEAD + 10,
        )));
        let scanner = scanner(fake.clone() as Arc<dyn ChunkScanner>);
        let files = (0..3).map(|i| scannable(&format!("f{i}"), "sixchr"));
        let mut ui = VoidScannerUI::default();
        let mut cache = Cache::in_memory();
        let results = scanner.scan(files, &mut ui, &mut cache, 1).unwrap();
        assert_eq!(results.results.len(), 3);
        assert_eq!(fake.chunks.lock().unwrap().len(), 3);
    }

    #[test]
    fn oversize_and_empty_documents_are_skipped() {
        let fake = Arc::new(FakeChunkScanner::new(preferences(20, 10, 1_000_000)));
        let scanner = scanner(fake.clone() as Arc<dyn ChunkScanner>);
        let files = vec![
            scannable("big", &"x".repeat(11)),
            scannable("empty", ""),
            scannable("ok", "short"),
        ];
        let mut ui = VoidScannerUI::default();
        let mut cache = Cache::in_memory();
        let results = scanner.scan(files, &mut ui, &mut cache, 1).unwrap();

        // results count = inputs - skipped
        assert_eq!(results.results.len(), 1);
        assert_eq!(ui.skipped.len(), 2);
        assert!(ui.skipped[0].1.contains("over 10 bytes"));
        // empty files are skipped silently
        assert_eq!(ui.skipped[1].1, "");
    }

    #[test]
    fn chunk_failures_do_not_abort_siblings() {
        let fake = Arc::new(FakeChunkScanner::failing(preferences(1, 1000, 1_000_000), || {
            ApiError::Server {
                status: 400,
                detail: "bad request".to_string(),
            }
        }));
        let scanner = scanner(fake as Arc<dyn ChunkScanner>);
        let files = vec![scannable("a", "one"), scannable("b", "two")];
        let mut ui = VoidScannerUI::default();
        let mut cache = Cache::in_memory();
        let results = scanner.scan(files, &mut ui, &mut cache, 2).unwrap();
        assert_eq!(results.results.len(), 0);
        assert_eq!(results.errors.len(), 2);
        assert!(results.errors[0].description.contains("bad request"));
        assert_eq!(results.errors[0].files.len(), 1);
    }

    #[test]
    fn quota_errors_abort_the_scan() {
        let fake = Arc::new(FakeChunkScanner::failing(preferences(20, 1000, 1_000_000), || {
            ApiError::QuotaLimitReached("quota exceeded".to_string())
        }));
        let scanner = scanner(fake as Arc<dyn ChunkScanner>);
        let files = vec![scannable("a", "one")];
        let mut ui = VoidScannerUI::default();
        let mut cache = Cache::in_memory();
        let err = scanner.scan(files, &mut ui, &mut cache, 1).unwrap_err();
        assert!(matches!(err, Error::QuotaLimitReached(_)));
    }

    #[test]
    fn auth_errors_abort_the_scan() {
        let fake = Arc::new(FakeChunkScanner::failing(
            preferences(20, 1000, 1_000_000),
            || ApiError::Auth,
        ));
        let scanner = scanner(fake as Arc<dyn ChunkScanner>);
        let files = vec![scannable("a", "one")];
        let mut ui = VoidScannerUI::default();
        let mut cache = Cache::in_memory();
        let err = scanner.scan(files, &mut ui, &mut cache, 1).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn filenames_are_truncated_from_the_front() {
        assert_eq!(tail("short", 256), "short");
        let long = format!("{}suffix", "a/".repeat(200));
        let truncated = tail(&long, 10);
        assert_eq!(truncated.len(), 10);
        assert!(truncated.ends_with("suffix"));
    }

    #[test]
    fn required_scopes_follow_the_config() {
        let mut config = SecretConfig::default();
        assert_eq!(required_token_scopes(&config), vec![TokenScope::Scan]);
        config.with_incident_details = true;
        config.source_uuid = Some("uuid".to_string());
        let scopes = required_token_scopes(&config);
        assert!(scopes.contains(&TokenScope::IncidentsRead));
        assert!(scopes.contains(&TokenScope::ScanCreateIncidents));
    }
}

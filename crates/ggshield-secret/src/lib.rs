//! # ggshield-secret
//!
//! The secret scanning pipeline: batches scannables into bounded API
//! chunks, dispatches them on a worker pool, folds verdicts back into a
//! result tree and classifies every policy break against the local
//! configuration.

mod collection;
mod extended_match;
pub mod repo;
mod scanner;

pub use collection::{
    compute_ignore_reason, group_secrets_by_ignore_sha, FileResult, IgnoreKind, IgnoreReason,
    Results, ScanError, Secret, SecretScanCollection,
};
pub use extended_match::ExtendedMatch;
pub use scanner::{
    check_client_api_key, default_scan_threads, required_token_scopes, ChunkScanner,
    ClientChunkScanner, ScannedDocument, SecretScanner, SCAN_THREADS_CAP,
};

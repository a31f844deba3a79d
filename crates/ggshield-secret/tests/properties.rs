//! Property tests for the chunk scheduler invariants.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ggshield_api::models::{Document, MultiScanResult, ScanResult, SecretScanPreferences};
use ggshield_api::ApiError;
use ggshield_cache::Cache;
use ggshield_core::config::SecretConfig;
use ggshield_core::{Filemode, ScanContext, ScanMode};
use ggshield_scannable::{Scannable, StringScannable, VoidScannerUI};
use ggshield_secret::{ChunkScanner, SecretScanner};
use proptest::prelude::*;

const METADATA_OVERHEAD: usize = 10 * 1024;

struct RecordingScanner {
    preferences: SecretScanPreferences,
    chunks: Mutex<Vec<Vec<usize>>>,
}

impl ChunkScanner for RecordingScanner {
    fn scan_chunk(
        &self,
        documents: &[Document],
        _extra_headers: &HashMap<String, String>,
    ) -> Result<MultiScanResult, ApiError> {
        self.chunks
            .lock()
            .unwrap()
            .push(documents.iter().map(|d| d.document.len()).collect());
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
        None
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn chunks_respect_all_three_caps(
        sizes in prop::collection::vec(0usize..4000, 0..40),
        max_docs in 1usize..10,
        // keep the per-document cap under the payload budget, so a single
        // document always fits a fresh chunk
        payload_budget in 3000usize..8000,
        max_doc_size in 500usize..3000,
    ) {
        let preferences = SecretScanPreferences {
            maximum_document_size: max_doc_size,
            maximum_documents_per_scan: max_docs,
            maximum_payload_size: METADATA_OVERHEAD + payload_budget,
        };
        let recording = Arc::new(RecordingScanner {
            preferences,
            chunks: Mutex::new(Vec::new()),
        });

        let files: Vec<Box<dyn Scannable>> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                Box::new(StringScannable::new(
                    format!("file://doc{i}"),
                    "x".repeat(size),
                    Filemode::File,
                )) as Box<dyn Scannable>
            })
            .collect();

        let context = ScanContext::new(ScanMode::Path, "ggshield secret scan path");
        let scanner = SecretScanner::new(
            recording.clone() as Arc<dyn ChunkScanner>,
            &context,
            SecretConfig::default(),
        );
        let mut ui = VoidScannerUI::default();
        let mut cache = Cache::in_memory();
        let results = scanner.scan(files, &mut ui, &mut cache, 2).unwrap();

        // every dispatched chunk honors the caps
        let chunks = recording.chunks.lock().unwrap();
        for chunk in chunks.iter() {
            prop_assert!(chunk.len() <= max_docs);
            prop_assert!(chunk.iter().sum::<usize>() <= payload_budget);
            for &size in chunk {
                prop_assert!(size <= max_doc_size);
            }
        }

        // results + skips account for every input
        let scanned: usize = chunks.iter().map(Vec::len).sum();
        prop_assert_eq!(results.results.len(), scanned);
        prop_assert_eq!(scanned + ui.skipped.len(), sizes.len());

        // only empty or oversize documents were skipped
        let skipped_expected = sizes
            .iter()
            .filter(|&&size| size == 0 || size > max_doc_size)
            .count();
        prop_assert_eq!(ui.skipped.len(), skipped_expected);
    }
}

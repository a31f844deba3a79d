use crate::Scannable;

/// Progress and message sink used by scanning code.
///
/// Implementations are driven from the orchestrating thread only (the
/// scanner serializes calls on chunk completion, never inside workers), so
/// they do not need to be thread safe.
pub trait ScannerUI {
    /// A chunk finished scanning; `urls` identify its scannables.
    fn on_scanned(&mut self, urls: &[String]);

    /// A scannable was skipped. An empty `reason` means the user should
    /// not be notified (empty files for example).
    fn on_skipped(&mut self, scannable: &dyn Scannable, reason: &str);
}

/// Plain-text implementation, no progress display.
#[derive(Debug, Default)]
pub struct PlainTextScannerUI;

impl ScannerUI for PlainTextScannerUI {
    fn on_scanned(&mut self, _urls: &[String]) {}

    fn on_skipped(&mut self, scannable: &dyn Scannable, reason: &str) {
        if !reason.is_empty() {
            eprintln!("Skipped {}: {}", scannable.url(), reason);
        }
    }
}

/// Silent implementation for nested scans and tests.
#[derive(Debug, Default)]
pub struct VoidScannerUI {
    pub scanned: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

impl ScannerUI for VoidScannerUI {
    fn on_scanned(&mut self, urls: &[String]) {
        self.scanned.extend(urls.iter().cloned());
    }

    fn on_skipped(&mut self, scannable: &dyn Scannable, reason: &str) {
        self.skipped.push((scannable.url(), reason.to_string()));
    }
}

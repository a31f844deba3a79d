//! # ggshield-scannable
//!
//! Uniform lazy-content view over everything the pipeline can scan: files
//! on disk, patch hunks, in-memory strings.
//!
//! A [`Scannable`] exposes a URL (its identity), a semantic path for
//! exclusion matching, a size gate that avoids loading oversize content,
//! and the decoded content itself. Decoding discipline (BOM handling,
//! charset fallback, UTF-8 size accounting) lives in [`decoder`].

pub mod decoder;
mod file;
mod scanner_ui;
mod string_scannable;

use std::path::Path;

use ggshield_core::Filemode;
use thiserror::Error;

pub use file::{is_path_binary, File, BINARY_EXTENSIONS};
pub use scanner_ui::{PlainTextScannerUI, ScannerUI, VoidScannerUI};
pub use string_scannable::StringScannable;

/// Worst case blow-up factor between UTF-8 and any other supported
/// encoding: UTF-32 spends four bytes where UTF-8 spends one, so content
/// bigger than `4 * limit` raw bytes can never fit once re-encoded.
pub const UTF8_TO_WORST_ENCODING_RATIO: usize = 4;

#[derive(Error, Debug)]
pub enum ScannableError {
    /// The content's encoding could not be determined.
    #[error("unable to detect the encoding")]
    Decode,

    /// The underlying file does not support seeking.
    #[error("file cannot be seeked")]
    NonSeekable,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A lazily readable unit of content to scan.
///
/// Implementations cache the decoded content and its UTF-8 encoded size on
/// first access; `is_longer_than` must answer without fully loading
/// oversize content when possible.
pub trait Scannable {
    /// Unique identifier. May use custom schemes, e.g.
    /// `commit://<sha>/<path>` or `file:///...`.
    fn url(&self) -> String;

    /// Display name, shown in reports and sent to the API.
    fn filename(&self) -> String;

    /// Semantic path, used for exclusion matching.
    fn path(&self) -> &Path;

    fn filemode(&self) -> Filemode;

    /// True when the UTF-8 encoded content exceeds `max_utf8_encoded_size`
    /// bytes.
    fn is_longer_than(&mut self, max_utf8_encoded_size: usize) -> Result<bool, ScannableError>;

    /// The decoded content.
    fn content(&mut self) -> Result<&str, ScannableError>;

    /// Byte length of the content once encoded as UTF-8.
    fn utf8_encoded_size(&mut self) -> Result<usize, ScannableError>;
}

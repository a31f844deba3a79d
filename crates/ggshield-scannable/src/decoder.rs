//! Decoding discipline shared by every content source.
//!
//! Policy:
//! 1. Sniff a BOM; UTF-8, UTF-16LE and UTF-16BE are recognized.
//! 2. Without a BOM, valid UTF-8 (which covers ASCII) is taken as is.
//! 3. Anything else falls back to a WINDOWS-1252 decode with replacement,
//!    unless it contains NUL bytes, which no single-byte text encoding
//!    produces: that content is undecodable.
//!
//! The UTF-8 encoded size is the raw byte length when the input already is
//! UTF-8 (minus the BOM), and the byte length of the re-encoded string
//! otherwise.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::debug;

use crate::ScannableError;

/// Decoded content together with its UTF-8 encoded size.
#[derive(Debug, Clone)]
pub struct DecodedContent {
    pub content: String,
    pub utf8_encoded_size: usize,
}

/// Decode raw bytes. Invalid sequences are replaced, zero bytes in valid
/// input are preserved.
pub fn decode_bytes(raw: &[u8]) -> Result<DecodedContent, ScannableError> {
    if let Some((encoding, bom_length)) = Encoding::for_bom(raw) {
        let (content, _had_errors) = encoding.decode_with_bom_removal(raw);
        let utf8_encoded_size = if encoding == UTF_8 {
            raw.len() - bom_length
        } else {
            content.len()
        };
        debug!(charset = encoding.name(), utf8_encoded_size, "bom detected");
        return Ok(DecodedContent {
            content: content.into_owned(),
            utf8_encoded_size,
        });
    }

    match std::str::from_utf8(raw) {
        Ok(content) => Ok(DecodedContent {
            content: content.to_string(),
            utf8_encoded_size: raw.len(),
        }),
        Err(_) => {
            if raw.contains(&0) {
                // Not UTF-8 and full of NULs: binary, not text in a legacy
                // charset.
                return Err(ScannableError::Decode);
            }
            let (content, _had_errors) = WINDOWS_1252.decode_without_bom_handling(raw);
            let content = content.into_owned();
            let utf8_encoded_size = content.len();
            debug!(charset = "windows-1252", utf8_encoded_size, "fallback decode");
            Ok(DecodedContent {
                content,
                utf8_encoded_size,
            })
        }
    }
}

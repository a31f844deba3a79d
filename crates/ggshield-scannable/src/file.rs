use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use ggshield_core::Filemode;

use crate::decoder::{decode_bytes, DecodedContent};
use crate::{Scannable, ScannableError, UTF8_TO_WORST_ENCODING_RATIO};

/// Extensions that never contain scannable text. Matched on the lowercased
/// extension without its dot.
pub const BINARY_EXTENSIONS: &[&str] = &[
    "7z", "a", "aac", "apk", "avi", "bin", "bmp", "bz2", "class", "dat", "db", "dll", "dmg",
    "doc", "docx", "dylib", "ear", "eot", "exe", "flac", "flv", "gif", "gz", "ico", "iso", "jar",
    "jpeg", "jpg", "lz", "lzma", "mkv", "mov", "mp3", "mp4", "mpg", "msi", "o", "obj", "odg",
    "odp", "ods", "odt", "ogg", "otf", "pdf", "pkg", "png", "ppt", "pptx", "psd", "pyc", "pyd",
    "pyo", "rar", "rpm", "so", "svgz", "swf", "tar", "tgz", "tif", "tiff", "ttf", "war", "wav",
    "webm", "webp", "whl", "wmv", "woff", "woff2", "xls", "xlsx", "xz", "zip", "zst",
];

/// True when the path's extension marks it as binary.
pub fn is_path_binary(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// [`Scannable`] backed by a file on disk. Content is read and decoded at
/// most once.
pub struct File {
    path: PathBuf,
    content: Option<String>,
    utf8_encoded_size: Option<usize>,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: None,
            utf8_encoded_size: None,
        }
    }

    fn read_and_decode(&mut self) -> Result<(), ScannableError> {
        let raw = fs::read(&self.path)?;
        let DecodedContent {
            content,
            utf8_encoded_size,
        } = decode_bytes(&raw)?;
        self.content = Some(content);
        self.utf8_encoded_size = Some(utf8_encoded_size);
        Ok(())
    }
}

impl Scannable for File {
    fn url(&self) -> String {
        let absolute = self
            .path
            .canonicalize()
            .unwrap_or_else(|_| self.path.clone());
        format!("file://{}", posix(&absolute))
    }

    fn filename(&self) -> String {
        self.path.display().to_string()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn filemode(&self) -> Filemode {
        Filemode::File
    }

    fn is_longer_than(&mut self, max_utf8_encoded_size: usize) -> Result<bool, ScannableError> {
        if let Some(size) = self.utf8_encoded_size {
            return Ok(size > max_utf8_encoded_size);
        }

        let mut file = fs::File::open(&self.path)?;
        let byte_size = file
            .seek(SeekFrom::End(0))
            .map_err(|_| ScannableError::NonSeekable)? as usize;
        file.seek(SeekFrom::Start(0))
            .map_err(|_| ScannableError::NonSeekable)?;

        // Even the worst encoding cannot shrink by more than 4x, so a file
        // this large can be rejected without decoding it.
        if byte_size > max_utf8_encoded_size * UTF8_TO_WORST_ENCODING_RATIO {
            return Ok(true);
        }

        let mut raw = Vec::with_capacity(byte_size);
        file.read_to_end(&mut raw)?;
        let DecodedContent {
            content,
            utf8_encoded_size,
        } = decode_bytes(&raw)?;
        self.utf8_encoded_size = Some(utf8_encoded_size);
        if utf8_encoded_size > max_utf8_encoded_size {
            Ok(true)
        } else {
            // The whole file has been decoded, keep it.
            self.content = Some(content);
            Ok(false)
        }
    }

    fn content(&mut self) -> Result<&str, ScannableError> {
        if self.content.is_none() {
            self.read_and_decode()?;
        }
        Ok(self.content.as_deref().unwrap_or_default())
    }

    fn utf8_encoded_size(&mut self) -> Result<usize, ScannableError> {
        if self.utf8_encoded_size.is_none() {
            self.read_and_decode()?;
        }
        Ok(self.utf8_encoded_size.unwrap_or_default())
    }
}

fn posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

use std::path::{Path, PathBuf};

use ggshield_core::Filemode;

use crate::{Scannable, ScannableError};

/// [`Scannable`] for content already loaded in memory.
///
/// Used for patch hunks parsed out of commits and for synthetic documents;
/// the URL doubles as the display name.
pub struct StringScannable {
    url: String,
    path: PathBuf,
    filemode: Filemode,
    content: String,
    utf8_encoded_size: Option<usize>,
}

impl StringScannable {
    pub fn new(url: impl Into<String>, content: impl Into<String>, filemode: Filemode) -> Self {
        let url = url.into();
        let path = path_from_url(&url);
        Self {
            url,
            path,
            filemode,
            content: content.into(),
            utf8_encoded_size: None,
        }
    }

    /// Override the semantic path used for exclusion matching.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
}

/// Extract the path component of a scheme URL: everything after the
/// authority, e.g. `commit://staged/src/app.py` yields `src/app.py`.
fn path_from_url(url: &str) -> PathBuf {
    let Some((_, rest)) = url.split_once("://") else {
        return PathBuf::from(url);
    };
    match rest.split_once('/') {
        Some((_, path)) => PathBuf::from(path),
        None => PathBuf::from(rest),
    }
}

impl Scannable for StringScannable {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn filename(&self) -> String {
        self.url.clone()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn filemode(&self) -> Filemode {
        self.filemode
    }

    fn is_longer_than(&mut self, max_utf8_encoded_size: usize) -> Result<bool, ScannableError> {
        Ok(self.utf8_encoded_size()? > max_utf8_encoded_size)
    }

    fn content(&mut self) -> Result<&str, ScannableError> {
        Ok(&self.content)
    }

    fn utf8_encoded_size(&mut self) -> Result<usize, ScannableError> {
        // The content is a `String`, so its byte length already is the
        // UTF-8 encoded size.
        Ok(*self.utf8_encoded_size.get_or_insert(self.content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_derived_from_the_url() {
        let scannable =
            StringScannable::new("commit://staged/src/app.py", "data", Filemode::Modify);
        assert_eq!(scannable.path(), Path::new("src/app.py"));
    }

    #[test]
    fn path_override_wins() {
        let scannable = StringScannable::new("custom://x", "data", Filemode::File)
            .with_path("layers/0/etc/passwd");
        assert_eq!(scannable.path(), Path::new("layers/0/etc/passwd"));
    }

    #[test]
    fn size_is_the_byte_length() {
        let mut scannable = StringScannable::new("url", "héllo", Filemode::File);
        assert_eq!(scannable.utf8_encoded_size().unwrap(), "héllo".len());
        assert!(!scannable.is_longer_than(10).unwrap());
        assert!(scannable.is_longer_than(3).unwrap());
    }
}

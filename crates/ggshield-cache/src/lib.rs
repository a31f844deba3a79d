//! # ggshield-cache
//!
//! Cache persisted across invocations, under the platform cache home.
//!
//! Two kinds of entries:
//! * last-found secrets: `(detector, ignore-sha, filename)` triples, shared
//!   with the "ignore last found" configuration feature;
//! * docker layer IDs known to be secret-free, keyed by the secrets engine
//!   version so a new engine invalidates them.
//!
//! Writes are additive within an invocation and saved explicitly by the
//! orchestrating thread once all chunks have completed. Concurrent
//! invocations may race, but the cache is monotone: losing a race only
//! costs re-work. An unreadable or schema-incompatible file is treated as
//! empty.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SCHEMA_VERSION: u32 = 1;
const CACHE_FILE_NAME: &str = "cache.json";

/// One secret found by a previous scan.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FoundSecret {
    /// Detector display name.
    pub name: String,
    /// Ignore-sha of the match set.
    #[serde(rename = "match")]
    pub ignore_sha: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheContent {
    schema_version: u32,
    #[serde(default)]
    last_found_secrets: BTreeSet<FoundSecret>,
    /// engine version -> layer digests with no secret.
    #[serde(default)]
    docker_layers: std::collections::BTreeMap<String, BTreeSet<String>>,
}

/// The on-disk cache. Create with [`Cache::load`], mutate, then call
/// [`Cache::save`].
#[derive(Debug)]
pub struct Cache {
    path: Option<PathBuf>,
    content: CacheContent,
    dirty: bool,
    read_only: bool,
}

impl Cache {
    /// Load the cache from the default location
    /// (`<cache home>/ggshield/cache.json`).
    pub fn load_default() -> Self {
        match default_cache_path() {
            Some(path) => Self::load(&path),
            None => {
                warn!("no cache directory available, cache disabled");
                Self::in_memory()
            }
        }
    }

    pub fn load(path: &Path) -> Self {
        let content = read_content(path).unwrap_or_else(|reason| {
            debug!(path = %path.display(), reason, "starting with an empty cache");
            CacheContent {
                schema_version: SCHEMA_VERSION,
                ..CacheContent::default()
            }
        });
        Self {
            path: Some(path.to_path_buf()),
            content,
            dirty: false,
            read_only: false,
        }
    }

    /// A cache that never touches the disk, used by pre-receive (which
    /// runs server side and must not write) and by tests.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            content: CacheContent {
                schema_version: SCHEMA_VERSION,
                ..CacheContent::default()
            },
            dirty: false,
            read_only: false,
        }
    }

    /// A cache that loads but silently drops every write.
    pub fn read_only(path: &Path) -> Self {
        let mut cache = Self::load(path);
        cache.read_only = true;
        cache
    }

    /// Forget the last-found secrets, called before a new scan fills them
    /// in again.
    pub fn purge(&mut self) {
        if self.read_only {
            return;
        }
        if !self.content.last_found_secrets.is_empty() {
            self.content.last_found_secrets.clear();
            self.dirty = true;
        }
    }

    pub fn add_found_secret(
        &mut self,
        name: impl Into<String>,
        ignore_sha: impl Into<String>,
        filename: impl Into<String>,
    ) {
        if self.read_only {
            return;
        }
        let inserted = self.content.last_found_secrets.insert(FoundSecret {
            name: name.into(),
            ignore_sha: ignore_sha.into(),
            filename: filename.into(),
        });
        self.dirty |= inserted;
    }

    pub fn last_found_secrets(&self) -> impl Iterator<Item = &FoundSecret> {
        self.content.last_found_secrets.iter()
    }

    /// True when the layer digest is known secret-free for this engine
    /// version. Entries recorded under another version are invisible.
    pub fn is_layer_cached(&self, engine_version: &str, layer_digest: &str) -> bool {
        self.content
            .docker_layers
            .get(engine_version)
            .is_some_and(|layers| layers.contains(layer_digest))
    }

    pub fn add_cached_layer(&mut self, engine_version: &str, layer_digest: impl Into<String>) {
        if self.read_only {
            return;
        }
        let inserted = self
            .content
            .docker_layers
            .entry(engine_version.to_string())
            .or_default()
            .insert(layer_digest.into());
        self.dirty |= inserted;
    }

    /// Persist to disk, atomically (write to a sibling file, then rename).
    /// A no-op for in-memory, read-only and unchanged caches.
    pub fn save(&mut self) -> std::io::Result<()> {
        if self.read_only || !self.dirty {
            return Ok(());
        }
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string(&self.content)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, path)?;
        self.dirty = false;
        debug!(path = %path.display(), "cache saved");
        Ok(())
    }
}

fn default_cache_path() -> Option<PathBuf> {
    Some(dirs::cache_dir()?.join("ggshield").join(CACHE_FILE_NAME))
}

fn read_content(path: &Path) -> Result<CacheContent, &'static str> {
    let raw = std::fs::read_to_string(path).map_err(|_| "unreadable")?;
    let content: CacheContent = serde_json::from_str(&raw).map_err(|_| "invalid json")?;
    if content.schema_version != SCHEMA_VERSION {
        return Err("schema version mismatch");
    }
    Ok(content)
}

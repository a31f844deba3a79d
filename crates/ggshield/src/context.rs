//! The context object carried through every command.
//!
//! Attributes that must be set before use are `Option`s with asserting
//! accessors, so commands can rely on them without re-checking.

use std::path::PathBuf;
use std::sync::Arc;

use ggshield_api::GGClient;
use ggshield_cache::Cache;
use ggshield_core::config::Config;
use ggshield_exclude::ExclusionRegexes;
use ggshield_output::OutputFormat;

pub struct ContextObj {
    pub config: Config,
    client: Option<Arc<GGClient>>,
    cache: Option<Cache>,
    pub exclusion_regexes: ExclusionRegexes,
    pub output_format: OutputFormat,
    /// Set by the `--output` option.
    pub output: Option<PathBuf>,
}

impl ContextObj {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: None,
            cache: None,
            exclusion_regexes: ExclusionRegexes::default(),
            output_format: OutputFormat::Text,
            output: None,
        }
    }

    pub fn set_client(&mut self, client: Arc<GGClient>) {
        self.client = Some(client);
    }

    /// The API client. Panics if no command set it up, which is a
    /// programming error, not a user error.
    pub fn client(&self) -> Arc<GGClient> {
        Arc::clone(self.client.as_ref().expect("client is not initialized"))
    }

    pub fn set_cache(&mut self, cache: Cache) {
        self.cache = Some(cache);
    }

    pub fn cache_mut(&mut self) -> &mut Cache {
        self.cache.as_mut().expect("cache is not initialized")
    }
}

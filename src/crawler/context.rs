//! Per-run harvest context

use crate::config::Config;
use crate::crawler::fetcher::{FetchCache, ReqwestTransport, Transport};
use crate::crawler::parser::{Extractor, SelectorExtractor};
use crate::output::Progress;
use crate::storage::{open_store, EntryStore};
use crate::{FetchError, Result};
use std::sync::Arc;

/// Everything a harvest run shares between the driver and its workers
///
/// Built once per run and handed around behind an `Arc`.
pub struct HarvestContext {
    pub config: Config,
    pub store: EntryStore,
    pub cache: FetchCache,
    pub extractor: Box<dyn Extractor>,
    pub progress: Progress,
}

impl HarvestContext {
    pub fn new(
        config: Config,
        store: EntryStore,
        cache: FetchCache,
        extractor: Box<dyn Extractor>,
    ) -> Self {
        Self {
            config,
            store,
            cache,
            extractor,
            progress: Progress::new(),
        }
    }

    /// Builds a context around the given store and transport
    ///
    /// The extractor is compiled from the configured selectors.
    pub fn with_transport(
        config: Config,
        store: EntryStore,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let extractor = SelectorExtractor::new(&config.selectors)?;
        let cache = FetchCache::new(&config.paths.cache, transport);
        Ok(Self::new(config, store, cache, Box::new(extractor)))
    }

    /// Prepares everything a run needs
    ///
    /// Creates the account directories, loads the entry store (unless
    /// `fresh`) and builds the production HTTP transport.
    pub async fn bootstrap(config: Config, fresh: bool) -> Result<Self> {
        config.paths.ensure_dirs().await?;
        tracing::debug!("Using account folder {}", config.paths.userdir.display());

        let store = open_store(&config.paths, fresh).await;

        let transport =
            ReqwestTransport::from_config(&config.crawler).map_err(|e| FetchError::Transport {
                url: config.base_url.to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Self::with_transport(config, store, Arc::new(transport))
    }
}

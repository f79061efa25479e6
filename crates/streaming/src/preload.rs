use std::sync::Arc;

use formats::{BUNDLE_FILE_NAME, BundleError, PartsBundle};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::ContentCache;
use crate::fetch::{Fetch, FetchError};
use crate::resolver::{LDCONFIG_FILE_NAME, correct_library_path, library_url, proxied};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloaderConfig {
    /// First-party object-storage host. Bundles only exist next to models
    /// stored there; every other origin skips the bundle request entirely.
    pub storage_host: String,
}

#[derive(Debug, Error)]
pub enum PreloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("parts bundle body is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// Fills the shared cache from a model's `parts-bundle.json` so individual
/// part requests never reach the network.
///
/// Every failure here only forfeits the optimization: callers get `false`
/// and fall back to per-part fetching.
#[derive(Clone)]
pub struct BundlePreloader {
    fetcher: Arc<dyn Fetch>,
    cache: ContentCache,
    config: PreloaderConfig,
}

impl BundlePreloader {
    pub fn new(fetcher: Arc<dyn Fetch>, cache: ContentCache, config: PreloaderConfig) -> Self {
        Self {
            fetcher,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Sibling manifest URL for a model on first-party storage, else `None`.
    pub fn bundle_url(&self, model_url: &str) -> Option<String> {
        let url = Url::parse(model_url).ok()?;
        if !matches!(url.scheme(), "http" | "https")
            || url.host_str() != Some(self.config.storage_host.as_str())
        {
            return None;
        }
        url.join(BUNDLE_FILE_NAME).ok().map(String::from)
    }

    /// Returns `true` if a bundle was fetched and applied to the cache.
    pub async fn preload_parts_bundle(&self, model_url: &str) -> bool {
        let Some(bundle_url) = self.bundle_url(model_url) else {
            debug!(model_url, "model not on first-party storage, skipping parts bundle");
            return false;
        };

        match self.fetch_bundle(&bundle_url).await {
            Ok(Some(bundle)) => {
                let inserted = self.apply(&bundle);
                info!(
                    bundle_url = %bundle_url,
                    version = bundle.version,
                    parts = bundle.len(),
                    inserted,
                    "parts bundle applied"
                );
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(
                    bundle_url = %bundle_url,
                    error = %err,
                    "parts bundle unavailable, using per-part fetching"
                );
                false
            }
        }
    }

    async fn fetch_bundle(&self, bundle_url: &str) -> Result<Option<PartsBundle>, PreloadError> {
        let resp = self.fetcher.fetch(bundle_url).await?;
        if !resp.is_success() {
            // Models generated before bundling existed have no manifest.
            debug!(bundle_url, status = resp.status, "no parts bundle");
            return Ok(None);
        }
        let text = resp.text()?;
        Ok(Some(PartsBundle::from_json(&text)?))
    }

    /// Inserts every bundled file under its direct and proxied URL.
    ///
    /// Returns how many new cache keys were written.
    pub fn apply(&self, bundle: &PartsBundle) -> usize {
        let mut inserted = 0;
        for (relative_path, text) in &bundle.parts {
            let direct = correct_library_path(&library_url(relative_path));
            inserted += self.insert_both(direct, text);
        }
        if !bundle.ldconfig_text.is_empty() {
            inserted += self.insert_both(library_url(LDCONFIG_FILE_NAME), &bundle.ldconfig_text);
        }
        inserted
    }

    fn insert_both(&self, direct: String, text: &str) -> usize {
        let content: Arc<str> = Arc::from(text);
        let via_proxy = proxied(&direct);
        usize::from(self.cache.insert(direct, Arc::clone(&content)))
            + usize::from(self.cache.insert(via_proxy, content))
    }
}

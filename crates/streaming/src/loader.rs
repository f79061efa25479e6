use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::cache::ContentCache;
use crate::fetch::{Fetch, FetchError};
use crate::preload::BundlePreloader;
use crate::resolver::UrlModifier;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is not a UTF-8 text file")]
    NotText { url: String },
}

/// Part-file source for a model loader.
///
/// Every reference goes through the URL hook first, then the shared cache,
/// and only on a miss to the network. A failed fetch here is fatal to the
/// part; callers surface it as a load failure.
#[derive(Clone)]
pub struct PartLoader {
    hook: Arc<dyn UrlModifier>,
    cache: ContentCache,
    fetcher: Arc<dyn Fetch>,
    preloader: Option<BundlePreloader>,
}

impl PartLoader {
    pub fn new(hook: Arc<dyn UrlModifier>, cache: ContentCache, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            hook,
            cache,
            fetcher,
            preloader: None,
        }
    }

    pub fn with_preloader(mut self, preloader: BundlePreloader) -> Self {
        self.preloader = Some(preloader);
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Attempts the bulk bundle fill. Await this before the first
    /// [`PartLoader::load`] of the model so part requests can hit the cache.
    pub async fn prepare_model(&self, model_url: &str) -> bool {
        match &self.preloader {
            Some(p) => p.preload_parts_bundle(model_url).await,
            None => false,
        }
    }

    pub async fn load(&self, reference: &str) -> Result<Arc<str>, LoadError> {
        let url = self.hook.modify_url(reference);
        if let Some(hit) = self.cache.get(&url) {
            return Ok(hit);
        }

        debug!(reference, url = %url, "part cache miss");
        let resp = self.fetcher.fetch(&url).await?;
        if !resp.is_success() {
            return Err(LoadError::Status {
                url,
                status: resp.status,
            });
        }
        let Ok(text) = resp.text() else {
            return Err(LoadError::NotText { url });
        };

        let content: Arc<str> = Arc::from(text);
        self.cache.insert(url, Arc::clone(&content));
        Ok(content)
    }
}

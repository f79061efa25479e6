use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Session-lifetime text cache shared by the preloader and part loaders.
///
/// Keys are full URL strings (direct or proxied form). Each key is written
/// at most once; later inserts for the same key keep the first value, which
/// makes overlapping preloads harmless. Entries never expire.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    entries: Arc<DashMap<String, Arc<str>>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call stored the content.
    pub fn insert(&self, url: impl Into<String>, content: impl Into<Arc<str>>) -> bool {
        match self.entries.entry(url.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(content.into());
                true
            }
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<str>> {
        self.entries.get(url).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

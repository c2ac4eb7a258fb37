//! LRU cache of rendered pages, shared by render workers

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::loader::DocumentId;
use super::raster::{RasterSurface, SlotKey};

pub struct PageCache {
    cache: LruCache<SlotKey, Arc<RasterSurface>>,
}

impl PageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &SlotKey) -> Option<Arc<RasterSurface>> {
        self.cache.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &SlotKey) -> bool {
        self.cache.contains(key)
    }

    pub fn insert(&mut self, key: SlotKey, surface: RasterSurface) -> Arc<RasterSurface> {
        let arc = Arc::new(surface);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Drop every page of a document that is no longer open
    pub fn invalidate_document(&mut self, document: DocumentId) {
        let stale: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.document == document)
            .map(|(k, _)| *k)
            .collect();

        for key in stale {
            self.cache.pop(&key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(document: u64, page_index: usize) -> SlotKey {
        SlotKey {
            document: DocumentId(document),
            page_index,
            target_width: Some(800),
        }
    }

    fn surface(page_index: usize) -> RasterSurface {
        RasterSurface::solid(page_index, 2, 2, [0, 0, 0])
    }

    #[test]
    fn cache_insert_and_get() {
        let mut cache = PageCache::new(10);
        cache.insert(key(1, 0), surface(0));

        assert!(cache.contains(&key(1, 0)));
        assert_eq!(cache.get(&key(1, 0)).map(|s| s.page_index), Some(0));
        assert!(cache.get(&key(2, 0)).is_none());
    }

    #[test]
    fn cache_lru_eviction() {
        let mut cache = PageCache::new(2);
        for i in 0..3 {
            cache.insert(key(1, i), surface(i));
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key(1, 0)));
        assert!(cache.contains(&key(1, 2)));
    }

    #[test]
    fn zero_capacity_holds_one_page() {
        let mut cache = PageCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(key(1, 0), surface(0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_document_keeps_others() {
        let mut cache = PageCache::new(10);
        cache.insert(key(1, 0), surface(0));
        cache.insert(key(1, 1), surface(1));
        cache.insert(key(2, 0), surface(0));

        cache.invalidate_document(DocumentId(1));

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key(2, 0)));
    }
}

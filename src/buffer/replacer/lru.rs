//! LRU (Least-Recently-Used) replacement policy.

use linked_hash_map::LinkedHashMap;

use crate::common::PageId;

/// Recency order over cached pages.
///
/// Front of the list is least recently touched. Each cached page appears
/// exactly once; the pool removes a page here whenever it leaves the cache.
///
/// The replacer knows nothing about dirtiness. [`evict`](Self::evict) takes
/// a predicate so the pool can skip pages it must not drop.
#[derive(Debug, Default)]
pub struct LruReplacer {
    order: LinkedHashMap<PageId, ()>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `page_id` as most recently used, adding it if absent.
    pub fn record_access(&mut self, page_id: PageId) {
        if self.order.get_refresh(&page_id).is_none() {
            self.order.insert(page_id, ());
        }
    }

    /// Pick the least recently used page accepted by `evictable` and forget it.
    ///
    /// Returns `None` if no tracked page is accepted.
    pub fn evict<F>(&mut self, mut evictable: F) -> Option<PageId>
    where
        F: FnMut(&PageId) -> bool,
    {
        let victim = self.order.keys().find(|&pid| evictable(pid)).copied()?;
        self.order.remove(&victim);
        Some(victim)
    }

    /// Stop tracking a page (it left the cache by another path).
    pub fn remove(&mut self, page_id: &PageId) {
        self.order.remove(page_id);
    }

    pub fn contains(&self, page_id: &PageId) -> bool {
        self.order.contains_key(page_id)
    }

    /// Tracked pages from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &PageId> + '_ {
        self.order.keys()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

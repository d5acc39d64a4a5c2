use linked_hash_map::LinkedHashMap;
use crate::common::types::PageId;

/// LRU (Least Recently Used) ordering over cached pages.
///
/// The replacer only orders pages; the caller decides which ones are
/// eligible for eviction.
#[derive(Debug, Default)]
pub struct LRUReplacer {
    lru_list: LinkedHashMap<PageId, ()>,
}

impl LRUReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a page has been accessed (moves it to the back)
    pub fn record_access(&mut self, page_id: PageId) {
        if self.lru_list.get_refresh(&page_id).is_none() {
            self.lru_list.insert(page_id, ());
        }
    }

    /// Remove a page from the replacer
    pub fn remove(&mut self, page_id: PageId) {
        self.lru_list.remove(&page_id);
    }

    /// Victim selection: the least recently used page accepted by `evictable`.
    /// The victim is removed from the replacer.
    pub fn victim(&mut self, mut evictable: impl FnMut(PageId) -> bool) -> Option<PageId> {
        let victim = self.lru_list.keys().copied().find(|&page_id| evictable(page_id))?;
        self.lru_list.remove(&victim);
        Some(victim)
    }

    pub fn len(&self) -> usize {
        self.lru_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru_list.is_empty()
    }
}

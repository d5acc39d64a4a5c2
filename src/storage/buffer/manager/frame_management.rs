use std::sync::Arc;
use log::debug;

use crate::common::types::{PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use super::{BufferPool, PoolState};

impl BufferPool {
    /// Ensure `page_id` can be inserted without exceeding the pool size
    pub(super) fn make_room(&self, state: &mut PoolState, page_id: PageId) -> Result<(), BufferPoolError> {
        if state.pages.contains_key(&page_id) || state.pages.len() < self.config.pool_size {
            return Ok(());
        }
        self.evict_page(state).map(|_| ())
    }

    /// Drop the least recently used evictable page.
    ///
    /// Dirty pages are never candidates; with none clean, the pool is full.
    fn evict_page(&self, state: &mut PoolState) -> Result<PageId, BufferPoolError> {
        let pages = &state.pages;
        let victim = state
            .replacer
            .victim(|page_id| pages.get(&page_id).is_some_and(is_evictable))
            .ok_or(BufferPoolError::BufferPoolFull)?;

        state.pages.remove(&victim);
        debug!("Evicted page {}", victim);
        Ok(victim)
    }
}

/// Clean, and referenced by nobody but the cache
fn is_evictable(page: &PagePtr) -> bool {
    Arc::strong_count(page) == 1
        && page.try_read().is_some_and(|page| page.is_dirty().is_none())
}

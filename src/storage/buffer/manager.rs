use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::common::types::{PageId, PagePtr, TransactionId};
use crate::storage::buffer::config::BufferPoolConfig;
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LRUReplacer;
use crate::transaction::concurrency::LockManager;

mod basic_operations;
mod frame_management;
mod transactions;

/// Bounded page cache with strict two-phase locking on every access.
///
/// Every page access takes the page lock for the calling transaction first.
/// Pages dirtied by a transaction stay in memory until that transaction
/// commits (flush) or aborts (discard); eviction only ever drops clean pages
/// (NO-STEAL).
///
/// `PagePtr`s handed out must not be locked (`read()`/`write()`) across a
/// call back into the pool.
pub struct BufferPool {
    config: BufferPoolConfig,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    state: Mutex<PoolState>,
}

/// Everything guarded by the pool mutex: the cache itself, its LRU order,
/// and the per-transaction dirty sets. Capacity check, eviction and insert
/// happen under one acquisition.
///
/// Page reads on a miss and page writes on flush run with this mutex held, so
/// cache misses and flushes are serialized across all transactions.
#[derive(Default)]
struct PoolState {
    pages: HashMap<PageId, PagePtr>,
    replacer: LRUReplacer,
    dirty_pages: HashMap<TransactionId, HashSet<PageId>>,
}

impl PoolState {
    /// Forget `page_id` in every transaction's dirty set
    fn untrack_dirty(&mut self, page_id: PageId) {
        self.dirty_pages.retain(|_, pages| {
            pages.remove(&page_id);
            !pages.is_empty()
        });
    }
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig, catalog: Arc<Catalog>) -> Result<Self, BufferPoolError> {
        config.validate()?;
        Ok(Self {
            config,
            catalog,
            lock_manager: LockManager::new(),
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.state.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pages.is_empty()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.state.lock().pages.contains_key(&page_id)
    }

    /// Pages currently registered as dirtied by `txn`
    pub fn dirty_pages(&self, txn: TransactionId) -> Vec<PageId> {
        let state = self.state.lock();
        let mut pages: Vec<_> = state
            .dirty_pages
            .get(&txn)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        pages.sort_unstable();
        pages
    }
}

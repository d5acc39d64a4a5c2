use std::sync::Arc;
use log::{debug, error, warn};
use parking_lot::RwLock;

use crate::common::types::{Page, PageId, PagePtr, Permissions, TransactionId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::traits::PageStore;
use super::{BufferPool, PoolState};

impl BufferPool {
    /// Fetch a page with the requested permission, locking it for `txn`.
    ///
    /// May block until the lock is granted. If waiting would deadlock, `txn`
    /// is rolled back (`transaction_complete(txn, false)`) before
    /// `TransactionAborted` is returned. On a miss the page is read from its
    /// table file, evicting a clean page first if the pool is full.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PagePtr, BufferPoolError> {
        if let Err(e) = self.lock_manager.get_lock(txn, page_id, perm) {
            self.unwind_aborted(txn);
            return Err(e.into());
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(page) = state.pages.get(&page_id) {
            state.replacer.record_access(page_id);
            return Ok(page.clone());
        }

        self.make_room(state, page_id)?;
        let data = self.catalog.read_page(page_id)?;
        let page = Arc::new(RwLock::new(Page::new(page_id, data)));
        state.pages.insert(page_id, page.clone());
        state.replacer.record_access(page_id);
        debug!(
            "Loaded page {} for {} ({}/{} cached)",
            page_id,
            txn,
            state.pages.len(),
            self.config.pool_size
        );
        Ok(page)
    }

    /// Release `txn`'s lock on a page before the transaction completes.
    ///
    /// This gives up strict two-phase locking for that page: only safe for
    /// pages the transaction has not modified and whose contents it does not
    /// depend on afterwards (e.g. a scan skipping a full page).
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        let exclusive = self.lock_manager.release_lock(txn, page_id, Permissions::ReadWrite);
        let shared = self.lock_manager.release_lock(txn, page_id, Permissions::ReadOnly);
        if exclusive || shared {
            warn!("{} released page {} before completing", txn, page_id);
        }
    }

    /// Return true if the specified transaction has a lock on the specified page
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_any_lock(txn, page_id)
    }

    /// Drop a page from the cache without writing it back
    pub fn discard_page(&self, page_id: PageId) {
        let mut guard = self.state.lock();
        Self::discard_locked(&mut guard, page_id);
    }

    /// Write a page to its file if it is dirty
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut guard = self.state.lock();
        self.flush_locked(&mut guard, page_id)
    }

    /// Flush every dirty cached page.
    ///
    /// Writes uncommitted data too, so it bypasses NO-STEAL; meant for
    /// checkpoints and shutdown, not normal transaction flow.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut guard = self.state.lock();
        let page_ids: Vec<PageId> = guard.pages.keys().copied().collect();
        for page_id in page_ids {
            self.flush_locked(&mut guard, page_id)?;
        }
        Ok(())
    }

    pub(super) fn flush_locked(&self, state: &mut PoolState, page_id: PageId) -> Result<(), BufferPoolError> {
        let Some(page) = state.pages.get(&page_id).cloned() else {
            return Ok(());
        };

        let mut page_guard = page.write();
        if page_guard.is_dirty().is_none() {
            return Ok(());
        }
        self.catalog.write_page(page_id, page_guard.data())?;
        page_guard.set_before_image();
        page_guard.mark_dirty(None);
        drop(page_guard);

        state.untrack_dirty(page_id);
        debug!("Flushed page {}", page_id);
        Ok(())
    }

    pub(super) fn discard_locked(state: &mut PoolState, page_id: PageId) {
        if state.pages.remove(&page_id).is_some() {
            state.replacer.remove(page_id);
            debug!("Discarded page {}", page_id);
        }
        state.untrack_dirty(page_id);
    }

    /// Roll back a transaction whose lock request was refused
    fn unwind_aborted(&self, txn: TransactionId) {
        if let Err(e) = self.transaction_complete(txn, false) {
            error!("Failed to roll back aborted {}: {}", txn, e);
        }
    }
}

use log::info;

use crate::common::types::{PagePtr, TableId, TransactionId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::heap::Tuple;
use super::BufferPool;

impl BufferPool {
    /// Add a tuple to `table_id` on behalf of `txn`.
    ///
    /// The table's file picks the page(s) and locks them; every page it
    /// reports as modified is installed in the cache as dirty for `txn`.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<(), BufferPoolError> {
        let file = self
            .catalog
            .get_database_file(table_id)
            .ok_or(BufferPoolError::TableNotFound(table_id))?;
        let dirtied = file.insert_tuple(self, txn, tuple)?;
        self.cache_dirty_pages(txn, dirtied)
    }

    /// Remove a tuple from the table its record id points at
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<(), BufferPoolError> {
        let record_id = tuple.record_id().ok_or_else(|| {
            BufferPoolError::InvalidOperation("Cannot delete a tuple without a record id".to_string())
        })?;
        let table_id = record_id.page_id.table_id;
        let file = self
            .catalog
            .get_database_file(table_id)
            .ok_or(BufferPoolError::TableNotFound(table_id))?;
        let dirtied = file.delete_tuple(self, txn, tuple)?;
        self.cache_dirty_pages(txn, dirtied)
    }

    /// Install pages modified by `txn` into the cache as dirty for `txn`,
    /// replacing any cached copy with the same id.
    ///
    /// Operators that modify a page obtained from `get_page` directly must
    /// report it here before releasing their reference.
    pub fn cache_dirty_pages(&self, txn: TransactionId, pages: Vec<PagePtr>) -> Result<(), BufferPoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for page in pages {
            let page_id = page.read().id();
            self.make_room(state, page_id)?;

            let previous = page.read().is_dirty();
            if previous.is_some_and(|owner| owner != txn) {
                state.untrack_dirty(page_id);
            }
            page.write().mark_dirty(Some(txn));

            state.pages.insert(page_id, page);
            state.replacer.record_access(page_id);
            state.dirty_pages.entry(txn).or_default().insert(page_id);
        }
        Ok(())
    }

    /// Write every page dirtied by `txn` to disk
    pub fn flush_pages(&self, txn: TransactionId) -> Result<(), BufferPoolError> {
        let mut guard = self.state.lock();
        let page_ids: Vec<_> = guard
            .dirty_pages
            .get(&txn)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        for page_id in page_ids {
            self.flush_locked(&mut guard, page_id)?;
        }
        guard.dirty_pages.remove(&txn);
        Ok(())
    }

    /// Commit or abort `txn`, then release all of its locks.
    ///
    /// Commit flushes its dirty pages; abort discards them so the next access
    /// rereads the last committed version. Completing a transaction that holds
    /// nothing is a no-op. If a commit flush fails, the remaining dirty pages
    /// are discarded, locks are still released, and the error is returned.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<(), BufferPoolError> {
        let outcome = if commit {
            self.flush_pages(txn)
        } else {
            Ok(())
        };
        let discarded = self.discard_pages(txn);
        let released = self.lock_manager.release_all(txn);

        info!(
            "{} {}: {} pages discarded, {} locks released",
            txn,
            if commit && outcome.is_ok() { "committed" } else { "rolled back" },
            discarded,
            released
        );
        outcome
    }

    fn discard_pages(&self, txn: TransactionId) -> usize {
        let mut guard = self.state.lock();
        let Some(page_ids) = guard.dirty_pages.remove(&txn) else {
            return 0;
        };
        let count = page_ids.len();
        for page_id in page_ids {
            Self::discard_locked(&mut guard, page_id);
        }
        count
    }
}

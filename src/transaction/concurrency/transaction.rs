// A transaction handle that drives completion through the buffer pool

use log::info;
use thiserror::Error;

use crate::common::types::{PageId, PagePtr, Permissions, TableId, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::heap::Tuple;

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is already committed or aborted")]
    InvalidState(TransactionId),

    #[error(transparent)]
    BufferPool(#[from] BufferPoolError),
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Transaction - one unit of work against the buffer pool.
///
/// Completion goes through `BufferPool::transaction_complete` exactly once.
/// When any page access reports `TransactionAborted`, the pool has already
/// rolled the transaction back; the handle records that and only `abort`
/// remains valid (and is then a no-op).
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
}

impl Transaction {
    /// Start a transaction with a freshly allocated ID
    pub fn begin() -> Self {
        Self {
            id: TransactionId::new(),
            state: TransactionState::Active,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn get_page(&mut self, pool: &BufferPool, page_id: PageId, perm: Permissions) -> Result<PagePtr> {
        self.ensure_active()?;
        let result = pool.get_page(self.id, page_id, perm);
        self.observe(result)
    }

    pub fn insert_tuple(&mut self, pool: &BufferPool, table_id: TableId, tuple: &mut Tuple) -> Result<()> {
        self.ensure_active()?;
        let result = pool.insert_tuple(self.id, table_id, tuple);
        self.observe(result)
    }

    pub fn delete_tuple(&mut self, pool: &BufferPool, tuple: &Tuple) -> Result<()> {
        self.ensure_active()?;
        let result = pool.delete_tuple(self.id, tuple);
        self.observe(result)
    }

    /// Flush this transaction's pages and release its locks
    pub fn commit(&mut self, pool: &BufferPool) -> Result<()> {
        self.ensure_active()?;
        let result = pool.transaction_complete(self.id, true);
        // Locks are gone either way; a failed flush leaves nothing to retry.
        self.state = if result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::Aborted
        };
        info!("{} finished as {:?}", self.id, self.state);
        result.map_err(TransactionError::from)
    }

    /// Discard this transaction's pages and release its locks.
    /// Aborting an already aborted transaction is a no-op.
    pub fn abort(&mut self, pool: &BufferPool) -> Result<()> {
        match self.state {
            TransactionState::Aborted => Ok(()),
            TransactionState::Committed => Err(TransactionError::InvalidState(self.id)),
            TransactionState::Active => {
                self.state = TransactionState::Aborted;
                info!("{} aborted", self.id);
                pool.transaction_complete(self.id, false)?;
                Ok(())
            }
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::InvalidState(self.id));
        }
        Ok(())
    }

    fn observe<T>(&mut self, result: std::result::Result<T, BufferPoolError>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_transaction_aborted() {
                self.state = TransactionState::Aborted;
            }
        }
        result.map_err(TransactionError::from)
    }
}

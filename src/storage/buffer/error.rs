use thiserror::Error;
use crate::common::types::TableId;
use crate::storage::disk::DiskManagerError;
use crate::storage::page::PageError;
use crate::transaction::concurrency::LockError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Buffer pool is full: no clean, unreferenced page can be evicted")]
    BufferPoolFull,
    #[error("Transaction aborted: {0}")]
    TransactionAborted(#[from] LockError),
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),
    #[error("Page error: {0}")]
    PageError(#[from] PageError),
    #[error("Table {0} not found in catalog")]
    TableNotFound(TableId),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl BufferPoolError {
    /// The transaction was rolled back and may be retried from scratch
    pub fn is_transaction_aborted(&self) -> bool {
        matches!(self, BufferPoolError::TransactionAborted(_))
    }
}

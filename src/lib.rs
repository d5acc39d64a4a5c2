// Quarry Database Engine: page cache and page-level two-phase locking

pub mod common;
pub mod storage;
pub mod transaction;
pub mod catalog;

// Re-export key items for convenient access
pub use common::types::{Page, PageId, PagePtr, Permissions, TransactionId};
pub use storage::buffer::{BufferPool, BufferPoolConfig, BufferPoolError};
pub use storage::heap::{HeapFile, RecordId, Tuple};
pub use storage::{DbFile, PageStore};
pub use transaction::{LockError, LockManager, Transaction, TransactionError};
pub use catalog::Catalog;

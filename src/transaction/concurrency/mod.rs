// Transaction concurrency module exports

pub mod error;
pub mod lock;
pub mod lock_manager;
pub mod transaction;

// Public exports
pub use error::LockError;
pub use lock::Lock;
pub use lock_manager::{LockManager, LockState};
pub use transaction::{Transaction, TransactionState, TransactionError};

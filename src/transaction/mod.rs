// Transaction Management Module

pub mod concurrency;

// Public exports
pub use concurrency::{
    Lock, LockError, LockManager, LockState, Transaction, TransactionError, TransactionState,
};

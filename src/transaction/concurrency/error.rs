use thiserror::Error;

use crate::common::types::{PageId, TransactionId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("{txn} aborted: deadlock detected while waiting for page {page}")]
    Deadlock {
        txn: TransactionId,
        page: PageId,
    },

    #[error("{txn} completed while waiting for page {page}")]
    Withdrawn {
        txn: TransactionId,
        page: PageId,
    },
}

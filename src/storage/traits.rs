use crate::common::types::{PageId, PagePtr, TableId, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::disk::DiskManagerError;
use crate::storage::heap::Tuple;

/// Permanent storage for fixed-size pages.
///
/// The buffer pool is the only caller: on a cache miss, and when flushing.
pub trait PageStore: Send + Sync {
    /// Read the full contents of `page_id`
    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>, DiskManagerError>;

    /// Overwrite `page_id` with `data`
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<(), DiskManagerError>;
}

/// A table's backing file: page I/O plus record placement.
///
/// `insert_tuple` and `delete_tuple` acquire pages through `pool` (and so take
/// locks as `txn`) and return every page they modified; the pool then installs
/// those pages as dirty for `txn`. Implementations must not hold a page guard
/// when they return.
pub trait DbFile: PageStore {
    fn table_id(&self) -> TableId;

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError>;

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError>;
}

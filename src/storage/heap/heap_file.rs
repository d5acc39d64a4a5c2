use std::path::Path;

use log::debug;

use crate::common::types::{PageId, PagePtr, Permissions, TableId, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::storage::heap::tuple::{RecordId, Tuple};
use crate::storage::page::{PageError, PageManager};
use crate::storage::traits::{DbFile, PageStore};

/// An unordered table file of slotted pages.
///
/// All page access during placement goes through the buffer pool, so it is
/// locked and cached like any other access.
pub struct HeapFile {
    table_id: TableId,
    disk_manager: DiskManager,
    page_manager: PageManager,
}

impl HeapFile {
    pub fn new(table_id: TableId, path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        Ok(Self {
            table_id,
            disk_manager: DiskManager::new(path)?,
            page_manager: PageManager::new(),
        })
    }

    pub fn num_pages(&self) -> Result<u32, DiskManagerError> {
        self.disk_manager.num_pages()
    }

    /// Read every live record of the table as `txn`, taking shared locks
    pub fn scan(&self, pool: &BufferPool, txn: TransactionId) -> Result<Vec<Tuple>, BufferPoolError> {
        let mut tuples = Vec::new();
        for page_number in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_number);
            let page = pool.get_page(txn, page_id, Permissions::ReadOnly)?;
            let records = self.page_manager.records(page.read().data());
            tuples.extend(records.into_iter().map(|(slot, data)| {
                let mut tuple = Tuple::new(data);
                tuple.set_record_id(Some(RecordId::new(page_id, slot)));
                tuple
            }));
        }
        Ok(tuples)
    }

    fn try_insert(&self, page: &PagePtr, data: &[u8]) -> Result<Option<u32>, BufferPoolError> {
        let mut guard = page.write();
        match self.page_manager.insert_record(guard.data_mut(), data) {
            Ok(slot) => Ok(Some(slot)),
            Err(PageError::InsufficientSpace) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn append_page(&self) -> Result<PageId, BufferPoolError> {
        let mut empty = vec![0u8; self.disk_manager.page_size()];
        self.page_manager.init_page(&mut empty);
        let page_number = self.disk_manager.allocate_page(&empty)?;
        debug!("Table {} grew to page {}", self.table_id, page_number);
        Ok(PageId::new(self.table_id, page_number))
    }
}

impl PageStore for HeapFile {
    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>, DiskManagerError> {
        if page_id.table_id != self.table_id {
            return Err(DiskManagerError::UnknownTable(page_id.table_id));
        }
        self.disk_manager.read_page(page_id.page_number)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<(), DiskManagerError> {
        if page_id.table_id != self.table_id {
            return Err(DiskManagerError::UnknownTable(page_id.table_id));
        }
        self.disk_manager.write_page(page_id.page_number, data)
    }
}

impl DbFile for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        let data = tuple.data().to_vec();
        if data.is_empty() {
            return Err(BufferPoolError::InvalidOperation("Cannot insert an empty tuple".to_string()));
        }
        if data.len() > PageManager::max_record_size(self.disk_manager.page_size()) {
            return Err(PageError::RecordTooLarge(data.len()).into());
        }

        // Look for room under a shared lock, upgrade only the page we use
        for page_number in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_number);
            let page = pool.get_page(txn, page_id, Permissions::ReadOnly)?;
            let has_room = self.page_manager.has_room(page.read().data(), data.len());
            if !has_room {
                continue;
            }

            drop(page);
            let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
            if let Some(slot) = self.try_insert(&page, &data)? {
                tuple.set_record_id(Some(RecordId::new(page_id, slot)));
                return Ok(vec![page]);
            }
        }

        let page_id = self.append_page()?;
        let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
        let slot = self
            .try_insert(&page, &data)?
            .ok_or(BufferPoolError::PageError(PageError::InsufficientSpace))?;
        tuple.set_record_id(Some(RecordId::new(page_id, slot)));
        Ok(vec![page])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        let record_id = tuple.record_id().ok_or_else(|| {
            BufferPoolError::InvalidOperation("Cannot delete a tuple without a record id".to_string())
        })?;
        if record_id.page_id.table_id != self.table_id {
            return Err(BufferPoolError::InvalidOperation(format!(
                "Tuple at page {} does not belong to table {}",
                record_id.page_id, self.table_id
            )));
        }

        let page = pool.get_page(txn, record_id.page_id, Permissions::ReadWrite)?;
        self.page_manager
            .delete_record(page.write().data_mut(), record_id.slot)?;
        Ok(vec![page])
    }
}

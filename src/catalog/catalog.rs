use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;

use crate::common::types::{PageId, TableId};
use crate::storage::disk::DiskManagerError;
use crate::storage::traits::{DbFile, PageStore};

/// Registry of table files, keyed by table id.
///
/// Also serves as the buffer pool's `PageStore`, routing each page to the
/// file of its table.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<dyn DbFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under its table id, replacing any previous file
    pub fn add_table(&self, file: Arc<dyn DbFile>) {
        self.tables.write().insert(file.table_id(), file);
    }

    pub fn get_database_file(&self, table_id: TableId) -> Option<Arc<dyn DbFile>> {
        self.tables.read().get(&table_id).cloned()
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn file_for(&self, page_id: PageId) -> Result<Arc<dyn DbFile>, DiskManagerError> {
        self.get_database_file(page_id.table_id)
            .ok_or(DiskManagerError::UnknownTable(page_id.table_id))
    }
}

impl PageStore for Catalog {
    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>, DiskManagerError> {
        self.file_for(page_id)?.read_page(page_id)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<(), DiskManagerError> {
        self.file_for(page_id)?.write_page(page_id, data)
    }
}

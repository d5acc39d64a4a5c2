use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Current process-wide page size
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::SeqCst)
}

/// Override the page size. Only meant for test harnesses: every cached page
/// and every file written so far keeps the size it was created with.
pub fn set_page_size(size: usize) {
    PAGE_SIZE.store(size, Ordering::SeqCst);
}

/// Restore the default page size (test harnesses only)
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::SeqCst);
}

/// Table ID type
pub type TableId = u32;

/// Identifies a page uniquely within the whole system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_number: u32) -> Self {
        Self { table_id, page_number }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_number)
    }
}

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a fresh, process-unique transaction ID
    pub fn new() -> Self {
        Self(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// Access level a transaction requests on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    /// Shared lock
    ReadOnly,
    /// Exclusive lock
    ReadWrite,
}

impl Permissions {
    /// Whether holding `self` already satisfies a request for `other`
    pub fn covers(self, other: Permissions) -> bool {
        self == Permissions::ReadWrite || other == Permissions::ReadOnly
    }
}

/// Page structure
///
/// `dirtied_by` doubles as the dirty flag: `Some(tid)` means the in-memory
/// contents differ from disk and were last written by `tid`.
#[derive(Debug, Clone)]
pub struct Page {
    page_id: PageId,
    data: Vec<u8>,
    dirtied_by: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl Page {
    /// A clean page holding `data`; the before image starts out equal to it.
    pub fn new(page_id: PageId, data: Vec<u8>) -> Self {
        Self {
            page_id,
            before_image: data.clone(),
            data,
            dirtied_by: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The transaction that last dirtied this page, if it is dirty
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn mark_dirty(&mut self, txn: Option<TransactionId>) {
        self.dirtied_by = txn;
    }

    /// The page as it was when last known clean
    pub fn before_image(&self) -> Page {
        Page::new(self.page_id, self.before_image.clone())
    }

    /// Snapshot the current contents as the new before image
    pub fn set_before_image(&mut self) {
        self.before_image.clone_from(&self.data);
    }
}

/// Smart pointer to a cached page
pub type PagePtr = Arc<RwLock<Page>>;

use std::fs::{File, OpenOptions};
use std::io::{Read, Write, Seek, SeekFrom};
use std::path::Path;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{page_size, TableId};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page size: expected {expected} bytes, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
    #[error("No file registered for table {0}")]
    UnknownTable(TableId),
}

/// DiskManager is responsible for handling the actual disk I/O operations
/// of one file, addressed by zero-based page number.
pub struct DiskManager {
    db_file: Mutex<File>,
    page_size: usize,
}

impl DiskManager {
    /// Open (or create) a file of pages sized by the current `page_size()`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(db_path)?;

        Ok(Self {
            db_file: Mutex::new(file),
            page_size: page_size(),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Read a page from disk. Pages past the end of the file read as zeros.
    pub fn read_page(&self, page_number: u32) -> Result<Vec<u8>, DiskManagerError> {
        let offset = self.page_offset(page_number);
        let mut buffer = vec![0u8; self.page_size];

        let mut file = self.db_file.lock();
        let file_size = file.metadata()?.len();
        if offset >= file_size {
            return Ok(buffer);
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Write a page to disk
    pub fn write_page(&self, page_number: u32, data: &[u8]) -> Result<(), DiskManagerError> {
        self.check_size(data)?;
        let offset = self.page_offset(page_number);

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    /// Append `initial` as a new page at the end of the file and return its number
    pub fn allocate_page(&self, initial: &[u8]) -> Result<u32, DiskManagerError> {
        self.check_size(initial)?;
        let mut file = self.db_file.lock();

        let file_size = file.metadata()?.len();
        let new_page_number = (file_size / self.page_size as u64) as u32;

        file.seek(SeekFrom::Start(self.page_offset(new_page_number)))?;
        file.write_all(initial)?;
        file.flush()?;
        Ok(new_page_number)
    }

    /// Number of whole pages in the file
    pub fn num_pages(&self) -> Result<u32, DiskManagerError> {
        let file_size = self.db_file.lock().metadata()?.len();
        Ok((file_size / self.page_size as u64) as u32)
    }

    fn check_size(&self, data: &[u8]) -> Result<(), DiskManagerError> {
        if data.len() != self.page_size {
            return Err(DiskManagerError::InvalidPageSize {
                expected: self.page_size,
                actual: data.len(),
            });
        }
        Ok(())
    }

    /// Calculate the offset of a page in the file
    fn page_offset(&self, page_number: u32) -> u64 {
        page_number as u64 * self.page_size as u64
    }
}

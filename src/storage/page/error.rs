use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Not enough space in page")]
    InsufficientSpace,
    #[error("Record of {0} bytes cannot fit in an empty page")]
    RecordTooLarge(usize),
    #[error("Record not found")]
    RecordNotFound,
    #[error("Invalid record ID")]
    InvalidRecordId,
    #[error("Page header does not describe a valid slotted page")]
    CorruptedPage,
}

pub mod heap_file;
pub mod tuple;

pub use heap_file::HeapFile;
pub use tuple::{RecordId, Tuple};

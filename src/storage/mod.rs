pub mod buffer;
pub mod disk;
pub mod heap;
pub mod page;
pub mod traits;

pub use traits::{DbFile, PageStore};

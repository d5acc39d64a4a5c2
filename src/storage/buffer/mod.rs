pub mod config;
pub mod error;
pub mod manager;
mod replacer;

pub use config::{BufferPoolConfig, DEFAULT_POOL_SIZE};
pub use error::BufferPoolError;
pub use manager::BufferPool;

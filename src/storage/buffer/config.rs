use serde::{Deserialize, Serialize};

use crate::storage::buffer::error::BufferPoolError;

/// Number of pages cached when no size is configured
pub const DEFAULT_POOL_SIZE: usize = 50;

/// Buffer pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Maximum number of pages held in memory
    pub pool_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl BufferPoolConfig {
    pub fn new(pool_size: usize) -> Result<Self, BufferPoolError> {
        let config = Self { pool_size };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BufferPoolError> {
        if self.pool_size == 0 {
            return Err(BufferPoolError::InvalidOperation(
                "Buffer pool size must be at least one page".to_string(),
            ));
        }
        Ok(())
    }
}

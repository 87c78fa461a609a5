use crate::error::{Result, StorageError};
use crate::storage::format::ENT_WIDTH;

/// Configuration handed down by the segment layer.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub segment: SegmentConfig,
}

/// Per-segment size limits.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Soft limit on store size in bytes.
    /// Not enforced by `Store`; the segment compares against it to decide
    /// when to roll.
    pub max_store_bytes: u64,

    /// Index capacity in bytes. The index file is pre-allocated to this size
    /// and mapped once, so it also bounds the number of entries.
    pub max_index_bytes: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_store_bytes: 1024 * 1024, // 1 MiB
            max_index_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

impl SegmentConfig {
    /// Number of entries an index of this capacity can hold.
    pub fn max_index_entries(&self) -> u64 {
        self.max_index_bytes / ENT_WIDTH
    }

    pub fn store_is_maxed(&self, store_size: u64) -> bool {
        store_size >= self.max_store_bytes
    }

    pub fn index_is_maxed(&self, index_size: u64) -> bool {
        index_size + ENT_WIDTH > self.max_index_bytes
    }
}

impl Config {
    pub fn new(max_store_bytes: u64, max_index_bytes: u64) -> Self {
        Self {
            segment: SegmentConfig {
                max_store_bytes,
                max_index_bytes,
            },
        }
    }

    /// Reject limits the index cannot be built with.
    pub fn validate(&self) -> Result<()> {
        if self.segment.max_index_bytes < ENT_WIDTH {
            return Err(StorageError::InvalidConfig(format!(
                "max_index_bytes {} is smaller than one index entry ({} bytes)",
                self.segment.max_index_bytes, ENT_WIDTH
            )));
        }
        if usize::try_from(self.segment.max_index_bytes).is_err() {
            return Err(StorageError::InvalidConfig(format!(
                "max_index_bytes {} does not fit in the address space",
                self.segment.max_index_bytes
            )));
        }
        Ok(())
    }
}

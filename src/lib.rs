pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;

pub use config::{Config, SegmentConfig};
pub use error::{Result, StorageError};
pub use storage::format::Format;
pub use storage::index::{Index, Lookup};
pub use storage::store::{Appended, Store, StoreReader};

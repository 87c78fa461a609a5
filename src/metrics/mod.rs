//! Process-wide storage counters.
pub mod registry;

pub use registry::{StorageMetrics, StorageMetricsSnapshot, METRICS};

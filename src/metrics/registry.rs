use std::sync::atomic::{AtomicU64, Ordering};

/// Global storage metrics registry.
///
/// Design principles:
/// - Zero allocations on hot path (atomic increments only)
/// - Read-only snapshots for export
///
/// Counters use `Ordering::Relaxed`: they are monotonic and independent of
/// each other, so no cross-counter ordering is needed.
pub struct StorageMetrics {
    // Store
    pub records_appended_total: AtomicU64,
    pub bytes_appended_total: AtomicU64,
    pub records_read_total: AtomicU64,
    pub bytes_read_total: AtomicU64,

    // Index
    pub index_entries_written_total: AtomicU64,
    pub index_full_total: AtomicU64,
    pub index_lookups_total: AtomicU64,
    pub index_lookup_misses_total: AtomicU64,
}

impl StorageMetrics {
    pub fn new() -> Self {
        Self {
            records_appended_total: AtomicU64::new(0),
            bytes_appended_total: AtomicU64::new(0),
            records_read_total: AtomicU64::new(0),
            bytes_read_total: AtomicU64::new(0),
            index_entries_written_total: AtomicU64::new(0),
            index_full_total: AtomicU64::new(0),
            index_lookups_total: AtomicU64::new(0),
            index_lookup_misses_total: AtomicU64::new(0),
        }
    }

    // ==================== Counter Operations (Hot Path) ====================

    /// Called on every successful `Store::append`.
    /// `bytes` includes the length prefix.
    #[inline]
    pub fn record_append(&self, bytes: u64) {
        self.records_appended_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Called on every successful `Store::read`.
    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.records_read_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_read_total.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_index_entries_written(&self) {
        self.index_entries_written_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_index_full(&self) {
        self.index_full_total.fetch_add(1, Ordering::Relaxed);
    }

    /// `hit` is false when the lookup ended in `EndOfData`.
    #[inline]
    pub fn record_index_lookup(&self, hit: bool) {
        self.index_lookups_total.fetch_add(1, Ordering::Relaxed);
        if !hit {
            self.index_lookup_misses_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ==================== Snapshot & Export ====================

    pub fn snapshot_counters(&self) -> StorageMetricsSnapshot {
        StorageMetricsSnapshot {
            records_appended_total: self.records_appended_total.load(Ordering::Relaxed),
            bytes_appended_total: self.bytes_appended_total.load(Ordering::Relaxed),
            records_read_total: self.records_read_total.load(Ordering::Relaxed),
            bytes_read_total: self.bytes_read_total.load(Ordering::Relaxed),
            index_entries_written_total: self.index_entries_written_total.load(Ordering::Relaxed),
            index_full_total: self.index_full_total.load(Ordering::Relaxed),
            index_lookups_total: self.index_lookups_total.load(Ordering::Relaxed),
            index_lookup_misses_total: self.index_lookup_misses_total.load(Ordering::Relaxed),
        }
    }

    /// Render counters in the Prometheus text exposition format.
    pub fn export_prometheus(&self) -> String {
        let s = self.snapshot_counters();
        let counters: [(&str, &str, u64); 8] = [
            ("records_appended_total", "Total number of records appended to stores", s.records_appended_total),
            ("bytes_appended_total", "Total bytes appended to stores, including length prefixes", s.bytes_appended_total),
            ("records_read_total", "Total number of records read from stores", s.records_read_total),
            ("bytes_read_total", "Total payload bytes read from stores", s.bytes_read_total),
            ("index_entries_written_total", "Total number of index entries written", s.index_entries_written_total),
            ("index_full_total", "Total number of index writes rejected for lack of capacity", s.index_full_total),
            ("index_lookups_total", "Total number of index lookups", s.index_lookups_total),
            ("index_lookup_misses_total", "Total number of index lookups past the last entry", s.index_lookup_misses_total),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }
        output
    }
}

impl Default for StorageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageMetricsSnapshot {
    pub records_appended_total: u64,
    pub bytes_appended_total: u64,
    pub records_read_total: u64,
    pub bytes_read_total: u64,
    pub index_entries_written_total: u64,
    pub index_full_total: u64,
    pub index_lookups_total: u64,
    pub index_lookup_misses_total: u64,
}

lazy_static::lazy_static! {
    pub static ref METRICS: StorageMetrics = StorageMetrics::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments() {
        let m = StorageMetrics::new();

        m.record_append(19);
        m.record_append(19);
        assert_eq!(m.records_appended_total.load(Ordering::Relaxed), 2);
        assert_eq!(m.bytes_appended_total.load(Ordering::Relaxed), 38);

        m.record_index_lookup(true);
        m.record_index_lookup(false);
        assert_eq!(m.index_lookups_total.load(Ordering::Relaxed), 2);
        assert_eq!(m.index_lookup_misses_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_snapshot() {
        let m = StorageMetrics::new();

        m.record_read(11);
        m.inc_index_entries_written();
        m.inc_index_full();

        let snapshot = m.snapshot_counters();
        assert_eq!(snapshot.records_read_total, 1);
        assert_eq!(snapshot.bytes_read_total, 11);
        assert_eq!(snapshot.index_entries_written_total, 1);
        assert_eq!(snapshot.index_full_total, 1);
        assert_eq!(snapshot.records_appended_total, 0);
    }

    #[test]
    fn test_prometheus_export() {
        let m = StorageMetrics::new();

        m.record_append(57);

        let export = m.export_prometheus();
        assert!(export.contains("records_appended_total 1"));
        assert!(export.contains("bytes_appended_total 57"));
        assert!(export.contains("# HELP index_full_total"));
        assert!(export.contains("# TYPE index_full_total counter"));
    }
}

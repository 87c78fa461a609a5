/// Storage-level errors.
/// These represent failures in the record store and offset index.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Read past the logical end of a store, or of an index entry that has
    /// not been written yet.
    #[error("end of data")]
    EndOfData,

    #[error("index full: capacity {capacity} bytes")]
    IndexFull { capacity: u64 },

    #[error("corrupted index: size {size}: {reason}")]
    CorruptIndex { size: u64, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Normal "no more data" boundary, as opposed to a hard failure.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, StorageError::EndOfData)
    }

    /// The index has no remaining capacity; the owning segment should roll.
    pub fn is_index_full(&self) -> bool {
        matches!(self, StorageError::IndexFull { .. })
    }

    /// Short reads from the OS surface as `EndOfData`, everything else stays `Io`.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            StorageError::EndOfData
        } else {
            StorageError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_unexpected_eof_maps_to_end_of_data() {
        let err = StorageError::from_read(io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
        assert!(err.is_end_of_data());

        let err = StorageError::from_read(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn test_index_full_display() {
        let err = StorageError::IndexFull { capacity: 1024 };
        assert!(err.is_index_full());
        assert_eq!(err.to_string(), "index full: capacity 1024 bytes");
    }
}

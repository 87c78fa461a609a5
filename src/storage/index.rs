use crate::config::Config;
use crate::error::{Result, StorageError};
use crate::metrics::METRICS;
use crate::storage::format::{Format, ENT_WIDTH};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which entry `Index::read` should resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The entry at this relative offset (entry number).
    Offset(u32),
    /// The most recently written entry.
    Latest,
}

impl From<u32> for Lookup {
    fn from(offset: u32) -> Self {
        Lookup::Offset(offset)
    }
}

/// Bounds-checked view over the writable index mapping.
///
/// Every access goes through `get`/`put`, which return `None`/`false`
/// instead of indexing out of range.
struct EntryRegion {
    mmap: MmapMut,
}

impl EntryRegion {
    fn capacity(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn get(&self, at: u64) -> Option<&[u8]> {
        let start = usize::try_from(at).ok()?;
        let end = start.checked_add(ENT_WIDTH as usize)?;
        self.mmap.get(start..end)
    }

    fn put(&mut self, at: u64, entry: &[u8; ENT_WIDTH as usize]) -> bool {
        let Ok(start) = usize::try_from(at) else {
            return false;
        };
        let Some(end) = start.checked_add(ENT_WIDTH as usize) else {
            return false;
        };
        match self.mmap.get_mut(start..end) {
            Some(slot) => {
                slot.copy_from_slice(entry);
                true
            }
            None => false,
        }
    }
}

/// The backing file plus the logical size it must be truncated to.
///
/// Dropped after the mapping (field order in `Index`), so the file is only
/// ever shrunk once nothing maps it.
struct IndexFile {
    file: File,
    path: PathBuf,

    /// Logical size: bytes of valid entries. Always a multiple of 12.
    size: u64,

    /// Set once `truncate` has run; drop then has nothing left to do.
    truncated: bool,
}

impl IndexFile {
    fn truncate(&mut self) -> Result<()> {
        self.file.set_len(self.size)?;
        self.truncated = true;
        Ok(())
    }
}

impl Drop for IndexFile {
    fn drop(&mut self) {
        if self.truncated {
            return;
        }
        if let Err(e) = self.truncate() {
            warn!(path = %self.path.display(), error = %e, "failed to truncate index on drop");
        }
    }
}

/// Grow `file` to `capacity` and map it.
///
/// If mapping fails the file is put back to `size`, so the next open still
/// recovers the same logical size.
fn preallocate_and_map<F>(file: &File, size: u64, capacity: u64, map: F) -> Result<MmapMut>
where
    F: FnOnce(&File) -> io::Result<MmapMut>,
{
    file.set_len(capacity)?;

    match map(file) {
        Ok(mmap) => Ok(mmap),
        Err(e) => {
            if let Err(restore) = file.set_len(size) {
                warn!(size, error = %restore, "failed to restore index length after map failure");
            }
            Err(StorageError::Io(e))
        }
    }
}

/// An Index maps relative offsets to record positions in the segment store.
///
/// Responsibilities:
/// - Own a `.index` file on disk, pre-allocated to the configured capacity
/// - Map the whole file read/write and append fixed-width entries through
///   the mapping
/// - Resolve an offset to its store position in O(1)
/// - Truncate the file back to its logical size on close
///
/// NOT responsible for:
/// - Reading store data
/// - Growing the mapping (a full index means the segment must roll)
/// - Deciding which offsets get written
///
/// ## On-disk format:
/// File name: `<base_offset>.index`
///
/// Each entry is exactly 12 bytes:
/// ```text
/// | offset: u32 | position: u64 |
/// | 4 bytes     | 8 bytes       |
/// ```
///
/// Entry `k` lives at byte `k * 12`. While open, the file is as large as the
/// configured capacity and only the first `size` bytes are meaningful.
/// After `close` the file is exactly `size` bytes, which is what lets the
/// next `open` recover `size` from file metadata.
///
/// ## Ownership:
/// - Index owns the file handle and mapping exclusively
/// - Not Sync-safe for writers: `write` takes `&mut self`
/// - Callers sharing an Index across threads wrap it in a lock
/// - Dropping an open Index truncates the file like `close`, without the
///   explicit sync
pub struct Index {
    // Field order matters: the mapping must be dropped before the file is
    // truncated.
    region: EntryRegion,
    file: IndexFile,
    format: Format,
}

impl Index {
    /// Open or create an index file at the given path.
    ///
    /// # Errors
    /// - `InvalidConfig` if the capacity cannot hold one entry
    /// - `CorruptIndex` if the existing file is not a whole number of
    ///   entries or is larger than the configured capacity
    /// - I/O errors opening, truncating or mapping the file
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        Self::from_file(file, path, config)
    }

    /// Build an index over an already opened file.
    ///
    /// `file` must be opened for reading and writing.
    pub fn from_file(file: File, path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let capacity = config.segment.max_index_bytes;

        let size = file.metadata()?.len();

        if size % ENT_WIDTH != 0 {
            return Err(StorageError::CorruptIndex {
                size,
                reason: format!("not a multiple of the {} byte entry width", ENT_WIDTH),
            });
        }
        if size > capacity {
            return Err(StorageError::CorruptIndex {
                size,
                reason: format!("larger than configured capacity {}", capacity),
            });
        }

        // SAFETY: the file is owned by this Index, was just sized to
        // `capacity` and is not resized again until the mapping has been
        // dropped (see the field order of `Index`). External modification
        // of index files while they are open is not supported.
        let mmap = preallocate_and_map(&file, size, capacity, |f| unsafe { MmapMut::map_mut(f) })?;

        debug!(path = %path.display(), size, capacity, "opened index");

        Ok(Index {
            region: EntryRegion { mmap },
            file: IndexFile {
                file,
                path: path.to_path_buf(),
                size,
                truncated: false,
            },
            format: Format::BIG_ENDIAN,
        })
    }

    /// Append an entry mapping `offset` to store `position`.
    ///
    /// # Errors
    /// - `IndexFull` if another entry does not fit in the mapping
    pub fn write(&mut self, offset: u32, position: u64) -> Result<()> {
        let capacity = self.region.capacity();
        let size = self.file.size;

        let entry = self.format.encode_entry(offset, position);
        if size + ENT_WIDTH > capacity || !self.region.put(size, &entry) {
            METRICS.inc_index_full();
            warn!(path = %self.file.path.display(), size, capacity, "index full");
            return Err(StorageError::IndexFull { capacity });
        }
        self.file.size += ENT_WIDTH;

        METRICS.inc_index_entries_written();
        Ok(())
    }

    /// Resolve an entry to its `(offset, position)` pair.
    ///
    /// Accepts a `u32` offset or `Lookup::Latest`.
    ///
    /// ## Example:
    /// ```text
    /// Index contains: [(0, 0), (1, 19), (2, 38)]
    ///
    /// read(1)              → (1, 19)
    /// read(Lookup::Latest) → (2, 38)
    /// read(3)              → EndOfData
    /// ```
    ///
    /// # Errors
    /// - `EndOfData` if the index is empty or the entry has not been
    ///   written. Bounds are checked against the logical size, never the
    ///   pre-allocated capacity.
    pub fn read(&self, lookup: impl Into<Lookup>) -> Result<(u32, u64)> {
        let result = self.resolve(lookup.into());
        METRICS.record_index_lookup(result.is_ok());
        result
    }

    fn resolve(&self, lookup: Lookup) -> Result<(u32, u64)> {
        let size = self.file.size;
        if size == 0 {
            return Err(StorageError::EndOfData);
        }

        let entry_index = match lookup {
            Lookup::Offset(offset) => u64::from(offset),
            Lookup::Latest => size / ENT_WIDTH - 1,
        };

        let at = entry_index * ENT_WIDTH;
        if at + ENT_WIDTH > size {
            return Err(StorageError::EndOfData);
        }

        self.region
            .get(at)
            .and_then(|bytes| self.format.decode_entry(bytes))
            .ok_or(StorageError::EndOfData)
    }

    /// Flush the mapping and sync the file to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.region.mmap.flush()?;
        self.file.file.sync_all()?;
        Ok(())
    }

    /// Sync, unmap, truncate the file to its logical size and close it.
    pub fn close(self) -> Result<()> {
        self.sync()?;

        let Index { region, mut file, .. } = self;

        // Unmap before shrinking the file under it.
        drop(region);
        file.truncate()?;

        debug!(path = %file.path.display(), size = file.size, "closed index");
        Ok(())
    }

    /// Logical size in bytes.
    pub fn size(&self) -> u64 {
        self.file.size
    }

    /// Number of entries written.
    pub fn entries(&self) -> u64 {
        self.file.size / ENT_WIDTH
    }

    /// Pre-allocated capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.region.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.file.size == 0
    }

    /// True when the next `write` would fail with `IndexFull`.
    pub fn is_full(&self) -> bool {
        self.file.size + ENT_WIDTH > self.capacity()
    }

    /// Path of the backing file.
    pub fn name(&self) -> &Path {
        &self.file.path
    }
}

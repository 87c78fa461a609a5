use crate::error::{Result, StorageError};
use crate::metrics::METRICS;
use crate::storage::format::{Format, LEN_WIDTH};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Outcome of a successful `Store::append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    /// Bytes written, length prefix included.
    pub bytes_written: u64,
    /// Position of the record's length prefix in the store.
    pub position: u64,
}

/// A Store is the append-only record file of one segment.
///
/// Responsibilities:
/// - Own a `.store` file on disk
/// - Append length-prefixed records through a write buffer
/// - Read a record back by position, or raw bytes by absolute offset
/// - Track the logical size of the file
///
/// NOT responsible for:
/// - Offset assignment (the index and the segment own that)
/// - Rolling or retention
/// - Interpreting payloads
///
/// ## On-disk format:
/// ```text
/// | length: u64 | payload: [u8; length] | length: u64 | payload ... |
/// ```
/// No padding, trailer or checksum.
///
/// ## Thread safety:
/// Store is `Sync`. `append`, `read` and `read_at` take the same mutex for
/// their whole duration, so a reader never sees a length prefix without
/// its payload. Every read flushes the write buffer first.
pub struct Store {
    path: PathBuf,
    format: Format,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    /// Buffered append handle. `get_ref()` is used for positional reads.
    writer: BufWriter<File>,

    /// Logical size in bytes, length prefixes included.
    /// Equals the file length once the buffer is flushed.
    size: u64,
}

impl Store {
    /// Open or create a store file at the given path.
    ///
    /// Existing content is kept and `size` starts at the current file
    /// length, so a store closed cleanly reopens with the same size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let size = file.metadata()?.len();

        debug!(path = %path.display(), size, "opened store");

        Ok(Store {
            path: path.to_path_buf(),
            format: Format::BIG_ENDIAN,
            inner: Mutex::new(StoreInner {
                writer: BufWriter::new(file),
                size,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Append a record at the end of the store.
    ///
    /// Writes the 8-byte length of `payload` followed by `payload`.
    /// A failed write is not rolled back; the segment should treat it as
    /// fatal.
    pub fn append(&self, payload: &[u8]) -> Result<Appended> {
        let mut inner = self.lock()?;

        let position = inner.size;
        let len = payload.len() as u64;

        inner.writer.write_all(&self.format.encode_len(len))?;
        inner.writer.write_all(payload)?;

        let bytes_written = self.format.record_width(len);
        inner.size += bytes_written;

        METRICS.record_append(bytes_written);

        Ok(Appended {
            bytes_written,
            position,
        })
    }

    /// Read the record whose length prefix starts at `pos`.
    ///
    /// # Errors
    /// - `EndOfData` if `pos` or the record it announces runs past the
    ///   logical end of the store
    /// - I/O errors during flush or read
    pub fn read(&self, pos: u64) -> Result<Vec<u8>> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;

        let payload_start = pos.checked_add(LEN_WIDTH).ok_or(StorageError::EndOfData)?;
        if payload_start > inner.size {
            return Err(StorageError::EndOfData);
        }

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        read_exact_at(inner.writer.get_ref(), &mut len_buf, pos).map_err(StorageError::from_read)?;
        let len = self.format.decode_len(len_buf);

        // Bounds-check before allocating: a bad prefix must not turn into a
        // huge allocation.
        match payload_start.checked_add(len) {
            Some(end) if end <= inner.size => {}
            _ => return Err(StorageError::EndOfData),
        }
        let len_usize = usize::try_from(len).map_err(|_| StorageError::EndOfData)?;

        let mut payload = vec![0u8; len_usize];
        read_exact_at(inner.writer.get_ref(), &mut payload, payload_start)
            .map_err(StorageError::from_read)?;

        METRICS.record_read(len);

        Ok(payload)
    }

    /// Raw positional read at an absolute byte offset. Framing is not
    /// interpreted.
    ///
    /// Returns the number of bytes read, which is short only when the read
    /// reaches the logical end of the store.
    ///
    /// # Errors
    /// - `EndOfData` if `offset` is at or past the logical end
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;

        if buf.is_empty() {
            return Ok(0);
        }
        if offset >= inner.size {
            return Err(StorageError::EndOfData);
        }

        let available = inner.size - offset;
        let want = usize::try_from(available).map_or(buf.len(), |a| a.min(buf.len()));

        read_exact_at(inner.writer.get_ref(), &mut buf[..want], offset)
            .map_err(StorageError::from_read)?;

        Ok(want)
    }

    /// Flush buffered appends and sync file data to stable storage.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;
        inner.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Logical size in bytes, buffered appends included.
    pub fn size(&self) -> Result<u64> {
        Ok(self.lock()?.size)
    }

    /// Path of the backing file.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Streaming reader over the raw store bytes, from position 0 to the
    /// logical end at the time of each read.
    pub fn reader(&self) -> StoreReader<'_> {
        StoreReader { store: self, pos: 0 }
    }

    /// Flush, sync and close the store.
    ///
    /// Dropping a Store without calling `close` still flushes the write
    /// buffer, but errors are lost and nothing is synced.
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner().map_err(|_| StorageError::LockPoisoned)?;
        let size = inner.size;

        let file = inner
            .writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?;
        file.sync_all()?;

        debug!(path = %self.path.display(), size, "closed store");
        Ok(())
    }
}

/// Sequential `Read` adapter over a `Store`, built on `Store::read_at`.
pub struct StoreReader<'a> {
    store: &'a Store,
    pos: u64,
}

impl StoreReader<'_> {
    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for StoreReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.store.read_at(buf, self.pos) {
            Ok(n) => {
                self.pos += n as u64;
                Ok(n)
            }
            Err(StorageError::EndOfData) => Ok(0),
            Err(StorageError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

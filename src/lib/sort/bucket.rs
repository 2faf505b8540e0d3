//! Bucket store: one append-only temp file plus write buffer per radix bucket.
//!
//! A bucket is written sequentially while the engine is accepting records,
//! then reopened and read sequentially exactly once. The file holds a raw
//! concatenation of fixed-width record images with no header or footer.
//!
//! The file handle lives in a [`Handle`] state so that closing twice, or
//! closing a bucket that was never reopened, is a no-op; the underlying
//! [`File`] is released when it is replaced or when the bucket is dropped.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::{DiskSortError, Result};
use crate::sort::config::bucket_path;
use crate::sort::record::Record;

#[derive(Debug)]
enum Handle {
    Writing(File),
    Reading(File),
    Closed,
}

/// A single disk-backed partition.
#[derive(Debug)]
pub struct Bucket {
    index: usize,
    path: PathBuf,
    buffer: Vec<u8>,
    capacity: usize,
    num_records: u64,
    bytes_on_disk: u64,
    flushes: u64,
    handle: Handle,
}

impl Bucket {
    /// Create (or truncate) the backing file for bucket `index`.
    pub fn create(prefix: &Path, index: usize, capacity: usize) -> Result<Self> {
        let path = bucket_path(prefix, index);
        let file = File::create(&path).map_err(|e| DiskSortError::io("create", &path, e))?;
        Ok(Self {
            index,
            path,
            buffer: Vec::with_capacity(capacity),
            capacity,
            num_records: 0,
            bytes_on_disk: 0,
            flushes: 0,
            handle: Handle::Writing(file),
        })
    }

    /// Append one serialized record image.
    ///
    /// The buffer is flushed first if `bytes` would not fit in what remains of it.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.slot(bytes.len())?.copy_from_slice(bytes);
        self.num_records += 1;
        Ok(())
    }

    /// Serialize `record` directly into the write buffer.
    pub fn push<T: Record>(&mut self, record: &T) -> Result<()> {
        let slot = self.slot(T::DISK_SIZE)?;
        let written = record.write_to(slot);
        debug_assert_eq!(written, T::DISK_SIZE, "record wrote {written} of {} bytes", T::DISK_SIZE);
        self.num_records += 1;
        Ok(())
    }

    /// Reserve `len` bytes at the end of the buffer, flushing beforehand if needed.
    fn slot(&mut self, len: usize) -> Result<&mut [u8]> {
        if len > self.capacity {
            return Err(DiskSortError::InvalidParameter {
                parameter: "write_buffer_size".to_string(),
                reason: format!("{} bytes cannot hold a {len}-byte record", self.capacity),
            });
        }
        if self.buffer.len() + len > self.capacity {
            self.flush()?;
        }
        let start = self.buffer.len();
        self.buffer.resize(start + len, 0);
        Ok(&mut self.buffer[start..])
    }

    /// Write any buffered bytes to the file.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let Handle::Writing(file) = &mut self.handle else {
            return Err(DiskSortError::io(
                "write",
                &self.path,
                std::io::Error::other("bucket is not open for writing"),
            ));
        };
        file.write_all(&self.buffer).map_err(|e| DiskSortError::io("write", &self.path, e))?;
        self.bytes_on_disk += self.buffer.len() as u64;
        self.flushes += 1;
        self.buffer.clear();
        Ok(())
    }

    /// Flush the remaining buffer and release the write handle.
    ///
    /// The file is not fsynced; the bytes only need to be visible to the
    /// reopened read handle.
    pub fn finish(&mut self) -> Result<()> {
        self.flush()?;
        if let Handle::Writing(file) = &mut self.handle {
            file.flush().map_err(|e| DiskSortError::io("flush", &self.path, e))?;
        }
        self.close();
        debug!(
            "Bucket {} finished: {} records, {} bytes, {} flushes",
            self.index, self.num_records, self.bytes_on_disk, self.flushes
        );
        Ok(())
    }

    /// Close whatever handle is open and open a fresh read handle at offset 0.
    pub fn reopen_for_read(&mut self) -> Result<()> {
        self.close();
        let file = File::open(&self.path).map_err(|e| DiskSortError::io("open", &self.path, e))?;
        self.handle = Handle::Reading(file);
        Ok(())
    }

    /// Fill `buf` completely from the read handle.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let Handle::Reading(file) = &mut self.handle else {
            return Err(DiskSortError::io(
                "read",
                &self.path,
                std::io::Error::other("bucket is not open for reading"),
            ));
        };
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(DiskSortError::ShortRead {
                        path: self.path.clone(),
                        expected: buf.len(),
                        actual: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(DiskSortError::io("read", &self.path, e)),
            }
        }
        Ok(())
    }

    /// Release the open handle, if any. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.handle = Handle::Closed;
    }

    /// Close the bucket and delete its backing file.
    pub fn remove(mut self) -> Result<()> {
        self.close();
        remove_bucket_file(&self.path)
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.num_records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_records == 0
    }

    /// Total bytes appended, flushed or not.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        self.bytes_on_disk + self.buffer.len() as u64
    }

    /// Bytes waiting in the write buffer.
    #[cfg(test)]
    fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Number of buffer flushes that wrote data to the file.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        !matches!(self.handle, Handle::Closed)
    }
}

/// Delete a bucket file; a file that is already gone counts as removed.
pub fn remove_bucket_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DiskSortError::io("remove", path, e)),
    }
}

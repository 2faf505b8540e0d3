//! Engine configuration.

use std::path::{Path, PathBuf};

use crate::errors::{DiskSortError, Result};
use crate::sort::record::Record;
use crate::validation::{validate_positive, validate_range};

/// Default per-bucket write buffer (1 MiB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Records read per chunk when a bucket is streamed back into memory.
pub const DEFAULT_READ_CHUNK_RECORDS: usize = 65_536;

/// Upper bound on `log_num_buckets`; every bucket owns an open file while writing.
pub const MAX_LOG_NUM_BUCKETS: u32 = 24;

/// Configuration for a [`DiskSort`](crate::sort::DiskSort).
///
/// # Example
///
/// ```
/// use disksort_lib::sort::DiskSortConfig;
///
/// let config = DiskSortConfig::new(32, 8, "/tmp/run1")
///     .threads(8)
///     .write_buffer_size(256 * 1024);
/// assert_eq!(config.num_buckets(), 256);
/// ```
#[derive(Clone, Debug)]
pub struct DiskSortConfig {
    /// Bit width of keys.
    pub key_size: u32,
    /// log2 of the number of buckets.
    pub log_num_buckets: u32,
    /// Worker fan-out for both the read and the sort stage.
    pub num_threads: usize,
    /// Bucket files are named `<file_prefix>.sort_bucket_<index>.tmp`.
    pub file_prefix: PathBuf,
    /// Bytes buffered per bucket before a write to disk.
    pub write_buffer_size: usize,
    /// Records per read call when materializing a bucket.
    pub read_chunk_records: usize,
    /// Refuse to materialize a bucket larger than this many bytes.
    pub max_bucket_bytes: Option<u64>,
    /// Items in flight per pool; defaults to `num_threads`.
    pub queue_depth: Option<usize>,
}

impl DiskSortConfig {
    /// Create a configuration with one thread and default buffer sizes.
    #[must_use]
    pub fn new(key_size: u32, log_num_buckets: u32, file_prefix: impl Into<PathBuf>) -> Self {
        Self {
            key_size,
            log_num_buckets,
            num_threads: 1,
            file_prefix: file_prefix.into(),
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            read_chunk_records: DEFAULT_READ_CHUNK_RECORDS,
            max_bucket_bytes: None,
            queue_depth: None,
        }
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set the per-bucket write buffer size in bytes.
    #[must_use]
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Set how many records are read per chunk during materialization.
    #[must_use]
    pub fn read_chunk_records(mut self, records: usize) -> Self {
        self.read_chunk_records = records;
        self
    }

    /// Cap the in-memory size of a single materialized bucket.
    #[must_use]
    pub fn max_bucket_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_bucket_bytes = limit;
        self
    }

    /// Set the in-flight item budget of each worker pool.
    #[must_use]
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn num_buckets(&self) -> usize {
        1usize << self.log_num_buckets
    }

    /// In-flight item budget of each worker pool.
    #[must_use]
    pub fn effective_queue_depth(&self) -> usize {
        self.queue_depth.unwrap_or(self.num_threads).max(1)
    }

    /// Path of the backing file for bucket `index`.
    #[must_use]
    pub fn bucket_path(&self, index: usize) -> PathBuf {
        bucket_path(&self.file_prefix, index)
    }

    /// Check the configuration against the record type it will sort.
    pub fn validate<T: Record>(&self) -> Result<()> {
        validate_range(self.key_size, 1..=64, "key_size")?;
        if self.log_num_buckets > self.key_size {
            return Err(invalid(
                "log_num_buckets",
                format!("{} exceeds key_size {}", self.log_num_buckets, self.key_size),
            ));
        }
        validate_range(self.log_num_buckets, 0..=MAX_LOG_NUM_BUCKETS, "log_num_buckets")?;
        validate_positive(self.num_threads, "num_threads")?;
        if T::DISK_SIZE == 0 {
            return Err(invalid("record", "records must occupy at least one byte".to_string()));
        }
        if self.write_buffer_size < T::DISK_SIZE {
            return Err(invalid(
                "write_buffer_size",
                format!("{} bytes cannot hold a {}-byte record", self.write_buffer_size, T::DISK_SIZE),
            ));
        }
        validate_positive(self.read_chunk_records, "read_chunk_records")?;
        if let Some(depth) = self.queue_depth {
            validate_positive(depth, "queue_depth")?;
        }
        if self.file_prefix.as_os_str().is_empty() {
            return Err(invalid("file_prefix", "must not be empty".to_string()));
        }
        Ok(())
    }
}

/// `<prefix>.sort_bucket_<index>.tmp`
#[must_use]
pub fn bucket_path(prefix: &Path, index: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".sort_bucket_{index}.tmp"));
    PathBuf::from(name)
}

fn invalid(parameter: &str, reason: String) -> DiskSortError {
    DiskSortError::InvalidParameter { parameter: parameter.to_string(), reason }
}

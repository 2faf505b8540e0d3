//! Custom error types for disksort operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::sort::engine::SortState;

/// Result type alias for disksort operations
pub type Result<T> = std::result::Result<T, DiskSortError>;

/// Error type for disksort operations
#[derive(Error, Debug)]
pub enum DiskSortError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A file could not be opened, created, written, flushed, or removed
    #[error("Failed to {operation} '{}': {source}", path.display())]
    Io {
        /// What was being attempted (e.g. "create", "write")
        operation: &'static str,
        /// Path of the file involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A bucket file held fewer bytes than its record count requires
    #[error("Short read from '{}': expected {expected} bytes, got {actual}", path.display())]
    ShortRead {
        /// Path of the bucket file
        path: PathBuf,
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes actually available
        actual: usize,
    },

    /// The engine was used in a lifecycle state that does not permit the operation
    #[error("Cannot {operation} while the sorter is {state}")]
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// The state the engine was in
        state: SortState,
    },

    /// A key mapped outside the configured bucket range
    #[error("Key {key} maps to bucket {index}, but only {num_buckets} buckets exist")]
    BucketIndexOutOfRange {
        /// The extracted key
        key: u64,
        /// The computed bucket index
        index: u64,
        /// Number of configured buckets
        num_buckets: usize,
    },

    /// A bucket is larger than the configured in-memory limit
    #[error("Bucket {index} holds {bytes} bytes, exceeding the limit of {limit} bytes")]
    BucketTooLarge {
        /// Bucket index
        index: usize,
        /// Bytes stored in the bucket
        bytes: u64,
        /// Configured limit
        limit: u64,
    },

    /// A worker or consumer thread panicked
    #[error("{stage} worker panicked: {message}")]
    WorkerPanicked {
        /// Pipeline stage name
        stage: String,
        /// Panic payload, if it was a string
        message: String,
    },

    /// A pipeline thread could not be started
    #[error("Failed to start {stage} thread: {source}")]
    ThreadSpawn {
        /// Pipeline stage name
        stage: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A downstream stage stopped accepting items without reporting an error
    #[error("{stage} stage closed unexpectedly")]
    PipelineClosed {
        /// Pipeline stage name
        stage: String,
    },
}

impl DiskSortError {
    /// Wraps an I/O error with the operation and path it came from.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { operation, path: path.into(), source }
    }

    /// Returns true for programming-error conditions (as opposed to I/O or resource failures).
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::BucketIndexOutOfRange { .. })
    }
}

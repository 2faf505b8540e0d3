//! Disk-backed bucketed external sort.
//!
//! Sorts more fixed-size records than fit in memory by scattering them into
//! key-range buckets on disk and sorting one bucket at a time.
//!
//! # Architecture
//!
//! 1. **Write phase**: each record is routed by the top `log_num_buckets` bits
//!    of its key and appended to that bucket's buffered file
//! 2. **Finish**: every buffer is flushed; no further writes are accepted
//! 3. **Materialize**: buckets are streamed back in parallel and grouped by
//!    `key / block_size` into blocks ordered by quotient
//! 4. **Sort phase**: the blocks of each bucket are sorted in parallel and
//!    emitted, bucket by bucket, in ascending key order
//! 5. **Teardown**: bucket files are removed
//!
//! Memory use during the read phase is bounded by the buckets in flight, not by
//! the total input size.

pub mod bucket;
pub mod config;
pub mod engine;
pub mod materialize;
pub mod partition;
pub mod record;
pub mod stage;

pub use config::DiskSortConfig;
pub use engine::{DiskSort, ReadStats, SortState};
pub use record::{FixedRecord, KeyExtractor, PrefixKey, Record};
pub use stage::OutputBlock;

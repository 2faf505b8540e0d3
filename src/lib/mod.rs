#![deny(unsafe_code)]
// Clippy lint configuration for CI
// - cast_*: key, offset and byte-count arithmetic moves between u64 and usize
// - missing_*_doc: documentation improvements tracked separately
// - needless_pass_by_value: sinks and buckets are moved through pipeline stages
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # disksort - disk-backed bucketed external sort
//!
//! Sorts collections of fixed-size records that do not fit in memory, ordered
//! by an unsigned integer key of up to 64 bits.
//!
//! ## Overview
//!
//! - **[`sort`]** - the engine: records and keys, configuration, bucket files,
//!   partitioning, materialization and the parallel sort stage
//! - **[`pipeline`]** - order-preserving worker pools and sinks the engine is built from
//! - **[`errors`]** - the [`DiskSortError`](errors::DiskSortError) type
//! - **[`validation`]** - parameter checks with consistent messages
//! - **[`progress`]** / **[`logging`]** - progress and summary logging
//!
//! ## Quick Start
//!
//! ```
//! use disksort_lib::sort::{DiskSort, DiskSortConfig, FixedRecord, OutputBlock, PrefixKey};
//!
//! # fn main() -> disksort_lib::errors::Result<()> {
//! let dir = tempfile::TempDir::new().unwrap();
//! // 16-byte records keyed by their first 4 bytes, 256 buckets, 4 threads.
//! let config = DiskSortConfig::new(32, 8, dir.path().join("job")).threads(4);
//! let mut sorter = DiskSort::new(config, PrefixKey::new(4))?;
//!
//! for i in 0..10_000u32 {
//!     let mut bytes = [0u8; 16];
//!     bytes[..4].copy_from_slice(&i.wrapping_mul(2_654_435_761).to_be_bytes());
//!     sorter.add(&FixedRecord(bytes))?;
//! }
//! sorter.finish()?;
//!
//! let blocks = sorter.read(Vec::<OutputBlock<FixedRecord<16>>>::new(), 1 << 16)?;
//! let keys: Vec<u32> = blocks
//!     .iter()
//!     .flat_map(|b| &b.records)
//!     .map(|r| u32::from_be_bytes([r.0[0], r.0[1], r.0[2], r.0[3]]))
//!     .collect();
//! assert!(keys.windows(2).all(|w| w[0] <= w[1]));
//! sorter.teardown()?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod sort;
pub mod validation;

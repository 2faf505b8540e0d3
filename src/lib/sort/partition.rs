//! Radix partitioning: route a key to its bucket by the key's top bits.
//!
//! Bucket `i` holds keys in `[i << shift, (i + 1) << shift)` where
//! `shift = key_size - log_num_buckets`, so every key in bucket `i` is strictly
//! smaller than every key in bucket `i + 1`.

use crate::errors::{DiskSortError, Result};

/// Maps keys to bucket indices.
#[derive(Clone, Copy, Debug)]
pub struct RadixPartitioner {
    shift: u32,
    num_buckets: usize,
}

impl RadixPartitioner {
    /// Create a partitioner for `key_size`-bit keys spread over `2^log_num_buckets` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `log_num_buckets > key_size`; configurations are validated before this is built.
    #[must_use]
    pub fn new(key_size: u32, log_num_buckets: u32) -> Self {
        assert!(log_num_buckets <= key_size, "log_num_buckets must not exceed key_size");
        Self { shift: key_size - log_num_buckets, num_buckets: 1usize << log_num_buckets }
    }

    /// Bucket index for `key`.
    ///
    /// A key wider than `key_size` bits lands past the last bucket and is
    /// reported as [`DiskSortError::BucketIndexOutOfRange`].
    #[inline]
    pub fn route(&self, key: u64) -> Result<usize> {
        // A shift of 64 (key_size 64, one bucket) sends every key to bucket 0.
        let index = key.checked_shr(self.shift).unwrap_or(0);
        if index >= self.num_buckets as u64 {
            return Err(DiskSortError::BucketIndexOutOfRange {
                key,
                index,
                num_buckets: self.num_buckets,
            });
        }
        Ok(index as usize)
    }

    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Smallest key routed to `index`.
    #[cfg(test)]
    fn lower_bound(&self, index: usize) -> u64 {
        (index as u64).checked_shl(self.shift).unwrap_or(0)
    }
}

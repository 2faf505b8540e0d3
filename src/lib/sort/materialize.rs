//! Bucket materializer: stream a bucket file back into memory as ordered blocks.
//!
//! Records are grouped by `quotient = key / block_size`. Because the quotient is
//! monotonic in the key, emitting the groups in ascending quotient order and
//! sorting each group independently yields a fully sorted bucket, however
//! unevenly the records fall across groups. `block_size` only controls how
//! finely the bucket is split for the parallel sort stage.

use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::errors::{DiskSortError, Result};
use crate::sort::bucket::Bucket;
use crate::sort::record::{KeyExtractor, Record};

/// Initial capacity of the quotient table.
const INITIAL_GROUPS: usize = 4096;

/// One bucket's records, split into blocks ordered by ascending quotient.
#[derive(Debug)]
pub struct MaterializedBucket<T> {
    /// Index of the source bucket.
    pub index: usize,
    /// Unsorted blocks; every key in block `i` is smaller than every key in block `i + 1`.
    pub blocks: Vec<Vec<T>>,
}

impl<T> MaterializedBucket<T> {
    /// Total records across all blocks.
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }
}

/// Reads buckets back and regroups them by quotient key.
pub struct BucketMaterializer<K> {
    key: Arc<K>,
    block_size: u64,
    chunk_records: usize,
    max_bucket_bytes: Option<u64>,
}

impl<K> BucketMaterializer<K> {
    /// Create a materializer producing blocks of roughly `block_size` consecutive keys.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` or `chunk_records` is zero.
    #[must_use]
    pub fn new(key: Arc<K>, block_size: u64, chunk_records: usize, max_bucket_bytes: Option<u64>) -> Self {
        assert!(block_size > 0, "block_size must be positive");
        assert!(chunk_records > 0, "chunk_records must be positive");
        Self { key, block_size, chunk_records, max_bucket_bytes }
    }

    /// Read every record of `bucket` and return its blocks in quotient order.
    ///
    /// The whole bucket is held in memory at once; if `max_bucket_bytes` is set
    /// and the bucket is larger, this fails before reading anything.
    pub fn materialize<T>(&self, mut bucket: Bucket) -> Result<MaterializedBucket<T>>
    where
        T: Record,
        K: KeyExtractor<T>,
    {
        let bytes = bucket.byte_len();
        if let Some(limit) = self.max_bucket_bytes {
            if bytes > limit {
                return Err(DiskSortError::BucketTooLarge { index: bucket.index(), bytes, limit });
            }
        }

        bucket.reopen_for_read()?;
        let total = usize::try_from(bucket.len()).map_err(|_| DiskSortError::BucketTooLarge {
            index: bucket.index(),
            bytes,
            limit: usize::MAX as u64,
        })?;

        let mut table: AHashMap<u64, Vec<T>> = AHashMap::with_capacity(INITIAL_GROUPS.min(total));
        let mut chunk = vec![0u8; self.chunk_records.min(total) * T::DISK_SIZE];
        let mut done = 0;
        while done < total {
            let count = self.chunk_records.min(total - done);
            let buf = &mut chunk[..count * T::DISK_SIZE];
            bucket.read_exact(buf)?;
            for image in buf.chunks_exact(T::DISK_SIZE) {
                let record = T::read_from(image);
                let quotient = self.key.key(&record) / self.block_size;
                table.entry(quotient).or_default().push(record);
            }
            done += count;
        }
        bucket.close();

        let mut groups: Vec<(u64, Vec<T>)> = table.into_iter().collect();
        groups.sort_unstable_by_key(|(quotient, _)| *quotient);
        debug!("Bucket {} materialized: {total} records in {} blocks", bucket.index(), groups.len());

        Ok(MaterializedBucket {
            index: bucket.index(),
            blocks: groups.into_iter().map(|(_, block)| block).collect(),
        })
    }
}

//! Parallel sort stage: sort each block of a bucket by full key.
//!
//! Blocks are sorted concurrently on a shared executor but reach the sink in
//! the order the materializer produced them, which is what turns independently
//! sorted blocks into one sorted bucket.

use std::sync::Arc;

use rayon::ThreadPool;

use crate::errors::Result;
use crate::pipeline::pool::build_executor;
use crate::pipeline::{OrderedPool, Sink};
use crate::sort::materialize::MaterializedBucket;
use crate::sort::record::{KeyExtractor, Record};

const STAGE: &str = "disksort-sort";

/// A sorted run of records from one bucket.
///
/// `is_begin` marks the first block emitted for a bucket and `is_end` the last
/// (a bucket with a single block has both set). Consumers use the flags to find
/// bucket boundaries without knowing bucket sizes up front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBlock<T> {
    /// Index of the bucket the block came from.
    pub bucket: usize,
    /// Records in ascending key order.
    pub records: Vec<T>,
    pub is_begin: bool,
    pub is_end: bool,
}

/// Sorts the blocks of one bucket at a time with a fixed set of worker threads.
pub struct SortStage<K> {
    key: Arc<K>,
    executor: Arc<ThreadPool>,
    queue_depth: usize,
}

impl<K> SortStage<K> {
    /// Start `threads` sort workers, allowing `queue_depth` blocks in flight.
    pub fn new(key: Arc<K>, threads: usize, queue_depth: usize) -> Result<Self> {
        Ok(Self { key, executor: build_executor(STAGE, threads)?, queue_depth })
    }

    /// Sort every block of `bucket`, forwarding them to `sink` in block order.
    ///
    /// Returns the sink once the last block of the bucket has been accepted.
    pub fn sort_bucket<T, S>(&self, bucket: MaterializedBucket<T>, sink: S) -> Result<S>
    where
        T: Record,
        K: KeyExtractor<T>,
        S: Sink<OutputBlock<T>> + 'static,
    {
        let key = Arc::clone(&self.key);
        let mut pool = OrderedPool::with_executor(
            STAGE,
            Arc::clone(&self.executor),
            self.queue_depth,
            move |mut block: OutputBlock<T>| {
                block.records.sort_unstable_by_key(|record| key.key(record));
                Ok(block)
            },
            sink,
        )?;

        let last = bucket.blocks.len().saturating_sub(1);
        for (i, records) in bucket.blocks.into_iter().enumerate() {
            pool.submit(OutputBlock { bucket: bucket.index, records, is_begin: i == 0, is_end: i == last })?;
        }
        pool.wait()
    }
}

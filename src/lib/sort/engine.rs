//! The disk sort engine: lifecycle and read-phase orchestration.
//!
//! # Read pipeline
//!
//! ```text
//! ┌──────────────────┐   bucket order   ┌────────────────┐   block order   ┌──────┐
//! │ Materializers    │────────────────>│ Order consumer │───────────────>│ Sink │
//! │ (N read threads) │                  │ + sort workers │                 │      │
//! └──────────────────┘                  └────────────────┘                 └──────┘
//! ```
//!
//! Buckets are read and regrouped concurrently, handed to a single consumer
//! in ascending bucket index, and each bucket's blocks are sorted concurrently
//! and emitted in block order. Since bucket `i` only holds keys below those of
//! bucket `i + 1`, the concatenated output is globally ascending.

use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{debug, info};

use crate::errors::{DiskSortError, Result};
use crate::logging::{OperationTimer, format_count};
use crate::pipeline::{AsyncSink, OrderedPool, Sink};
use crate::sort::bucket::{Bucket, remove_bucket_file};
use crate::sort::config::DiskSortConfig;
use crate::sort::materialize::{BucketMaterializer, MaterializedBucket};
use crate::sort::partition::RadixPartitioner;
use crate::sort::record::{KeyExtractor, Record};
use crate::sort::stage::{OutputBlock, SortStage};

/// Lifecycle of a [`DiskSort`].
///
/// `Writing → Finished → Exhausted`, with `TornDown` reachable from any state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortState {
    /// Accepting records.
    Writing,
    /// Buffers flushed; ready to be read once.
    Finished,
    /// Read (successfully or not); only teardown remains.
    Exhausted,
    /// Bucket files removed.
    TornDown,
}

impl fmt::Display for SortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortState::Writing => "writing",
            SortState::Finished => "finished",
            SortState::Exhausted => "exhausted",
            SortState::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

/// Counts of what a read emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Non-empty buckets emitted.
    pub buckets: usize,
    /// Blocks emitted.
    pub blocks: u64,
    /// Records emitted.
    pub records: u64,
}

/// Disk-backed bucketed external sort.
///
/// # Example
///
/// ```
/// use disksort_lib::sort::{DiskSort, DiskSortConfig, OutputBlock};
///
/// # fn main() -> disksort_lib::errors::Result<()> {
/// let dir = tempfile::TempDir::new().unwrap();
/// let config = DiskSortConfig::new(16, 4, dir.path().join("run")).threads(2);
/// let mut sorter = DiskSort::new(config, |x: &u16| u64::from(*x))?;
///
/// for x in [900u16, 3, 65_000, 42] {
///     sorter.add(&x)?;
/// }
/// sorter.finish()?;
/// let blocks = sorter.read(Vec::<OutputBlock<u16>>::new(), 256)?;
/// let keys: Vec<u16> = blocks.into_iter().flat_map(|b| b.records).collect();
/// assert_eq!(keys, vec![3, 42, 900, 65_000]);
/// sorter.teardown()?;
/// # Ok(())
/// # }
/// ```
pub struct DiskSort<T, K> {
    config: DiskSortConfig,
    key: Arc<K>,
    partitioner: RadixPartitioner,
    buckets: Vec<Bucket>,
    bucket_lens: Vec<u64>,
    state: SortState,
    num_records: u64,
    retired_flushes: u64,
    read_stats: Option<ReadStats>,
    _record: PhantomData<fn() -> T>,
}

impl<T, K> DiskSort<T, K>
where
    T: Record,
    K: KeyExtractor<T>,
{
    /// Validate `config` and `key`, then create one empty file per bucket.
    ///
    /// If a bucket file cannot be created, the files created so far are removed.
    pub fn new(config: DiskSortConfig, key: K) -> Result<Self> {
        config.validate::<T>()?;
        <K as KeyExtractor<T>>::validate(&key)?;
        let num_buckets = config.num_buckets();

        let mut buckets = Vec::with_capacity(num_buckets);
        for index in 0..num_buckets {
            match Bucket::create(&config.file_prefix, index, config.write_buffer_size) {
                Ok(bucket) => buckets.push(bucket),
                Err(e) => {
                    for bucket in buckets {
                        let _ = bucket.remove();
                    }
                    return Err(e);
                }
            }
        }
        info!(
            "Created {num_buckets} buckets at {} ({}-bit keys, {} threads)",
            config.file_prefix.display(),
            config.key_size,
            config.num_threads
        );

        Ok(Self {
            partitioner: RadixPartitioner::new(config.key_size, config.log_num_buckets),
            key: Arc::new(key),
            buckets,
            bucket_lens: vec![0; num_buckets],
            state: SortState::Writing,
            num_records: 0,
            retired_flushes: 0,
            read_stats: None,
            config,
            _record: PhantomData,
        })
    }

    /// Append a record to its bucket.
    pub fn add(&mut self, record: &T) -> Result<()> {
        self.expect_state("add", SortState::Writing)?;
        let index = self.partitioner.route(self.key.key(record))?;
        self.buckets[index].push(record)?;
        self.bucket_lens[index] += 1;
        self.num_records += 1;
        Ok(())
    }

    /// Flush every bucket and stop accepting records.
    pub fn finish(&mut self) -> Result<()> {
        self.expect_state("finish", SortState::Writing)?;
        for bucket in &mut self.buckets {
            bucket.finish()?;
        }
        self.state = SortState::Finished;
        info!(
            "Finished writing {} records into {} buckets ({} flushes)",
            format_count(self.num_records),
            self.buckets.len(),
            self.flush_count()
        );
        Ok(())
    }

    /// Emit every record in ascending key order, as blocks, to `sink`.
    ///
    /// `block_size` is the width of the key range that makes up one block and
    /// only affects how finely each bucket is split for parallel sorting. The
    /// sink is handed back once the last block has been accepted.
    ///
    /// A read can happen once; afterwards (or after a failure) the engine is
    /// [`SortState::Exhausted`].
    pub fn read<S>(&mut self, sink: S, block_size: u64) -> Result<S>
    where
        S: Sink<OutputBlock<T>> + 'static,
    {
        self.expect_state("read", SortState::Finished)?;
        if block_size == 0 {
            return Err(DiskSortError::InvalidParameter {
                parameter: "block_size".to_string(),
                reason: "must be positive (> 0)".to_string(),
            });
        }
        self.state = SortState::Exhausted;
        let buckets = std::mem::take(&mut self.buckets);
        self.retired_flushes += buckets.iter().map(Bucket::flush_count).sum::<u64>();

        let timer = OperationTimer::new("Reading sorted buckets");
        let threads = self.config.num_threads;
        let depth = self.config.effective_queue_depth();

        let key = Arc::clone(&self.key);
        let consumer = AsyncSink::spawn(
            "disksort-order",
            1,
            move |rx: Receiver<MaterializedBucket<T>>| -> Result<CountingSink<S>> {
                let stage = SortStage::new(key, threads, depth)?;
                let mut sink = CountingSink::new(sink);
                for bucket in rx {
                    debug!("Sorting bucket {} ({} blocks)", bucket.index, bucket.blocks.len());
                    sink = stage.sort_bucket(bucket, sink)?;
                }
                Ok(sink)
            },
        )?;

        let materializer = BucketMaterializer::new(
            Arc::clone(&self.key),
            block_size,
            self.config.read_chunk_records,
            self.config.max_bucket_bytes,
        );
        let mut readers = OrderedPool::new(
            "disksort-read",
            threads,
            depth,
            move |bucket: Bucket| materializer.materialize::<T>(bucket),
            consumer,
        )?;
        for bucket in buckets {
            readers.submit(bucket)?;
        }
        debug!("Queued {} buckets for reading", readers.submitted());

        let (sink, stats) = readers.wait()?.wait()?.into_parts();
        timer.log_completion(stats.records);
        info!(
            "Emitted {} blocks from {} non-empty buckets",
            format_count(stats.blocks),
            stats.buckets
        );
        self.read_stats = Some(stats);
        Ok(sink)
    }

    /// Close and delete every bucket file. Safe to call in any state, and more than once.
    pub fn teardown(&mut self) -> Result<()> {
        for bucket in self.buckets.drain(..) {
            bucket.remove()?;
        }
        // Buckets handed to the read pipeline are gone; their files may remain.
        for index in 0..self.config.num_buckets() {
            remove_bucket_file(&self.config.bucket_path(index))?;
        }
        if self.state != SortState::TornDown {
            debug!("Removed {} bucket files", self.config.num_buckets());
        }
        self.state = SortState::TornDown;
        Ok(())
    }

    /// Bucket that `record` is (or would be) stored in.
    pub fn bucket_index(&self, record: &T) -> Result<usize> {
        self.partitioner.route(self.key.key(record))
    }
}

impl<T, K> DiskSort<T, K> {
    #[must_use]
    pub fn state(&self) -> SortState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &DiskSortConfig {
        &self.config
    }

    /// Records accepted by [`add`](Self::add).
    #[must_use]
    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.bucket_lens.len()
    }

    /// Records stored in bucket `index`, or `None` if there is no such bucket.
    #[must_use]
    pub fn bucket_len(&self, index: usize) -> Option<u64> {
        self.bucket_lens.get(index).copied()
    }

    /// Backing file of bucket `index`.
    #[must_use]
    pub fn bucket_path(&self, index: usize) -> PathBuf {
        self.config.bucket_path(index)
    }

    /// Buffer flushes performed across all buckets so far.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.retired_flushes + self.buckets.iter().map(Bucket::flush_count).sum::<u64>()
    }

    /// What the last successful [`read`](DiskSort::read) emitted.
    #[must_use]
    pub fn read_stats(&self) -> Option<ReadStats> {
        self.read_stats
    }

    fn expect_state(&self, operation: &'static str, expected: SortState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DiskSortError::InvalidState { operation, state: self.state })
        }
    }
}

/// Passes blocks through while tallying [`ReadStats`].
struct CountingSink<S> {
    inner: S,
    stats: ReadStats,
}

impl<S> CountingSink<S> {
    fn new(inner: S) -> Self {
        Self { inner, stats: ReadStats::default() }
    }

    fn into_parts(self) -> (S, ReadStats) {
        (self.inner, self.stats)
    }
}

impl<T, S> Sink<OutputBlock<T>> for CountingSink<S>
where
    T: Send,
    S: Sink<OutputBlock<T>>,
{
    fn accept(&mut self, block: OutputBlock<T>) -> Result<()> {
        if block.is_begin {
            self.stats.buckets += 1;
        }
        self.stats.blocks += 1;
        self.stats.records += block.records.len() as u64;
        self.inner.accept(block)
    }
}

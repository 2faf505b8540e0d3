//! Order-preserving parallel map.
//!
//! An [`OrderedPool`] applies a transform to each submitted item on a rayon
//! thread pool and forwards the results to a downstream [`Sink`] from a single
//! forwarding thread, in the order the items were submitted. Item `i` always
//! reaches the sink before item `i + 1`, even when `i + 1` finishes first.
//!
//! At most `queue_depth` items are in flight (submitted but not yet forwarded).
//! [`OrderedPool::submit`] blocks while that budget is exhausted, which is the
//! backpressure that keeps memory bounded when the sink is slower than the workers.
//!
//! ```
//! use disksort_lib::pipeline::OrderedPool;
//!
//! # fn main() -> disksort_lib::errors::Result<()> {
//! let mut pool = OrderedPool::new("square", 4, 8, |x: u64| Ok(x * x), Vec::<u64>::new())?;
//! for x in 0..100 {
//!     pool.submit(x)?;
//! }
//! let squares = pool.wait()?;
//! assert_eq!(squares, (0..100).map(|x| x * x).collect::<Vec<_>>());
//! # Ok(())
//! # }
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::debug;
use rayon::ThreadPool;

use super::reorder::ReorderBuffer;
use super::sink::Sink;
use super::{join_stage, panic_message};
use crate::errors::{DiskSortError, Result};

type Transform<I, O> = dyn Fn(I) -> Result<O> + Send + Sync;

/// Build a named rayon pool with `threads` workers.
pub fn build_executor(stage: &str, threads: usize) -> Result<Arc<ThreadPool>> {
    let name = stage.to_string();
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{name}-{i}"))
        .build()
        .map(Arc::new)
        .map_err(|e| DiskSortError::InvalidParameter {
            parameter: "threads".to_string(),
            reason: format!("could not start {stage} workers: {e}"),
        })
}

/// Parallel map whose outputs reach the sink in submission order.
pub struct OrderedPool<I, O, S> {
    stage: String,
    executor: Arc<ThreadPool>,
    transform: Arc<Transform<I, O>>,
    result_tx: Option<Sender<(u64, Result<O>)>>,
    permit_tx: Sender<()>,
    forwarder: Option<JoinHandle<Result<S>>>,
    submitted: u64,
}

impl<I, O, S> OrderedPool<I, O, S>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Sink<O> + 'static,
{
    /// Create a pool with its own `threads`-wide executor.
    pub fn new<F>(stage: &str, threads: usize, queue_depth: usize, transform: F, sink: S) -> Result<Self>
    where
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
    {
        let executor = build_executor(stage, threads)?;
        Self::with_executor(stage, executor, queue_depth, transform, sink)
    }

    /// Create a pool that schedules work on an existing executor.
    ///
    /// Several short-lived pools (one per bucket, say) can share one executor
    /// without respawning threads each time.
    pub fn with_executor<F>(
        stage: &str,
        executor: Arc<ThreadPool>,
        queue_depth: usize,
        transform: F,
        sink: S,
    ) -> Result<Self>
    where
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
    {
        let (result_tx, result_rx) = unbounded();
        let (permit_tx, permit_rx) = bounded(queue_depth.max(1));
        let forwarder = thread::Builder::new()
            .name(format!("{stage}-forward"))
            .spawn(move || forward(result_rx, permit_rx, sink))
            .map_err(|source| DiskSortError::ThreadSpawn { stage: stage.to_string(), source })?;

        Ok(Self {
            stage: stage.to_string(),
            executor,
            transform: Arc::new(transform),
            result_tx: Some(result_tx),
            permit_tx,
            forwarder: Some(forwarder),
            submitted: 0,
        })
    }

    /// Queue `item` for processing, blocking while the in-flight budget is used up.
    ///
    /// If a worker or the sink has already failed, that failure is returned here.
    pub fn submit(&mut self, item: I) -> Result<()> {
        if self.permit_tx.send(()).is_err() {
            return Err(self.forwarder_failure());
        }
        let Some(result_tx) = self.result_tx.clone() else {
            return Err(self.closed());
        };

        let seq = self.submitted;
        self.submitted += 1;
        let transform = Arc::clone(&self.transform);
        let stage = self.stage.clone();
        self.executor.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| transform(item))).unwrap_or_else(
                |payload| {
                    Err(DiskSortError::WorkerPanicked { stage, message: panic_message(payload) })
                },
            );
            // A closed channel means the forwarder already failed; it reports why.
            let _ = result_tx.send((seq, result));
        });
        Ok(())
    }

    /// Queue a copy of `item`.
    pub fn submit_copy(&mut self, item: &I) -> Result<()>
    where
        I: Clone,
    {
        self.submit(item.clone())
    }

    /// Number of items submitted so far.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Wait until every submitted item has been forwarded, then return the sink.
    pub fn wait(mut self) -> Result<S> {
        drop(self.result_tx.take());
        let forwarder = self.forwarder.take();
        let stage = std::mem::take(&mut self.stage);
        debug!("{stage}: waiting on {} items", self.submitted);
        match forwarder {
            Some(handle) => join_stage(&stage, handle),
            None => Err(DiskSortError::PipelineClosed { stage }),
        }
    }

    fn forwarder_failure(&mut self) -> DiskSortError {
        drop(self.result_tx.take());
        match self.forwarder.take().map(|handle| join_stage(&self.stage, handle)) {
            Some(Err(e)) => e,
            _ => self.closed(),
        }
    }

    fn closed(&self) -> DiskSortError {
        DiskSortError::PipelineClosed { stage: self.stage.clone() }
    }
}

impl<I, O, S> Drop for OrderedPool<I, O, S> {
    fn drop(&mut self) {
        drop(self.result_tx.take());
        if let Some(handle) = self.forwarder.take() {
            let _ = handle.join();
        }
    }
}

/// Forwarding loop: restore submission order and feed the sink.
fn forward<O, S: Sink<O>>(
    results: Receiver<(u64, Result<O>)>,
    permits: Receiver<()>,
    mut sink: S,
) -> Result<S> {
    let mut pending = ReorderBuffer::new();
    for (seq, result) in results {
        pending.insert(seq, result?);
        for item in pending.drain_ready() {
            sink.accept(item)?;
            // Every submitted item deposited a permit before it was scheduled.
            let _ = permits.try_recv();
        }
    }
    if pending.is_empty() {
        Ok(sink)
    } else {
        Err(DiskSortError::PipelineClosed { stage: format!("reorder (stuck at {})", pending.next_seq()) })
    }
}

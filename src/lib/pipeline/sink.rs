//! Downstream sinks and the single-consumer asynchronous sink thread.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};

use super::join_stage;
use crate::errors::{DiskSortError, Result};

/// Receives items one at a time from a pipeline stage.
///
/// A sink is only ever driven by one thread at a time, so implementations need
/// no internal synchronization; they must merely be movable between threads.
pub trait Sink<T>: Send {
    /// Accept the next item. An error aborts the stage feeding this sink.
    fn accept(&mut self, item: T) -> Result<()>;
}

impl<T: Send> Sink<T> for Vec<T> {
    fn accept(&mut self, item: T) -> Result<()> {
        self.push(item);
        Ok(())
    }
}

impl<T: Send> Sink<T> for Sender<T> {
    fn accept(&mut self, item: T) -> Result<()> {
        self.send(item).map_err(|_| DiskSortError::PipelineClosed { stage: "channel".to_string() })
    }
}

/// Adapts a closure into a [`Sink`].
pub struct FnSink<F>(pub F);

impl<T, F> Sink<T> for FnSink<F>
where
    F: FnMut(T) -> Result<()> + Send,
{
    fn accept(&mut self, item: T) -> Result<()> {
        (self.0)(item)
    }
}

/// A sink that hands items to a dedicated consumer thread over a bounded channel.
///
/// [`accept`](Sink::accept) blocks once `capacity` items are queued. The
/// consumer closure sees the items in exactly the order they were accepted and
/// its return value is handed back by [`AsyncSink::wait`].
pub struct AsyncSink<T, R> {
    stage: String,
    tx: Option<Sender<T>>,
    handle: Option<JoinHandle<Result<R>>>,
}

impl<T, R> AsyncSink<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Spawn the consumer thread.
    pub fn spawn<F>(stage: &str, capacity: usize, consume: F) -> Result<Self>
    where
        F: FnOnce(Receiver<T>) -> Result<R> + Send + 'static,
    {
        let (tx, rx) = bounded(capacity.max(1));
        let handle = thread::Builder::new()
            .name(stage.to_string())
            .spawn(move || consume(rx))
            .map_err(|source| DiskSortError::ThreadSpawn { stage: stage.to_string(), source })?;
        Ok(Self { stage: stage.to_string(), tx: Some(tx), handle: Some(handle) })
    }

    /// Close the queue and wait for the consumer to drain it.
    pub fn wait(mut self) -> Result<R> {
        drop(self.tx.take());
        match self.handle.take() {
            Some(handle) => join_stage(&self.stage, handle),
            None => Err(self.closed()),
        }
    }

    /// Collects the consumer's failure after it hung up on us.
    fn consumer_failure(&mut self) -> DiskSortError {
        drop(self.tx.take());
        match self.handle.take().map(|handle| join_stage(&self.stage, handle)) {
            Some(Err(e)) => e,
            _ => self.closed(),
        }
    }

    fn closed(&self) -> DiskSortError {
        DiskSortError::PipelineClosed { stage: self.stage.clone() }
    }
}

impl<T, R> Sink<T> for AsyncSink<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn accept(&mut self, item: T) -> Result<()> {
        let sent = match &self.tx {
            Some(tx) => tx.send(item).is_ok(),
            None => return Err(self.closed()),
        };
        if sent { Ok(()) } else { Err(self.consumer_failure()) }
    }
}

impl<T, R> Drop for AsyncSink<T, R> {
    fn drop(&mut self) {
        // Close the queue first so a consumer blocked on recv can exit.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

//! Threading primitives the sort engine is built from.
//!
//! # Architecture
//!
//! ```text
//!            submit(seq)            (seq, result)          in order
//!  caller ───────────────> workers ──────────────> reorder ─────────> Sink
//!     ▲     (N threads)                             (1 thread)          │
//!     └──────────────────── permit released ◄───────────────────────────┘
//! ```
//!
//! - [`OrderedPool`]: runs a transform on `N` worker threads and forwards results
//!   to a [`Sink`] in submission order, with a bounded number of items in flight.
//! - [`AsyncSink`]: a single consumer thread fed through a bounded queue.
//! - [`ReorderBuffer`]: the sequence-number buffer that restores submission order.

pub mod pool;
pub mod reorder;
pub mod sink;

use std::any::Any;
use std::thread::JoinHandle;

pub use pool::OrderedPool;
pub use reorder::ReorderBuffer;
pub use sink::{AsyncSink, FnSink, Sink};

use crate::errors::{DiskSortError, Result};

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Join a stage thread, turning a panic into [`DiskSortError::WorkerPanicked`].
pub(crate) fn join_stage<R>(stage: &str, handle: JoinHandle<Result<R>>) -> Result<R> {
    handle.join().map_err(|payload| DiskSortError::WorkerPanicked {
        stage: stage.to_string(),
        message: panic_message(payload),
    })?
}

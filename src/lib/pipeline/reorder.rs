//! Sequence-number reordering for results that complete out of order.
//!
//! Worker threads finish items in whatever order the scheduler allows. The
//! forwarding thread of an [`OrderedPool`](super::pool::OrderedPool) pushes each
//! result into a [`ReorderBuffer`] tagged with its submission sequence number
//! and only releases the contiguous prefix that starts at the next expected
//! sequence number.
//!
//! # Example
//!
//! ```
//! use disksort_lib::pipeline::ReorderBuffer;
//!
//! let mut buffer: ReorderBuffer<&str> = ReorderBuffer::new();
//! buffer.insert(1, "second");
//! assert_eq!(buffer.try_pop_next(), None);
//!
//! buffer.insert(0, "first");
//! let ready: Vec<_> = buffer.drain_ready().collect();
//! assert_eq!(ready, vec!["first", "second"]);
//! ```

use std::collections::VecDeque;

/// Holds items keyed by sequence number and releases them strictly in sequence.
///
/// Slot `i` of the internal deque holds the item for sequence `next_seq + i`, so
/// both insertion and release are O(1) amortized.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    slots: VecDeque<Option<T>>,
    next_seq: u64,
    count: usize,
}

impl<T> ReorderBuffer<T> {
    /// Create an empty buffer expecting sequence number 0 first.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: VecDeque::new(), next_seq: 0, count: 0 }
    }

    /// Store `item` under sequence number `seq`.
    ///
    /// # Panics
    ///
    /// Panics if `seq` was already released or is already buffered.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, seq: u64, item: T) {
        assert!(seq >= self.next_seq, "sequence {seq} was already released");
        let offset = (seq - self.next_seq) as usize;
        if self.slots.len() <= offset {
            self.slots.resize_with(offset + 1, || None);
        }
        assert!(self.slots[offset].is_none(), "duplicate sequence number {seq}");
        self.slots[offset] = Some(item);
        self.count += 1;
    }

    /// Release the item for the next expected sequence number, if it has arrived.
    #[must_use]
    pub fn try_pop_next(&mut self) -> Option<T> {
        if !self.can_pop() {
            return None;
        }
        let item = self.slots.pop_front().flatten()?;
        self.next_seq += 1;
        self.count -= 1;
        Some(item)
    }

    /// Iterate over every item that can be released right now.
    pub fn drain_ready(&mut self) -> DrainReady<'_, T> {
        DrainReady { buffer: self }
    }

    /// True if the next expected item is present.
    #[must_use]
    pub fn can_pop(&self) -> bool {
        self.slots.front().is_some_and(Option::is_some)
    }

    /// Number of items held (released items excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The sequence number that will be released next.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`ReorderBuffer::drain_ready`]; stops at the first gap.
pub struct DrainReady<'a, T> {
    buffer: &'a mut ReorderBuffer<T>,
}

impl<T> Iterator for DrainReady<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.try_pop_next()
    }
}

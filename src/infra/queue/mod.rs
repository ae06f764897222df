//! Bounded FIFO connecting frame producers (interrupt handlers, driver tasks)
//! to the node engine.
//!
//! The ring never blocks and never grows: a full queue drops the incoming item
//! and counts it. Every access runs inside an `embassy_sync` blocking mutex, so
//! the critical section is bounded by one slot copy.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};

/// Usage counters, snapshotted by [`FrameQueue::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueStats {
    /// Items currently stored.
    pub len: usize,
    /// Largest `len` ever observed.
    pub high_water_mark: usize,
    /// Successful enqueues.
    pub puts: u32,
    /// Successful dequeues.
    pub gets: u32,
    /// Items discarded because the queue was full.
    pub dropped: u32,
}

struct Ring<T, const N: usize> {
    slots: [Option<T>; N],
    head: usize,
    len: usize,
    stats: QueueStats,
}

impl<T, const N: usize> Ring<T, N> {
    const fn new() -> Self {
        Self {
            slots: [const { None }; N],
            head: 0,
            len: 0,
            stats: QueueStats {
                len: 0,
                high_water_mark: 0,
                puts: 0,
                gets: 0,
                dropped: 0,
            },
        }
    }

    fn push(&mut self, item: T) -> Result<(), T> {
        if self.len == N {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            return Err(item);
        }
        let tail = (self.head + self.len) % N;
        self.slots[tail] = Some(item);
        self.len += 1;
        self.stats.puts = self.stats.puts.wrapping_add(1);
        self.stats.high_water_mark = self.stats.high_water_mark.max(self.len);
        Ok(())
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        self.stats.gets = self.stats.gets.wrapping_add(1);
        item
    }
}

/// Fixed-capacity, drop-when-full queue guarded by a raw mutex `M`.
pub struct FrameQueue<M: RawMutex, T, const N: usize> {
    inner: Mutex<M, RefCell<Ring<T, N>>>,
}

impl<M: RawMutex, T, const N: usize> Default for FrameQueue<M, T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, T, const N: usize> FrameQueue<M, T, N> {
    /// Empty queue; usable in a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Ring::new())),
        }
    }

    /// Append `item`. On a full queue the item is handed back and counted as dropped.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let result = self.inner.lock(|ring| ring.borrow_mut().push(item));
        #[cfg(feature = "defmt")]
        if result.is_err() {
            defmt::warn!("Frame queue full, item dropped");
        }
        result
    }

    /// Remove the oldest item, `None` when empty.
    pub fn dequeue(&self) -> Option<T> {
        self.inner.lock(|ring| ring.borrow_mut().pop())
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|ring| ring.borrow().len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> QueueStats {
        self.inner.lock(|ring| {
            let ring = ring.borrow();
            QueueStats {
                len: ring.len,
                ..ring.stats
            }
        })
    }

    /// Drop every queued item; counters are kept.
    pub fn clear(&self) {
        self.inner.lock(|ring| {
            let mut ring = ring.borrow_mut();
            while ring.pop().is_some() {}
        })
    }
}

//! Unbounded FIFO shared between callers and the worker thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

/// Multi-producer FIFO drained by one consumer.
///
/// Clones share the same queue. [`push`](Self::push) never blocks on the
/// consumer; [`pop`](Self::pop) waits for an item or a stop signal. Items
/// left behind by a stopped consumer stay queued for the next one.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::AtomicBool;
/// use command_suggest_engine::TaskQueue;
///
/// let queue = TaskQueue::new();
/// queue.push("load");
/// queue.push("refresh");
///
/// let stop = AtomicBool::new(false);
/// assert_eq!(queue.pop(&stop), Some("load"));
/// assert_eq!(queue.len(), 1);
/// ```
#[derive(Debug)]
pub struct TaskQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item and wakes the consumer.
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
        self.inner.available.notify_one();
    }

    /// Takes the oldest item, waiting while the queue is empty.
    ///
    /// Returns `None` once `stop` is set, even if items remain.
    pub fn pop(&self, stop: &AtomicBool) -> Option<T> {
        let mut items = self.lock();
        loop {
            if stop.load(Ordering::Acquire) {
                return None;
            }
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            items = self
                .inner
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wakes every waiting consumer so it can observe a stop signal.
    pub fn wake_all(&self) {
        // Taking the lock orders this wake-up after any pending stop check.
        let _items = self.lock();
        self.inner.available.notify_all();
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

//! Bounded FIFO between the input reader and the worker pool.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::{watch, Notify};

/// Async FIFO with optional capacity and join semantics.
///
/// `join` resolves once every item that was `put` has been matched by a
/// `task_done` call.
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: Option<usize>,
    item_added: Notify,
    slot_freed: Notify,
    /// Mirror of `QueueState::unfinished`, only written while `state` is locked.
    unfinished: watch::Sender<usize>,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    unfinished: usize,
}

impl<T> WorkQueue<T> {
    /// `capacity == 0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        let (unfinished, _) = watch::channel(0);
        WorkQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            capacity: (capacity > 0).then_some(capacity),
            item_added: Notify::new(),
            slot_freed: Notify::new(),
            unfinished,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        match self.capacity {
            Some(cap) => self.lock().items.len() >= cap,
            None => false,
        }
    }

    /// Items handed out or queued but not yet marked done.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    /// Adds `item`, waiting while the queue is full.
    pub async fn put(&self, item: T) {
        let mut item = item;
        loop {
            let freed = self.slot_freed.notified();
            tokio::pin!(freed);
            freed.as_mut().enable();

            match self.try_put(item) {
                Ok(()) => return,
                Err(back) => item = back,
            }
            freed.await;
        }
    }

    /// Adds `item` without waiting. Gives it back when the queue is full.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if let Some(cap) = self.capacity {
            if state.items.len() >= cap {
                return Err(item);
            }
        }
        state.items.push_back(item);
        // Counted before the lock drops, so a consumer can never mark it done first.
        state.unfinished += 1;
        self.unfinished.send_replace(state.unfinished);
        let has_room = self.capacity.map_or(true, |cap| state.items.len() < cap);
        drop(state);

        self.item_added.notify_one();
        if has_room {
            // Another producer may be parked on a slot that is still free.
            self.slot_freed.notify_one();
        }
        Ok(())
    }

    /// Removes the oldest item, waiting while the queue is empty.
    pub async fn get(&self) -> T {
        loop {
            let added = self.item_added.notified();
            tokio::pin!(added);
            added.as_mut().enable();

            if let Some(item) = self.try_get() {
                return item;
            }
            added.await;
        }
    }

    pub fn try_get(&self) -> Option<T> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        let more = !state.items.is_empty();
        drop(state);

        self.slot_freed.notify_one();
        if more {
            self.item_added.notify_one();
        }
        Some(item)
    }

    /// Marks one previously fetched item as processed.
    ///
    /// Calling it more often than items were put is a caller bug: it panics in
    /// debug builds and is ignored in release builds.
    pub fn task_done(&self) {
        let mut state = self.lock();
        debug_assert!(state.unfinished > 0, "task_done called more times than put");
        if state.unfinished == 0 {
            return;
        }
        state.unfinished -= 1;
        self.unfinished.send_replace(state.unfinished);
    }

    /// Waits until every queued item has been marked done.
    pub async fn join(&self) {
        let mut rx = self.unfinished.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

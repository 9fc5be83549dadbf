//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// Bounded multi-producer event queue with drop-oldest overflow policy.
///
/// Producers run in link-driver context and must never block; `push` is
/// synchronous and, when the queue is full, evicts the oldest entry to make
/// room. The single consumer awaits `pop`.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
}

// ===== impl BoundedQueue =====

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> BoundedQueue<T> {
        assert!(capacity > 0);
        BoundedQueue {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    /// Appends an entry, evicting the oldest one when full.
    ///
    /// Returns whether an entry was dropped.
    pub fn push(&self, entry: T) -> bool {
        let dropped;
        {
            let mut queue = self.queue.lock().unwrap();
            dropped = queue.len() == self.capacity;
            if dropped {
                queue.pop_front();
            }
            queue.push_back(entry);
        }
        self.notify.notify_one();
        dropped
    }

    /// Removes and returns the oldest entry, if any.
    pub fn try_pop(&self) -> Option<T> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Removes and returns the oldest entry, waiting for one if the queue
    /// is empty.
    pub async fn pop(&self) -> T {
        loop {
            let notified = self.notify.notified();
            if let Some(entry) = self.queue.lock().unwrap().pop_front() {
                return entry;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

// ===== tests =====

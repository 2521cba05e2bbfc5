//! Fixed-capacity FIFO shared by one producer and one consumer thread.
//!
//! A push on a full queue evicts an element instead of blocking the producer,
//! so the length never exceeds capacity. The consumer waits on a condition
//! variable with a timeout.

use std::collections::VecDeque;
use std::sync::{
    Condvar, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;

pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Appends `item`. Returns the evicted oldest element when full, or
    /// gives `item` back if the queue is closed.
    pub fn push(&self, item: T) -> Result<Option<T>, T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(item);
        }
        let Ok(mut q) = self.items.lock() else {
            return Err(item);
        };
        let evicted = if q.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            q.pop_front()
        } else {
            None
        };
        q.push_back(item);
        drop(q);
        self.ready.notify_one();
        Ok(evicted)
    }

    /// Puts an element back at the head, e.g. a packet that could not be
    /// sent this tick or a retransmission. On a full queue the newest
    /// element is evicted from the tail and returned.
    pub fn push_front(&self, item: T) -> Option<T> {
        let Ok(mut q) = self.items.lock() else {
            return None;
        };
        let evicted = if q.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            q.pop_back()
        } else {
            None
        };
        q.push_front(item);
        drop(q);
        self.ready.notify_one();
        evicted
    }

    /// Waits up to `timeout` for an element.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let q = self.items.lock().ok()?;
        let (mut q, _) = self
            .ready
            .wait_timeout_while(q, timeout, |q| {
                q.is_empty() && !self.closed.load(Ordering::Acquire)
            })
            .ok()?;
        q.pop_front()
    }

    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().ok()?.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map_or(0, |q| q.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Elements evicted by pushes on a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Rejects further pushes and wakes a waiting consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn full_queue_drops_oldest() {
        let q = BoundedQueue::new(2);
        assert_eq!(q.push(1), Ok(None));
        assert_eq!(q.push(2), Ok(None));
        assert_eq!(q.push(3), Ok(Some(1)));
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn push_front_jumps_the_line() {
        let q = BoundedQueue::new(4);
        q.push(1).unwrap();
        assert_eq!(q.push_front(0), None);
        assert_eq!(q.try_pop(), Some(0));
    }

    #[test]
    fn push_front_respects_capacity() {
        let q = BoundedQueue::new(4);
        for i in 0..100 {
            let _ = q.push_front(i);
        }
        assert_eq!(q.len(), 4);
        assert_eq!(q.dropped(), 96);
        assert_eq!(q.try_pop(), Some(99));

        let q = BoundedQueue::new(2);
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.push_front(0), Some(2));
        assert_eq!(q.try_pop(), Some(0));
        assert_eq!(q.try_pop(), Some(1));
    }

    #[test]
    fn consumer_wakes_on_push() {
        let q = Arc::new(BoundedQueue::new(4));
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                q.push(7u8).unwrap();
            })
        };
        let start = Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_secs(2)), Some(7));
        assert!(start.elapsed() < Duration::from_secs(2));
        producer.join().unwrap();
    }

    #[test]
    fn closed_queue_rejects_and_releases_waiter() {
        let q: BoundedQueue<u8> = BoundedQueue::new(1);
        q.close();
        assert_eq!(q.push(1), Err(1));
        assert_eq!(q.pop_timeout(Duration::from_secs(1)), None);
    }
}

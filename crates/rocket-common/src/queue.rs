//! queue.rs — single-producer/single-consumer bounded ring buffer used to
//! hand packets between the client's network thread and its frame thread
//! (§5, §9).
//!
//! Converted from: myq2-common's net_queue.rs, which solves the same
//! producer/consumer handoff with `crossbeam::channel::bounded`. This
//! version hand-rolls the ring over `AtomicUsize` instead, matching the
//! acquire/release discipline shown in the ipc channel reference in this
//! pack's other examples — no lock, no heap allocation on the hot path
//! beyond the fixed-capacity backing array allocated once at construction.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CAPACITY: usize = 256;

struct Slot<T> {
    value: UnsafeCell<Option<T>>,
}

unsafe impl<T: Send> Sync for Slot<T> {}

struct Ring<T> {
    slots: Box<[Slot<T>]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl<T> Ring<T> {
    fn new() -> Self {
        let slots = (0..CAPACITY)
            .map(|_| Slot { value: UnsafeCell::new(None) })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }
}

/// Producer half. There must be exactly one of these per `Ring`.
pub struct Sender<T> {
    ring: Arc<Ring<T>>,
}

/// Consumer half. There must be exactly one of these per `Ring`.
pub struct Receiver<T> {
    ring: Arc<Ring<T>>,
}

unsafe impl<T: Send> Send for Sender<T> {}
unsafe impl<T: Send> Send for Receiver<T> {}

/// Build a bounded SPSC channel of fixed capacity 256. Returns `None` if the
/// queue is full rather than blocking — the caller decides whether to drop
/// or retry.
pub fn bounded<T>() -> (Sender<T>, Receiver<T>) {
    let ring = Arc::new(Ring::new());
    (Sender { ring: ring.clone() }, Receiver { ring })
}

impl<T> Sender<T> {
    /// Attempt to push a value. Returns the value back if the ring is full.
    pub fn try_send(&self, value: T) -> Result<(), T> {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) % CAPACITY;
        let head = self.ring.head.load(Ordering::Acquire);
        if next_tail == head {
            return Err(value);
        }
        unsafe {
            *self.ring.slots[tail].value.get() = Some(value);
        }
        self.ring.tail.store(next_tail, Ordering::Release);
        Ok(())
    }
}

impl<T> Receiver<T> {
    /// Attempt to pop the oldest queued value. Returns `None` if empty.
    pub fn try_recv(&self) -> Option<T> {
        let head = self.ring.head.load(Ordering::Relaxed);
        let tail = self.ring.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let value = unsafe { (*self.ring.slots[head].value.get()).take() };
        self.ring.head.store((head + 1) % CAPACITY, Ordering::Release);
        value
    }

    /// Drain everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(v) = self.try_recv() {
            out.push(v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn single_thread_push_pop_preserves_order() {
        let (tx, rx) = bounded::<u32>();
        for i in 0..10 {
            tx.try_send(i).unwrap();
        }
        let drained = rx.drain();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn full_ring_rejects_without_blocking() {
        let (tx, _rx) = bounded::<u32>();
        for i in 0..(CAPACITY - 1) as u32 {
            tx.try_send(i).unwrap();
        }
        assert!(tx.try_send(9999).is_err());
    }

    #[test]
    fn cross_thread_handoff_preserves_order() {
        let (tx, rx) = bounded::<u32>();
        let producer = thread::spawn(move || {
            for i in 0..1000u32 {
                while tx.try_send(i).is_err() {
                    thread::yield_now();
                }
            }
        });
        let mut received = Vec::with_capacity(1000);
        while received.len() < 1000 {
            if let Some(v) = rx.try_recv() {
                received.push(v);
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }
}

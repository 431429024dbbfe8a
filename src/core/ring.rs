//! Fixed-capacity single-producer/single-consumer subtask ring.
//!
//! Each slot carries its own readiness gate: a `Mutex<Option<T>>` paired with
//! a `Condvar`. A gate is a single-use binary signal per cycle, safe to reuse
//! only because the whole ring has exactly one producer and one consumer. It
//! is not a general-purpose semaphore and must not be shared beyond that
//! contract; the split [`RingProducer`]/[`RingConsumer`] handles (neither is
//! `Clone`) enforce it in the type system.
//!
//! # Cursor protocol
//!
//! The producer checks `produce_cursor − consume_cursor ≤ capacity` before
//! writing and rejects overflowing batches with `QueueFull` instead of
//! overwriting an unconsumed slot. The consumer advances its cursor only
//! after a subtask has actually left for the engine, so a failed dispatch can
//! restore the item into the same slot and retry later.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::core::error::AdmissionError;

struct Slot<T> {
    item: Mutex<Option<T>>,
    gate: Condvar,
}

struct RingShared<T> {
    slots: Box<[Slot<T>]>,
    prod: AtomicU64,
    cons: AtomicU64,
    stopped: AtomicBool,
}

impl<T> RingShared<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, cursor: u64) -> &Slot<T> {
        let idx = (cursor % self.slots.len() as u64) as usize;
        &self.slots[idx]
    }

    fn occupancy(&self) -> usize {
        let prod = self.prod.load(Ordering::Acquire);
        let cons = self.cons.load(Ordering::Acquire);
        (prod - cons) as usize
    }

    fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
        // Take each slot lock before notifying so a consumer between its
        // stop-flag check and its wait cannot miss the signal.
        for slot in &*self.slots {
            let _guard = slot.item.lock();
            slot.gate.notify_all();
        }
    }
}

/// Outcome of waiting on the consume-cursor slot's gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingWait {
    /// A subtask is ready in the consume-cursor slot.
    Ready,
    /// A stop was requested; no item is available.
    Stopped,
}

/// Outcome of a blocking consume.
#[derive(Debug)]
pub enum RingConsume<T> {
    /// The next subtask, in submission order.
    Item(T),
    /// A stop was requested; no item is returned.
    Stopped,
}

/// Producer half of the ring. Exactly one per ring.
pub struct RingProducer<T> {
    shared: Arc<RingShared<T>>,
}

/// Consumer half of the ring. Exactly one per ring.
pub struct RingConsumer<T> {
    shared: Arc<RingShared<T>>,
}

/// Create a ring with `capacity` slots and split it into its two halves.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn bounded<T>(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
    assert!(capacity > 0, "ring capacity must be non-zero");
    let slots: Box<[Slot<T>]> = (0..capacity)
        .map(|_| Slot {
            item: Mutex::new(None),
            gate: Condvar::new(),
        })
        .collect();
    let shared = Arc::new(RingShared {
        slots,
        prod: AtomicU64::new(0),
        cons: AtomicU64::new(0),
        stopped: AtomicBool::new(false),
    });
    (
        RingProducer {
            shared: Arc::clone(&shared),
        },
        RingConsumer { shared },
    )
}

impl<T> RingProducer<T> {
    /// Total slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Subtasks currently enqueued and not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.occupancy()
    }

    /// Whether no subtask is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue a whole batch or nothing.
    ///
    /// Writes each item into its slot and signals that slot's gate; the
    /// batch is visible to the consumer in submission order. Performs no
    /// blocking.
    ///
    /// # Errors
    ///
    /// `QueueFull` when fewer than `items.len()` slots are free; in that
    /// case no item is enqueued.
    pub fn try_produce_batch(&mut self, items: Vec<T>) -> Result<(), AdmissionError> {
        let requested = items.len();
        let prod = self.shared.prod.load(Ordering::Relaxed);
        let cons = self.shared.cons.load(Ordering::Acquire);
        let available = self.shared.capacity() - (prod - cons) as usize;
        if requested > available {
            return Err(AdmissionError::QueueFull {
                requested,
                available,
            });
        }
        for (i, item) in items.into_iter().enumerate() {
            let slot = self.shared.slot(prod + i as u64);
            let mut guard = slot.item.lock();
            debug_assert!(guard.is_none(), "producer overran an unconsumed slot");
            *guard = Some(item);
            slot.gate.notify_one();
        }
        self.shared.prod.store(prod + requested as u64, Ordering::Release);
        Ok(())
    }

    /// Enqueue a single subtask.
    ///
    /// # Errors
    ///
    /// `QueueFull` when no slot is free.
    pub fn produce(&mut self, item: T) -> Result<(), AdmissionError> {
        self.try_produce_batch(vec![item])
    }

    /// Request a stop: sets the stop flag and signals every slot gate so a
    /// blocked consumer wakes and observes the stop instead of hanging.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }
}

impl<T> RingConsumer<T> {
    /// Block until the consume-cursor slot is ready or a stop is requested.
    ///
    /// A pending stop wins over a ready slot, so shutdown is prompt even
    /// when work is still queued.
    pub fn wait_ready(&mut self) -> RingWait {
        let cons = self.shared.cons.load(Ordering::Relaxed);
        let slot = self.shared.slot(cons);
        let mut guard = slot.item.lock();
        loop {
            if self.shared.stopped.load(Ordering::Acquire) {
                return RingWait::Stopped;
            }
            if guard.is_some() {
                return RingWait::Ready;
            }
            slot.gate.wait(&mut guard);
        }
    }

    /// Non-blocking check of the consume-cursor slot.
    #[must_use]
    pub fn ready(&self) -> bool {
        let cons = self.shared.cons.load(Ordering::Relaxed);
        self.shared.slot(cons).item.lock().is_some()
    }

    /// Take the subtask at the consume cursor without advancing it.
    ///
    /// The slot is reset to empty; pair with [`advance`](Self::advance) on
    /// dispatch success or [`restore`](Self::restore) on dispatch failure.
    pub fn take(&mut self) -> Option<T> {
        let cons = self.shared.cons.load(Ordering::Relaxed);
        self.shared.slot(cons).item.lock().take()
    }

    /// Advance the consume cursor past a successfully dispatched subtask,
    /// releasing the slot for reuse by a future produce.
    pub fn advance(&mut self) {
        self.shared.cons.fetch_add(1, Ordering::Release);
    }

    /// Put a subtask back into the consume-cursor slot after a failed
    /// dispatch. The cursor stays put, so the same subtask is retried next.
    pub fn restore(&mut self, item: T) {
        let cons = self.shared.cons.load(Ordering::Relaxed);
        let mut guard = self.shared.slot(cons).item.lock();
        debug_assert!(guard.is_none(), "restore into an occupied slot");
        *guard = Some(item);
    }

    /// Blocking consume: wait for the next subtask, take it, reset the slot
    /// and advance the cursor. Returns [`RingConsume::Stopped`] with no item
    /// once a stop has been requested.
    pub fn consume(&mut self) -> RingConsume<T> {
        loop {
            match self.wait_ready() {
                RingWait::Stopped => return RingConsume::Stopped,
                RingWait::Ready => {
                    if let Some(item) = self.take() {
                        self.advance();
                        return RingConsume::Item(item);
                    }
                }
            }
        }
    }

    /// Subtasks currently enqueued and not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.occupancy()
    }

    /// Whether no subtask is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Take every item still sitting in unconsumed slots.
    ///
    /// Called after the scheduler thread has exited so pending native
    /// subtasks can be freed at context stop.
    pub fn drain_unconsumed(&mut self) -> Vec<T> {
        let prod = self.shared.prod.load(Ordering::Acquire);
        let mut cons = self.shared.cons.load(Ordering::Relaxed);
        let mut drained = Vec::new();
        while cons < prod {
            if let Some(item) = self.shared.slot(cons).item.lock().take() {
                drained.push(item);
            }
            cons += 1;
        }
        self.shared.cons.store(cons, Ordering::Release);
        drained
    }
}

//! Integration tests for the subtask ring.
//!
//! These tests exercise the cursor protocol, the per-slot gates, and the
//! stop path with real producer and consumer threads.

use std::thread;
use std::time::Duration;

use offload_admission::core::ring::{self, RingConsume, RingWait};
use offload_admission::core::AdmissionError;

/// Fill, wrap, and refill a small ring, checking capacity accounting at
/// every step.
#[test]
fn test_capacity_and_wraparound() {
    let (mut producer, mut consumer) = ring::bounded(4);
    assert_eq!(producer.capacity(), 4);

    producer.try_produce_batch(vec!['a', 'b', 'c', 'd']).unwrap();
    assert_eq!(producer.len(), 4);

    // Ring is full: a fifth item must be rejected without side effects.
    let err = producer.produce('e').unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::QueueFull {
            requested: 1,
            available: 0
        }
    ));
    assert_eq!(producer.len(), 4);

    // Consume two, freeing two slots.
    assert!(matches!(consumer.consume(), RingConsume::Item('a')));
    assert!(matches!(consumer.consume(), RingConsume::Item('b')));
    assert_eq!(producer.len(), 2);

    // A three-item batch still does not fit, all or nothing.
    let err = producer.try_produce_batch(vec!['e', 'f', 'g']).unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::QueueFull {
            requested: 3,
            available: 2
        }
    ));
    assert_eq!(producer.len(), 2);

    // Two fit, wrapping the produce cursor past the array end.
    producer.try_produce_batch(vec!['e', 'f']).unwrap();
    assert!(matches!(consumer.consume(), RingConsume::Item('c')));
    assert!(matches!(consumer.consume(), RingConsume::Item('d')));
    assert!(matches!(consumer.consume(), RingConsume::Item('e')));
    assert!(matches!(consumer.consume(), RingConsume::Item('f')));
    assert!(consumer.is_empty());
}

/// The consumer blocks on the slot gate until the producer signals it.
#[test]
fn test_consume_blocks_until_produce() {
    let (mut producer, mut consumer) = ring::bounded(2);

    let handle = thread::spawn(move || match consumer.consume() {
        RingConsume::Item(v) => v,
        RingConsume::Stopped => panic!("unexpected stop"),
    });

    // Give the consumer time to block on the gate.
    thread::sleep(Duration::from_millis(50));
    producer.produce(42u32).unwrap();

    assert_eq!(handle.join().unwrap(), 42);
}

/// A stop request wakes a gate-blocked consumer instead of leaving it
/// parked forever.
#[test]
fn test_stop_wakes_blocked_consumer() {
    let (producer, mut consumer) = ring::bounded::<u32>(2);

    let handle = thread::spawn(move || consumer.wait_ready());

    thread::sleep(Duration::from_millis(50));
    producer.request_stop();

    assert_eq!(handle.join().unwrap(), RingWait::Stopped);
    assert!(producer.is_stopped());
}

/// A stop request wins over queued work.
#[test]
fn test_stop_wins_over_ready_item() {
    let (mut producer, mut consumer) = ring::bounded(2);
    producer.produce(1u32).unwrap();
    producer.request_stop();

    assert_eq!(consumer.wait_ready(), RingWait::Stopped);
    assert!(matches!(consumer.consume(), RingConsume::Stopped));
}

/// take/restore leaves the cursor in place so the same item is seen again;
/// advance releases the slot.
#[test]
fn test_take_restore_advance() {
    let (mut producer, mut consumer) = ring::bounded(2);
    producer.try_produce_batch(vec![10u32, 20]).unwrap();

    let first = consumer.take().unwrap();
    assert_eq!(first, 10);
    consumer.restore(first);

    // Cursor did not move: the restored item comes out again.
    assert_eq!(consumer.take().unwrap(), 10);
    consumer.advance();
    assert_eq!(consumer.take().unwrap(), 20);
    consumer.advance();
    assert!(consumer.is_empty());

    // Both slots are free again.
    producer.try_produce_batch(vec![30, 40]).unwrap();
    assert_eq!(producer.len(), 2);
}

/// Items come out in exactly the order batches were produced.
#[test]
fn test_fifo_across_batches() {
    let (mut producer, mut consumer) = ring::bounded(8);
    producer.try_produce_batch(vec![1u32, 2, 3]).unwrap();
    producer.try_produce_batch(vec![4, 5]).unwrap();

    let mut seen = Vec::new();
    for _ in 0..5 {
        match consumer.consume() {
            RingConsume::Item(v) => seen.push(v),
            RingConsume::Stopped => panic!("unexpected stop"),
        }
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

/// After a stop, drain_unconsumed returns everything still in the ring.
#[test]
fn test_drain_unconsumed_after_stop() {
    let (mut producer, mut consumer) = ring::bounded(4);
    producer.try_produce_batch(vec![7u32, 8, 9]).unwrap();
    assert!(matches!(consumer.consume(), RingConsume::Item(7)));

    producer.request_stop();
    let leftovers = consumer.drain_unconsumed();
    assert_eq!(leftovers, vec![8, 9]);
    assert!(consumer.is_empty());
    assert!(consumer.drain_unconsumed().is_empty());
}

/// Sustained producer/consumer traffic crosses the ring without loss or
/// reordering.
#[test]
fn test_spsc_traffic() {
    const ITEMS: u32 = 500;

    let (mut producer, mut consumer) = ring::bounded(8);

    let producer_handle = thread::spawn(move || {
        for i in 0..ITEMS {
            // Spin until a slot frees up; the ring never blocks producers.
            loop {
                match producer.produce(i) {
                    Ok(()) => break,
                    Err(AdmissionError::QueueFull { .. }) => thread::yield_now(),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        }
    });

    let consumer_handle = thread::spawn(move || {
        let mut seen = Vec::with_capacity(ITEMS as usize);
        for _ in 0..ITEMS {
            match consumer.consume() {
                RingConsume::Item(v) => seen.push(v),
                RingConsume::Stopped => panic!("unexpected stop"),
            }
        }
        seen
    });

    producer_handle.join().unwrap();
    let seen = consumer_handle.join().unwrap();
    assert_eq!(seen, (0..ITEMS).collect::<Vec<_>>());
}

//! Open-loop latency pacing.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Computes a monotonically increasing target dispatch time per logical
/// task, enforcing a minimum inter-arrival spacing.
///
/// On each submission: `target = max(now, last_expected) + sla_interval`,
/// and the anchor moves to `target`. The resulting sequence is strictly
/// non-decreasing and spaced at least `sla_interval` apart regardless of
/// submission burstiness. This is an accounting schedule for downstream
/// latency tracking, not a throttle: it never delays or rejects a
/// submission.
///
/// The anchor is instance state, owned by the context that created the
/// pacer, so independent engine bindings pace independently.
#[derive(Debug)]
pub struct LatencyPacer {
    sla_interval: Duration,
    last_expected: Mutex<Option<Instant>>,
}

impl LatencyPacer {
    /// Create a pacer with the given minimum inter-arrival spacing.
    #[must_use]
    pub const fn new(sla_interval: Duration) -> Self {
        Self {
            sla_interval,
            last_expected: Mutex::new(None),
        }
    }

    /// Stamp one submission and advance the anchor.
    pub fn stamp(&self) -> Instant {
        let now = Instant::now();
        let mut last = self.last_expected.lock();
        let base = last.map_or(now, |anchor| anchor.max(now));
        let target = base + self.sla_interval;
        *last = Some(target);
        target
    }

    /// Minimum spacing between consecutive targets.
    #[must_use]
    pub const fn sla_interval(&self) -> Duration {
        self.sla_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn targets_are_spaced_and_monotonic() {
        let sla = Duration::from_millis(5);
        let pacer = LatencyPacer::new(sla);

        let mut previous: Option<Instant> = None;
        for _ in 0..10 {
            let called_at = Instant::now();
            let target = pacer.stamp();
            assert!(target >= called_at + sla);
            if let Some(prev) = previous {
                assert!(target >= prev + sla);
            }
            previous = Some(target);
        }
    }

    #[test]
    fn anchor_resets_to_now_after_idle() {
        let sla = Duration::from_millis(1);
        let pacer = LatencyPacer::new(sla);

        let first = pacer.stamp();
        thread::sleep(Duration::from_millis(20));
        let called_at = Instant::now();
        let second = pacer.stamp();

        // After the anchor fell behind wall time, pacing restarts from now.
        assert!(second >= called_at + sla);
        assert!(second > first + sla);
    }
}

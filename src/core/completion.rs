//! Per-logical-task completion bookkeeping.
//!
//! A [`CompletionRecord`] is created by the caller, baked into each native
//! subtask's user data, and updated from the engine's completion callbacks,
//! which only ever run inside
//! [`PollingEngine::progress`](crate::core::PollingEngine::progress). The
//! caller must keep the record alive until the task completes or the owning
//! context stops, whichever comes first.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Shared counters and timestamps for one logical task.
///
/// Both the success and the error callback increment the finished count, so
/// a caller spinning on [`is_complete`](Self::is_complete) always
/// terminates; failures are additionally counted in
/// [`failed`](Self::failed). Success and failure are otherwise
/// indistinguishable to a waiting caller except via logs.
#[derive(Debug)]
pub struct CompletionRecord {
    expected: u32,
    finished: AtomicU32,
    failed: AtomicU32,
    submitted_at: Mutex<Option<Instant>>,
    expected_at: Mutex<Option<Instant>>,
    completed_at: Mutex<Option<Instant>>,
}

impl CompletionRecord {
    /// Create a record expecting `expected` subtask completions.
    #[must_use]
    pub const fn new(expected: u32) -> Self {
        Self {
            expected,
            finished: AtomicU32::new(0),
            failed: AtomicU32::new(0),
            submitted_at: Mutex::new(None),
            expected_at: Mutex::new(None),
            completed_at: Mutex::new(None),
        }
    }

    /// Subtask completions this record expects.
    #[must_use]
    pub const fn expected(&self) -> u32 {
        self.expected
    }

    /// Subtask completions observed so far (successes and failures).
    #[must_use]
    pub fn finished(&self) -> u32 {
        self.finished.load(Ordering::Acquire)
    }

    /// Subtask failures observed so far.
    #[must_use]
    pub fn failed(&self) -> u32 {
        self.failed.load(Ordering::Acquire)
    }

    /// Whether every expected subtask has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished() >= self.expected
    }

    /// Success-callback hook. Returns `true` when this call completed the
    /// logical task.
    pub fn record_success(&self) -> bool {
        self.finish_one()
    }

    /// Error-callback hook. Failures count toward completion so waiting
    /// loops terminate; they are never retried.
    pub fn record_failure(&self) -> bool {
        self.failed.fetch_add(1, Ordering::AcqRel);
        self.finish_one()
    }

    /// Wall-clock latency from submission to completion, once both ends
    /// have been stamped.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        let submitted = (*self.submitted_at.lock())?;
        let completed = (*self.completed_at.lock())?;
        Some(completed.duration_since(submitted))
    }

    /// When the task was admitted.
    #[must_use]
    pub fn submitted_at(&self) -> Option<Instant> {
        *self.submitted_at.lock()
    }

    /// The pacing target assigned at admission.
    #[must_use]
    pub fn expected_at(&self) -> Option<Instant> {
        *self.expected_at.lock()
    }

    /// When the final subtask completed.
    #[must_use]
    pub fn completed_at(&self) -> Option<Instant> {
        *self.completed_at.lock()
    }

    pub(crate) fn stamp_submission(&self, expected_at: Instant) {
        *self.submitted_at.lock() = Some(Instant::now());
        *self.expected_at.lock() = Some(expected_at);
    }

    fn finish_one(&self) -> bool {
        let done = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        if done == self.expected {
            *self.completed_at.lock() = Some(Instant::now());
            return true;
        }
        false
    }
}

/// Handle returned from a successful submission.
///
/// Holds the task id, the pacing target, and a reference to the caller's
/// completion record. The record is shared, not back-pointed: tasks and
/// records form a plain ownership tree with no cycles.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    expected_at: Instant,
    record: Arc<CompletionRecord>,
}

impl TaskHandle {
    pub(crate) const fn new(id: u64, expected_at: Instant, record: Arc<CompletionRecord>) -> Self {
        Self {
            id,
            expected_at,
            record,
        }
    }

    /// Context-local task id, assigned in admission order.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The pacing target assigned at admission.
    #[must_use]
    pub const fn expected_at(&self) -> Instant {
        self.expected_at
    }

    /// The completion record tracking this task.
    #[must_use]
    pub const fn record(&self) -> &Arc<CompletionRecord> {
        &self.record
    }
}

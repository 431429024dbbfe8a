//! Progress engine: aggregates admission contexts and drives completion
//! callbacks.
//!
//! `progress()` is the only place completion callbacks run. It takes every
//! attached context's exclusive lock in attachment order (one global fixed
//! order, so concurrent dispatch can never deadlock against polling), fires
//! pending callbacks, then releases the locks in reverse order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::AdmissionError;

/// One attached context's engine binding, locked for a progress pass.
pub trait EnginePoll {
    /// Fire pending completion callbacks; returns how many fired.
    fn poll_once(&mut self) -> usize;
}

/// Object-safe view of an admission context used by the polling engine.
///
/// Implemented by [`AdmissionContext`](crate::core::AdmissionContext) for
/// every engine type, so one polling engine can drive bindings of different
/// kinds.
pub trait PollTarget: Send + Sync {
    /// Acquire the context's exclusive lock for a progress pass.
    fn begin_progress(&self) -> Box<dyn EnginePoll + '_>;

    /// Whether the context has fully stopped.
    fn is_stopped(&self) -> bool;

    /// Whether any logical task has been admitted yet.
    fn has_submitted(&self) -> bool;

    /// Stable identity tag of the context.
    fn context_id(&self) -> Uuid;
}

/// Snapshot of polling activity.
#[derive(Debug, Clone, Default)]
pub struct ProgressStats {
    /// Total `progress()` calls.
    pub progress_calls: u64,
    /// Total completion callbacks observed across all calls.
    pub completions: u64,
}

/// Drives completion detection across every attached context.
///
/// Attachment order fixes the lock order used by
/// [`progress`](Self::progress); contexts must attach before their first
/// submission.
#[derive(Default)]
pub struct PollingEngine {
    contexts: Vec<Arc<dyn PollTarget>>,
    progress_calls: AtomicU64,
    completions: AtomicU64,
}

impl PollingEngine {
    /// Create an empty polling engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Register a context. Its position fixes its place in the lock order.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the context has already stopped or already admitted
    /// a task; attachment must precede the first submission.
    pub fn attach(&mut self, context: Arc<dyn PollTarget>) -> Result<(), AdmissionError> {
        if context.is_stopped() {
            return Err(AdmissionError::InvalidState(
                "cannot attach a stopped context".into(),
            ));
        }
        if context.has_submitted() {
            return Err(AdmissionError::InvalidState(
                "contexts must attach before their first submission".into(),
            ));
        }
        debug!(
            context = %context.context_id(),
            order = self.contexts.len(),
            "context attached to polling engine"
        );
        self.contexts.push(context);
        Ok(())
    }

    /// Run one completion-detection pass.
    ///
    /// Locks every attached context in attachment order, fires pending
    /// callbacks synchronously, releases the locks in reverse order, and
    /// reports whether at least one completion fired. Never blocks beyond
    /// the lock acquisitions themselves; callers choose the poll cadence.
    pub fn progress(&self) -> bool {
        let mut held: Vec<Box<dyn EnginePoll + '_>> = self
            .contexts
            .iter()
            .map(|context| context.begin_progress())
            .collect();

        let mut fired = 0usize;
        for binding in &mut held {
            fired += binding.poll_once();
        }

        // Release in reverse attachment order.
        while held.pop().is_some() {}

        self.progress_calls.fetch_add(1, Ordering::Relaxed);
        if fired > 0 {
            self.completions.fetch_add(fired as u64, Ordering::Relaxed);
        }
        fired > 0
    }

    /// Snapshot of polling activity.
    #[must_use]
    pub fn stats(&self) -> ProgressStats {
        ProgressStats {
            progress_calls: self.progress_calls.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
        }
    }

    /// Release context ownership and the underlying engine handles.
    ///
    /// # Errors
    ///
    /// `InvalidState` if any attached context has not been stopped yet.
    pub fn destroy(self) -> Result<(), AdmissionError> {
        for context in &self.contexts {
            if !context.is_stopped() {
                return Err(AdmissionError::InvalidState(format!(
                    "context {} is still running",
                    context.context_id()
                )));
            }
        }
        info!(contexts = self.contexts.len(), "polling engine destroyed");
        Ok(())
    }
}

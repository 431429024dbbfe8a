//! Error types for admission control and dispatch.

use thiserror::Error;

/// Engine-side rejection of a dispatch attempt.
///
/// A rejected subtask stays in its ring slot and is retried on the next
/// scheduler tick; the rejection is logged and never surfaced synchronously
/// to the submitter.
#[derive(Debug, Clone, Error)]
#[error("device rejected dispatch: {reason}")]
pub struct DeviceError {
    /// Engine-specific description of the rejection.
    pub reason: String,
}

impl DeviceError {
    /// Create a device error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors produced by quota ledger backends.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Tenant id outside the ledger's counter table.
    #[error("unknown tenant id {0}")]
    UnknownTenant(u32),
    /// Cross-process lock or storage failure.
    #[error("ledger storage failure: {0}")]
    Storage(#[from] std::io::Error),
    /// Ledger table is smaller than the configured tenant count.
    #[error("ledger table truncated: expected {expected} tenants, found {found}")]
    Truncated {
        /// Tenant slots the caller configured.
        expected: usize,
        /// Whole counters actually present in the table.
        found: usize,
    },
}

/// Errors produced by admission contexts and the polling engine.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The ring lacks capacity for the whole batch; nothing was enqueued.
    #[error("subtask ring full: need {requested} free slots, have {available}")]
    QueueFull {
        /// Slots the batch needs.
        requested: usize,
        /// Slots currently free.
        available: usize,
    },
    /// Operation not valid for the context's lifecycle state.
    #[error("invalid context state: {0}")]
    InvalidState(String),
    /// A logical task must carry at least one subtask.
    #[error("logical task has no subtasks")]
    EmptyTask,
    /// A logical task exceeds the configured decomposition limit.
    #[error("logical task too large: {requested} subtasks, limit {limit}")]
    TooManySubtasks {
        /// Subtasks in the rejected descriptor.
        requested: usize,
        /// Configured per-task limit.
        limit: usize,
    },
    /// The completion record does not expect the descriptor's subtask count.
    #[error("completion record expects {expected} subtasks, descriptor holds {actual}")]
    ExpectedCountMismatch {
        /// Count the record was created with.
        expected: usize,
        /// Subtasks actually present in the descriptor.
        actual: usize,
    },
    /// The engine refused a dispatch attempt.
    #[error("dispatch failed: {0}")]
    Device(#[from] DeviceError),
    /// A quota ledger operation failed.
    #[error("quota ledger: {0}")]
    Ledger(#[from] LedgerError),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal error (scheduler thread panic, spawn failure).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

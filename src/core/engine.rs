//! Engine binding abstraction.
//!
//! The external accelerator is opaque to the scheduler core: it can accept a
//! subtask and it can fire completion callbacks when polled. Everything else
//! (device setup, buffer plumbing, task construction) belongs to the
//! integration layer that implements [`OffloadEngine`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DeviceError;

/// Kind of hardware engine a context is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Erasure-coded block construction.
    ErasureCoding,
    /// Authenticated encryption.
    Cipher,
    /// Compression and decompression.
    Compression,
}

impl EngineKind {
    /// Short stable name, used in thread names and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ErasureCoding => "erasure-coding",
            Self::Cipher => "cipher",
            Self::Compression => "compression",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatch attempt the engine refused.
///
/// The subtask comes back untouched so the scheduler can retry it from the
/// same ring slot on a later tick.
#[derive(Debug)]
pub struct DispatchFailure<S> {
    /// The subtask, returned for a later retry.
    pub subtask: S,
    /// Why the engine refused it.
    pub error: DeviceError,
}

/// Capability surface of one engine binding.
///
/// `dispatch` and `poll_once` must never run concurrently on the same
/// binding; the owning context's exclusive lock is the sole serialization
/// point, shared between the scheduler thread and
/// [`PollingEngine::progress`](crate::core::PollingEngine::progress).
pub trait OffloadEngine: Send + 'static {
    /// Opaque native work item this engine executes.
    type Subtask: Send + 'static;

    /// The kind of work this binding accelerates.
    fn kind(&self) -> EngineKind;

    /// Hand one subtask to the engine.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchFailure`] carrying the subtask back when the
    /// engine cannot accept it right now. Rejection is not fatal; the
    /// scheduler logs it and retries on the next tick.
    fn dispatch(&mut self, subtask: Self::Subtask) -> Result<(), DispatchFailure<Self::Subtask>>;

    /// Drive completion detection.
    ///
    /// Fires the success/error callbacks registered at engine creation,
    /// synchronously, once per completed subtask, and returns how many fired.
    fn poll_once(&mut self) -> usize;
}

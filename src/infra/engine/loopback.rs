//! In-process stand-in for an offload device.
//!
//! Dispatched subtasks sit in an internal queue until the next poll, which
//! fires the success or error callback for each. Test hooks let a caller
//! force dispatch rejection and count what the "device" accepted, so the
//! scheduler's retry and quota paths can be exercised without hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::engine::{DispatchFailure, EngineKind, OffloadEngine};
use crate::core::error::DeviceError;

/// Unit of work the loopback engine accepts.
#[derive(Debug, Clone)]
pub struct LoopbackSubtask {
    /// Caller-assigned identifier, echoed back through the callbacks.
    pub id: u64,
    /// When set, the subtask completes through the error callback.
    pub fail: bool,
}

/// Callback fired once per subtask when a poll drains it.
pub type CompletionCallback = Box<dyn FnMut(&LoopbackSubtask) + Send>;

/// Shared test hooks into a [`LoopbackEngine`].
#[derive(Debug, Default)]
pub struct LoopbackControls {
    reject_dispatch: AtomicBool,
    dispatched: AtomicU64,
}

impl LoopbackControls {
    /// Force (or stop forcing) every dispatch to fail at submission time.
    pub fn set_reject_dispatch(&self, reject: bool) {
        self.reject_dispatch.store(reject, Ordering::SeqCst);
    }

    /// Total subtasks the engine has accepted.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }
}

/// Callback-driven fake engine with a dispatch queue drained by polling.
pub struct LoopbackEngine {
    kind: EngineKind,
    controls: Arc<LoopbackControls>,
    inflight_tx: Sender<LoopbackSubtask>,
    inflight_rx: Receiver<LoopbackSubtask>,
    on_success: CompletionCallback,
    on_error: CompletionCallback,
}

impl LoopbackEngine {
    /// Build an engine of `kind` with the given completion callbacks.
    #[must_use]
    pub fn new(kind: EngineKind, on_success: CompletionCallback, on_error: CompletionCallback) -> Self {
        let (inflight_tx, inflight_rx) = unbounded();
        Self {
            kind,
            controls: Arc::new(LoopbackControls::default()),
            inflight_tx,
            inflight_rx,
            on_success,
            on_error,
        }
    }

    /// Handle to the engine's test hooks, usable from any thread.
    #[must_use]
    pub fn controls(&self) -> Arc<LoopbackControls> {
        Arc::clone(&self.controls)
    }
}

impl OffloadEngine for LoopbackEngine {
    type Subtask = LoopbackSubtask;

    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn dispatch(&mut self, subtask: Self::Subtask) -> Result<(), DispatchFailure<Self::Subtask>> {
        if self.controls.reject_dispatch.load(Ordering::SeqCst) {
            return Err(DispatchFailure {
                subtask,
                error: DeviceError::new("dispatch rejected by device"),
            });
        }
        if let Err(send_err) = self.inflight_tx.send(subtask) {
            return Err(DispatchFailure {
                subtask: send_err.into_inner(),
                error: DeviceError::new("inflight queue closed"),
            });
        }
        self.controls.dispatched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn poll_once(&mut self) -> usize {
        let mut fired = 0;
        while let Ok(subtask) = self.inflight_rx.try_recv() {
            if subtask.fail {
                (self.on_error)(&subtask);
            } else {
                (self.on_success)(&subtask);
            }
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn poll_routes_by_failure_flag() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ok_log = Arc::clone(&seen);
        let err_log = Arc::clone(&seen);
        let mut engine = LoopbackEngine::new(
            EngineKind::Cipher,
            Box::new(move |sub| ok_log.lock().unwrap().push((sub.id, true))),
            Box::new(move |sub| err_log.lock().unwrap().push((sub.id, false))),
        );

        engine.dispatch(LoopbackSubtask { id: 1, fail: false }).unwrap();
        engine.dispatch(LoopbackSubtask { id: 2, fail: true }).unwrap();
        assert_eq!(engine.poll_once(), 2);
        assert_eq!(engine.poll_once(), 0);

        let log = seen.lock().unwrap();
        assert_eq!(*log, vec![(1, true), (2, false)]);
        assert_eq!(engine.controls().dispatched(), 2);
    }

    #[test]
    fn rejection_returns_the_subtask() {
        let mut engine = LoopbackEngine::new(
            EngineKind::Compression,
            Box::new(|_| {}),
            Box::new(|_| {}),
        );
        engine.controls().set_reject_dispatch(true);

        let failure = engine
            .dispatch(LoopbackSubtask { id: 9, fail: false })
            .unwrap_err();
        assert_eq!(failure.subtask.id, 9);
        assert_eq!(engine.controls().dispatched(), 0);
    }
}

//! Admission context: one engine binding plus its background scheduler.
//!
//! The context decomposes logical tasks into subtasks, admits them into a
//! fixed-capacity ring, and runs a dedicated scheduler thread that drains
//! the ring against the tenant's cross-process token budget. The engine
//! binding sits behind an exclusive lock shared with
//! [`PollingEngine::progress`](crate::core::PollingEngine::progress); both
//! sides hold it only for the minimum span around the engine call.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ContextConfig;
use crate::core::completion::{CompletionRecord, TaskHandle};
use crate::core::engine::{EngineKind, OffloadEngine};
use crate::core::error::AdmissionError;
use crate::core::pacer::LatencyPacer;
use crate::core::polling::{EnginePoll, PollTarget};
use crate::core::ring::{self, RingConsumer, RingProducer, RingWait};
use crate::infra::ledger::{QuotaLedger, TenantId};

/// Lifecycle of an admission context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, scheduler not yet running.
    Created,
    /// Scheduler thread running; submissions accepted.
    Started,
    /// Stop requested; waiting for the scheduler thread to exit.
    Stopping,
    /// Scheduler joined and pending subtasks freed.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// An ordered batch of subtasks submitted atomically as one logical task.
pub struct TaskDescriptor<S> {
    /// Subtasks in dispatch order, `1..=max_subtasks_per_task` of them.
    pub subtasks: Vec<S>,
    /// Caller-owned record the engine callbacks update; must expect exactly
    /// `subtasks.len()` completions.
    pub record: Arc<CompletionRecord>,
}

/// Internal counters for scheduler activity (thread-safe).
#[derive(Debug, Default)]
struct ContextCounters {
    submitted_tasks: AtomicU64,
    enqueued_subtasks: AtomicU64,
    dispatched_subtasks: AtomicU64,
    dispatch_rejections: AtomicU64,
    ledger_faults: AtomicU64,
    ticks: AtomicU64,
}

/// Snapshot of scheduler activity for one context.
#[derive(Debug, Clone, Default)]
pub struct ContextStats {
    /// Logical tasks admitted.
    pub submitted_tasks: u64,
    /// Subtasks enqueued into the ring.
    pub enqueued_subtasks: u64,
    /// Subtasks accepted by the engine.
    pub dispatched_subtasks: u64,
    /// Dispatch attempts the engine rejected (each retried later).
    pub dispatch_rejections: u64,
    /// Ledger operations that failed and aborted their tick.
    pub ledger_faults: u64,
    /// Scheduler ticks executed.
    pub ticks: u64,
}

impl ContextCounters {
    fn snapshot(&self) -> ContextStats {
        ContextStats {
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            enqueued_subtasks: self.enqueued_subtasks.load(Ordering::Relaxed),
            dispatched_subtasks: self.dispatched_subtasks.load(Ordering::Relaxed),
            dispatch_rejections: self.dispatch_rejections.load(Ordering::Relaxed),
            ledger_faults: self.ledger_faults.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

/// One binding to an external offload engine, with admission control.
///
/// Create with [`new`](Self::new), attach to a
/// [`PollingEngine`](crate::core::PollingEngine), [`start`](Self::start) it,
/// submit any number of logical tasks, then [`stop`](Self::stop) it before
/// dropping. Stopping joins the scheduler thread and frees every subtask
/// still held in unconsumed ring slots.
pub struct AdmissionContext<E: OffloadEngine> {
    id: Uuid,
    kind: EngineKind,
    config: ContextConfig,
    /// Exclusive lock around the engine binding, shared with the polling
    /// engine. The binding is not safe for concurrent submit-and-poll.
    engine: Arc<Mutex<E>>,
    producer: Mutex<RingProducer<E::Subtask>>,
    /// Consumer half, present until `start` hands it to the scheduler.
    consumer: Mutex<Option<RingConsumer<E::Subtask>>>,
    pacer: LatencyPacer,
    ledger: Arc<dyn QuotaLedger>,
    state: Mutex<LifecycleState>,
    worker: Mutex<Option<JoinHandle<RingConsumer<E::Subtask>>>>,
    task_ids: AtomicU64,
    counters: Arc<ContextCounters>,
}

impl<E: OffloadEngine> AdmissionContext<E> {
    /// Create a context binding `engine` to the given tenant's budget in
    /// `ledger`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration fails validation.
    pub fn new(
        config: ContextConfig,
        engine: E,
        ledger: Arc<dyn QuotaLedger>,
    ) -> Result<Self, AdmissionError> {
        config.validate().map_err(AdmissionError::InvalidConfig)?;
        let kind = engine.kind();
        let (producer, consumer) = ring::bounded(config.ring_capacity);
        let pacer = LatencyPacer::new(config.sla_interval());
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            config,
            engine: Arc::new(Mutex::new(engine)),
            producer: Mutex::new(producer),
            consumer: Mutex::new(Some(consumer)),
            pacer,
            ledger,
            state: Mutex::new(LifecycleState::Created),
            worker: Mutex::new(None),
            task_ids: AtomicU64::new(0),
            counters: Arc::new(ContextCounters::default()),
        })
    }

    /// Identity tag of this context.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The engine kind this context is bound to.
    #[must_use]
    pub const fn kind(&self) -> EngineKind {
        self.kind
    }

    /// The configuration this context was built with.
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Snapshot of scheduler activity.
    pub fn stats(&self) -> ContextStats {
        self.counters.snapshot()
    }

    /// Spawn the background scheduler thread.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the context is freshly created; `Internal` if
    /// the thread cannot be spawned.
    pub fn start(&self) -> Result<(), AdmissionError> {
        let mut state = self.state.lock();
        if *state != LifecycleState::Created {
            return Err(AdmissionError::InvalidState(format!(
                "start requires a freshly created context, state is {}",
                *state
            )));
        }
        let consumer = self
            .consumer
            .lock()
            .take()
            .ok_or_else(|| AdmissionError::Internal("ring consumer already claimed".into()))?;

        let worker = SchedulerWorker {
            engine: Arc::clone(&self.engine),
            ledger: Arc::clone(&self.ledger),
            counters: Arc::clone(&self.counters),
            tenant: self.config.tenant,
            tick_interval: self.config.tick_interval(),
            budget_ceiling: self.config.ring_capacity as u32,
            context_id: self.id,
        };
        let handle = thread::Builder::new()
            .name(format!("admission-{}", self.kind))
            .spawn(move || worker.run(consumer))
            .map_err(|e| AdmissionError::Internal(format!("failed to spawn scheduler: {e}")))?;

        *self.worker.lock() = Some(handle);
        *state = LifecycleState::Started;
        info!(context = %self.id, kind = %self.kind, "admission context started");
        Ok(())
    }

    /// Admit one logical task: enqueue all of its subtasks, atomically.
    ///
    /// On success the task is stamped with a pacing target and a
    /// [`TaskHandle`] is returned. On any error nothing is enqueued.
    ///
    /// Never touches the engine lock, so completion callbacks running inside
    /// a progress pass may submit follow-up tasks.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the context is started
    /// - `EmptyTask` / `TooManySubtasks` / `ExpectedCountMismatch` for a
    ///   malformed descriptor
    /// - `QueueFull` when the ring lacks capacity for the whole batch
    pub fn submit_task(
        &self,
        descriptor: TaskDescriptor<E::Subtask>,
    ) -> Result<TaskHandle, AdmissionError> {
        {
            let state = self.state.lock();
            if *state != LifecycleState::Started {
                return Err(AdmissionError::InvalidState(format!(
                    "submit requires a started context, state is {}",
                    *state
                )));
            }
        }

        let TaskDescriptor { subtasks, record } = descriptor;
        let nb_subtasks = subtasks.len();
        if nb_subtasks == 0 {
            return Err(AdmissionError::EmptyTask);
        }
        if nb_subtasks > self.config.max_subtasks_per_task {
            return Err(AdmissionError::TooManySubtasks {
                requested: nb_subtasks,
                limit: self.config.max_subtasks_per_task,
            });
        }
        let expected = record.expected() as usize;
        if expected != nb_subtasks {
            return Err(AdmissionError::ExpectedCountMismatch {
                expected,
                actual: nb_subtasks,
            });
        }

        self.producer.lock().try_produce_batch(subtasks)?;

        let target = self.pacer.stamp();
        record.stamp_submission(target);
        let id = self.task_ids.fetch_add(1, Ordering::Relaxed);
        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        self.counters
            .enqueued_subtasks
            .fetch_add(nb_subtasks as u64, Ordering::Relaxed);
        debug!(context = %self.id, task = id, subtasks = nb_subtasks, "logical task admitted");
        Ok(TaskHandle::new(id, target, record))
    }

    /// Stop the scheduler and free pending subtasks.
    ///
    /// Sets the stop flag, wakes a gate-blocked scheduler, joins the thread,
    /// then drops every subtask still held in unconsumed ring slots.
    /// Idempotent: stopping an already stopping or stopped context is a
    /// no-op, and stopping a never-started context just marks it stopped.
    ///
    /// # Errors
    ///
    /// `Internal` if the scheduler thread panicked; the context still ends
    /// up `Stopped`.
    pub fn stop(&self) -> Result<(), AdmissionError> {
        {
            let mut state = self.state.lock();
            match *state {
                LifecycleState::Created => {
                    *state = LifecycleState::Stopped;
                    return Ok(());
                }
                LifecycleState::Stopping | LifecycleState::Stopped => return Ok(()),
                LifecycleState::Started => *state = LifecycleState::Stopping,
            }
        }

        // Wake the scheduler whether it is blocked on a gate or mid-tick.
        self.producer.lock().request_stop();

        let handle = self.worker.lock().take();
        let join_result = handle.map(JoinHandle::join);

        let outcome = match join_result {
            Some(Ok(mut consumer)) => {
                let leftovers = consumer.drain_unconsumed();
                if !leftovers.is_empty() {
                    debug!(
                        context = %self.id,
                        freed = leftovers.len(),
                        "freed unconsumed subtasks at stop"
                    );
                }
                drop(leftovers);
                Ok(())
            }
            Some(Err(_)) => Err(AdmissionError::Internal(
                "scheduler thread panicked".into(),
            )),
            None => Ok(()),
        };

        *self.state.lock() = LifecycleState::Stopped;
        info!(context = %self.id, "admission context stopped");
        outcome
    }
}

impl<E: OffloadEngine> PollTarget for AdmissionContext<E> {
    fn begin_progress(&self) -> Box<dyn EnginePoll + '_> {
        Box::new(HeldBinding {
            guard: self.engine.lock(),
        })
    }

    fn is_stopped(&self) -> bool {
        *self.state.lock() == LifecycleState::Stopped
    }

    fn has_submitted(&self) -> bool {
        self.counters.submitted_tasks.load(Ordering::Relaxed) > 0
    }

    fn context_id(&self) -> Uuid {
        self.id
    }
}

/// Exclusive engine lock held for the duration of one progress pass.
struct HeldBinding<'a, E: OffloadEngine> {
    guard: MutexGuard<'a, E>,
}

impl<E: OffloadEngine> EnginePoll for HeldBinding<'_, E> {
    fn poll_once(&mut self) -> usize {
        self.guard.poll_once()
    }
}

/// Everything one scheduler tick needs; moves into the worker thread.
struct SchedulerWorker<E: OffloadEngine> {
    engine: Arc<Mutex<E>>,
    ledger: Arc<dyn QuotaLedger>,
    counters: Arc<ContextCounters>,
    tenant: TenantId,
    tick_interval: Duration,
    budget_ceiling: u32,
    context_id: Uuid,
}

impl<E: OffloadEngine> SchedulerWorker<E> {
    /// The scheduler loop. Returns the ring consumer at exit so the
    /// stopping context can drain unconsumed slots.
    fn run(self, mut subtasks: RingConsumer<E::Subtask>) -> RingConsumer<E::Subtask> {
        debug!(context = %self.context_id, "scheduler thread started");
        loop {
            self.counters.ticks.fetch_add(1, Ordering::Relaxed);

            // 1. Snapshot this tenant's token budget; a ledger fault aborts
            //    only the current tick.
            let tokens = match self.ledger.try_reserve(self.tenant, self.budget_ceiling) {
                Ok(tokens) => tokens,
                Err(e) => {
                    self.counters.ledger_faults.fetch_add(1, Ordering::Relaxed);
                    error!(context = %self.context_id, error = %e, "token snapshot failed, skipping tick");
                    thread::sleep(self.tick_interval);
                    continue;
                }
            };

            // 2. Wait for work; a stop request wins over a ready slot.
            if subtasks.wait_ready() == RingWait::Stopped {
                break;
            }

            // 3. Dispatch up to the observed budget, holding the exclusive
            //    lock only around each engine call. The cursor advances only
            //    on success; a rejected subtask stays in its slot.
            let mut dispatched: u32 = 0;
            while dispatched < tokens {
                let Some(subtask) = subtasks.take() else { break };
                let outcome = { self.engine.lock().dispatch(subtask) };
                match outcome {
                    Ok(()) => {
                        subtasks.advance();
                        dispatched += 1;
                    }
                    Err(failure) => {
                        subtasks.restore(failure.subtask);
                        self.counters
                            .dispatch_rejections
                            .fetch_add(1, Ordering::Relaxed);
                        warn!(
                            context = %self.context_id,
                            error = %failure.error,
                            "engine rejected dispatch, will retry next tick"
                        );
                        break;
                    }
                }
            }

            // 4. Commit exactly what was dispatched, never what was intended.
            if dispatched > 0 {
                self.counters
                    .dispatched_subtasks
                    .fetch_add(u64::from(dispatched), Ordering::Relaxed);
            }
            if let Err(e) = self.ledger.release(self.tenant, dispatched) {
                self.counters.ledger_faults.fetch_add(1, Ordering::Relaxed);
                error!(context = %self.context_id, error = %e, "token release failed");
            }

            // 5. Fixed tick.
            thread::sleep(self.tick_interval);
        }
        debug!(context = %self.context_id, "scheduler thread exiting");
        subtasks
    }
}

//! Core admission-control components.

pub mod completion;
pub mod context;
pub mod engine;
pub mod error;
pub mod pacer;
pub mod polling;
pub mod ring;

pub use completion::{CompletionRecord, TaskHandle};
pub use context::{AdmissionContext, ContextStats, LifecycleState, TaskDescriptor};
pub use engine::{DispatchFailure, EngineKind, OffloadEngine};
pub use error::{AdmissionError, AppResult, DeviceError, LedgerError};
pub use pacer::LatencyPacer;
pub use polling::{EnginePoll, PollTarget, PollingEngine, ProgressStats};
pub use ring::{RingConsume, RingConsumer, RingProducer, RingWait};

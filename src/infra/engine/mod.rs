//! Engine bindings. The loopback engine stands in for real offload
//! hardware in tests and local development.

pub mod loopback;

pub use loopback::{CompletionCallback, LoopbackControls, LoopbackEngine, LoopbackSubtask};

//! # Offload Admission
//!
//! An admission-control and pacing scheduler for callback-driven hardware
//! offload engines.
//!
//! This library sits between application code that produces units of offload
//! work (erasure-coded block construction, authenticated encryption,
//! compression) and an asynchronous hardware acceleration engine that executes
//! that work out of process control. The engine itself is an opaque
//! collaborator behind the [`core::OffloadEngine`] trait: it only knows how to
//! accept a subtask and how to fire completion callbacks when polled.
//!
//! ## Core Problem Solved
//!
//! Hardware offload engines have scheduling constraints that ordinary thread
//! pools do not:
//!
//! - **Shared silicon**: several processes share one accelerator, so in-flight
//!   work must be bounded by a cross-process token budget per tenant
//! - **Callback completion**: the engine reports results only when polled, and
//!   its handle is not safe for concurrent submit-and-poll
//! - **Latency accounting**: submissions need a paced target timestamp so
//!   downstream latency tracking has a stable reference schedule
//!
//! ## Key Components
//!
//! - [`core::AdmissionContext`]: owns one engine binding and a background
//!   scheduler thread that drains a subtask ring under the token budget
//! - [`core::ring`]: fixed-capacity SPSC ring with a readiness gate per slot
//! - [`core::PollingEngine`]: locks every attached context, drives completion
//!   callbacks, and reports whether anything finished
//! - [`infra::ledger`]: quota ledgers, in-memory for tests and file-backed
//!   with an exclusive lock for cross-process deployments
//!
//! ## Example
//!
//! ```rust,ignore
//! use offload_admission::builders::build_contexts;
//! use offload_admission::config::AdmissionConfig;
//! use offload_admission::core::{PollingEngine, TaskDescriptor};
//!
//! let cfg = AdmissionConfig::from_json_str(&std::fs::read_to_string("admission.json")?)?;
//! let contexts = build_contexts(&cfg, |name, ctx_cfg| Ok(my_engine(name, ctx_cfg)))?;
//!
//! let mut pe = PollingEngine::new();
//! let ctx = contexts["ec"].clone();
//! pe.attach(ctx.clone())?;
//! ctx.start()?;
//!
//! let handle = ctx.submit_task(descriptor)?;
//! while !handle.record().is_complete() {
//!     pe.progress();
//! }
//! ```
//!
//! For complete examples, see `tests/admission_tests.rs`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling components: contexts, ring, pacing, completion tracking.
pub mod core;
/// Configuration models for contexts and quota ledgers.
pub mod config;
/// Builders to construct admission components from configuration.
pub mod builders;
/// Infrastructure adapters for quota ledgers and engine bindings.
pub mod infra;
/// Shared utilities.
pub mod util;

//! Configuration models for contexts, ledgers, and pacing.

pub mod admission;

pub use admission::{AdmissionConfig, ContextConfig, LedgerBackendConfig, LedgerConfig};

//! Builders to construct ledgers and admission contexts from configuration.

pub mod context_builder;

pub use context_builder::{build_contexts, build_ledger};

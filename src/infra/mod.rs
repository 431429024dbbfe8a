//! Infrastructure adapters: quota ledgers and engine bindings.

pub mod engine;
pub mod ledger;

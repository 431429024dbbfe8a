//! Quota ledger backends: per-tenant token accounting for a shared
//! hardware pool.
//!
//! A token is permission to dispatch one subtask. The ledger does not hand
//! tokens out; it lets a scheduler *observe* its budget at the start of a
//! tick and *commit* what it actually used at the end. The contract that
//! keeps the pool conserved:
//!
//! - a context never dispatches more units in one tick than the count it
//!   observed via [`QuotaLedger::try_reserve`] at the start of that tick;
//! - it releases exactly the amount it actually consumed, not the amount
//!   it intended to consume, so a failed dispatch leaks no quota.

pub mod file;
pub mod memory;

pub use file::SharedFileLedger;
pub use memory::InMemoryLedger;

use crate::core::error::LedgerError;

/// Identifier of a consumer of the shared hardware pool.
pub type TenantId = u32;

/// Per-tenant token table. Every call is one short critical section under a
/// single lock; ledger locks are never nested inside a context lock or vice
/// versa.
pub trait QuotaLedger: Send + Sync {
    /// Observe how many of up to `want` tokens are currently available for
    /// `tenant`. Does not mutate the table.
    ///
    /// # Errors
    ///
    /// [`LedgerError`] on an unknown tenant or a lock/storage fault.
    fn try_reserve(&self, tenant: TenantId, want: u32) -> Result<u32, LedgerError>;

    /// Commit `used` tokens as consumed (the amount actually dispatched).
    ///
    /// # Errors
    ///
    /// [`LedgerError`] on an unknown tenant or a lock/storage fault.
    fn release(&self, tenant: TenantId, used: u32) -> Result<(), LedgerError>;

    /// Grant additional tokens to `tenant` (the external replenisher).
    ///
    /// # Errors
    ///
    /// [`LedgerError`] on an unknown tenant or a lock/storage fault.
    fn replenish(&self, tenant: TenantId, amount: u32) -> Result<(), LedgerError>;

    /// Current token count for `tenant`.
    ///
    /// # Errors
    ///
    /// [`LedgerError`] on an unknown tenant or a lock/storage fault.
    fn available(&self, tenant: TenantId) -> Result<u32, LedgerError>;
}

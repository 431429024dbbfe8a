//! In-process quota ledger for tests and single-process deployments.

use parking_lot::Mutex;

use super::{QuotaLedger, TenantId};
use crate::core::error::LedgerError;

/// Mutex-guarded token table with the same observe/commit contract as the
/// cross-process backend.
#[derive(Debug)]
pub struct InMemoryLedger {
    table: Mutex<Vec<u32>>,
}

impl InMemoryLedger {
    /// Create a table with `tenants` slots, each seeded with
    /// `initial_tokens`.
    #[must_use]
    pub fn new(tenants: usize, initial_tokens: u32) -> Self {
        Self {
            table: Mutex::new(vec![initial_tokens; tenants]),
        }
    }
}

impl QuotaLedger for InMemoryLedger {
    fn try_reserve(&self, tenant: TenantId, want: u32) -> Result<u32, LedgerError> {
        let table = self.table.lock();
        let available = *table
            .get(tenant as usize)
            .ok_or(LedgerError::UnknownTenant(tenant))?;
        Ok(available.min(want))
    }

    fn release(&self, tenant: TenantId, used: u32) -> Result<(), LedgerError> {
        let mut table = self.table.lock();
        let slot = table
            .get_mut(tenant as usize)
            .ok_or(LedgerError::UnknownTenant(tenant))?;
        *slot = slot.saturating_sub(used);
        Ok(())
    }

    fn replenish(&self, tenant: TenantId, amount: u32) -> Result<(), LedgerError> {
        let mut table = self.table.lock();
        let slot = table
            .get_mut(tenant as usize)
            .ok_or(LedgerError::UnknownTenant(tenant))?;
        *slot = slot.saturating_add(amount);
        Ok(())
    }

    fn available(&self, tenant: TenantId) -> Result<u32, LedgerError> {
        let table = self.table.lock();
        table
            .get(tenant as usize)
            .copied()
            .ok_or(LedgerError::UnknownTenant(tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_observes_without_mutating() {
        let ledger = InMemoryLedger::new(2, 10);
        assert_eq!(ledger.try_reserve(0, 4).unwrap(), 4);
        assert_eq!(ledger.try_reserve(0, 64).unwrap(), 10);
        assert_eq!(ledger.available(0).unwrap(), 10);
    }

    #[test]
    fn release_commits_actual_use() {
        let ledger = InMemoryLedger::new(1, 10);
        ledger.release(0, 3).unwrap();
        assert_eq!(ledger.available(0).unwrap(), 7);
        ledger.replenish(0, 5).unwrap();
        assert_eq!(ledger.available(0).unwrap(), 12);
    }

    #[test]
    fn unknown_tenant_is_rejected() {
        let ledger = InMemoryLedger::new(1, 10);
        assert!(matches!(
            ledger.try_reserve(7, 1),
            Err(LedgerError::UnknownTenant(7))
        ));
    }
}

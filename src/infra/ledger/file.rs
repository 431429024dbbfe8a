//! Cross-process quota ledger backed by a shared counter file.
//!
//! The table is a flat array of little-endian `u32` counters, one per
//! tenant, guarded by an advisory exclusive lock on the file itself. Any
//! process that opens the same path sees the same token pool, so several
//! admission daemons can share one hardware budget without coordinating
//! beyond the filesystem.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use super::{QuotaLedger, TenantId};
use crate::core::error::LedgerError;

const SLOT_BYTES: u64 = 4;

/// File-backed token table shared between processes.
///
/// Each operation opens the file, takes the exclusive lock, reads or
/// rewrites the table, and drops the handle (which releases the lock).
/// Ledger calls happen once per scheduler tick, so the open-per-call cost
/// is irrelevant next to the tick interval.
#[derive(Debug, Clone)]
pub struct SharedFileLedger {
    path: PathBuf,
    tenants: usize,
}

impl SharedFileLedger {
    /// Open (creating and seeding if absent) the ledger file at `path`.
    ///
    /// A fresh file is seeded with `initial_tokens` in every tenant slot.
    /// An existing file is validated for size and reused as-is, so a second
    /// process joining an established pool does not reset anyone's budget.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] on I/O failure, [`LedgerError::Truncated`]
    /// if an existing file is too small for `tenants` slots.
    pub fn open(
        path: impl AsRef<Path>,
        tenants: usize,
        initial_tokens: u32,
    ) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        let len = file.metadata()?.len();
        let expected = tenants as u64 * SLOT_BYTES;
        if len == 0 {
            let table = vec![initial_tokens; tenants];
            write_table(&mut file, &table)?;
            debug!(path = %path.display(), tenants, initial_tokens, "seeded ledger file");
        } else if len < expected {
            return Err(LedgerError::Truncated {
                expected: tenants,
                found: (len / SLOT_BYTES) as usize,
            });
        }

        Ok(Self { path, tenants })
    }

    /// Number of tenant slots this handle was opened with.
    #[must_use]
    pub const fn tenants(&self) -> usize {
        self.tenants
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_table<R>(
        &self,
        tenant: TenantId,
        apply: impl FnOnce(&mut File, &mut Vec<u32>, usize) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let index = tenant as usize;
        if index >= self.tenants {
            return Err(LedgerError::UnknownTenant(tenant));
        }
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.lock_exclusive()?;
        let mut table = read_table(&mut file, self.tenants)?;
        apply(&mut file, &mut table, index)
        // Dropping `file` releases the advisory lock.
    }
}

impl QuotaLedger for SharedFileLedger {
    fn try_reserve(&self, tenant: TenantId, want: u32) -> Result<u32, LedgerError> {
        self.with_table(tenant, |_, table, index| Ok(table[index].min(want)))
    }

    fn release(&self, tenant: TenantId, used: u32) -> Result<(), LedgerError> {
        if used == 0 {
            // Nothing to commit; skip the lock round-trip.
            if tenant as usize >= self.tenants {
                return Err(LedgerError::UnknownTenant(tenant));
            }
            return Ok(());
        }
        self.with_table(tenant, |file, table, index| {
            table[index] = table[index].saturating_sub(used);
            write_table(file, table)
        })
    }

    fn replenish(&self, tenant: TenantId, amount: u32) -> Result<(), LedgerError> {
        self.with_table(tenant, |file, table, index| {
            table[index] = table[index].saturating_add(amount);
            write_table(file, table)
        })
    }

    fn available(&self, tenant: TenantId) -> Result<u32, LedgerError> {
        self.with_table(tenant, |_, table, index| Ok(table[index]))
    }
}

fn read_table(file: &mut File, tenants: usize) -> Result<Vec<u32>, LedgerError> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = vec![0u8; tenants * SLOT_BYTES as usize];
    file.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(SLOT_BYTES as usize)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn write_table(file: &mut File, table: &[u32]) -> Result<(), LedgerError> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::with_capacity(table.len() * SLOT_BYTES as usize);
    for value in table {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    file.write_all(&bytes)?;
    file.flush()?;
    Ok(())
}

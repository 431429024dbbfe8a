//! Context and ledger configuration structures.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::engine::EngineKind;
use crate::infra::ledger::TenantId;

/// Ledger backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackendConfig {
    /// In-memory table for development/testing.
    InMemory,
    /// Cross-process table backed by a shared counter file.
    File {
        /// Path of the counter file, shared by all participating processes.
        path: PathBuf,
    },
}

/// Quota ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Number of tenant slots in the token table.
    pub tenants: usize,
    /// Tokens seeded into each slot of a fresh table.
    pub initial_tokens: u32,
    /// Backend selection.
    pub backend: LedgerBackendConfig,
}

/// Per-context configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Engine kind this context binds to.
    pub kind: EngineKind,
    /// Tenant slot charged for this context's dispatches.
    pub tenant: TenantId,
    /// Capacity of the subtask ring; also the per-tick dispatch ceiling.
    pub ring_capacity: usize,
    /// Largest subtask batch a single task may carry.
    pub max_subtasks_per_task: usize,
    /// Scheduler tick interval in microseconds.
    pub tick_interval_us: u64,
    /// Latency SLA interval in microseconds, used to pace deadlines.
    pub sla_interval_us: u64,
}

impl ContextConfig {
    /// Create a configuration with workable defaults for `kind`/`tenant`.
    #[must_use]
    pub const fn new(kind: EngineKind, tenant: TenantId) -> Self {
        Self {
            kind,
            tenant,
            ring_capacity: 64,
            max_subtasks_per_task: 16,
            tick_interval_us: 100,
            sla_interval_us: 1000,
        }
    }

    /// Set the ring capacity.
    #[must_use]
    pub const fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    /// Set the per-task subtask limit.
    #[must_use]
    pub const fn with_max_subtasks_per_task(mut self, limit: usize) -> Self {
        self.max_subtasks_per_task = limit;
        self
    }

    /// Set the scheduler tick interval in microseconds.
    #[must_use]
    pub const fn with_tick_interval_us(mut self, us: u64) -> Self {
        self.tick_interval_us = us;
        self
    }

    /// Set the latency SLA interval in microseconds.
    #[must_use]
    pub const fn with_sla_interval_us(mut self, us: u64) -> Self {
        self.sla_interval_us = us;
        self
    }

    /// Scheduler tick interval as a [`Duration`].
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_micros(self.tick_interval_us)
    }

    /// Latency SLA interval as a [`Duration`].
    #[must_use]
    pub const fn sla_interval(&self) -> Duration {
        Duration::from_micros(self.sla_interval_us)
    }

    /// Validate context configuration values.
    ///
    /// # Errors
    ///
    /// A human-readable description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.ring_capacity == 0 {
            return Err("ring_capacity must be greater than 0".into());
        }
        if self.max_subtasks_per_task == 0 {
            return Err("max_subtasks_per_task must be greater than 0".into());
        }
        if self.max_subtasks_per_task > self.ring_capacity {
            return Err("max_subtasks_per_task cannot exceed ring_capacity".into());
        }
        if self.tick_interval_us == 0 {
            return Err("tick_interval_us must be greater than 0".into());
        }
        if self.sla_interval_us == 0 {
            return Err("sla_interval_us must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root admission-layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Shared token table configuration.
    pub ledger: LedgerConfig,
    /// Map of context name to configuration.
    pub contexts: HashMap<String, ContextConfig>,
}

impl LedgerConfig {
    /// Validate ledger configuration values.
    ///
    /// # Errors
    ///
    /// A human-readable description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.tenants == 0 {
            return Err("tenants must be greater than 0".into());
        }
        Ok(())
    }
}

impl AdmissionConfig {
    /// Validate all contexts and ensure each references a known tenant.
    ///
    /// # Errors
    ///
    /// A human-readable description of the first invalid entry.
    pub fn validate(&self) -> Result<(), String> {
        self.ledger.validate()?;
        if self.contexts.is_empty() {
            return Err("at least one context must be defined".into());
        }
        for (name, context) in &self.contexts {
            context
                .validate()
                .map_err(|e| format!("context `{name}` invalid: {e}"))?;
            if context.tenant as usize >= self.ledger.tenants {
                return Err(format!(
                    "context `{name}` references tenant {} but the ledger has {} slots",
                    context.tenant, self.ledger.tenants
                ));
            }
        }
        Ok(())
    }

    /// Parse admission configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// A parse or validation error description.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ContextConfig::new(EngineKind::ErasureCoding, 0).validate().is_ok());
    }

    #[test]
    fn batch_limit_bounded_by_capacity() {
        let cfg = ContextConfig::new(EngineKind::Cipher, 0)
            .with_ring_capacity(4)
            .with_max_subtasks_per_task(8);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_round_trip_with_validation() {
        let input = r#"{
            "ledger": {
                "tenants": 2,
                "initial_tokens": 32,
                "backend": "in_memory"
            },
            "contexts": {
                "ec": {
                    "kind": "erasure_coding",
                    "tenant": 0,
                    "ring_capacity": 8,
                    "max_subtasks_per_task": 4,
                    "tick_interval_us": 100,
                    "sla_interval_us": 1000
                }
            }
        }"#;
        let cfg = AdmissionConfig::from_json_str(input).unwrap();
        assert_eq!(cfg.contexts["ec"].ring_capacity, 8);
    }

    #[test]
    fn unknown_tenant_rejected_at_config_level() {
        let mut contexts = HashMap::new();
        contexts.insert("c".to_string(), ContextConfig::new(EngineKind::Cipher, 5));
        let cfg = AdmissionConfig {
            ledger: LedgerConfig {
                tenants: 2,
                initial_tokens: 0,
                backend: LedgerBackendConfig::InMemory,
            },
            contexts,
        };
        assert!(cfg.validate().is_err());
    }
}

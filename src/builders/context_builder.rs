//! Assembly of a configured admission layer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AdmissionConfig, ContextConfig, LedgerBackendConfig, LedgerConfig};
use crate::core::{AdmissionContext, AdmissionError, OffloadEngine};
use crate::infra::ledger::{InMemoryLedger, QuotaLedger, SharedFileLedger};

/// Build the configured quota ledger backend.
///
/// # Errors
///
/// `InvalidConfig` if the configuration fails validation, `Ledger` if a
/// file backend cannot be opened.
pub fn build_ledger(cfg: &LedgerConfig) -> Result<Arc<dyn QuotaLedger>, AdmissionError> {
    cfg.validate().map_err(AdmissionError::InvalidConfig)?;
    match &cfg.backend {
        LedgerBackendConfig::InMemory => {
            Ok(Arc::new(InMemoryLedger::new(cfg.tenants, cfg.initial_tokens)))
        }
        LedgerBackendConfig::File { path } => Ok(Arc::new(SharedFileLedger::open(
            path,
            cfg.tenants,
            cfg.initial_tokens,
        )?)),
    }
}

/// Build admission contexts from configuration using the provided engine
/// factory, all sharing one ledger built from `cfg.ledger`.
///
/// The factory is called once per configured context with its name and
/// configuration, and must produce an engine whose kind matches the
/// configured one.
///
/// # Errors
///
/// `InvalidConfig` on validation failure or an engine/config kind
/// mismatch; any error from the factory or ledger construction.
pub fn build_contexts<E, F>(
    cfg: &AdmissionConfig,
    mut engine_factory: F,
) -> Result<HashMap<String, Arc<AdmissionContext<E>>>, AdmissionError>
where
    E: OffloadEngine,
    F: FnMut(&str, &ContextConfig) -> Result<E, AdmissionError>,
{
    cfg.validate().map_err(AdmissionError::InvalidConfig)?;
    let ledger = build_ledger(&cfg.ledger)?;

    let mut contexts = HashMap::new();
    for (name, ctx_cfg) in &cfg.contexts {
        let engine = engine_factory(name, ctx_cfg)?;
        if engine.kind() != ctx_cfg.kind {
            return Err(AdmissionError::InvalidConfig(format!(
                "context `{name}` configured for {} but the factory built {}",
                ctx_cfg.kind,
                engine.kind()
            )));
        }
        let context = AdmissionContext::new(ctx_cfg.clone(), engine, Arc::clone(&ledger))?;
        contexts.insert(name.clone(), Arc::new(context));
    }

    Ok(contexts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineKind;
    use crate::infra::engine::LoopbackEngine;

    fn one_context_config() -> AdmissionConfig {
        let mut contexts = HashMap::new();
        contexts.insert(
            "ec".to_string(),
            ContextConfig::new(EngineKind::ErasureCoding, 0)
                .with_ring_capacity(4)
                .with_max_subtasks_per_task(4),
        );
        AdmissionConfig {
            ledger: LedgerConfig {
                tenants: 1,
                initial_tokens: 8,
                backend: LedgerBackendConfig::InMemory,
            },
            contexts,
        }
    }

    #[test]
    fn builds_contexts_against_shared_ledger() {
        let cfg = one_context_config();
        let contexts = build_contexts(&cfg, |_, ctx_cfg| {
            Ok(LoopbackEngine::new(ctx_cfg.kind, Box::new(|_| {}), Box::new(|_| {})))
        })
        .unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts["ec"].kind(), EngineKind::ErasureCoding);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let cfg = one_context_config();
        let result = build_contexts(&cfg, |_, _| {
            Ok(LoopbackEngine::new(EngineKind::Cipher, Box::new(|_| {}), Box::new(|_| {})))
        });
        assert!(matches!(result, Err(AdmissionError::InvalidConfig(_))));
    }
}

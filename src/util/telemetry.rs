//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing/telemetry. Loads `.env` overrides if present, then
/// installs a default env-based subscriber unless the caller already set
/// one.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

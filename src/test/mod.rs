//! Shared functionality which is used in unit tests


use std::sync::Once;

/// Installs a `tracing` subscriber honouring `RUST_LOG`, once per test binary
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

//! Shared integration-test support. Lives under `tests/common/` (not
//! directly under `tests/`) so cargo treats it as a module included by the
//! other test files rather than a standalone test binary of its own.

/// Installs a global tracing subscriber so `trace!`/`debug!`/`warn!` output
/// from relink and solve (spec §4.4, §4.5, §7) is observable under
/// `cargo test -- --nocapture`, mirroring `src/test_support.rs`'s unit-test
/// counterpart. Safe to call from every test; a second call in the same
/// process is a harmless no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

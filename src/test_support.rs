//! Test-only tracing setup, mirroring the subscriber construction in the
//! teacher's `ox-bin` entrypoint (`tracing_subscriber::fmt()` with an
//! env-filter), except routed through [`tracing_subscriber::fmt()
//! ::with_test_writer`] so `trace!`/`debug!`/`warn!` output from the relink
//! and solver modules (spec §4.4, §4.5, §7) interleaves correctly with
//! `cargo test`'s captured per-test output instead of racing stdout across
//! parallel test threads.

use tracing_subscriber::EnvFilter;

/// Installs a global subscriber on first call; a later call in the same
/// process is a harmless no-op (`try_init` returns `Err`, which this
/// discards, matching the teacher's own `Err(_err) => {}` branch in
/// `configure_logging`).
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

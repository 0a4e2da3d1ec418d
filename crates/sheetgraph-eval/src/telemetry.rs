//! Opt-in log output for binaries and tests embedding the engine.

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `warn`).
/// Does nothing if a global subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing() {}

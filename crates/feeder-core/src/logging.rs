use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber on stderr. `RUST_LOG` overrides the `info` default.
/// Calling it twice is harmless; the second install is ignored.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

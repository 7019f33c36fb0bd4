use tracing_subscriber::EnvFilter;

/// fallback filter when RUST_LOG is not set
pub const DEFAULT_FILTER: &str = "debug";

/// Install the global subscriber, timestamped lines on stderr
///
/// Must be called once at process start before anything logs, `RUST_LOG` takes precedence over
/// `DEFAULT_FILTER`.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber.
///
/// The filter comes from `RUST_LOG`, else `LOG_LEVEL`, else `default_level`.
/// Log lines go to stderr so they never interleave with the menu on stdout.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: JSON lines on stdout, filtered by RUST_LOG
/// and falling back to `default_filter`. `log` records from actix and the
/// request logger are forwarded into the same pipeline.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(default_filter: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
}

use std::sync::Once;

use sink_config::Environment;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for a sink process.
///
/// Logs are rendered as JSON in deployed environments and as human readable lines in
/// development. Every line carries the `app` field so logs of several sink processes can be
/// told apart. Events emitted through the `log` crate are forwarded to tracing.
pub fn init_tracing(app_name: &str, environment: Environment) -> Result<(), TryInitError> {
    // Fails if a log tracer is already installed.
    let _ = tracing_log::LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    if environment.is_deployed() {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }

    tracing::info!(app = app_name, environment = %environment, "tracing initialized");

    Ok(())
}

/// Installs a subscriber writing to the test harness output.
///
/// Safe to call from every test, only the first call installs the subscriber. The level is
/// taken from `RUST_LOG`, so tests stay quiet unless asked otherwise.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

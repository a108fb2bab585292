use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "sink=info";

/// Filter applied in tests when `RUST_LOG` is not set.
const DEFAULT_TEST_FILTER: &str = "sink=debug";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs a global subscriber that writes formatted events to stdout.
///
/// The filter is read from `RUST_LOG` and falls back to `sink=info`. Fails when a global
/// subscriber is already installed.
pub fn init_tracing() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(fmt::layer())
        .try_init()
}

/// Installs a test-friendly subscriber once per process.
///
/// Output goes through the test writer so it is captured per test. Safe to call from every test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_TEST_FILTER.into()),
            )
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

//! Test logging setup shared by unit and integration tests

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

static TEST_SETUP: Once = Once::new();

/// Install a stderr subscriber once per test binary.
///
/// Honours `RUST_LOG`; defaults to `icdsync=debug`.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("icdsync=debug"));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_test_writer()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter),
        );

        // Another harness may already own the global dispatcher.
        if subscriber.try_init().is_err() {
            debug!("Tracing subscriber already set");
        }
    });
}

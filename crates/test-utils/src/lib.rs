pub mod builders;
pub mod fake_runner;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Set up tracing once for the whole test binary.
///
/// Uses `with_test_writer()`, so output is captured per test and only shown
/// for failures (or with `-- --nocapture`). Levels come from `RUST_LOG`,
/// defaulting to `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await a future, panicking if it takes longer than five seconds. Keeps a
/// stuck executor or an unkilled child process from hanging the suite.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

//! Test-only helpers shared across the workspace: logging-for-tests
//! init, and the env-var gate for tests that need a live Postgres.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::sync::Once;

#[cfg(feature = "future_timeout")]
mod timeout;
#[cfg(feature = "future_timeout")]
pub use timeout::FutureTimeout;

static LOG_INIT: Once = Once::new();

/// Installs a `tracing_subscriber` driven by `RUST_LOG` (default `debug`)
/// exactly once per process, no matter how many tests call this. Safe to
/// call from every test that wants to see its own log output; `cargo test`
/// runs tests in separate threads of one process, so a `Once` is enough
/// (unlike a full binary, which would use `trogging::Builder`).
pub fn maybe_start_logging() {
    LOG_INIT.call_once(|| {
        dotenvy::dotenv().ok();
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Returns the Postgres connection string for Store integration tests, or
/// `None` if `FRACTAL_TEST_DATABASE_URL` is unset — the gate that lets
/// `cargo test` skip tests needing a live database rather than failing to
/// connect.
pub fn test_database_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("FRACTAL_TEST_DATABASE_URL").ok()
}

/// Skips the calling test (by returning early) unless a test database is
/// configured, logging why.
#[macro_export]
macro_rules! maybe_skip_integration {
    () => {
        match $crate::test_database_url() {
            Some(url) => url,
            None => {
                eprintln!(
                    "skipping integration test: FRACTAL_TEST_DATABASE_URL is not set"
                );
                return;
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_var_is_none() {
        std::env::remove_var("FRACTAL_TEST_DATABASE_URL");
        assert!(test_database_url().is_none());
    }
}

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// Bounds how long a test will wait on a future before failing, so a
/// hung lease/poll loop fails the test instead of the suite.
#[async_trait]
pub trait FutureTimeout: Future {
    /// Awaits `self`, panicking if it does not resolve within `duration`.
    async fn with_timeout_panic(self, duration: Duration) -> Self::Output;
}

#[async_trait]
impl<F> FutureTimeout for F
where
    F: Future + Send,
{
    async fn with_timeout_panic(self, duration: Duration) -> Self::Output {
        tokio::time::timeout(duration, self)
            .await
            .expect("future did not complete within timeout")
    }
}

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Default time to wait for an expected condition before failing a test.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Awaits `future`, panicking when it does not finish within `timeout_duration`.
///
/// Keeps tests from hanging forever when an expected state is never reached.
pub async fn with_timeout<F>(timeout_duration: Duration, future: F) -> F::Output
where
    F: Future,
{
    match timeout(timeout_duration, future).await {
        Ok(output) => output,
        Err(_) => panic!(
            "Test notification timed out after {timeout_duration:?}. \
             This likely indicates the expected state was never reached."
        ),
    }
}

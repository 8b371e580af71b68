//! Bounded exponential backoff for remote calls

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use drivesync_core::ports::classify;

/// Maximum number of retries after the first attempt
pub const MAX_RETRIES: u32 = 5;

/// Delay before the first retry; doubles on every further retry
pub const BASE_DELAY_SECS: u64 = 1;

/// Retry an operation while it fails with a transient remote error
///
/// Rate limiting (403) and server errors (5xx) are retried up to
/// [`MAX_RETRIES`] times with delays of 1, 2, 4, 8 and 16 seconds. Every
/// other error, idle timeouts included, is returned at once.
pub async fn with_retry<F, Fut, T>(operation_name: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if attempt < MAX_RETRIES && classify(&err).is_transient() => {
                let delay_secs = BASE_DELAY_SECS * 2u64.pow(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_secs,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

//! Retry executor.
//!
//! Every attempt re-runs the operation closure from scratch, so anything the
//! operation builds internally (a freshly signed transaction with a new blockhash,
//! a new upload request) is rebuilt per attempt.

use std::future::Future;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use forge_types::{is_permanent, ForgeError, RetryPolicy};

use crate::delay::sleep;

/// Invoke `op` until it succeeds or `policy.max_attempts()` attempts have failed.
///
/// `op` receives the 1-based attempt number. Permanent errors (see
/// [`ForgeError::is_permanent`]) are returned after the attempt that produced them.
/// Once every attempt has failed the last error is returned wrapped in
/// [`ForgeError::Exhausted`].
pub async fn retry<T, F, Fut>(operation: &str, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1u32;

    loop {
        debug!(operation, attempt, max_attempts, "attempt started");
        match op(attempt).await {
            Ok(v) => {
                if attempt > 1 {
                    info!(operation, attempt, max_attempts, "succeeded after retry");
                }
                return Ok(v);
            }
            Err(e) if is_permanent(&e) => {
                error!(operation, attempt, error = %format!("{:#}", e), "permanent failure, not retrying");
                return Err(e);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    error!(operation, attempts = attempt, error = %format!("{:#}", e), "all attempts failed");
                    return Err(ForgeError::Exhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        source: e,
                    }
                    .into());
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %format!("{:#}", e),
                    "attempt failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

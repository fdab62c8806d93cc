//! Eventual-visibility poller.
//!
//! A write accepted by one node may not be readable from the node we query next,
//! so a failed lookup right after a mutation is not treated as definitive.

use std::future::Future;

use anyhow::Result;
use tracing::{debug, info};

use forge_types::{is_permanent, ForgeError, ResourceHandle, RetryPolicy};

use crate::delay::sleep;

/// Call `lookup` until it returns `Ok` or `policy.max_attempts()` lookups have missed.
///
/// Any `Err` from `lookup` counts as "not visible yet", except permanent errors,
/// which end polling immediately. There is no delay after the final miss. When every
/// lookup misses the result is [`ForgeError::NotFound`] carrying `handle` and the
/// number of lookups made.
pub async fn await_visible<T, F, Fut>(
    handle: &ResourceHandle,
    policy: &RetryPolicy,
    mut lookup: F,
) -> Result<T>
where
    F: FnMut(ResourceHandle) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();

    for attempt in 1..=max_attempts {
        match lookup(handle.clone()).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(%handle, attempt, max_attempts, "resource visible");
                } else {
                    debug!(%handle, "resource visible on first lookup");
                }
                return Ok(value);
            }
            Err(e) if is_permanent(&e) => return Err(e),
            Err(e) => {
                debug!(
                    %handle,
                    attempt,
                    max_attempts,
                    error = %format!("{:#}", e),
                    "resource not visible yet"
                );
                if attempt < max_attempts {
                    sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    Err(ForgeError::NotFound {
        handle: handle.clone(),
        attempts: max_attempts,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_visible_on_fourth_lookup() {
        let calls = AtomicU32::new(0);
        let handle = ResourceHandle::new("Mint4th");
        let start = Instant::now();

        let value = await_visible(&handle, &RetryPolicy::constant(10, 3000), |h| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 4 {
                    Err(anyhow!("account not found"))
                } else {
                    Ok(format!("{}:{}", h, n))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "Mint4th:4");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(9000) && elapsed <= Duration::from_millis(9003));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_visible_reports_handle_and_attempts() {
        let calls = AtomicU32::new(0);
        let handle = ResourceHandle::new("GhostMint");
        let start = Instant::now();

        let err = await_visible(&handle, &RetryPolicy::constant(6, 5000), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(anyhow!("account not found")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        match err.downcast_ref::<ForgeError>() {
            Some(ForgeError::NotFound { handle, attempts }) => {
                assert_eq!(handle.as_str(), "GhostMint");
                assert_eq!(*attempts, 6);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("GhostMint"));
        // Five gaps, none after the final lookup.
        assert!(start.elapsed() <= Duration::from_millis(25_005));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_lookup_error_stops_polling() {
        let calls = AtomicU32::new(0);
        let err = await_visible(&ResourceHandle::new("bad"), &RetryPolicy::constant(10, 100), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), anyhow::Error>(ForgeError::InvalidInput("not a base58 address".into()).into())
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err.downcast_ref::<ForgeError>(),
            Some(ForgeError::InvalidInput(_))
        ));
    }
}

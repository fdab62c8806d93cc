//! Delay primitive used between attempts.

use std::time::Duration;

/// Suspend the current task for `duration`. Zero returns immediately.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    tokio::time::sleep(duration).await;
}

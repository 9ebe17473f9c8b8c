//! Background tasks for the Vaani server.

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use vaani_session::SessionStore;

/// Starts the session expiry sweep.
///
/// Expiry is already enforced lazily on every store access; the sweep exists
/// so idle sessions nobody touches again still release their memory. Runs
/// indefinitely.
pub async fn start_expiry_sweep(store: Arc<SessionStore>, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::warn!("expiry sweep disabled (interval=0); relying on lazy expiry only");
        return;
    }

    let interval = Duration::from_secs(interval_secs);
    tracing::info!(interval_secs, "starting session expiry sweep");

    loop {
        sleep(interval).await;
        let swept = store.sweep_expired().await;
        if swept > 0 {
            tracing::info!(count = swept, "swept expired sessions");
        }
    }
}

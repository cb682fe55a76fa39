//! Confirmation wait
//!
//! Submitted transactions are not polled for receipts. Instead the cycle
//! waits a fixed window assumed long enough for them to be mined. A slow
//! chain can outlast the window, in which case the rebase reads stale
//! oracle values.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait ConfirmationWait: Send + Sync {
    async fn wait_for_confirmation(&self);
}

/// Sleeps `AVERAGE_BLOCK_TIME * BLOCKS_DELAY`
pub struct FixedDelayConfirmation {
    window: Duration,
}

impl FixedDelayConfirmation {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[async_trait]
impl ConfirmationWait for FixedDelayConfirmation {
    async fn wait_for_confirmation(&self) {
        info!(window_secs = self.window.as_secs(), "Waiting for transactions to be mined");
        tokio::time::sleep(self.window).await;
    }
}

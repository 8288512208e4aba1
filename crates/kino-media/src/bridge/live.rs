//! Live-edge polling

use crate::context::MediaContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-frame loop copying the engine's live sync position into the store.
///
/// Skipped ticks are dropped, not replayed. Dropping the loop stops it.
#[derive(Debug)]
pub struct LiveSyncLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl LiveSyncLoop {
    /// Start polling `position` every `period`; `None` means the edge is unknown
    pub fn start<F>(period: Duration, ctx: Arc<MediaContext>, position: F) -> Self
    where
        F: Fn() -> Option<f64> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(?period, "Live sync started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let edge = position().unwrap_or(f64::INFINITY);
                        ctx.store.live_sync_position.set(edge);
                    }
                }
            }
            ctx.store.live_sync_position.set(f64::INFINITY);
            debug!("Live sync stopped");
        });
        Self { token, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }

    pub fn stop(self) {
        self.token.cancel();
    }
}

impl Drop for LiveSyncLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

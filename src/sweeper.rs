use crate::claims::TokenKind;
use crate::store::TokenStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Periodic purge of expired repository entries. Cooperative: the task
/// sleeps on its ticker and exits deterministically when the engine's
/// cancellation token fires. Batch bounds are each backend's concern.
pub(crate) fn spawn_sweeper(
    store: Arc<dyn TokenStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the initial
        // sweep happens one full interval after startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => sweep(store.as_ref()).await,
            }
        }
    })
}

async fn sweep(store: &dyn TokenStore) {
    for kind in [TokenKind::Access, TokenKind::Refresh] {
        match store.cleanup_expired_revoked(kind).await {
            Ok(0) => {}
            Ok(removed) => debug!(kind = %kind, removed, "swept expired revocation entries"),
            Err(err) => warn!(kind = %kind, error = %err, "revocation sweep failed"),
        }
    }
    match store.cleanup_expired_rotated().await {
        Ok(0) => {}
        Ok(removed) => debug!(removed, "swept expired rotation entries"),
        Err(err) => warn!(error = %err, "rotation sweep failed"),
    }
}

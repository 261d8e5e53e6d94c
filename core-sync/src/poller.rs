//! HTTP polling loop.
//!
//! Polling never stops while the engine runs; it only slows down. At the
//! primary cadence it is the sole source of state, and while the push
//! channel is healthy it keeps running at the fallback cadence as a
//! liveness check on the HTTP path.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::SyncEngine;

pub(crate) async fn run(engine: Arc<SyncEngine>, token: CancellationToken) {
    let mut connected_rx = engine.subscribe_push_connected();
    loop {
        let interval = if *connected_rx.borrow_and_update() {
            engine.config().poll_interval_fallback
        } else {
            engine.config().poll_interval_primary
        };
        tokio::select! {
            _ = token.cancelled() => break,
            // A cadence change takes effect immediately instead of after
            // the currently scheduled sleep.
            changed = connected_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if engine.locks().is_polling_paused() {
            debug!("skipping poll tick, operation in flight");
            continue;
        }
        if let Err(e) = engine.refresh().await {
            // Transient by assumption; the next tick retries.
            warn!(error = %e, "poll failed");
        }
    }
    debug!("poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::MockPlayerApi;
    use core_model::StatusResponse;
    use core_runtime::SyncConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_api(calls: Arc<AtomicUsize>) -> MockPlayerApi {
        let mut api = MockPlayerApi::new();
        api.expect_get_state().returning(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(StatusResponse::default())
        });
        api
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Advance virtual time in one-second steps so each poll tick gets to
    /// run and schedule its next sleep before time moves again.
    async fn advance_secs(n: u64) {
        for _ in 0..n {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_at_primary_cadence_without_push_channel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(
            SyncEngine::new(
                SyncConfig::default()
                    .with_poll_intervals(Duration::from_secs(1), Duration::from_secs(5)),
                Arc::new(counting_api(Arc::clone(&calls))),
            )
            .unwrap(),
        );

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&engine), token.clone()));
        settle().await;

        advance_secs(3).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_drops_to_fallback_while_push_connected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(
            SyncEngine::new(
                SyncConfig::default()
                    .with_poll_intervals(Duration::from_secs(1), Duration::from_secs(5)),
                Arc::new(counting_api(Arc::clone(&calls))),
            )
            .unwrap(),
        );
        engine.set_push_connected(true);

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&engine), token.clone()));
        settle().await;

        advance_secs(4).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        advance_secs(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_recovers_immediately_on_disconnect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(
            SyncEngine::new(
                SyncConfig::default()
                    .with_poll_intervals(Duration::from_secs(1), Duration::from_secs(5)),
                Arc::new(counting_api(Arc::clone(&calls))),
            )
            .unwrap(),
        );
        engine.set_push_connected(true);

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&engine), token.clone()));
        settle().await;

        // Mid-way through a 5s fallback sleep the channel drops; the next
        // poll must land 1s later, not 4s later.
        advance_secs(1).await;
        engine.set_push_connected(false);
        settle().await;

        advance_secs(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poll_tick_skipped_while_locked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(
            SyncEngine::new(
                SyncConfig::default()
                    .with_poll_intervals(Duration::from_secs(1), Duration::from_secs(5)),
                Arc::new(counting_api(Arc::clone(&calls))),
            )
            .unwrap(),
        );
        engine.locks().acquire("seek");

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&engine), token.clone()));
        settle().await;

        advance_secs(2).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        engine.locks().release("seek");
        advance_secs(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        token.cancel();
        handle.await.unwrap();
    }
}

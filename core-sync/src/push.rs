//! Push-channel driver: connect, heartbeat, reconnect with backoff.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{PushConnection, PushTransport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;

/// Exponential reconnect backoff with a cap.
///
/// `next_delay` returns the floor on the first call and doubles on each
/// subsequent call, saturating at the cap. A successful connect resets the
/// sequence via `reset`.
#[derive(Debug)]
pub struct Backoff {
    floor: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, cap: Duration) -> Self {
        Self {
            floor,
            cap,
            current: floor,
        }
    }

    /// The delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.cap);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

enum Disconnect {
    /// Shutdown requested; do not reconnect.
    Cancelled,
    /// The connection dropped or errored; reconnect after backoff.
    Dropped,
}

pub(crate) async fn run(
    engine: Arc<SyncEngine>,
    transport: Arc<dyn PushTransport>,
    token: CancellationToken,
) {
    let config = engine.config().clone();
    let mut backoff = Backoff::new(config.reconnect_floor, config.reconnect_cap);
    loop {
        let connect = tokio::select! {
            _ = token.cancelled() => break,
            result = transport.connect() => result,
        };
        match connect {
            Ok(mut conn) => {
                backoff.reset();
                info!("push channel connected");
                engine.set_push_connected(true);
                let reason =
                    drive(&engine, conn.as_mut(), config.heartbeat_interval, &token).await;
                engine.set_push_connected(false);
                let _ = conn.close().await;
                match reason {
                    Disconnect::Cancelled => break,
                    Disconnect::Dropped => warn!("push channel dropped"),
                }
            }
            Err(e) => {
                warn!(error = %e, "push channel connect failed");
            }
        }
        let delay = backoff.next_delay();
        debug!(delay = ?delay, "scheduling push channel reconnect");
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!("push channel driver stopped");
}

/// Pump one live connection until it drops or shutdown is requested.
async fn drive(
    engine: &SyncEngine,
    conn: &mut dyn PushConnection,
    heartbeat_interval: Duration,
    token: &CancellationToken,
) -> Disconnect {
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + heartbeat_interval,
        heartbeat_interval,
    );
    loop {
        // The heartbeat branch cannot send inline: `recv` and `send_text`
        // both need the connection mutably. Flag it and send after the
        // select resolves.
        let mut ping_due = false;
        tokio::select! {
            _ = token.cancelled() => return Disconnect::Cancelled,
            _ = heartbeat.tick() => ping_due = true,
            frame = conn.recv() => match frame {
                Ok(Some(text)) => engine.handle_push_frame(&text),
                Ok(None) => {
                    debug!("push channel closed by server");
                    return Disconnect::Dropped;
                }
                Err(e) => {
                    warn!(error = %e, "push channel receive failed");
                    return Disconnect::Dropped;
                }
            },
        }
        if ping_due {
            if let Err(e) = conn.send_text("ping").await {
                warn!(error = %e, "heartbeat send failed");
                return Disconnect::Dropped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, MockPlayerApi, MockPushTransport};
    use core_runtime::{EventStream, PlayerEvent, SyncConfig};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Connection fed by a channel. Dropping the sender reads as a clean
    /// server-side close; keeping it open leaves `recv` pending so only
    /// timers fire.
    struct FakeConnection {
        rx: mpsc::UnboundedReceiver<String>,
        pings: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PushConnection for FakeConnection {
        async fn recv(&mut self) -> bridge_traits::error::Result<Option<String>> {
            Ok(self.rx.recv().await)
        }

        async fn send_text(&mut self, text: &str) -> bridge_traits::error::Result<()> {
            if text == "ping" {
                self.pings.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn close(&mut self) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    /// Transport handing out pre-built connections, then refusing.
    struct FakeTransport {
        conns: Mutex<VecDeque<FakeConnection>>,
    }

    impl FakeTransport {
        fn new(conns: Vec<FakeConnection>) -> Self {
            Self {
                conns: Mutex::new(conns.into()),
            }
        }
    }

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn connect(&self) -> bridge_traits::error::Result<Box<dyn PushConnection>> {
            match self.conns.lock().unwrap().pop_front() {
                Some(conn) => Ok(Box::new(conn)),
                None => Err(BridgeError::Network("refused".to_string())),
            }
        }
    }

    #[test]
    fn backoff_doubles_to_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    fn engine() -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(SyncConfig::default(), Arc::new(MockPlayerApi::new())).unwrap())
    }

    fn state_frame(ts: f64) -> String {
        format!(
            r#"{{"type":"state_update","current_meta":{{"title":"Pushed"}},"mpv_state":{{}},"loop_mode":0,"pitch_shift":0,"current_playlist_id":"default","playlist_updated":false,"ts":{ts}}}"#
        )
    }

    #[tokio::test(start_paused = true)]
    async fn frames_become_snapshots_and_connection_events_fire() {
        let engine = engine();
        let mut events = EventStream::new(engine.events().subscribe()).filter(|e| {
            matches!(
                e,
                PlayerEvent::ChannelConnected | PlayerEvent::ChannelDisconnected
            )
        });

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(state_frame(7.0)).unwrap();
        drop(tx);
        let transport = FakeTransport::new(vec![FakeConnection {
            rx,
            pings: Arc::new(AtomicUsize::new(0)),
        }]);

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&engine),
            Arc::new(transport),
            token.clone(),
        ));

        assert_eq!(events.recv().await.unwrap(), PlayerEvent::ChannelConnected);
        assert_eq!(
            events.recv().await.unwrap(),
            PlayerEvent::ChannelDisconnected
        );
        let state = engine.current_state().unwrap();
        assert_eq!(state.media_title, "Pushed");
        assert_eq!(state.revision, 7.0);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_with_growing_delay_and_resets_on_success() {
        let engine = engine();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_mock = Arc::clone(&attempts);

        let mut transport = MockPushTransport::new();
        transport.expect_connect().returning(move || {
            attempts_in_mock.fetch_add(1, Ordering::SeqCst);
            Err(BridgeError::Network("refused".to_string()))
        });

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&engine),
            Arc::new(transport),
            token.clone(),
        ));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        // First attempt happens immediately.
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        // Delays: 1s, then 2s, then 4s.
        tokio::time::advance(Duration::from_secs(1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_at_configured_interval() {
        let engine = Arc::new(
            SyncEngine::new(
                SyncConfig::default().with_heartbeat_interval(Duration::from_secs(20)),
                Arc::new(MockPlayerApi::new()),
            )
            .unwrap(),
        );
        let pings = Arc::new(AtomicUsize::new(0));

        // The sender stays alive so the connection never closes and only
        // the heartbeat timer fires.
        let (_tx, rx) = mpsc::unbounded_channel();
        let transport = FakeTransport::new(vec![FakeConnection {
            rx,
            pings: Arc::clone(&pings),
        }]);

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&engine),
            Arc::new(transport),
            token.clone(),
        ));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        for expected in 1..=3 {
            tokio::time::advance(Duration::from_secs(20)).await;
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert_eq!(pings.load(Ordering::SeqCst), expected);
        }

        token.cancel();
        handle.await.unwrap();
    }
}

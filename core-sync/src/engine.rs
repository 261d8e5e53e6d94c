//! The sync engine: one authoritative local snapshot, two transports in,
//! commands out.

use std::sync::{Arc, Mutex};

use bridge_traits::{PlayerApi, PushTransport};
use core_model::{
    CommandAck, CommandStatus, PushMessage, StateSnapshot, PITCH_SHIFT_MAX, PITCH_SHIFT_MIN,
};
use core_runtime::{EventBus, PlayerEvent, SyncConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::lock::OperationLockCoordinator;
use crate::{poller, push};

/// Where a snapshot came from. The merge policy differs per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Push-channel `state_update`. Carries a server revision; always
    /// applied, even while operation locks are held.
    Push,
    /// Polled status response. Dropped while polling is paused and when its
    /// revision predates an earlier poll (out-of-order HTTP responses).
    Poll,
    /// Optimistic patch built from a command ack. Always applied, never
    /// advances the transport revision, so the next real snapshot wins.
    Command,
}

struct EngineState {
    current: Option<StateSnapshot>,
    /// Highest server revision seen on the push channel. Server clock
    /// domain.
    last_push_revision: f64,
    /// Highest revision accepted from a poll. Status responses carry no
    /// server timestamp and are stamped with the local clock, so this is
    /// only ever compared against other polls, never against
    /// `last_push_revision`. Command patches leave both untouched.
    last_poll_revision: f64,
}

struct Running {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Client-side mirror of the server's playback state.
///
/// Holds exactly one current [`StateSnapshot`], replaced wholesale on every
/// accepted update. `start` spawns the poller, the push-channel driver and
/// the lock watchdog; `stop` cancels and joins them. All command methods are
/// `&self` and safe to call concurrently.
pub struct SyncEngine {
    config: SyncConfig,
    api: Arc<dyn PlayerApi>,
    locks: Arc<OperationLockCoordinator>,
    events: EventBus,
    state: Mutex<EngineState>,
    push_connected_tx: watch::Sender<bool>,
    runtime: Mutex<Option<Running>>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, api: Arc<dyn PlayerApi>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let locks = Arc::new(OperationLockCoordinator::new(config.default_lock_ttl));
        let events = EventBus::new(config.event_buffer);
        let (push_connected_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            api,
            locks,
            events,
            state: Mutex::new(EngineState {
                current: None,
                last_push_revision: 0.0,
                last_poll_revision: 0.0,
            }),
            push_connected_tx,
            runtime: Mutex::new(None),
        })
    }

    /// The current snapshot, if any transport or command has produced one.
    pub fn current_state(&self) -> Option<StateSnapshot> {
        self.state.lock().unwrap().current.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn locks(&self) -> &Arc<OperationLockCoordinator> {
        &self.locks
    }

    pub fn is_push_connected(&self) -> bool {
        *self.push_connected_tx.borrow()
    }

    pub(crate) fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub(crate) fn subscribe_push_connected(&self) -> watch::Receiver<bool> {
        self.push_connected_tx.subscribe()
    }

    pub(crate) fn set_push_connected(&self, connected: bool) {
        self.push_connected_tx.send_replace(connected);
        let event = if connected {
            PlayerEvent::ChannelConnected
        } else {
            PlayerEvent::ChannelDisconnected
        };
        let _ = self.events.emit(event);
    }

    /// Offer a snapshot to the merge policy. Returns whether it was accepted
    /// as the new authoritative state.
    pub fn apply_snapshot(&self, snapshot: StateSnapshot, source: SnapshotSource) -> bool {
        let old = {
            let mut state = self.state.lock().unwrap();
            match source {
                SnapshotSource::Poll => {
                    if self.locks.is_polling_paused() {
                        debug!(revision = snapshot.revision, "dropping polled snapshot, operation in flight");
                        return false;
                    }
                    if snapshot.revision < state.last_poll_revision {
                        debug!(
                            revision = snapshot.revision,
                            newest = state.last_poll_revision,
                            "dropping out-of-order polled snapshot"
                        );
                        return false;
                    }
                    state.last_poll_revision = snapshot.revision;
                }
                SnapshotSource::Push => {
                    // Server-pushed truth is authoritative and arrives in
                    // order on one stream; never gate it on a poll stamp.
                    state.last_push_revision =
                        state.last_push_revision.max(snapshot.revision);
                }
                SnapshotSource::Command => {}
            }
            state.current.replace(snapshot.clone())
        };
        // Emit outside the state lock; a subscriber may call back in.
        let _ = self.events.emit(PlayerEvent::StateUpdate {
            old,
            new: snapshot,
        });
        true
    }

    /// Handle one text frame from the push channel.
    pub(crate) fn handle_push_frame(&self, text: &str) {
        let Some(message) = PushMessage::parse(text) else {
            // Heartbeat pongs and unknown message types land here.
            debug!(frame = text, "ignoring non-state push frame");
            return;
        };
        let PushMessage::StateUpdate {
            playlist_updated,
            ref current_playlist_id,
            ..
        } = message;
        let playlist_id = current_playlist_id.clone();

        let snapshot = StateSnapshot::from_push(&message);
        self.apply_snapshot(snapshot, SnapshotSource::Push);

        if playlist_updated {
            if self.locks.has_active_locks() {
                debug!("suppressing playlist change notification, operation in flight");
            } else {
                let _ = self
                    .events
                    .emit(PlayerEvent::PlaylistChanged { playlist_id });
            }
        }
    }

    /// Fetch the server state once over HTTP and offer it as a polled
    /// snapshot. Used by the poller task and handy for a manual refresh.
    pub async fn refresh(&self) -> Result<bool> {
        let status = self.api.get_state().await?;
        let snapshot = StateSnapshot::from_status(&status, unix_now());
        Ok(self.apply_snapshot(snapshot, SnapshotSource::Poll))
    }

    // Commands. Each holds a named operation lock for its duration, calls
    // the server, then patches the local snapshot from the ack so the UI
    // moves before the next transport tick.

    pub async fn play(&self, url: &str, title: &str, kind: &str) -> Result<CommandAck> {
        let _guard = Arc::clone(&self.locks).guard("play");
        let ack = self.api.play(url, title, kind).await?;
        self.check_ack("play", &ack)?;
        if ack.status.is_ok() {
            self.patch(|snap| {
                snap.media_title = title.to_string();
                snap.paused = false;
                snap.position_seconds = 0.0;
            });
            let _ = self.events.emit(PlayerEvent::Play {
                title: title.to_string(),
            });
        }
        Ok(ack)
    }

    pub async fn toggle_pause(&self) -> Result<CommandAck> {
        let _guard = Arc::clone(&self.locks).guard("pause");
        let ack = self.api.toggle_pause().await?;
        self.check_ack("pause", &ack)?;
        if let Some(paused) = ack.paused {
            self.patch(|snap| snap.paused = paused);
            let event = if paused {
                PlayerEvent::Pause
            } else {
                PlayerEvent::Play {
                    title: self
                        .current_state()
                        .map(|s| s.media_title)
                        .unwrap_or_default(),
                }
            };
            let _ = self.events.emit(event);
        }
        Ok(ack)
    }

    pub async fn next(&self) -> Result<CommandAck> {
        let _guard = Arc::clone(&self.locks).guard("next");
        let ack = self.api.next().await?;
        self.check_ack("next", &ack)?;
        self.patch_track_change(&ack);
        let _ = self.events.emit(PlayerEvent::Next);
        Ok(ack)
    }

    pub async fn prev(&self) -> Result<CommandAck> {
        let _guard = Arc::clone(&self.locks).guard("prev");
        let ack = self.api.prev().await?;
        self.check_ack("prev", &ack)?;
        self.patch_track_change(&ack);
        let _ = self.events.emit(PlayerEvent::Prev);
        Ok(ack)
    }

    pub async fn seek(&self, position_seconds: f64) -> Result<CommandAck> {
        let position = position_seconds.max(0.0);
        let duration = self
            .current_state()
            .map(|snap| snap.duration_seconds)
            .unwrap_or(0.0);
        let _guard = Arc::clone(&self.locks).guard("seek");
        let ack = self.api.seek(position, duration).await?;
        self.check_ack("seek", &ack)?;
        if ack.status.is_ok() {
            let applied = ack.position.unwrap_or(position);
            self.patch(|snap| snap.position_seconds = applied);
            let _ = self.events.emit(PlayerEvent::Seek {
                position_seconds: applied,
            });
        }
        Ok(ack)
    }

    pub async fn set_volume(&self, level: f64) -> Result<CommandAck> {
        let level = level.clamp(0.0, 100.0);
        let _guard = Arc::clone(&self.locks).guard("volume");
        let ack = self.api.set_volume(level).await?;
        self.check_ack("volume", &ack)?;
        if ack.status.is_ok() {
            let applied = ack.volume.unwrap_or(level);
            self.patch(|snap| snap.volume = applied);
            let _ = self.events.emit(PlayerEvent::VolumeChange { level: applied });
        }
        Ok(ack)
    }

    pub async fn cycle_loop(&self) -> Result<CommandAck> {
        let _guard = Arc::clone(&self.locks).guard("loop");
        let ack = self.api.cycle_loop().await?;
        self.check_ack("loop", &ack)?;
        if ack.status.is_ok() {
            let mode = ack.loop_mode.unwrap_or_else(|| {
                self.current_state()
                    .map(|s| s.loop_mode.next())
                    .unwrap_or_default()
            });
            self.patch(|snap| snap.loop_mode = mode);
            let _ = self.events.emit(PlayerEvent::LoopChange { mode });
        }
        Ok(ack)
    }

    pub async fn set_pitch(&self, semitones: i8) -> Result<CommandAck> {
        let semitones = semitones.clamp(PITCH_SHIFT_MIN, PITCH_SHIFT_MAX);
        let _guard = Arc::clone(&self.locks).guard("pitch");
        let ack = self.api.set_pitch(semitones).await?;
        self.check_ack("pitch", &ack)?;
        if ack.status.is_ok() {
            let applied = ack.pitch_shift.unwrap_or(semitones);
            self.patch(|snap| snap.pitch_shift_semitones = applied);
            let _ = self.events.emit(PlayerEvent::PitchChange { semitones: applied });
        }
        Ok(ack)
    }

    /// Raise the pitch shift by one semitone, saturating at the supported
    /// maximum.
    pub async fn pitch_up(&self) -> Result<CommandAck> {
        let current = self
            .current_state()
            .map(|s| s.pitch_shift_semitones)
            .unwrap_or(0);
        self.set_pitch(current.saturating_add(1)).await
    }

    /// Lower the pitch shift by one semitone, saturating at the supported
    /// minimum.
    pub async fn pitch_down(&self) -> Result<CommandAck> {
        let current = self
            .current_state()
            .map(|s| s.pitch_shift_semitones)
            .unwrap_or(0);
        self.set_pitch(current.saturating_sub(1)).await
    }

    fn check_ack(&self, command: &str, ack: &CommandAck) -> Result<()> {
        match ack.status {
            CommandStatus::Error => Err(SyncError::CommandFailed {
                command: command.to_string(),
                message: ack.message.clone().unwrap_or_default(),
            }),
            CommandStatus::Empty => {
                debug!(command, "command was a no-op, queue empty");
                Ok(())
            }
            CommandStatus::Ok => Ok(()),
        }
    }

    /// Apply an optimistic patch on top of the current snapshot.
    fn patch(&self, mutate: impl FnOnce(&mut StateSnapshot)) {
        let mut snapshot = {
            let state = self.state.lock().unwrap();
            state
                .current
                .clone()
                .unwrap_or_else(|| {
                    StateSnapshot::empty(state.last_push_revision.max(state.last_poll_revision))
                })
        };
        mutate(&mut snapshot);
        self.apply_snapshot(snapshot, SnapshotSource::Command);
    }

    fn patch_track_change(&self, ack: &CommandAck) {
        if !ack.status.is_ok() {
            return;
        }
        let Some(meta) = &ack.current else {
            return;
        };
        self.patch(|snap| {
            snap.media_title = meta.title.clone().unwrap_or_default();
            snap.secondary_media_id = meta.secondary_media_id();
            snap.thumbnail_url = meta.thumbnail_url.clone();
            snap.duration_seconds = meta.duration.unwrap_or(0.0).max(0.0);
            snap.position_seconds = 0.0;
            snap.paused = false;
        });
    }

    /// Spawn the background tasks: poller, push-channel driver and lock
    /// watchdog.
    pub fn start(self: Arc<Self>, transport: Arc<dyn PushTransport>) -> Result<()> {
        let mut runtime = self.runtime.lock().unwrap();
        if runtime.is_some() {
            return Err(SyncError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        let handles = vec![
            Arc::clone(&self.locks)
                .spawn_watchdog(self.config.watchdog_interval, token.child_token()),
            tokio::spawn(poller::run(Arc::clone(&self), token.child_token())),
            tokio::spawn(push::run(Arc::clone(&self), transport, token.child_token())),
        ];
        *runtime = Some(Running { token, handles });
        info!("sync engine started");
        Ok(())
    }

    /// Cancel and join the background tasks.
    pub async fn stop(&self) -> Result<()> {
        let running = self
            .runtime
            .lock()
            .unwrap()
            .take()
            .ok_or(SyncError::NotRunning)?;
        running.token.cancel();
        for handle in running.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "sync task did not shut down cleanly");
            }
        }
        info!("sync engine stopped");
        Ok(())
    }
}

/// Receiver's clock as epoch seconds, used to stamp polled snapshots whose
/// body carries no server timestamp.
pub(crate) fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

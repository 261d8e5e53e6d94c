//! Named operation locks that gate polling while a command is in flight.
//!
//! A command such as seek or track-skip acquires a lock before talking to
//! the daemon. While any lock is held, poll-sourced snapshots are dropped
//! so a response captured before the command took effect cannot roll the
//! local state back. Every lock carries a TTL; a background watchdog (and
//! lazy purging on reads) guarantees polling can never stay paused forever
//! because a caller forgot to release.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A single held lock.
struct HeldLock {
    acquired_at: Instant,
    ttl: Duration,
}

impl HeldLock {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.acquired_at) >= self.ttl
    }
}

/// Snapshot of one lock for diagnostics.
#[derive(Debug, Clone)]
pub struct LockInfo {
    pub name: String,
    pub held_for: Duration,
    pub ttl: Duration,
}

/// Point-in-time view of the coordinator, for diagnostics and logging.
#[derive(Debug, Clone)]
pub struct LockStatus {
    pub locks: Vec<LockInfo>,
    pub polling_paused: bool,
}

struct State {
    locks: HashMap<String, HeldLock>,
    polling_paused: bool,
}

/// Coordinates named operation locks and the polling-paused flag.
///
/// The lock table and the paused flag live behind a single mutex so their
/// transitions are atomic: the first acquire pauses polling in the same
/// critical section, and the release that empties the table resumes it.
pub struct OperationLockCoordinator {
    state: Mutex<State>,
    paused_tx: watch::Sender<bool>,
    default_ttl: Duration,
}

impl OperationLockCoordinator {
    pub fn new(default_ttl: Duration) -> Self {
        let (paused_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(State {
                locks: HashMap::new(),
                polling_paused: false,
            }),
            paused_tx,
            default_ttl,
        }
    }

    /// Acquire `name` with the default TTL.
    ///
    /// Re-acquiring a held lock resets its TTL rather than stacking a
    /// second hold; release is not reference counted.
    pub fn acquire(&self, name: &str) {
        self.acquire_with_ttl(name, self.default_ttl);
    }

    /// Acquire `name` with an explicit TTL.
    pub fn acquire_with_ttl(&self, name: &str, ttl: Duration) {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        Self::purge_locked(&mut state, now, &self.paused_tx);
        state.locks.insert(
            name.to_string(),
            HeldLock {
                acquired_at: now,
                ttl,
            },
        );
        if !state.polling_paused {
            state.polling_paused = true;
            self.paused_tx.send_replace(true);
            debug!(lock = name, "polling paused");
        }
    }

    /// Release `name`. Releasing a lock that is not held is a no-op.
    pub fn release(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.locks.remove(name);
        Self::purge_locked(&mut state, Instant::now(), &self.paused_tx);
        if state.locks.is_empty() && state.polling_paused {
            state.polling_paused = false;
            self.paused_tx.send_replace(false);
            debug!(lock = name, "polling resumed");
        }
    }

    /// Acquire `name` and return a guard that releases it on drop.
    ///
    /// The TTL still applies underneath the guard, so even a leaked guard
    /// (a task aborted mid-command) cannot pause polling indefinitely.
    pub fn guard(self: Arc<Self>, name: &str) -> LockGuard {
        self.acquire(name);
        LockGuard {
            name: name.to_string(),
            coordinator: self,
        }
    }

    /// Pause polling without holding a lock.
    ///
    /// A pause with no backing lock is cleared by the watchdog on its next
    /// tick, so this is only suitable for short suppression windows.
    pub fn pause_polling(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.polling_paused {
            state.polling_paused = true;
            self.paused_tx.send_replace(true);
        }
    }

    /// Resume polling unconditionally and drop the paused flag.
    pub fn resume_polling(&self) {
        let mut state = self.state.lock().unwrap();
        if state.polling_paused {
            state.polling_paused = false;
            self.paused_tx.send_replace(false);
        }
    }

    /// True if at least one unexpired lock is held.
    pub fn has_active_locks(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        Self::purge_locked(&mut state, Instant::now(), &self.paused_tx);
        !state.locks.is_empty()
    }

    /// True if poll-sourced snapshots should currently be dropped.
    pub fn is_polling_paused(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        Self::purge_locked(&mut state, Instant::now(), &self.paused_tx);
        state.polling_paused
    }

    /// Watch channel mirroring the paused flag; `true` while paused.
    pub fn subscribe_paused(&self) -> watch::Receiver<bool> {
        self.paused_tx.subscribe()
    }

    /// Diagnostic snapshot of held locks and the paused flag.
    pub fn get_status(&self) -> LockStatus {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        Self::purge_locked(&mut state, now, &self.paused_tx);
        let locks = state
            .locks
            .iter()
            .map(|(name, lock)| LockInfo {
                name: name.clone(),
                held_for: now.duration_since(lock.acquired_at),
                ttl: lock.ttl,
            })
            .collect();
        LockStatus {
            locks,
            polling_paused: state.polling_paused,
        }
    }

    /// Drop expired locks and resume polling if that emptied the table.
    fn purge_locked(state: &mut State, now: Instant, paused_tx: &watch::Sender<bool>) {
        let before = state.locks.len();
        state.locks.retain(|name, lock| {
            let expired = lock.is_expired(now);
            if expired {
                warn!(lock = name.as_str(), ttl = ?lock.ttl, "operation lock expired, force releasing");
            }
            !expired
        });
        if before > 0 && state.locks.is_empty() && state.polling_paused {
            state.polling_paused = false;
            paused_tx.send_replace(false);
        }
    }

    /// Spawn the self-healing watchdog.
    ///
    /// Every `interval` it purges expired locks and clears a paused flag
    /// that has no backing lock. The purge on public reads makes the state
    /// correct at observation time; the watchdog additionally wakes the
    /// paused-flag watchers even when nobody is reading.
    pub fn spawn_watchdog(
        self: Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let coordinator = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => coordinator.watchdog_tick(),
                }
            }
        })
    }

    fn watchdog_tick(&self) {
        let mut state = self.state.lock().unwrap();
        Self::purge_locked(&mut state, Instant::now(), &self.paused_tx);
        if state.polling_paused && state.locks.is_empty() {
            warn!("polling paused with no active locks, force resuming");
            state.polling_paused = false;
            self.paused_tx.send_replace(false);
        }
    }
}

impl std::fmt::Debug for OperationLockCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.get_status();
        f.debug_struct("OperationLockCoordinator")
            .field("locks", &status.locks.len())
            .field("polling_paused", &status.polling_paused)
            .finish()
    }
}

/// Releases its lock when dropped.
pub struct LockGuard {
    coordinator: Arc<OperationLockCoordinator>,
    name: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.coordinator.release(&self.name);
    }
}

//! # Configuration
//!
//! Tunable knobs of the sync engine and the drift correction loop, with the
//! production defaults baked in. Both configs validate fail-fast: a zero
//! interval or an inverted backoff range is a construction error, not a
//! runtime surprise.

use std::time::Duration;

use crate::error::{Error, Result};

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Poll cadence while the push channel is down. Polling is the sole
    /// source of truth then, so it runs fast.
    pub poll_interval_primary: Duration,

    /// Poll cadence while the push channel is connected. Polling stays alive
    /// as a safety net (and for progress-bar smoothness) at reduced rate.
    pub poll_interval_fallback: Duration,

    /// Initial reconnect delay after a push-channel drop.
    pub reconnect_floor: Duration,

    /// Upper bound on the exponential reconnect delay.
    pub reconnect_cap: Duration,

    /// Application-level heartbeat period on the push channel, to defeat
    /// idle-timeout proxies and NAT entries.
    pub heartbeat_interval: Duration,

    /// Cadence of the lock-coordinator watchdog.
    pub watchdog_interval: Duration,

    /// Hard expiry applied to operation locks acquired without an explicit
    /// TTL. The backstop against a caller that never releases.
    pub default_lock_ttl: Duration,

    /// Event bus buffer capacity.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_primary: Duration::from_millis(1000),
            poll_interval_fallback: Duration::from_millis(5000),
            reconnect_floor: Duration::from_millis(1000),
            reconnect_cap: Duration::from_millis(30_000),
            heartbeat_interval: Duration::from_secs(20),
            watchdog_interval: Duration::from_secs(5),
            default_lock_ttl: Duration::from_secs(10),
            event_buffer: 100,
        }
    }
}

impl SyncConfig {
    /// Validate invariants between the knobs.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_primary.is_zero() || self.poll_interval_fallback.is_zero() {
            return Err(Error::Config("poll intervals must be non-zero".into()));
        }
        if self.poll_interval_fallback < self.poll_interval_primary {
            return Err(Error::Config(
                "fallback poll interval must not be faster than the primary".into(),
            ));
        }
        if self.reconnect_floor.is_zero() {
            return Err(Error::Config("reconnect floor must be non-zero".into()));
        }
        if self.reconnect_cap < self.reconnect_floor {
            return Err(Error::Config(
                "reconnect cap must be at least the floor".into(),
            ));
        }
        if self.watchdog_interval.is_zero() {
            return Err(Error::Config("watchdog interval must be non-zero".into()));
        }
        if self.default_lock_ttl.is_zero() {
            return Err(Error::Config("lock TTL must be non-zero".into()));
        }
        if self.event_buffer == 0 {
            return Err(Error::Config("event buffer must be non-zero".into()));
        }
        Ok(())
    }

    pub fn with_poll_intervals(mut self, primary: Duration, fallback: Duration) -> Self {
        self.poll_interval_primary = primary;
        self.poll_interval_fallback = fallback;
        self
    }

    pub fn with_reconnect_backoff(mut self, floor: Duration, cap: Duration) -> Self {
        self.reconnect_floor = floor;
        self.reconnect_cap = cap;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    pub fn with_default_lock_ttl(mut self, ttl: Duration) -> Self {
        self.default_lock_ttl = ttl;
        self
    }
}

/// Drift correction loop configuration.
#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// Drift beyond this (seconds) triggers a corrective seek.
    pub drift_threshold_secs: f64,

    /// Minimum spacing between position reconciliations, regardless of how
    /// often snapshots arrive.
    pub min_correction_interval: Duration,

    /// Window after a corrective seek during which drift checks are skipped.
    /// The seek itself perturbs the measured position; checking again too
    /// early would trigger a feedback loop of corrections.
    pub correction_cooldown: Duration,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            drift_threshold_secs: 0.3,
            min_correction_interval: Duration::from_millis(1000),
            correction_cooldown: Duration::from_millis(500),
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.drift_threshold_secs.is_finite() || self.drift_threshold_secs <= 0.0 {
            return Err(Error::Config("drift threshold must be positive".into()));
        }
        if self.min_correction_interval.is_zero() {
            return Err(Error::Config(
                "minimum correction interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn with_threshold(mut self, secs: f64) -> Self {
        self.drift_threshold_secs = secs;
        self
    }

    pub fn with_correction_cooldown(mut self, cooldown: Duration) -> Self {
        self.correction_cooldown = cooldown;
        self
    }
}

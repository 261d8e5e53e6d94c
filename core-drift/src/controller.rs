//! The alignment state machine driving a [`SecondarySurface`].

use std::collections::HashSet;
use std::sync::Arc;

use bridge_traits::{SecondarySurface, SurfaceError, SurfacePlayState};
use core_model::StateSnapshot;
use core_runtime::{DriftConfig, EventStream, PlayerEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{DriftError, Result};
use crate::metrics::{DriftMetrics, MetricsSnapshot};

/// Where the controller is in its alignment lifecycle for the active
/// content id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentState {
    /// No content loaded, or a load is still pending.
    Uninitialized,
    /// Content loaded; no drift measurement taken yet.
    Ready,
    /// Last measured drift was within the threshold.
    Aligned,
    /// A corrective seek was just issued; drift checks are suspended for
    /// the cool-down window because the seek perturbs the measurement.
    Correcting,
}

/// Keeps one secondary surface aligned to the authoritative clock.
///
/// Fed one [`StateSnapshot`] at a time, in arrival order. Every corrective
/// action is bounded: at most one play/pause call per snapshot and at most
/// one seek per excursion past the drift threshold, with a cool-down before
/// the next measurement is trusted.
pub struct DriftController {
    surface: Arc<dyn SecondarySurface>,
    config: DriftConfig,
    state: AlignmentState,
    active_media: Option<String>,
    /// Content ids that failed fatally; never retried this session.
    disabled: HashSet<String>,
    next_check_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    metrics: DriftMetrics,
}

impl DriftController {
    pub fn new(surface: Arc<dyn SecondarySurface>, config: DriftConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DriftError::Config(e.to_string()))?;
        Ok(Self {
            surface,
            config,
            state: AlignmentState::Uninitialized,
            active_media: None,
            disabled: HashSet::new(),
            next_check_at: None,
            cooldown_until: None,
            metrics: DriftMetrics::new(),
        })
    }

    pub fn alignment_state(&self) -> AlignmentState {
        self.state
    }

    pub fn active_media(&self) -> Option<&str> {
        self.active_media.as_deref()
    }

    /// Whether `media_id` was disabled by a fatal error this session.
    pub fn is_disabled(&self, media_id: &str) -> bool {
        self.disabled.contains(media_id)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Reconcile the surface against one authoritative snapshot.
    pub async fn handle_snapshot(&mut self, snapshot: &StateSnapshot) {
        self.reconcile_media(snapshot).await;
        let Some(media_id) = self.active_media.clone() else {
            return;
        };

        if self.state == AlignmentState::Uninitialized {
            // A previous load failed transiently; try again.
            if !self.try_load(&media_id).await {
                return;
            }
        }

        if !self.reconcile_play_state(snapshot, &media_id).await {
            return;
        }
        if !snapshot.paused {
            self.reconcile_position(snapshot, &media_id).await;
        }
    }

    /// Handle the active content id changing, appearing or going away.
    async fn reconcile_media(&mut self, snapshot: &StateSnapshot) {
        let incoming = snapshot.secondary_media_id.as_deref();
        if incoming == self.active_media.as_deref() {
            return;
        }

        if let Some(old) = self.active_media.take() {
            info!(media_id = old.as_str(), "tearing down surface alignment");
            if let Err(e) = self.surface.stop().await {
                debug!(error = %e, "surface stop failed during teardown");
            }
        }
        self.state = AlignmentState::Uninitialized;
        self.next_check_at = None;
        self.cooldown_until = None;

        if let Some(id) = incoming {
            if self.disabled.contains(id) {
                debug!(media_id = id, "content disabled for this session, staying audio-only");
                return;
            }
            self.active_media = Some(id.to_string());
            self.try_load(id).await;
        }
    }

    async fn try_load(&mut self, media_id: &str) -> bool {
        match self.surface.load(media_id).await {
            Ok(()) => {
                info!(media_id, "surface content loaded");
                self.state = AlignmentState::Ready;
                true
            }
            Err(e) if e.is_fatal() => {
                let _ = self.surface.stop().await;
                self.disable(media_id, &e);
                false
            }
            Err(e) => {
                debug!(media_id, error = %e, "surface not ready, retrying on next snapshot");
                false
            }
        }
    }

    fn disable(&mut self, media_id: &str, err: &SurfaceError) {
        warn!(media_id, error = %err, "surface disabled for this content, audio-only fallback");
        self.disabled.insert(media_id.to_string());
        self.active_media = None;
        self.state = AlignmentState::Uninitialized;
    }

    /// Issue at most one play/pause call, and only when the surface's
    /// actual state disagrees with the authoritative one.
    async fn reconcile_play_state(&mut self, snapshot: &StateSnapshot, media_id: &str) -> bool {
        let play_state = match self.surface.play_state().await {
            Ok(state) => state,
            Err(e) => return self.handle_surface_error(media_id, "play_state", e).await,
        };

        let surface = Arc::clone(&self.surface);
        let action = if snapshot.paused {
            play_state.is_playing().then(|| surface.pause())
        } else {
            matches!(
                play_state,
                SurfacePlayState::Paused | SurfacePlayState::Unstarted
            )
            .then(|| surface.play())
        };

        match action {
            Some(call) => match call.await {
                Ok(()) => true,
                Err(e) => self.handle_surface_error(media_id, "play/pause", e).await,
            },
            None => true,
        }
    }

    /// Rate-limited drift measurement and bounded correction.
    async fn reconcile_position(&mut self, snapshot: &StateSnapshot, media_id: &str) {
        let now = Instant::now();

        if let Some(until) = self.cooldown_until {
            if now < until {
                return;
            }
            self.cooldown_until = None;
            self.state = AlignmentState::Aligned;
        }
        if let Some(at) = self.next_check_at {
            if now < at {
                return;
            }
        }
        self.next_check_at = Some(now + self.config.min_correction_interval);

        let surface_pos = match self.surface.position_seconds().await {
            Ok(pos) => pos,
            Err(e) => {
                self.handle_surface_error(media_id, "position", e).await;
                return;
            }
        };

        let drift = (surface_pos - snapshot.position_seconds).abs();
        self.metrics.record_sample(drift);

        if drift > self.config.drift_threshold_secs {
            debug!(
                drift,
                authoritative = snapshot.position_seconds,
                surface = surface_pos,
                "correcting surface drift"
            );
            match self.surface.seek_to(snapshot.position_seconds).await {
                Ok(()) => {
                    self.metrics.record_correction();
                    self.state = AlignmentState::Correcting;
                    self.cooldown_until = Some(now + self.config.correction_cooldown);
                }
                Err(e) => {
                    self.handle_surface_error(media_id, "seek_to", e).await;
                }
            }
        } else {
            self.state = AlignmentState::Aligned;
        }
    }

    /// Returns `false` so callers can bail out of the current snapshot.
    async fn handle_surface_error(
        &mut self,
        media_id: &str,
        operation: &str,
        err: SurfaceError,
    ) -> bool {
        if err.is_fatal() {
            let _ = self.surface.stop().await;
            self.disable(media_id, &err);
        } else {
            debug!(media_id, operation, error = %err, "transient surface error");
        }
        false
    }
}

/// Drive a controller from the sync engine's event stream.
///
/// A lagged subscriber skips straight to newer events rather than replaying
/// the backlog; only the latest snapshot matters for alignment.
pub fn spawn(
    mut controller: DriftController,
    events: EventStream,
    token: CancellationToken,
) -> JoinHandle<DriftController> {
    tokio::spawn(async move {
        let mut events = events.filter(|e| matches!(e, PlayerEvent::StateUpdate { .. }));
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Ok(PlayerEvent::StateUpdate { new, .. }) => {
                        controller.handle_snapshot(&new).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "drift loop lagged behind state updates");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("drift loop stopped");
        controller
    })
}

//! Wire payloads exchanged with the player server.
//!
//! The server speaks JSON in two places: the push channel (one message type
//! carries state, everything else is control noise) and the HTTP
//! command/query endpoints. Field names here follow the server exactly; the
//! conversion functions at the bottom normalize both shapes into
//! [`StateSnapshot`].

use serde::{Deserialize, Serialize};

use crate::snapshot::{LoopMode, StateSnapshot, PITCH_SHIFT_MAX, PITCH_SHIFT_MIN};

/// Metadata of a track as the server reports it.
///
/// Every field is optional: local files carry `url`, streamed tracks carry
/// `video_id`, and the map may be entirely empty between tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Source kind: `"local"`, `"youtube"`, or `"stream"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl TrackMeta {
    /// The synchronized-video content id, present only for streamed tracks.
    pub fn secondary_media_id(&self) -> Option<String> {
        match self.kind.as_deref() {
            Some("youtube") => self.video_id.clone(),
            _ => None,
        }
    }
}

/// Raw playback engine state as mirrored by the server.
///
/// Every field is nullable: the server substitutes `null` while the engine
/// is between tracks or restarting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpvState {
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default)]
    pub time_pos: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

/// A message received on the push channel.
///
/// Only `state_update` carries playback state. The variant set is open-ended
/// on the server side; unknown types must be ignored by the client, which is
/// why callers go through [`PushMessage::parse`] rather than `serde_json`
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    StateUpdate {
        #[serde(default)]
        current_meta: TrackMeta,
        #[serde(default)]
        mpv_state: MpvState,
        #[serde(default)]
        loop_mode: LoopMode,
        #[serde(default)]
        pitch_shift: i8,
        #[serde(default)]
        current_playlist_id: String,
        #[serde(default)]
        playlist_updated: bool,
        #[serde(default)]
        ts: f64,
    },
}

impl PushMessage {
    /// Parses a text frame from the push channel.
    ///
    /// Returns `None` for anything that is not a known JSON message: the
    /// server answers heartbeats with a bare non-JSON pong, and future server
    /// versions may add message types this client does not know. Neither is
    /// an error.
    pub fn parse(text: &str) -> Option<PushMessage> {
        serde_json::from_str(text).ok()
    }
}

/// Outcome discriminator on command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Ok,
    /// The queue was empty; the command was a no-op.
    Empty,
    Error,
}

impl CommandStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, CommandStatus::Ok)
    }
}

/// Response body of a mutation endpoint.
///
/// Besides the status, the server opportunistically returns the fields the
/// command changed (`paused` after a pause toggle, `current` after a track
/// skip, ...). The sync engine layers these onto the last snapshot as an
/// optimistic patch so the UI moves before the next transport tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_mode: Option<LoopMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_shift: Option<i8>,
    /// Metadata of the track now playing, returned by `next`/`prev`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<TrackMeta>,
}

impl CommandAck {
    /// A bare success ack with no partial state.
    pub fn ok() -> Self {
        Self {
            status: CommandStatus::Ok,
            message: None,
            paused: None,
            position: None,
            volume: None,
            loop_mode: None,
            pitch_shift: None,
            current: None,
        }
    }
}

/// Response body of the state query endpoint.
///
/// Older server builds named the engine state field `mpv`; current ones use
/// `mpv_state`. Both are accepted. The body carries no timestamp, so the
/// receiver stamps the snapshot with its own clock (see
/// [`StateSnapshot::from_status`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub current_meta: TrackMeta,
    #[serde(default, alias = "mpv")]
    pub mpv_state: MpvState,
    #[serde(default)]
    pub loop_mode: LoopMode,
    #[serde(default)]
    pub pitch_shift: i8,
    #[serde(default)]
    pub current_playlist_id: String,
    #[serde(default)]
    pub ts: Option<f64>,
}

fn clamp_pitch(semitones: i8) -> i8 {
    semitones.clamp(PITCH_SHIFT_MIN, PITCH_SHIFT_MAX)
}

fn build_snapshot(
    meta: &TrackMeta,
    mpv: &MpvState,
    loop_mode: LoopMode,
    pitch_shift: i8,
    playlist_id: &str,
    revision: f64,
) -> StateSnapshot {
    StateSnapshot {
        media_title: meta.title.clone().unwrap_or_default(),
        position_seconds: mpv.time_pos.unwrap_or(0.0).max(0.0),
        duration_seconds: mpv.duration.unwrap_or(0.0).max(0.0),
        paused: mpv.paused.unwrap_or(true),
        volume: mpv.volume.unwrap_or(50.0).clamp(0.0, 100.0),
        loop_mode,
        active_playlist_id: if playlist_id.is_empty() {
            "default".to_string()
        } else {
            playlist_id.to_string()
        },
        pitch_shift_semitones: clamp_pitch(pitch_shift),
        secondary_media_id: meta.secondary_media_id(),
        thumbnail_url: meta.thumbnail_url.clone(),
        revision,
    }
}

impl StateSnapshot {
    /// Builds a snapshot from a push-channel `state_update` message.
    pub fn from_push(message: &PushMessage) -> StateSnapshot {
        match message {
            PushMessage::StateUpdate {
                current_meta,
                mpv_state,
                loop_mode,
                pitch_shift,
                current_playlist_id,
                ts,
                ..
            } => build_snapshot(
                current_meta,
                mpv_state,
                *loop_mode,
                *pitch_shift,
                current_playlist_id,
                *ts,
            ),
        }
    }

    /// Builds a snapshot from a polled status response.
    ///
    /// `fallback_revision` (the receiver's clock, epoch seconds) is used when
    /// the body carries no `ts`, which is the normal case for the query
    /// endpoint.
    pub fn from_status(status: &StatusResponse, fallback_revision: f64) -> StateSnapshot {
        build_snapshot(
            &status.current_meta,
            &status.mpv_state,
            status.loop_mode,
            status.pitch_shift,
            &status.current_playlist_id,
            status.ts.unwrap_or(fallback_revision),
        )
    }
}

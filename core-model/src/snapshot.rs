//! The authoritative playback state value type.

use serde::{Deserialize, Serialize};

/// Minimum pitch shift supported by the server, in semitones.
pub const PITCH_SHIFT_MIN: i8 = -6;

/// Maximum pitch shift supported by the server, in semitones.
pub const PITCH_SHIFT_MAX: i8 = 6;

/// Repeat mode of the shared player.
///
/// Encoded on the wire as an integer: `0` = off, `1` = repeat the current
/// track, `2` = repeat the whole playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum LoopMode {
    /// No looping.
    #[default]
    None,
    /// Repeat the current track.
    Single,
    /// Repeat the whole playlist.
    All,
}

impl LoopMode {
    /// Returns the next mode in the cycle `None -> Single -> All -> None`.
    pub fn next(self) -> Self {
        match self {
            LoopMode::None => LoopMode::Single,
            LoopMode::Single => LoopMode::All,
            LoopMode::All => LoopMode::None,
        }
    }
}

impl From<LoopMode> for u8 {
    fn from(mode: LoopMode) -> u8 {
        match mode {
            LoopMode::None => 0,
            LoopMode::Single => 1,
            LoopMode::All => 2,
        }
    }
}

impl TryFrom<u8> for LoopMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LoopMode::None),
            1 => Ok(LoopMode::Single),
            2 => Ok(LoopMode::All),
            other => Err(format!("invalid loop mode: {other}")),
        }
    }
}

/// A complete, immutable description of server-side playback state at one
/// instant.
///
/// Exactly one snapshot is "current" at any time inside the sync engine.
/// Updates are total replacements; consumers must never mutate a snapshot in
/// place or combine fields from two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Title of the currently loaded track. Empty when nothing is playing.
    pub media_title: String,

    /// Playback position in seconds. Always `>= 0`.
    pub position_seconds: f64,

    /// Track duration in seconds. `0.0` means unknown.
    pub duration_seconds: f64,

    /// Whether the shared player is paused.
    pub paused: bool,

    /// Server-side output volume, `0..=100`.
    pub volume: f64,

    /// Repeat mode.
    pub loop_mode: LoopMode,

    /// Identifier of the playlist the server is currently playing from.
    pub active_playlist_id: String,

    /// KTV pitch shift in semitones, clamped to `[-6, 6]`.
    pub pitch_shift_semitones: i8,

    /// Identifier of the synchronized video surface content, if the current
    /// track has one (i.e. it is a streamed video). `None` means audio-only.
    pub secondary_media_id: Option<String>,

    /// Cover art URL for the current track, when the server provides one.
    pub thumbnail_url: Option<String>,

    /// Server timestamp (epoch seconds) of the state this snapshot was built
    /// from. Monotonically increasing per server; used to discard
    /// out-of-order arrivals across the two transports.
    pub revision: f64,
}

impl StateSnapshot {
    /// Returns playback progress as a percentage in `0.0..=100.0`.
    ///
    /// A duration of zero means "unknown" and yields `0.0` rather than a
    /// division by zero.
    pub fn progress_percent(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        ((self.position_seconds / self.duration_seconds) * 100.0).clamp(0.0, 100.0)
    }

    /// Whether this snapshot's revision is strictly newer than `other`'s.
    pub fn is_newer_than(&self, other: &StateSnapshot) -> bool {
        self.revision > other.revision
    }

    /// An empty "nothing playing" snapshot with the given revision.
    pub fn empty(revision: f64) -> Self {
        Self {
            media_title: String::new(),
            position_seconds: 0.0,
            duration_seconds: 0.0,
            paused: true,
            volume: 50.0,
            loop_mode: LoopMode::None,
            active_playlist_id: "default".to_string(),
            pitch_shift_semitones: 0,
            secondary_media_id: None,
            thumbnail_url: None,
            revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_mode_cycle() {
        assert_eq!(LoopMode::None.next(), LoopMode::Single);
        assert_eq!(LoopMode::Single.next(), LoopMode::All);
        assert_eq!(LoopMode::All.next(), LoopMode::None);
    }

    #[test]
    fn test_loop_mode_wire_encoding() {
        assert_eq!(u8::from(LoopMode::All), 2);
        assert_eq!(LoopMode::try_from(1u8).unwrap(), LoopMode::Single);
        assert!(LoopMode::try_from(3u8).is_err());

        let json = serde_json::to_string(&LoopMode::Single).unwrap();
        assert_eq!(json, "1");
        let parsed: LoopMode = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, LoopMode::All);
    }

    #[test]
    fn test_progress_percent() {
        let mut snap = StateSnapshot::empty(1.0);
        snap.position_seconds = 30.0;
        snap.duration_seconds = 120.0;
        assert_eq!(snap.progress_percent(), 25.0);
    }

    #[test]
    fn test_progress_percent_unknown_duration() {
        let mut snap = StateSnapshot::empty(1.0);
        snap.position_seconds = 42.0;
        snap.duration_seconds = 0.0;
        let percent = snap.progress_percent();
        assert_eq!(percent, 0.0);
        assert!(percent.is_finite());
    }

    #[test]
    fn test_progress_percent_clamped() {
        let mut snap = StateSnapshot::empty(1.0);
        // Position can briefly overshoot duration on track boundaries.
        snap.position_seconds = 130.0;
        snap.duration_seconds = 120.0;
        assert_eq!(snap.progress_percent(), 100.0);
    }

    #[test]
    fn test_revision_ordering() {
        let older = StateSnapshot::empty(10.0);
        let newer = StateSnapshot::empty(10.5);
        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
        assert!(!older.is_newer_than(&older));
    }
}

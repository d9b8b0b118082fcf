//! Core types for AvPlayer

use crate::source::MediaLocator;
use crate::tracks::TrackCatalog;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Caller-opaque player identifier, also the output-surface registration key
pub type PlayerId = i64;

/// Unique identifier for one open→close cycle, used in log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player state machine states
///
/// Ordered: comparisons such as `state > PlayerState::Opening` are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlayerState {
    /// No session
    Idle = 0,
    /// Source handed to the engine, preparation pending
    Opening = 1,
    /// Prepared and paused
    Ready = 2,
    /// Playing
    Playing = 3,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, target),
            (Idle, Opening)
                | (Opening, Ready)
                | (Ready, Playing)
                | (Playing, Ready)
                | (Opening, Idle)
                | (Ready, Idle)
                | (Playing, Idle)
        )
    }

    /// Numeric code used on the wire
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Opening => write!(f, "opening"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Playing => write!(f, "playing"),
        }
    }
}

/// Maximum video resolution constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A 0x0 constraint means "unconstrained"
    pub fn is_unbounded(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Raw video geometry as reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoGeometry {
    /// Coded width in pixels
    pub width: u32,
    /// Coded height in pixels
    pub height: u32,
    /// Clockwise rotation in degrees
    pub rotation_degrees: i32,
    /// Pixel aspect ratio (width / height of one pixel)
    pub pixel_aspect_ratio: f32,
}

impl VideoGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rotation_degrees: 0,
            pixel_aspect_ratio: 1.0,
        }
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn with_pixel_aspect_ratio(mut self, ratio: f32) -> Self {
        self.pixel_aspect_ratio = ratio;
        self
    }

    /// Display dimensions after pixel aspect correction and rotation
    pub fn display_size(&self) -> (u32, u32) {
        let ratio = if self.pixel_aspect_ratio > 0.0 {
            self.pixel_aspect_ratio
        } else {
            1.0
        };
        let corrected = (self.width as f32 * ratio).round() as u32;
        if self.rotation_degrees.rem_euclid(180) == 0 {
            (corrected, self.height)
        } else {
            (self.height, corrected)
        }
    }
}

/// Player-lifetime attributes; survive close/open cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Playback rate
    pub speed: f32,
    /// Output volume in [0, 1]
    pub volume: f32,
    /// Restart from zero at end of media
    pub looping: bool,
    /// Composite subtitles over video
    pub show_subtitle: bool,
    /// Cap on adaptive video resolution (richer engines only)
    pub max_resolution: Option<Resolution>,
    /// Cap on adaptive video bitrate in bps (richer engines only)
    pub max_bitrate: Option<u64>,
    /// Preferred audio language, `None` = system default
    pub preferred_audio_language: Option<String>,
    /// Preferred subtitle language, `None` = system default
    pub preferred_subtitle_language: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            volume: 1.0,
            looping: false,
            show_subtitle: false,
            max_resolution: None,
            max_bitrate: None,
            preferred_audio_language: None,
            preferred_subtitle_language: None,
        }
    }
}

impl PlayerConfig {
    /// Track-selection constraints derived from this config
    pub fn constraints(&self) -> TrackConstraints {
        TrackConstraints {
            max_resolution: self.max_resolution.filter(|r| !r.is_unbounded()),
            max_bitrate: self.max_bitrate.filter(|b| *b > 0),
            preferred_audio_language: self.preferred_audio_language.clone(),
            preferred_subtitle_language: self.preferred_subtitle_language.clone(),
        }
    }
}

/// Normalizes a host-supplied language preference
pub fn language_preference(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Track selection parameters pushed to the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackConstraints {
    pub max_resolution: Option<Resolution>,
    pub max_bitrate: Option<u64>,
    pub preferred_audio_language: Option<String>,
    pub preferred_subtitle_language: Option<String>,
}

/// Session attributes; reset wholesale by close
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    /// Log-facing session id
    pub id: SessionId,
    /// Generation stamp used to reject stale engine callbacks
    pub generation: u64,
    /// Source string as given to `open`
    pub source: String,
    /// Resolved engine-loadable reference
    pub locator: MediaLocator,
    /// Media duration; zero while unknown or for live streams
    pub duration: Duration,
    /// Media has no finite, seekable duration
    pub live: bool,
    /// Last emitted position
    pub position: Option<i64>,
    /// Last emitted buffered end
    pub buffer_position: i64,
    /// A host seek is outstanding
    pub seeking: bool,
    /// A seek-to-zero restart is outstanding; playback resumes on completion
    pub restarting: bool,
    /// Natural end reached and not yet restarted
    pub ended: bool,
    /// Last emitted display size
    pub video_size: (u32, u32),
    /// Tracks snapshotted on Ready
    pub tracks: Option<TrackCatalog>,
}

impl PlaybackSession {
    pub fn new(generation: u64, source: impl Into<String>, locator: MediaLocator) -> Self {
        Self {
            id: SessionId::new(),
            generation,
            source: source.into(),
            locator,
            duration: Duration::ZERO,
            live: false,
            position: None,
            buffer_position: 0,
            seeking: false,
            restarting: false,
            ended: false,
            video_size: (0, 0),
            tracks: None,
        }
    }

    /// Media duration known and finite
    pub fn is_finite(&self) -> bool {
        !self.live && !self.duration.is_zero()
    }

    /// Source was resolved to a network address
    pub fn is_networked(&self) -> bool {
        self.locator.is_network()
    }
}

/// Converts an engine time to the boundary unit
pub fn to_millis(time: Duration) -> i64 {
    time.as_millis().min(i64::MAX as u128) as i64
}

/// Converts a boundary time to an engine time; negative values clamp to zero
pub fn from_millis(millis: i64) -> Duration {
    Duration::from_millis(millis.max(0) as u64)
}

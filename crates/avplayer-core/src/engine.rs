//! Native engine capability interface
//!
//! Every platform pipeline (rich adaptive engine, system media framework,
//! legacy media player) is driven through [`NativeEngine`]. Engines report
//! asynchronous happenings as normalized [`EngineEvent`]s through an
//! [`EngineEventSender`] stamped with the session generation they were loaded
//! under, so callbacks that outlive their session can be recognized and
//! dropped by the owner task.

use crate::config::EngineProfile;
use crate::frame::{FrameCopier, SubtitleCue};
use crate::source::MediaLocator;
use crate::tracks::TrackGroup;
use crate::types::{TrackConstraints, VideoGeometry};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How an engine reports playback position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionReporting {
    /// The player samples `position()` on a timer
    Polled,
    /// The engine pushes [`EngineEvent::Position`] itself
    Pushed,
}

/// What a concrete engine supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    /// Engine family; sets the default position poll period
    pub profile: EngineProfile,
    pub position: PositionReporting,
    /// Track groups can be enumerated and overridden
    pub track_selection: bool,
    /// Max resolution/bitrate and language preferences are honored
    pub track_constraints: bool,
    /// Subtitles go to a second output surface instead of a composited overlay
    pub subtitle_surface: bool,
    /// Buffered range must be polled while loading
    pub polled_buffering: bool,
}

impl EngineCapabilities {
    /// Adaptive engine with track selection and polled position
    pub fn rich() -> Self {
        Self {
            profile: EngineProfile::Rich,
            position: PositionReporting::Polled,
            track_selection: true,
            track_constraints: true,
            subtitle_surface: false,
            polled_buffering: true,
        }
    }

    /// Legacy media player: no tracks, no constraints, coarse polling
    pub fn legacy() -> Self {
        Self {
            profile: EngineProfile::Legacy,
            position: PositionReporting::Polled,
            track_selection: false,
            track_constraints: false,
            subtitle_surface: false,
            polled_buffering: false,
        }
    }

    /// Position poll period this engine needs
    pub fn position_poll_interval(&self) -> Duration {
        self.profile.position_poll_interval()
    }

    pub fn with_subtitle_surface(mut self) -> Self {
        self.subtitle_surface = true;
        self
    }

    pub fn with_pushed_position(mut self) -> Self {
        self.position = PositionReporting::Pushed;
        self
    }
}

/// Normalized engine callback
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Preparation finished; media info is available
    Prepared,
    /// Engine stalled waiting for data (`true`) or resumed (`false`)
    Stalled(bool),
    /// The engine's loading flag changed
    LoadingChanged(bool),
    /// The outstanding seek completed
    SeekCompleted,
    /// Natural end of media
    Ended,
    /// Fatal decode/network failure; the text is shown to the host as is
    Failed(String),
    /// Loaded time ranges changed
    BufferedRanges(Vec<(Duration, Duration)>),
    /// Position pushed by the engine
    Position(Duration),
    /// Decoded video geometry changed
    Geometry(VideoGeometry),
    /// Active subtitle cues changed
    Cues(Vec<SubtitleCue>),
}

/// An engine event tagged with the session it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Callback handle given to the engine on `load`; usable from any thread
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EngineEventSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Post an event to the owner task; `false` once the player is gone
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// A platform playback pipeline
///
/// All methods run on the player's owner task and must not block on I/O;
/// completion is reported through the sender passed to [`NativeEngine::load`].
pub trait NativeEngine: Send + 'static {
    fn capabilities(&self) -> EngineCapabilities;

    /// Hand a source to the engine and begin asynchronous preparation
    fn load(&mut self, locator: &MediaLocator, events: EngineEventSender) -> Result<()>;

    /// Stop and drop the current source
    fn unload(&mut self);

    fn set_playing(&mut self, playing: bool);

    fn seek(&mut self, position: Duration);

    fn set_volume(&mut self, volume: f32);

    fn set_speed(&mut self, speed: f32);

    fn position(&self) -> Duration;

    /// End of the buffered range containing the playhead
    fn buffered_position(&self) -> Duration;

    /// `None` for live/unbounded media
    fn duration(&self) -> Option<Duration>;

    /// Currently fetching media data
    fn is_loading(&self) -> bool;

    /// Playback would not progress right now for lack of data
    fn is_stalled(&self) -> bool;

    fn track_groups(&self) -> Vec<TrackGroup> {
        Vec::new()
    }

    fn select_track(&mut self, _group: usize, _option: usize) {}

    fn clear_track_override(&mut self, _group: usize) {}

    fn clear_track_overrides(&mut self) {}

    fn apply_constraints(&mut self, _constraints: &TrackConstraints) {}

    /// Frame handoff for engines that decode into a readable buffer;
    /// `None` when the engine draws into the surface itself
    fn frame_copier(&self) -> Option<Arc<dyn FrameCopier>> {
        None
    }

    /// Release all native resources; the engine is not used afterwards
    fn release(&mut self);
}

/// Builds one engine per player
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn NativeEngine>>;

    fn capabilities(&self) -> EngineCapabilities;
}

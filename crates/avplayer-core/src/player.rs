//! Player state machine
//!
//! Owns one native engine, one frame bridge and the event sink for a single
//! player. Commands and engine callbacks are applied synchronously on the
//! owner task (see [`crate::actor`]); each mutates at most one authoritative
//! [`PlayerState`] through [`PlayerStateMachine::transition`] and emits the
//! resulting outward events in order.
//!
//! ```text
//!            open                prepared            play
//!   Idle ───────────▶ Opening ───────────▶ Ready ◀─────────▶ Playing
//!    ▲                   │                   │      pause       │
//!    └───────────────────┴───── close / fatal error / live end ─┘
//! ```

use crate::clock::{buffer_update, position_update, range_containing};
use crate::engine::{EngineCapabilities, EngineEvent, EngineEventSender, NativeEngine, PositionReporting, SessionEvent};
use crate::event::{EventSink, EventStream, PlayerEvent};
use crate::frame::{FrameBridge, SubtitleCue};
use crate::source::{resolve_source, AssetResolver};
use crate::tracks::TrackCatalog;
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Which periodic samplers the owner task should be running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchDemand {
    pub position: bool,
    pub buffer: bool,
    pub frames: bool,
}

/// Per-player state machine
pub struct PlayerStateMachine {
    id: PlayerId,
    state: PlayerState,
    config: PlayerConfig,
    session: Option<PlaybackSession>,
    generation: u64,
    engine: Box<dyn NativeEngine>,
    capabilities: EngineCapabilities,
    frames: FrameBridge,
    sink: EventSink,
    assets: Arc<dyn AssetResolver>,
    engine_tx: mpsc::UnboundedSender<SessionEvent>,
    buffering: bool,
    disposed: bool,
}

impl PlayerStateMachine {
    pub fn new(
        id: PlayerId,
        engine: Box<dyn NativeEngine>,
        frames: FrameBridge,
        assets: Arc<dyn AssetResolver>,
        engine_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let capabilities = engine.capabilities();
        Self {
            id,
            state: PlayerState::Idle,
            config: PlayerConfig::default(),
            session: None,
            generation: 0,
            engine,
            capabilities,
            frames,
            sink: EventSink::new(id),
            assets,
            engine_tx,
            buffering: false,
            disposed: false,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    pub fn frames(&self) -> &FrameBridge {
        &self.frames
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Attach the host listener, replacing any previous one
    pub fn listen(&mut self) -> EventStream {
        self.sink.listen()
    }

    pub fn cancel_listen(&mut self) {
        self.sink.cancel();
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.sink.emit(event);
    }

    fn transition(&mut self, to: PlayerState) {
        if self.state == to {
            return;
        }
        if !self.state.can_transition_to(to) {
            warn!(player = self.id, from = %self.state, to = %to, "Rejected state transition");
            return;
        }
        debug!(player = self.id, from = %self.state, to = %to, "State transition");
        self.state = to;
    }

    // ---- control surface ----

    /// Start a new session; any prior session is closed first
    #[instrument(skip(self), fields(player = self.id))]
    pub fn open(&mut self, source: &str) {
        if self.disposed {
            return;
        }
        self.close();

        let locator = match resolve_source(source, self.assets.as_ref()) {
            Ok(locator) => locator,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "Source rejected");
                self.emit(PlayerEvent::Error { value: e.to_string() });
                return;
            }
        };

        self.generation += 1;
        let session = PlaybackSession::new(self.generation, source, locator.clone());
        info!(session = %session.id, uri = %locator, "Opening source");

        if self.capabilities.track_constraints {
            self.engine.apply_constraints(&self.config.constraints());
        }
        self.engine.set_speed(self.config.speed);

        let sender = EngineEventSender::new(self.generation, self.engine_tx.clone());
        if let Err(e) = self.engine.load(&locator, sender) {
            warn!(code = e.error_code(), error = %e, "Engine rejected source");
            self.engine.unload();
            self.generation += 1;
            self.emit(PlayerEvent::Error { value: e.to_string() });
            return;
        }

        self.session = Some(session);
        self.frames.begin_session(self.generation);
        self.transition(PlayerState::Opening);
    }

    /// End the session; persistent attributes are kept. Idempotent.
    #[instrument(skip(self), fields(player = self.id))]
    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        info!(session = %session.id, "Closing session");
        self.transition(PlayerState::Idle);
        // Callbacks still in flight for the old session are rejected from here on
        self.generation += 1;
        self.buffering = false;
        self.engine.set_playing(false);
        self.engine.unload();
        if session.tracks.as_ref().map_or(false, TrackCatalog::has_overrides) {
            self.engine.clear_track_overrides();
        }
        self.frames.end_session();
    }

    #[instrument(skip(self), fields(player = self.id))]
    pub fn play(&mut self) {
        if self.state != PlayerState::Ready {
            return;
        }
        self.transition(PlayerState::Playing);
        let restart = self.session.as_ref().map_or(false, |s| s.ended);
        if restart {
            self.restart();
        } else {
            self.engine.set_playing(true);
        }
        if self.engine.is_stalled() {
            self.emit(PlayerEvent::Loading { value: true });
        }
    }

    #[instrument(skip(self), fields(player = self.id))]
    pub fn pause(&mut self) {
        if self.state <= PlayerState::Ready {
            return;
        }
        self.transition(PlayerState::Ready);
        self.engine.set_playing(false);
        self.sample_position();
    }

    #[instrument(skip(self), fields(player = self.id))]
    pub fn seek_to(&mut self, millis: i64) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let unbounded = session.live || (self.state > PlayerState::Opening && !session.is_finite());
        let target = from_millis(millis);
        if unbounded || to_millis(self.engine.position()) == to_millis(target) {
            self.emit(PlayerEvent::SeekEnd);
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.seeking = true;
            session.ended = false;
        }
        self.engine.seek(target);
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.config.volume = volume;
        self.engine.set_volume(volume);
    }

    pub fn set_speed(&mut self, speed: f32) {
        if !speed.is_finite() || speed <= 0.0 {
            debug!(player = self.id, speed, "Ignoring invalid speed");
            return;
        }
        self.config.speed = speed;
        self.engine.set_speed(speed);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.config.looping = looping;
    }

    pub fn set_max_resolution(&mut self, width: u32, height: u32) {
        self.config.max_resolution = Some(Resolution::new(width, height));
        self.push_constraints();
    }

    pub fn set_max_bitrate(&mut self, bitrate: u64) {
        self.config.max_bitrate = Some(bitrate);
        self.push_constraints();
    }

    pub fn set_preferred_audio_language(&mut self, language: &str) {
        self.config.preferred_audio_language = language_preference(language);
        self.push_constraints();
    }

    pub fn set_preferred_subtitle_language(&mut self, language: &str) {
        self.config.preferred_subtitle_language = language_preference(language);
        self.push_constraints();
    }

    fn push_constraints(&mut self) {
        if self.capabilities.track_constraints {
            self.engine.apply_constraints(&self.config.constraints());
        }
    }

    pub fn set_show_subtitle(&mut self, show: bool) {
        self.config.show_subtitle = show;
        self.frames.set_show_subtitle(show, self.state == PlayerState::Ready);
    }

    /// Select (`enabled`) or release an explicit track override
    #[instrument(skip(self), fields(player = self.id))]
    pub fn override_track(&mut self, group: usize, option: usize, enabled: bool) {
        if self.state <= PlayerState::Opening || !self.capabilities.track_selection {
            return;
        }
        let Some(catalog) = self.session.as_mut().and_then(|s| s.tracks.as_mut()) else {
            return;
        };
        if !catalog.is_selectable(group, option) {
            debug!(group, option, "Track not selectable");
            return;
        }
        if enabled {
            catalog.record_override(group, option);
            self.engine.select_track(group, option);
        } else if catalog.release_override(group, option) {
            self.engine.clear_track_override(group);
        }
    }

    pub fn surface_destroyed(&mut self) {
        self.frames.surface_destroyed();
    }

    pub fn surface_available(&mut self) {
        self.frames.surface_available();
    }

    /// Release everything; the player accepts nothing afterwards
    #[instrument(skip(self), fields(player = self.id))]
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.close();
        self.engine.release();
        self.sink.end_of_stream();
        self.disposed = true;
        info!("Player disposed");
    }

    // ---- engine callbacks ----

    /// Apply one engine callback; callbacks from other sessions are dropped
    pub fn handle_engine_event(&mut self, event: SessionEvent) {
        if self.disposed {
            return;
        }
        if event.generation != self.generation || self.session.is_none() {
            warn!(
                player = self.id,
                generation = event.generation,
                current = self.generation,
                event = ?event.event,
                "Dropping stale engine callback"
            );
            return;
        }

        match event.event {
            EngineEvent::Prepared => self.on_prepared(),
            EngineEvent::Stalled(stalled) => {
                if self.state == PlayerState::Playing {
                    self.emit(PlayerEvent::Loading { value: stalled });
                }
            }
            EngineEvent::LoadingChanged(loading) => self.on_loading_changed(loading),
            EngineEvent::SeekCompleted => self.on_seek_completed(),
            EngineEvent::Ended => self.on_ended(),
            EngineEvent::Failed(message) => self.on_failed(message),
            EngineEvent::BufferedRanges(ranges) => self.on_buffered_ranges(&ranges),
            EngineEvent::Position(position) => {
                if self.state > PlayerState::Opening {
                    self.emit_position(position);
                }
            }
            EngineEvent::Geometry(geometry) => self.on_geometry(geometry),
            EngineEvent::Cues(cues) => self.on_cues(cues),
        }
    }

    fn on_prepared(&mut self) {
        if self.state != PlayerState::Opening {
            debug!(player = self.id, state = %self.state, "Ignoring repeated prepared callback");
            return;
        }
        self.transition(PlayerState::Ready);
        self.engine.set_volume(self.config.volume);

        let duration = self.engine.duration();
        let catalog = self
            .capabilities
            .track_selection
            .then(|| TrackCatalog::snapshot(self.engine.track_groups()));
        let tracks = catalog.as_ref().map(|c| c.descriptors().clone());

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.live = duration.is_none();
        session.duration = duration.unwrap_or(Duration::ZERO);
        session.tracks = catalog;
        let event = PlayerEvent::MediaInfo {
            duration: if session.live { 0 } else { to_millis(session.duration) },
            tracks,
            source: session.source.clone(),
        };
        info!(
            player = self.id,
            session = %session.id,
            duration_ms = to_millis(session.duration),
            live = session.live,
            "Media ready"
        );
        self.emit(event);

        if self.tracks_buffering() && self.engine.is_loading() {
            self.buffering = true;
        }
    }

    /// Buffer ranges are only reported for networked, bounded media
    fn tracks_buffering(&self) -> bool {
        self.capabilities.polled_buffering
            && self
                .session
                .as_ref()
                .map_or(false, |s| s.is_networked() && !s.live)
    }

    fn on_loading_changed(&mut self, loading: bool) {
        // Before Ready, liveness is unknown and mediaInfo has not gone out yet;
        // on_prepared picks up a load that is already in progress.
        if self.state <= PlayerState::Opening || !self.tracks_buffering() {
            return;
        }
        if loading {
            self.buffering = true;
        } else if self.buffering {
            self.buffering = false;
            self.sample_buffer();
        }
    }

    fn on_seek_completed(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (seeking, restarting) = (session.seeking, session.restarting);
        if !seeking && !restarting {
            debug!(player = self.id, "Ignoring seek completion with no seek outstanding");
            return;
        }
        session.seeking = false;
        session.restarting = false;
        if restarting && self.state == PlayerState::Playing {
            self.engine.set_playing(true);
        }
        if seeking {
            self.emit(PlayerEvent::SeekEnd);
            if !self.watch_demand().position {
                self.sample_position();
            }
        }
    }

    fn on_ended(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.seeking || session.restarting {
            self.on_seek_completed();
            return;
        }
        let live = session.live;
        let duration = session.duration;

        if self.state > PlayerState::Opening && !live {
            self.emit_position(duration);
        }
        if self.state != PlayerState::Playing {
            return;
        }
        if live {
            info!(player = self.id, "Live stream ended");
            self.close();
        } else if self.config.looping {
            debug!(player = self.id, "Looping to start");
            self.restart();
        } else {
            self.transition(PlayerState::Ready);
            self.engine.set_playing(false);
            if let Some(session) = self.session.as_mut() {
                session.ended = true;
            }
        }
        self.emit(PlayerEvent::Finished);
    }

    fn on_failed(&mut self, message: String) {
        if self.state == PlayerState::Idle {
            return;
        }
        warn!(player = self.id, error = %message, "Engine failure, closing session");
        self.close();
        self.emit(PlayerEvent::Error { value: message });
    }

    fn on_buffered_ranges(&mut self, ranges: &[(Duration, Duration)]) {
        if self.state <= PlayerState::Opening {
            return;
        }
        let position = self.engine.position();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_finite() {
            return;
        }
        let Some(end) = range_containing(ranges, position) else {
            return;
        };
        if let Some((begin, end)) = buffer_update(&mut session.buffer_position, position, end) {
            self.emit(PlayerEvent::Buffer { begin, end });
        }
    }

    fn on_geometry(&mut self, geometry: VideoGeometry) {
        let (width, height) = geometry.display_size();
        if width > 0 && height > 0 {
            self.frames.resize(width, height);
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.video_size != (width, height) {
            session.video_size = (width, height);
            self.emit(PlayerEvent::VideoSize {
                width: width as f64,
                height: height as f64,
            });
        }
    }

    fn on_cues(&mut self, cues: Vec<SubtitleCue>) {
        self.frames.update_cues(cues);
    }

    /// Seek to zero; playback resumes once the engine confirms the seek
    fn restart(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.ended = false;
            session.restarting = true;
        }
        self.engine.seek(Duration::ZERO);
    }

    // ---- watchers ----

    /// Samplers the owner task should run right now
    pub fn watch_demand(&self) -> WatchDemand {
        let Some(session) = self.session.as_ref() else {
            return WatchDemand::default();
        };
        WatchDemand {
            position: self.state == PlayerState::Playing
                && session.is_finite()
                && self.capabilities.position == PositionReporting::Polled,
            buffer: self.buffering,
            frames: self.frames.wants_ticks(),
        }
    }

    /// Position watcher tick
    pub fn on_position_tick(&mut self) {
        if self.state > PlayerState::Opening {
            self.sample_position();
        }
    }

    /// Buffer watcher tick; stops the watcher once loading is over
    pub fn on_buffer_tick(&mut self) {
        let keep = self.state > PlayerState::Opening && self.tracks_buffering() && self.engine.is_loading();
        if keep {
            self.sample_buffer();
        } else {
            self.buffering = false;
        }
    }

    fn sample_position(&mut self) {
        let position = self.engine.position();
        self.emit_position(position);
    }

    fn emit_position(&mut self, position: Duration) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(value) = position_update(&mut session.position, position) {
            self.emit(PlayerEvent::Position { value });
        }
    }

    fn sample_buffer(&mut self) {
        let position = self.engine.position();
        let end = self.engine.buffered_position();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some((begin, end)) = buffer_update(&mut session.buffer_position, position, end) {
            self.emit(PlayerEvent::Buffer { begin, end });
        }
    }
}

impl std::fmt::Debug for PlayerStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerStateMachine")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimController, SimMedia, SimSurface, SimulatedEngine, SolidSubtitleRenderer};
    use crate::source::DirectoryAssetResolver;
    use crate::tracks::{TrackFormat, TrackGroup, TrackKind, TrackOption};

    struct Harness {
        machine: PlayerStateMachine,
        sim: SimController,
        events: EventStream,
        engine_rx: mpsc::UnboundedReceiver<SessionEvent>,
    }

    impl Harness {
        fn new(media: SimMedia) -> Self {
            let (engine, sim) = SimulatedEngine::manual(media);
            let surface = Arc::new(SimSurface::new(1));
            let frames = FrameBridge::new(
                surface,
                None,
                engine.frame_copier(),
                Box::new(SolidSubtitleRenderer),
                2,
            );
            let (engine_tx, engine_rx) = mpsc::unbounded_channel();
            let assets = Arc::new(DirectoryAssetResolver::new("/assets"));
            let mut machine = PlayerStateMachine::new(1, Box::new(engine), frames, assets, engine_tx);
            let events = machine.listen();
            Self {
                machine,
                sim,
                events,
                engine_rx,
            }
        }

        /// Deliver queued engine callbacks, as the owner task would
        fn pump(&mut self) {
            while let Ok(event) = self.engine_rx.try_recv() {
                self.machine.handle_engine_event(event);
            }
        }

        fn drain(&mut self) -> Vec<PlayerEvent> {
            self.pump();
            self.events.drain()
        }

        fn open_ready(&mut self, source: &str) {
            self.machine.open(source);
            self.sim.prepare();
            self.pump();
        }
    }

    fn ten_seconds() -> SimMedia {
        SimMedia::finite(Duration::from_secs(10))
    }

    #[test]
    fn test_open_emits_media_info_once() {
        let mut h = Harness::new(ten_seconds());
        h.machine.open("file:///a.mp4");
        assert_eq!(h.machine.state(), PlayerState::Opening);
        h.sim.prepare();
        h.sim.prepare();
        let events = h.drain();
        assert_eq!(h.machine.state(), PlayerState::Ready);
        let infos: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, PlayerEvent::MediaInfo { .. }))
            .collect();
        assert_eq!(infos.len(), 1);
        match infos[0] {
            PlayerEvent::MediaInfo { duration, source, .. } => {
                assert_eq!(*duration, 10_000);
                assert_eq!(source, "file:///a.mp4");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_invalid_source_reports_error_and_stays_idle() {
        let mut h = Harness::new(ten_seconds());
        h.machine.open("http://[::1");
        assert_eq!(h.machine.state(), PlayerState::Idle);
        let events = h.drain();
        assert!(matches!(events.as_slice(), [PlayerEvent::Error { .. }]));
    }

    #[test]
    fn test_load_failure_reports_error() {
        let mut h = Harness::new(ten_seconds().failing_load("unsupported container"));
        h.machine.open("file:///broken.bin");
        assert_eq!(h.machine.state(), PlayerState::Idle);
        match h.drain().as_slice() {
            [PlayerEvent::Error { value }] => assert!(value.contains("unsupported container")),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_play_pause_preconditions() {
        let mut h = Harness::new(ten_seconds());
        h.machine.play();
        h.machine.pause();
        assert_eq!(h.machine.state(), PlayerState::Idle);
        assert!(h.drain().is_empty());

        h.open_ready("file:///a.mp4");
        h.machine.pause();
        assert_eq!(h.machine.state(), PlayerState::Ready);
        h.machine.play();
        assert_eq!(h.machine.state(), PlayerState::Playing);
        assert!(h.sim.is_playing());
        h.machine.play();
        assert_eq!(h.machine.state(), PlayerState::Playing);
        h.machine.pause();
        assert!(!h.sim.is_playing());
    }

    #[test]
    fn test_seek_short_circuits() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.drain();

        h.machine.seek_to(0);
        assert_eq!(h.drain(), vec![PlayerEvent::SeekEnd]);
        assert!(h.sim.seeks().is_empty());
    }

    #[test]
    fn test_seek_on_live_short_circuits() {
        let mut h = Harness::new(SimMedia::live());
        h.open_ready("https://live.example.com/stream.m3u8");
        h.drain();
        h.machine.seek_to(5_000);
        assert_eq!(h.drain(), vec![PlayerEvent::SeekEnd]);
        assert!(h.sim.seeks().is_empty());
    }

    #[test]
    fn test_seek_completion_flushes_position_when_paused() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.drain();

        h.machine.seek_to(5_000);
        assert!(h.machine.session().unwrap().seeking);
        assert!(h.drain().is_empty());
        h.sim.complete_seek();
        assert_eq!(
            h.drain(),
            vec![PlayerEvent::SeekEnd, PlayerEvent::Position { value: 5_000 }]
        );
        assert!(!h.machine.session().unwrap().seeking);
    }

    #[test]
    fn test_stale_seek_completion_ignored() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.drain();
        h.sim.complete_seek();
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_end_of_media_without_loop() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.machine.play();
        h.drain();

        h.sim.finish();
        assert_eq!(
            h.drain(),
            vec![PlayerEvent::Position { value: 10_000 }, PlayerEvent::Finished]
        );
        assert_eq!(h.machine.state(), PlayerState::Ready);

        // Playing again restarts from zero once the seek lands
        h.machine.play();
        assert_eq!(h.sim.seeks(), vec![Duration::ZERO]);
        assert!(!h.sim.is_playing());
        h.sim.complete_seek();
        h.pump();
        assert!(h.sim.is_playing());
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_looping_waits_for_seek() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.machine.set_looping(true);
        h.machine.play();
        h.drain();

        h.sim.finish();
        let events = h.drain();
        assert_eq!(events.last(), Some(&PlayerEvent::Finished));
        assert_eq!(h.machine.state(), PlayerState::Playing);
        assert!(h.machine.session().unwrap().restarting);

        h.sim.complete_seek();
        let events = h.drain();
        assert!(!events.contains(&PlayerEvent::SeekEnd));
        assert!(h.sim.is_playing());
    }

    #[test]
    fn test_live_end_closes_then_finishes() {
        let mut h = Harness::new(SimMedia::live());
        h.open_ready("rtmp://live.example.com/app");
        match h.drain().first() {
            Some(PlayerEvent::MediaInfo { duration, .. }) => assert_eq!(*duration, 0),
            other => panic!("unexpected {other:?}"),
        }
        h.machine.play();
        h.sim.finish();
        assert_eq!(h.drain(), vec![PlayerEvent::Finished]);
        assert_eq!(h.machine.state(), PlayerState::Idle);
        assert!(h.machine.session().is_none());
    }

    #[test]
    fn test_fatal_error_closes_before_reporting() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.machine.play();
        h.drain();
        h.sim.fail("ERROR_CODE_DECODING_FAILED");
        h.pump();
        assert_eq!(h.machine.state(), PlayerState::Idle);
        assert_eq!(
            h.events.drain(),
            vec![PlayerEvent::Error {
                value: "ERROR_CODE_DECODING_FAILED".into()
            }]
        );
    }

    #[test]
    fn test_stale_callbacks_dropped_after_close() {
        let mut h = Harness::new(ten_seconds());
        h.machine.open("file:///a.mp4");
        let stale = h.sim.sender().unwrap();
        h.machine.close();
        h.machine.open("file:///b.mp4");
        stale.send(EngineEvent::Prepared);
        h.pump();
        assert_eq!(h.machine.state(), PlayerState::Opening);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_close_is_idempotent_and_keeps_config() {
        let mut h = Harness::new(ten_seconds());
        h.machine.set_volume(0.25);
        h.machine.set_speed(1.5);
        h.machine.set_looping(true);
        h.open_ready("file:///a.mp4");
        h.drain();

        h.machine.close();
        let generation = h.machine.generation();
        h.machine.close();
        assert_eq!(h.machine.generation(), generation);
        assert_eq!(h.machine.state(), PlayerState::Idle);
        assert!(h.drain().is_empty());
        assert_eq!(h.machine.config().volume, 0.25);
        assert_eq!(h.machine.config().speed, 1.5);
        assert!(h.machine.config().looping);
    }

    #[test]
    fn test_volume_applied_on_ready() {
        let mut h = Harness::new(ten_seconds());
        h.machine.set_volume(3.0);
        assert_eq!(h.machine.config().volume, 1.0);
        h.machine.set_volume(0.5);
        h.open_ready("file:///a.mp4");
        assert_eq!(h.sim.volume(), 0.5);
        h.machine.set_speed(-1.0);
        assert_eq!(h.machine.config().speed, 1.0);
    }

    #[test]
    fn test_video_size_only_on_change() {
        let mut h = Harness::new(ten_seconds().with_geometry(VideoGeometry::new(1920, 1080).with_rotation(90)));
        h.open_ready("file:///a.mp4");
        let sizes: Vec<_> = h
            .drain()
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::VideoSize { .. }))
            .collect();
        assert_eq!(sizes, vec![PlayerEvent::VideoSize { width: 1080.0, height: 1920.0 }]);

        h.sim.geometry(VideoGeometry::new(1920, 1080).with_rotation(270));
        assert!(h.drain().is_empty());
        assert_eq!(h.machine.frames().size(), (1080, 1920));
    }

    fn media_with_tracks() -> SimMedia {
        let video = |w, h| {
            TrackOption::new(TrackFormat {
                width: Some(w),
                height: Some(h),
                ..Default::default()
            })
        };
        ten_seconds().with_tracks(vec![
            TrackGroup::new(TrackKind::Video, vec![video(1920, 1080), video(1280, 720)]),
            TrackGroup::new(TrackKind::Audio, vec![TrackOption::new(TrackFormat::default())]),
        ])
    }

    #[test]
    fn test_track_override_bookkeeping() {
        let mut h = Harness::new(media_with_tracks());
        h.machine.override_track(0, 1, true);
        assert!(h.sim.track_overrides().is_empty());

        h.open_ready("file:///a.mp4");
        h.machine.override_track(0, 1, true);
        assert_eq!(h.sim.track_overrides().get(&0), Some(&1));

        // Releasing a different option is a no-op
        h.machine.override_track(0, 0, false);
        assert_eq!(h.sim.track_overrides().get(&0), Some(&1));

        h.machine.override_track(0, 1, false);
        assert!(h.sim.track_overrides().is_empty());

        h.machine.override_track(5, 0, true);
        assert!(h.sim.track_overrides().is_empty());
    }

    #[test]
    fn test_constraints_pushed_to_engine() {
        let mut h = Harness::new(ten_seconds());
        h.machine.set_max_resolution(1280, 720);
        h.machine.set_max_bitrate(2_000_000);
        h.machine.set_preferred_audio_language("");
        h.machine.set_preferred_subtitle_language("ja");
        let constraints = h.sim.constraints();
        assert_eq!(constraints.max_resolution, Some(Resolution::new(1280, 720)));
        assert_eq!(constraints.max_bitrate, Some(2_000_000));
        assert_eq!(constraints.preferred_audio_language, None);
        assert_eq!(constraints.preferred_subtitle_language.as_deref(), Some("ja"));
    }

    #[test]
    fn test_watch_demand() {
        let mut h = Harness::new(ten_seconds());
        assert_eq!(h.machine.watch_demand(), WatchDemand::default());
        h.open_ready("file:///a.mp4");
        assert!(!h.machine.watch_demand().position);
        h.machine.play();
        assert!(h.machine.watch_demand().position);
        assert!(h.machine.watch_demand().frames);
        h.machine.pause();
        assert!(!h.machine.watch_demand().position);
    }

    #[test]
    fn test_buffer_watch_for_network_sources() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("https://cdn.example.com/a.mp4");
        h.machine.play();
        h.drain();

        h.sim.set_loading(true);
        h.pump();
        assert!(h.machine.watch_demand().buffer);

        h.sim.set_buffered(Duration::from_secs(4));
        h.machine.on_buffer_tick();
        h.machine.on_buffer_tick();
        assert_eq!(h.drain(), vec![PlayerEvent::Buffer { begin: 0, end: 4_000 }]);

        h.sim.set_buffered(Duration::from_secs(10));
        h.sim.set_loading(false);
        h.pump();
        assert!(!h.machine.watch_demand().buffer);
        assert_eq!(h.drain(), vec![PlayerEvent::Buffer { begin: 0, end: 10_000 }]);
    }

    #[test]
    fn test_loading_while_opening_waits_for_media_info() {
        let mut h = Harness::new(ten_seconds());
        h.machine.open("https://cdn.example.com/a.mp4");
        h.sim.set_loading(true);
        h.pump();
        assert!(!h.machine.watch_demand().buffer);

        h.sim.set_buffered(Duration::from_secs(3));
        h.machine.on_buffer_tick();
        h.sim.prepare();
        let events = h.drain();
        assert!(matches!(events.first(), Some(PlayerEvent::MediaInfo { .. })), "{events:?}");
        assert!(!events.iter().any(|e| matches!(e, PlayerEvent::Buffer { .. })));

        // The load already in progress is picked up once Ready
        assert!(h.machine.watch_demand().buffer);
        h.machine.on_buffer_tick();
        assert_eq!(h.drain(), vec![PlayerEvent::Buffer { begin: 0, end: 3_000 }]);
    }

    #[test]
    fn test_live_source_never_watches_buffer() {
        let mut h = Harness::new(SimMedia::live());
        h.machine.open("https://live.example.com/index.m3u8");
        h.sim.set_loading(true);
        h.sim.set_buffered(Duration::from_secs(3));
        h.pump();
        h.machine.on_buffer_tick();
        h.sim.prepare();
        h.pump();
        assert!(!h.machine.watch_demand().buffer);
        assert!(!h.drain().iter().any(|e| matches!(e, PlayerEvent::Buffer { .. })));
    }

    #[test]
    fn test_buffer_watch_skips_local_files() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.sim.set_loading(true);
        h.pump();
        assert!(!h.machine.watch_demand().buffer);
    }

    #[test]
    fn test_stall_reports_loading_only_while_playing() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.drain();
        h.sim.set_stalled(true);
        assert!(h.drain().is_empty());
        h.machine.play();
        assert_eq!(h.drain(), vec![PlayerEvent::Loading { value: true }]);
        h.sim.set_stalled(false);
        assert_eq!(h.drain(), vec![PlayerEvent::Loading { value: false }]);
    }

    #[test]
    fn test_dispose_is_terminal() {
        let mut h = Harness::new(ten_seconds());
        h.open_ready("file:///a.mp4");
        h.drain();
        h.machine.dispose();
        assert!(h.sim.is_released());
        h.machine.open("file:///b.mp4");
        h.sim.prepare();
        assert!(h.drain().is_empty());
        assert!(h.events.try_next().is_none());
    }
}

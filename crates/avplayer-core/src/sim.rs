//! Simulated native engine
//!
//! A deterministic stand-in for a platform pipeline, used by the test suite
//! and the CLI. In manual mode nothing happens until the [`SimController`]
//! says so; in timed mode a driver task prepares the media, advances the
//! playhead, completes seeks and grows the buffer on a fixed tick (fully
//! deterministic under a paused tokio clock).

use crate::engine::{EngineCapabilities, EngineEvent, EngineEventSender, EngineFactory, NativeEngine};
use crate::frame::{CopyCompletion, DisplayTick, FrameBuffer, FrameCopier, FrameTime, OutputSurface, SubtitleCue, SubtitleRenderer};
use crate::registry::SurfaceRegistry;
use crate::source::MediaLocator;
use crate::tracks::TrackGroup;
use crate::types::{TrackConstraints, VideoGeometry};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// A timed subtitle line
#[derive(Debug, Clone, PartialEq)]
pub struct SimCue {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// Media the simulated engine pretends to play
#[derive(Debug, Clone, PartialEq)]
pub struct SimMedia {
    /// `None` for live streams
    pub duration: Option<Duration>,
    pub geometry: Option<VideoGeometry>,
    pub tracks: Vec<TrackGroup>,
    pub subtitles: Vec<SimCue>,
    /// Reject `load` with this message
    pub load_error: Option<String>,
}

impl SimMedia {
    pub fn finite(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            geometry: Some(VideoGeometry::new(1280, 720)),
            tracks: Vec::new(),
            subtitles: Vec::new(),
            load_error: None,
        }
    }

    pub fn live() -> Self {
        Self {
            duration: None,
            ..Self::finite(Duration::ZERO)
        }
    }

    pub fn with_geometry(mut self, geometry: VideoGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn audio_only(mut self) -> Self {
        self.geometry = None;
        self
    }

    pub fn with_tracks(mut self, tracks: Vec<TrackGroup>) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn with_subtitles(mut self, subtitles: Vec<SimCue>) -> Self {
        self.subtitles = subtitles;
        self
    }

    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }
}

/// Driver cadence for timed mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTiming {
    /// Delay between `load` and the prepared callback
    pub prepare_delay: Duration,
    /// Playhead step period; seeks complete on the next step
    pub tick: Duration,
    /// How far ahead of the playhead network sources buffer
    pub buffer_ahead: Duration,
}

impl Default for SimTiming {
    fn default() -> Self {
        Self {
            prepare_delay: Duration::from_millis(50),
            tick: Duration::from_millis(10),
            buffer_ahead: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct SimState {
    media: SimMedia,
    sender: Option<EngineEventSender>,
    locator: Option<MediaLocator>,
    load_id: u64,
    prepared: bool,
    playing: bool,
    ended: bool,
    position: Duration,
    buffered: Duration,
    loading: bool,
    stalled: bool,
    seek_pending: bool,
    seeks: Vec<Duration>,
    volume: f32,
    speed: f32,
    overrides: HashMap<usize, usize>,
    constraints: TrackConstraints,
    active_cues: Vec<String>,
    released: bool,
}

impl SimState {
    fn send(&self, event: EngineEvent) {
        if let Some(sender) = &self.sender {
            sender.send(event);
        }
    }

    fn networked(&self) -> bool {
        self.locator.as_ref().map_or(false, MediaLocator::is_network)
    }
}

/// Test/driver handle onto a [`SimulatedEngine`]
#[derive(Debug, Clone)]
pub struct SimController {
    shared: Arc<Mutex<SimState>>,
}

impl SimController {
    /// Report preparation; repeated calls repeat the callback
    pub fn prepare(&self) {
        let mut st = self.shared.lock();
        if st.locator.is_none() {
            return;
        }
        let first = !st.prepared;
        st.prepared = true;
        st.send(EngineEvent::Prepared);
        if first {
            if let Some(geometry) = st.media.geometry {
                st.send(EngineEvent::Geometry(geometry));
            }
        }
    }

    /// Reach the natural end of media
    pub fn finish(&self) {
        let mut st = self.shared.lock();
        if let Some(duration) = st.media.duration {
            st.position = duration;
        }
        st.ended = true;
        st.send(EngineEvent::Ended);
    }

    pub fn fail(&self, message: &str) {
        self.shared.lock().send(EngineEvent::Failed(message.to_string()));
    }

    pub fn complete_seek(&self) {
        let mut st = self.shared.lock();
        st.seek_pending = false;
        st.send(EngineEvent::SeekCompleted);
    }

    pub fn set_position(&self, position: Duration) {
        self.shared.lock().position = position;
    }

    pub fn set_buffered(&self, buffered: Duration) {
        self.shared.lock().buffered = buffered;
    }

    pub fn set_loading(&self, loading: bool) {
        let mut st = self.shared.lock();
        st.loading = loading;
        st.send(EngineEvent::LoadingChanged(loading));
    }

    pub fn set_stalled(&self, stalled: bool) {
        let mut st = self.shared.lock();
        st.stalled = stalled;
        st.send(EngineEvent::Stalled(stalled));
    }

    pub fn push_ranges(&self, ranges: Vec<(Duration, Duration)>) {
        self.shared.lock().send(EngineEvent::BufferedRanges(ranges));
    }

    pub fn geometry(&self, geometry: VideoGeometry) {
        self.shared.lock().send(EngineEvent::Geometry(geometry));
    }

    pub fn cues(&self, cues: Vec<SubtitleCue>) {
        self.shared.lock().send(EngineEvent::Cues(cues));
    }

    /// Post an arbitrary callback for the current session
    pub fn send(&self, event: EngineEvent) {
        self.shared.lock().send(event);
    }

    /// Sender of the current load, kept by tests to fake late callbacks
    pub fn sender(&self) -> Option<EngineEventSender> {
        self.shared.lock().sender.clone()
    }

    /// Move the playhead as a playing engine would
    pub fn advance(&self, elapsed: Duration, buffer_ahead: Duration) {
        let mut st = self.shared.lock();
        if !st.prepared || st.ended || st.seek_pending || st.stalled || !st.playing {
            return;
        }
        let step = elapsed.mul_f32(st.speed);
        st.position += step;
        if st.networked() {
            let ahead = st.position + buffer_ahead;
            st.buffered = st.media.duration.map_or(ahead, |d| ahead.min(d));
        }
        if let Some(duration) = st.media.duration {
            if st.position >= duration {
                st.position = duration;
                st.ended = true;
                st.send(EngineEvent::Ended);
            }
        }

        let position = st.position;
        let active: Vec<String> = st
            .media
            .subtitles
            .iter()
            .filter(|c| c.start <= position && position < c.end)
            .map(|c| c.text.clone())
            .collect();
        if active != st.active_cues {
            let cues: Vec<SubtitleCue> = active.iter().map(SubtitleCue::new).collect();
            st.active_cues = active;
            st.send(EngineEvent::Cues(cues));
        }
    }

    /// One driver step; `false` once the load it belongs to is gone
    fn step(&self, load_id: u64, timing: &SimTiming) -> bool {
        {
            let mut st = self.shared.lock();
            if st.load_id != load_id || st.released {
                return false;
            }
            if st.seek_pending {
                st.seek_pending = false;
                st.send(EngineEvent::SeekCompleted);
                return true;
            }
        }
        self.advance(timing.tick, timing.buffer_ahead);
        let mut st = self.shared.lock();
        let fully_buffered = st.media.duration.map_or(false, |d| st.buffered >= d);
        if st.loading && fully_buffered {
            st.loading = false;
            st.send(EngineEvent::LoadingChanged(false));
        }
        true
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().playing
    }

    pub fn position(&self) -> Duration {
        self.shared.lock().position
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.shared.lock().seeks.clone()
    }

    pub fn volume(&self) -> f32 {
        self.shared.lock().volume
    }

    pub fn speed(&self) -> f32 {
        self.shared.lock().speed
    }

    pub fn track_overrides(&self) -> HashMap<usize, usize> {
        self.shared.lock().overrides.clone()
    }

    pub fn constraints(&self) -> TrackConstraints {
        self.shared.lock().constraints.clone()
    }

    pub fn is_released(&self) -> bool {
        self.shared.lock().released
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.lock().locator.is_some()
    }
}

async fn drive(controller: SimController, load_id: u64, timing: SimTiming) {
    tokio::time::sleep(timing.prepare_delay).await;
    if controller.shared.lock().load_id != load_id {
        return;
    }
    controller.prepare();
    let networked = controller.shared.lock().networked();
    if networked {
        controller.set_loading(true);
    }

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + timing.tick, timing.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if !controller.step(load_id, &timing) {
            trace!(load_id, "Simulation driver stopped");
            return;
        }
    }
}

/// Simulated [`NativeEngine`]
#[derive(Debug)]
pub struct SimulatedEngine {
    shared: Arc<Mutex<SimState>>,
    capabilities: EngineCapabilities,
    timing: Option<SimTiming>,
}

impl SimulatedEngine {
    fn with_mode(media: SimMedia, timing: Option<SimTiming>) -> (Self, SimController) {
        let shared = Arc::new(Mutex::new(SimState {
            media,
            sender: None,
            locator: None,
            load_id: 0,
            prepared: false,
            playing: false,
            ended: false,
            position: Duration::ZERO,
            buffered: Duration::ZERO,
            loading: false,
            stalled: false,
            seek_pending: false,
            seeks: Vec::new(),
            volume: 1.0,
            speed: 1.0,
            overrides: HashMap::new(),
            constraints: TrackConstraints::default(),
            active_cues: Vec::new(),
            released: false,
        }));
        let engine = Self {
            shared: shared.clone(),
            capabilities: EngineCapabilities::rich(),
            timing,
        };
        (engine, SimController { shared })
    }

    /// Engine that only moves when its controller is driven
    pub fn manual(media: SimMedia) -> (Self, SimController) {
        Self::with_mode(media, None)
    }

    /// Engine driven by a timer task spawned on each load
    pub fn timed(media: SimMedia, timing: SimTiming) -> (Self, SimController) {
        Self::with_mode(media, Some(timing))
    }

    pub fn with_capabilities(mut self, capabilities: EngineCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl NativeEngine for SimulatedEngine {
    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn load(&mut self, locator: &MediaLocator, events: EngineEventSender) -> Result<()> {
        let load_id = {
            let mut st = self.shared.lock();
            if st.released {
                return Err(Error::EngineSetup("engine released".to_string()));
            }
            if let Some(message) = &st.media.load_error {
                return Err(Error::EngineSetup(message.clone()));
            }
            st.load_id += 1;
            st.locator = Some(locator.clone());
            st.sender = Some(events);
            st.prepared = false;
            st.ended = false;
            st.position = Duration::ZERO;
            st.buffered = Duration::ZERO;
            st.loading = false;
            st.stalled = false;
            st.seek_pending = false;
            st.seeks.clear();
            st.active_cues.clear();
            st.load_id
        };
        debug!(uri = %locator, load_id, "Simulated engine loading");

        if let Some(timing) = self.timing {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|e| Error::EngineSetup(format!("no async runtime: {e}")))?;
            let controller = SimController {
                shared: self.shared.clone(),
            };
            handle.spawn(drive(controller, load_id, timing));
        }
        Ok(())
    }

    fn unload(&mut self) {
        let mut st = self.shared.lock();
        st.load_id += 1;
        st.locator = None;
        st.sender = None;
        st.prepared = false;
        st.playing = false;
    }

    fn set_playing(&mut self, playing: bool) {
        self.shared.lock().playing = playing;
    }

    fn seek(&mut self, position: Duration) {
        let mut st = self.shared.lock();
        let target = st.media.duration.map_or(position, |d| position.min(d));
        st.position = target;
        st.seeks.push(target);
        st.seek_pending = true;
        st.ended = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared.lock().volume = volume;
    }

    fn set_speed(&mut self, speed: f32) {
        self.shared.lock().speed = speed;
    }

    fn position(&self) -> Duration {
        self.shared.lock().position
    }

    fn buffered_position(&self) -> Duration {
        self.shared.lock().buffered
    }

    fn duration(&self) -> Option<Duration> {
        self.shared.lock().media.duration
    }

    fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    fn is_stalled(&self) -> bool {
        self.shared.lock().stalled
    }

    fn track_groups(&self) -> Vec<TrackGroup> {
        self.shared.lock().media.tracks.clone()
    }

    fn select_track(&mut self, group: usize, option: usize) {
        self.shared.lock().overrides.insert(group, option);
    }

    fn clear_track_override(&mut self, group: usize) {
        self.shared.lock().overrides.remove(&group);
    }

    fn clear_track_overrides(&mut self) {
        self.shared.lock().overrides.clear();
    }

    fn apply_constraints(&mut self, constraints: &TrackConstraints) {
        self.shared.lock().constraints = constraints.clone();
    }

    fn frame_copier(&self) -> Option<Arc<dyn FrameCopier>> {
        Some(Arc::new(SimFrameSource {
            shared: self.shared.clone(),
        }))
    }

    fn release(&mut self) {
        self.unload();
        self.shared.lock().released = true;
    }
}

/// Decoder-side frame source: the current frame is the playhead position
struct SimFrameSource {
    shared: Arc<Mutex<SimState>>,
}

impl FrameCopier for SimFrameSource {
    fn frame_time(&self, _tick: DisplayTick) -> Option<FrameTime> {
        let st = self.shared.lock();
        (st.prepared && st.media.geometry.is_some()).then(|| FrameTime::from_duration(st.position))
    }

    fn copy_frame(&self, time: FrameTime, target: Arc<FrameBuffer>, done: CopyCompletion) {
        let shade = (time.0 / 1_000 % 256) as u8;
        target.with_pixels(|pixels| {
            for px in pixels.chunks_exact_mut(4) {
                px.copy_from_slice(&[shade, shade, shade, 0xff]);
            }
        });
        done.complete(true);
    }
}

/// Paints each cue as an opaque band near the bottom of the frame
#[derive(Debug, Default, Clone, Copy)]
pub struct SolidSubtitleRenderer;

impl SubtitleRenderer for SolidSubtitleRenderer {
    fn draw(&mut self, cues: &[SubtitleCue], pixels: &mut [u8], width: u32, height: u32) {
        let band = (height / 12).max(1) as usize;
        let stride = width as usize * 4;
        for (i, cue) in cues.iter().enumerate() {
            let line = cue.line.unwrap_or(0.9).clamp(0.0, 1.0);
            let top = ((height as f32 * line) as usize).saturating_sub((i + 1) * band);
            let rows = pixels.chunks_exact_mut(stride).skip(top).take(band);
            for row in rows {
                for px in row.chunks_exact_mut(4) {
                    px.copy_from_slice(&[0xff, 0xff, 0xff, 0xff]);
                }
            }
        }
    }
}

/// Host surface stand-in that counts what it is asked to draw
#[derive(Debug)]
pub struct SimSurface {
    id: i64,
    attached: AtomicBool,
    size: Mutex<(u32, u32)>,
    presented: AtomicU64,
    overlays: AtomicU64,
}

impl SimSurface {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            attached: AtomicBool::new(true),
            size: Mutex::new((0, 0)),
            presented: AtomicU64::new(0),
            overlays: AtomicU64::new(0),
        }
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::SeqCst);
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    /// Frames drawn so far
    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::SeqCst)
    }

    /// Frames drawn with a subtitle overlay
    pub fn overlays(&self) -> u64 {
        self.overlays.load(Ordering::SeqCst)
    }
}

impl OutputSurface for SimSurface {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_size(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
    }

    fn present(&self, _frame: &FrameBuffer, overlay: Option<&FrameBuffer>) -> bool {
        if !self.attached.load(Ordering::SeqCst) {
            return false;
        }
        self.presented.fetch_add(1, Ordering::SeqCst);
        if overlay.is_some() {
            self.overlays.fetch_add(1, Ordering::SeqCst);
        }
        true
    }
}

/// Hands out [`SimSurface`]s with increasing ids
#[derive(Debug)]
pub struct SimSurfaceRegistry {
    next_id: AtomicI64,
    surfaces: Mutex<HashMap<i64, Arc<SimSurface>>>,
    capacity: Option<usize>,
}

impl SimSurfaceRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            surfaces: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }

    /// Refuse registration once `capacity` surfaces are live
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    pub fn get(&self, id: i64) -> Option<Arc<SimSurface>> {
        self.surfaces.lock().get(&id).cloned()
    }

    pub fn registered(&self) -> usize {
        self.surfaces.lock().len()
    }
}

impl Default for SimSurfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceRegistry for SimSurfaceRegistry {
    fn register(&self) -> Result<Arc<dyn OutputSurface>> {
        let mut surfaces = self.surfaces.lock();
        if let Some(capacity) = self.capacity {
            if surfaces.len() >= capacity {
                return Err(Error::SurfaceRegistration(format!(
                    "all {capacity} texture slots are in use"
                )));
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let surface = Arc::new(SimSurface::new(id));
        surfaces.insert(id, surface.clone());
        Ok(surface)
    }

    fn unregister(&self, id: i64) {
        self.surfaces.lock().remove(&id);
    }
}

/// Builds simulated engines; keeps every controller for inspection
pub struct SimEngineFactory {
    media: SimMedia,
    timing: Option<SimTiming>,
    capabilities: EngineCapabilities,
    controllers: Mutex<Vec<SimController>>,
}

impl SimEngineFactory {
    pub fn manual(media: SimMedia) -> Self {
        Self {
            media,
            timing: None,
            capabilities: EngineCapabilities::rich(),
            controllers: Mutex::new(Vec::new()),
        }
    }

    pub fn timed(media: SimMedia, timing: SimTiming) -> Self {
        Self {
            timing: Some(timing),
            ..Self::manual(media)
        }
    }

    pub fn with_capabilities(mut self, capabilities: EngineCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Controller of the `index`-th engine created
    pub fn controller(&self, index: usize) -> Option<SimController> {
        self.controllers.lock().get(index).cloned()
    }

    pub fn last_controller(&self) -> Option<SimController> {
        self.controllers.lock().last().cloned()
    }
}

impl EngineFactory for SimEngineFactory {
    fn create(&self) -> Result<Box<dyn NativeEngine>> {
        let (engine, controller) = SimulatedEngine::with_mode(self.media.clone(), self.timing);
        self.controllers.lock().push(controller);
        Ok(Box::new(engine.with_capabilities(self.capabilities)))
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{resolve_source, DirectoryAssetResolver};
    use tokio::sync::mpsc;

    fn locator(source: &str) -> MediaLocator {
        resolve_source(source, &DirectoryAssetResolver::new("/assets")).unwrap()
    }

    #[test]
    fn test_manual_engine_reports_only_when_driven() {
        let (mut engine, sim) = SimulatedEngine::manual(SimMedia::finite(Duration::from_secs(2)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.load(&locator("file:///a.mp4"), EngineEventSender::new(1, tx)).unwrap();
        assert!(rx.try_recv().is_err());

        sim.prepare();
        assert_eq!(rx.try_recv().unwrap().event, EngineEvent::Prepared);
        assert!(matches!(rx.try_recv().unwrap().event, EngineEvent::Geometry(_)));

        engine.set_playing(true);
        sim.advance(Duration::from_millis(1500), Duration::ZERO);
        assert_eq!(engine.position(), Duration::from_millis(1500));
        sim.advance(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(engine.position(), Duration::from_secs(2));
        assert_eq!(rx.try_recv().unwrap().event, EngineEvent::Ended);
    }

    #[test]
    fn test_seek_clamps_and_blocks_progress() {
        let (mut engine, sim) = SimulatedEngine::manual(SimMedia::finite(Duration::from_secs(2)));
        let (tx, _rx) = mpsc::unbounded_channel();
        engine.load(&locator("file:///a.mp4"), EngineEventSender::new(1, tx)).unwrap();
        sim.prepare();
        engine.set_playing(true);
        engine.seek(Duration::from_secs(9));
        assert_eq!(sim.seeks(), vec![Duration::from_secs(2)]);
        sim.advance(Duration::from_millis(10), Duration::ZERO);
        assert_eq!(engine.position(), Duration::from_secs(2));
    }

    #[test]
    fn test_timed_engine_requires_runtime() {
        let (mut engine, _sim) =
            SimulatedEngine::timed(SimMedia::finite(Duration::from_secs(1)), SimTiming::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = engine
            .load(&locator("file:///a.mp4"), EngineEventSender::new(1, tx))
            .unwrap_err();
        assert!(matches!(err, Error::EngineSetup(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_engine_prepares_and_plays() {
        let timing = SimTiming::default();
        let (mut engine, sim) = SimulatedEngine::timed(SimMedia::finite(Duration::from_millis(100)), timing);
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.load(&locator("file:///a.mp4"), EngineEventSender::new(1, tx)).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, EngineEvent::Prepared);
        engine.set_playing(true);
        loop {
            let event = rx.recv().await.unwrap();
            if event.event == EngineEvent::Ended {
                break;
            }
        }
        assert_eq!(sim.position(), Duration::from_millis(100));
    }

    #[test]
    fn test_subtitle_renderer_paints_band() {
        let mut renderer = SolidSubtitleRenderer;
        let mut pixels = vec![0u8; 8 * 12 * 4];
        renderer.draw(&[SubtitleCue::new("hi")], &mut pixels, 8, 12);
        assert!(pixels.iter().any(|b| *b == 0xff));
        renderer.draw(&[], &mut vec![0u8; 16], 2, 2);
    }

    #[test]
    fn test_surface_registry() {
        let registry = SimSurfaceRegistry::new();
        let a = registry.register().unwrap();
        let b = registry.register().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.registered(), 2);
        registry.unregister(a.id());
        assert!(registry.get(a.id()).is_none());
    }

    #[test]
    fn test_surface_capacity() {
        let registry = SimSurfaceRegistry::with_capacity(1);
        let a = registry.register().unwrap();
        let err = registry.register().err().expect("second surface refused");
        assert_eq!(err.error_code(), "SURFACE_REGISTRATION");

        registry.unregister(a.id());
        assert!(registry.register().is_ok());
    }
}

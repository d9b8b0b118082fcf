//! Frame delivery from the native decoder to the host's output surface
//!
//! The bridge tracks three frame handles: the frame being read from the
//! decoder (`reading`), the buffer being copied into, and the frame already
//! presented (`rendered`). A copy is only started when none is in flight;
//! later frames are skipped, never queued. Buffers retired by a resize while
//! a copy is in flight are recycled when that copy completes, driven by a
//! tri-state latch:
//!
//! ```text
//!   IDLE ──tick──▶ COPYING ──done──▶ IDLE
//!                    │                 ▲
//!                 resize               │
//!                    ▼                 │
//!           COPYING_PENDING_RECYCLE ──done (recycle retired buffer)
//! ```
//!
//! Copy completions may arrive on any thread. Each carries the session
//! generation it was started under and is ignored for presentation when the
//! session has moved on.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

const IDLE: u8 = 0;
const COPYING: u8 = 1;
const COPYING_PENDING_RECYCLE: u8 = 2;

const BYTES_PER_PIXEL: usize = 4;

/// Decoder timestamp of a frame, in microseconds of media time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameTime(pub i64);

impl FrameTime {
    pub fn from_duration(time: Duration) -> Self {
        Self(time.as_micros().min(i64::MAX as u128) as i64)
    }
}

/// RGBA8 pixel buffer shared between the bridge, copiers and surfaces
#[derive(Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Mutex<Vec<u8>>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            pixels: Mutex::new(vec![0; len]),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Zero every pixel (fully transparent)
    pub fn clear(&self) {
        self.pixels.lock().fill(0);
    }

    /// Run `f` with exclusive access to the pixels
    pub fn with_pixels<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut pixels = self.pixels.lock();
        f(&mut pixels)
    }

    /// Copy the pixel data out
    pub fn snapshot(&self) -> Vec<u8> {
        self.pixels.lock().clone()
    }
}

/// Retains released buffers for reuse at the same size
#[derive(Debug)]
pub struct FramePool {
    capacity: usize,
    free: Vec<Arc<FrameBuffer>>,
    recycled: u64,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Vec::with_capacity(capacity),
            recycled: 0,
        }
    }

    /// A cleared buffer of the requested size
    pub fn acquire(&mut self, width: u32, height: u32) -> Arc<FrameBuffer> {
        if let Some(index) = self.free.iter().position(|b| b.size() == (width, height)) {
            let buffer = self.free.swap_remove(index);
            buffer.clear();
            return buffer;
        }
        Arc::new(FrameBuffer::new(width, height))
    }

    /// Return a buffer; kept only when nothing else still holds it
    pub fn recycle(&mut self, buffer: Arc<FrameBuffer>) {
        self.recycled += 1;
        if Arc::strong_count(&buffer) == 1 && self.free.len() < self.capacity {
            self.free.push(buffer);
        }
    }

    pub fn recycled(&self) -> u64 {
        self.recycled
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// One display refresh signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTick {
    /// Host time the next frame will be shown at
    pub target_time: Duration,
}

/// Platform frame handoff
///
/// Implemented per engine (texture copy, pixel-buffer copy, canvas blit);
/// the skip-if-busy and deferred-recycle policy live in [`FrameBridge`].
pub trait FrameCopier: Send + Sync {
    /// Timestamp of the decoder frame that should be visible at `tick`
    fn frame_time(&self, tick: DisplayTick) -> Option<FrameTime>;

    /// Copy frame `time` into `target`; call `done.complete(..)` when finished,
    /// from any thread. Dropping `done` counts as a failed copy.
    fn copy_frame(&self, time: FrameTime, target: Arc<FrameBuffer>, done: CopyCompletion);
}

/// Host-registered output surface (texture)
pub trait OutputSurface: Send + Sync {
    /// Registration id assigned by the host
    fn id(&self) -> i64;

    /// Resize backing storage
    fn set_size(&self, width: u32, height: u32);

    /// Draw `frame` with an optional composited overlay; `false` when the
    /// surface is currently detached
    fn present(&self, frame: &FrameBuffer, overlay: Option<&FrameBuffer>) -> bool;
}

/// One subtitle cue as delivered by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub text: String,
    /// Vertical anchor as a fraction of the frame height
    pub line: Option<f32>,
    /// Horizontal anchor as a fraction of the frame width
    pub position: Option<f32>,
    /// Box width as a fraction of the frame width
    pub size: Option<f32>,
}

impl SubtitleCue {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            line: None,
            position: None,
            size: None,
        }
    }
}

/// Swappable subtitle painter
pub trait SubtitleRenderer: Send {
    /// Paint `cues` onto a cleared RGBA buffer of `width`x`height`
    fn draw(&mut self, cues: &[SubtitleCue], pixels: &mut [u8], width: u32, height: u32);
}

/// Renderer that leaves the subtitle layer transparent
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSubtitleRenderer;

impl SubtitleRenderer for NullSubtitleRenderer {
    fn draw(&mut self, _cues: &[SubtitleCue], _pixels: &mut [u8], _width: u32, _height: u32) {}
}

/// Result of one refresh tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session, no size, or no copier
    Inactive,
    /// Decoder has nothing for this tick
    NoFrame,
    /// Frame already read or rendered
    Unchanged,
    /// A copy is in flight; frame skipped
    Busy,
    /// Copy started
    Started(FrameTime),
}

/// Counters exposed for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub copies_started: u64,
    pub copies_failed: u64,
    pub skipped_busy: u64,
    pub presented: u64,
    pub suppressed: u64,
    pub recycled: u64,
}

struct BridgeState {
    reading: Option<FrameTime>,
    rendered: Option<FrameTime>,
    size: (u32, u32),
    video: Arc<FrameBuffer>,
    subtitle: Arc<FrameBuffer>,
    retired: Option<Arc<FrameBuffer>>,
    cues: Vec<SubtitleCue>,
    pool: FramePool,
    stats: FrameStats,
}

struct BridgeInner {
    latch: AtomicU8,
    generation: AtomicU64,
    active: AtomicBool,
    hidden: AtomicBool,
    pending_redraw: AtomicBool,
    show_subtitle: AtomicBool,
    state: Mutex<BridgeState>,
    copier: Option<Arc<dyn FrameCopier>>,
    surface: Arc<dyn OutputSurface>,
    subtitle_surface: Option<Arc<dyn OutputSurface>>,
    renderer: Mutex<Box<dyn SubtitleRenderer>>,
}

/// Completion handle for one in-flight copy
pub struct CopyCompletion {
    bridge: Weak<BridgeInner>,
    generation: u64,
    time: FrameTime,
    buffer: Option<Arc<FrameBuffer>>,
}

impl CopyCompletion {
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Report the copy result
    pub fn complete(mut self, success: bool) {
        self.finish(success);
    }

    fn finish(&mut self, success: bool) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.finish_copy(self.generation, self.time, buffer, success);
        }
    }
}

impl Drop for CopyCompletion {
    fn drop(&mut self) {
        self.finish(false);
    }
}

impl std::fmt::Debug for CopyCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyCompletion")
            .field("generation", &self.generation)
            .field("time", &self.time)
            .finish()
    }
}

impl BridgeInner {
    fn finish_copy(&self, generation: u64, time: FrameTime, buffer: Arc<FrameBuffer>, success: bool) {
        let mut state = self.state.lock();
        if state.reading == Some(time) {
            state.reading = None;
        }
        let current = self.active.load(Ordering::Acquire)
            && self.generation.load(Ordering::Acquire) == generation;
        if !success {
            state.stats.copies_failed += 1;
        } else if current && Arc::ptr_eq(&buffer, &state.video) {
            state.rendered = Some(time);
            self.draw(&mut state);
        } else {
            trace!(?time, "Dropping stale frame copy");
        }
        drop(buffer);
        if self.latch.swap(IDLE, Ordering::AcqRel) == COPYING_PENDING_RECYCLE {
            if let Some(old) = state.retired.take() {
                state.pool.recycle(old);
                state.stats.recycled += 1;
            }
        }
    }

    /// Present the current video buffer; requires the state lock
    fn draw(&self, state: &mut BridgeState) {
        if self.hidden.load(Ordering::Acquire) {
            self.pending_redraw.store(true, Ordering::Release);
            state.stats.suppressed += 1;
            return;
        }
        let show_subtitle = self.show_subtitle.load(Ordering::Acquire);
        let overlay = if show_subtitle && self.subtitle_surface.is_none() {
            Some(state.subtitle.as_ref())
        } else {
            None
        };
        let shown = self.surface.present(&state.video, overlay);
        if shown {
            if show_subtitle {
                if let Some(subtitle_surface) = &self.subtitle_surface {
                    subtitle_surface.present(&state.subtitle, None);
                }
            }
            self.pending_redraw.store(false, Ordering::Release);
            state.stats.presented += 1;
        } else {
            self.pending_redraw.store(true, Ordering::Release);
            state.stats.suppressed += 1;
        }
    }

    fn paint_subtitles(&self, state: &BridgeState) {
        let subtitle = &state.subtitle;
        let (width, height) = subtitle.size();
        subtitle.with_pixels(|pixels| {
            pixels.fill(0);
            if !state.cues.is_empty() {
                self.renderer.lock().draw(&state.cues, pixels, width, height);
            }
        });
    }
}

/// Delivers decoded frames to an output surface; cheap to clone
#[derive(Clone)]
pub struct FrameBridge {
    inner: Arc<BridgeInner>,
}

impl FrameBridge {
    pub fn new(
        surface: Arc<dyn OutputSurface>,
        subtitle_surface: Option<Arc<dyn OutputSurface>>,
        copier: Option<Arc<dyn FrameCopier>>,
        renderer: Box<dyn SubtitleRenderer>,
        pool_capacity: usize,
    ) -> Self {
        let state = BridgeState {
            reading: None,
            rendered: None,
            size: (0, 0),
            video: Arc::new(FrameBuffer::new(1, 1)),
            subtitle: Arc::new(FrameBuffer::new(1, 1)),
            retired: None,
            cues: Vec::new(),
            pool: FramePool::new(pool_capacity),
            stats: FrameStats::default(),
        };
        Self {
            inner: Arc::new(BridgeInner {
                latch: AtomicU8::new(IDLE),
                generation: AtomicU64::new(0),
                active: AtomicBool::new(false),
                hidden: AtomicBool::new(false),
                pending_redraw: AtomicBool::new(false),
                show_subtitle: AtomicBool::new(false),
                state: Mutex::new(state),
                copier,
                surface,
                subtitle_surface,
                renderer: Mutex::new(renderer),
            }),
        }
    }

    pub fn surface_id(&self) -> i64 {
        self.inner.surface.id()
    }

    pub fn subtitle_surface_id(&self) -> Option<i64> {
        self.inner.subtitle_surface.as_ref().map(|s| s.id())
    }

    /// Start accepting frames for session `generation`
    pub fn begin_session(&self, generation: u64) {
        self.inner.generation.store(generation, Ordering::Release);
        self.inner.active.store(true, Ordering::Release);
    }

    /// Stop presenting and forget per-session frame state
    pub fn end_session(&self) {
        self.inner.active.store(false, Ordering::Release);
        let mut state = self.inner.state.lock();
        state.reading = None;
        state.rendered = None;
        state.size = (0, 0);
        state.cues.clear();
        state.subtitle.clear();
        self.inner.pending_redraw.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Needs refresh ticks: active, sized and fed by a copier
    pub fn wants_ticks(&self) -> bool {
        self.is_active() && self.inner.copier.is_some() && self.size() != (0, 0)
    }

    pub fn size(&self) -> (u32, u32) {
        self.inner.state.lock().size
    }

    /// Resize surfaces and backing buffers; `false` when the size is unchanged
    pub fn resize(&self, width: u32, height: u32) -> bool {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if state.size == (width, height) || width == 0 || height == 0 {
            return false;
        }
        state.size = (width, height);
        inner.surface.set_size(width, height);
        if let Some(subtitle_surface) = &inner.subtitle_surface {
            subtitle_surface.set_size(width, height);
        }

        let subtitle = state.pool.acquire(width, height);
        let old_subtitle = std::mem::replace(&mut state.subtitle, subtitle);
        state.pool.recycle(old_subtitle);
        inner.paint_subtitles(&state);

        let video = state.pool.acquire(width, height);
        let old_video = std::mem::replace(&mut state.video, video);
        let deferred = inner
            .latch
            .compare_exchange(COPYING, COPYING_PENDING_RECYCLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if deferred {
            debug!(width, height, "Deferring recycle of in-flight frame buffer");
            state.retired = Some(old_video);
        } else {
            state.pool.recycle(old_video);
            state.stats.recycled += 1;
        }
        true
    }

    /// Handle one display refresh signal
    pub fn on_display_tick(&self, tick: DisplayTick) -> TickOutcome {
        let inner = &self.inner;
        let Some(copier) = inner.copier.as_ref() else {
            return TickOutcome::Inactive;
        };
        if !inner.active.load(Ordering::Acquire) {
            return TickOutcome::Inactive;
        }
        let Some(time) = copier.frame_time(tick) else {
            return TickOutcome::NoFrame;
        };

        let (target, generation) = {
            let mut state = inner.state.lock();
            if state.size == (0, 0) {
                return TickOutcome::Inactive;
            }
            if state.reading == Some(time) || state.rendered == Some(time) {
                return TickOutcome::Unchanged;
            }
            if inner
                .latch
                .compare_exchange(IDLE, COPYING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                state.stats.skipped_busy += 1;
                return TickOutcome::Busy;
            }
            state.reading = Some(time);
            state.stats.copies_started += 1;
            (state.video.clone(), inner.generation.load(Ordering::Acquire))
        };

        let done = CopyCompletion {
            bridge: Arc::downgrade(inner),
            generation,
            time,
            buffer: Some(target.clone()),
        };
        copier.copy_frame(time, target, done);
        TickOutcome::Started(time)
    }

    /// A copy is in flight
    pub fn is_copying(&self) -> bool {
        self.inner.latch.load(Ordering::Acquire) != IDLE
    }

    /// Replace the active cues and repaint the subtitle layer
    pub fn update_cues(&self, cues: Vec<SubtitleCue>) {
        if !self.is_active() {
            return;
        }
        let mut state = self.inner.state.lock();
        state.cues = cues;
        self.inner.paint_subtitles(&state);
    }

    /// Toggle subtitle compositing; re-presents the current frame when paused
    pub fn set_show_subtitle(&self, show: bool, paused: bool) {
        let inner = &self.inner;
        inner.show_subtitle.store(show, Ordering::Release);
        if paused && !self.is_copying() && self.is_active() {
            let mut state = inner.state.lock();
            if state.size != (0, 0) && state.rendered.is_some() {
                inner.draw(&mut state);
            }
        }
    }

    /// Host destroyed the surface; draws are suppressed until it returns
    pub fn surface_destroyed(&self) {
        self.inner.hidden.store(true, Ordering::Release);
    }

    /// Host surface is back; replay the last frame
    pub fn surface_available(&self) {
        let inner = &self.inner;
        inner.hidden.store(false, Ordering::Release);
        let mut state = inner.state.lock();
        if self.is_active() && state.size != (0, 0) && state.rendered.is_some() {
            inner.draw(&mut state);
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.load(Ordering::Acquire)
    }

    /// A draw was suppressed and awaits replay
    pub fn has_pending_redraw(&self) -> bool {
        self.inner.pending_redraw.load(Ordering::Acquire)
    }

    pub fn last_rendered(&self) -> Option<FrameTime> {
        self.inner.state.lock().rendered
    }

    pub fn stats(&self) -> FrameStats {
        self.inner.state.lock().stats
    }
}

impl std::fmt::Debug for FrameBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBridge")
            .field("surface", &self.surface_id())
            .field("active", &self.is_active())
            .field("copying", &self.is_copying())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct RecordingSurface {
        attached: AtomicBool,
        sizes: Mutex<Vec<(u32, u32)>>,
        presents: Mutex<Vec<bool>>,
    }

    impl RecordingSurface {
        fn attached() -> Arc<Self> {
            let surface = Arc::new(Self::default());
            surface.attached.store(true, Ordering::SeqCst);
            surface
        }
    }

    impl OutputSurface for RecordingSurface {
        fn id(&self) -> i64 {
            42
        }

        fn set_size(&self, width: u32, height: u32) {
            self.sizes.lock().push((width, height));
        }

        fn present(&self, _frame: &FrameBuffer, overlay: Option<&FrameBuffer>) -> bool {
            if !self.attached.load(Ordering::SeqCst) {
                return false;
            }
            self.presents.lock().push(overlay.is_some());
            true
        }
    }

    /// Holds completions until the test releases them
    #[derive(Default)]
    struct ManualCopier {
        next: Mutex<Option<FrameTime>>,
        pending: Mutex<VecDeque<CopyCompletion>>,
    }

    impl ManualCopier {
        fn offer(&self, micros: i64) {
            *self.next.lock() = Some(FrameTime(micros));
        }

        fn finish_next(&self, success: bool) {
            let done = self.pending.lock().pop_front().expect("no copy in flight");
            done.complete(success);
        }
    }

    impl FrameCopier for ManualCopier {
        fn frame_time(&self, _tick: DisplayTick) -> Option<FrameTime> {
            *self.next.lock()
        }

        fn copy_frame(&self, _time: FrameTime, target: Arc<FrameBuffer>, done: CopyCompletion) {
            target.with_pixels(|p| p.fill(0xff));
            self.pending.lock().push_back(done);
        }
    }

    struct NoopRenderer;

    impl SubtitleRenderer for NoopRenderer {
        fn draw(&mut self, _cues: &[SubtitleCue], pixels: &mut [u8], _w: u32, _h: u32) {
            pixels[3] = 0xff;
        }
    }

    fn bridge(surface: Arc<RecordingSurface>, copier: Arc<ManualCopier>) -> FrameBridge {
        let bridge = FrameBridge::new(surface, None, Some(copier), Box::new(NoopRenderer), 4);
        bridge.begin_session(1);
        bridge.resize(4, 2);
        bridge
    }

    fn tick() -> DisplayTick {
        DisplayTick {
            target_time: Duration::from_millis(16),
        }
    }

    #[test]
    fn test_skip_if_busy() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface.clone(), copier.clone());

        copier.offer(1_000);
        assert_eq!(bridge.on_display_tick(tick()), TickOutcome::Started(FrameTime(1_000)));
        copier.offer(2_000);
        assert_eq!(bridge.on_display_tick(tick()), TickOutcome::Busy);
        assert_eq!(copier.pending.lock().len(), 1);

        copier.finish_next(true);
        assert!(!bridge.is_copying());
        assert_eq!(bridge.last_rendered(), Some(FrameTime(1_000)));
        assert_eq!(surface.presents.lock().len(), 1);
        assert_eq!(bridge.stats().skipped_busy, 1);
    }

    #[test]
    fn test_same_frame_not_copied_twice() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface, copier.clone());

        copier.offer(1_000);
        bridge.on_display_tick(tick());
        assert_eq!(bridge.on_display_tick(tick()), TickOutcome::Unchanged);
        copier.finish_next(true);
        assert_eq!(bridge.on_display_tick(tick()), TickOutcome::Unchanged);
    }

    #[test]
    fn test_resize_during_copy_defers_recycle() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface.clone(), copier.clone());
        let recycled_before = bridge.stats().recycled;

        copier.offer(1_000);
        bridge.on_display_tick(tick());
        assert!(bridge.resize(8, 4));
        assert_eq!(bridge.stats().recycled, recycled_before);

        copier.finish_next(true);
        assert_eq!(bridge.stats().recycled, recycled_before + 1);
        // The finished copy targeted the retired buffer, so nothing is shown
        assert!(surface.presents.lock().is_empty());
        assert_eq!(surface.sizes.lock().last(), Some(&(8, 4)));
        assert!(!bridge.is_copying());
    }

    #[test]
    fn test_resize_when_idle_recycles_immediately() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface, copier);
        let before = bridge.stats().recycled;
        assert!(bridge.resize(8, 4));
        assert_eq!(bridge.stats().recycled, before + 1);
        assert!(!bridge.resize(8, 4));
    }

    #[test]
    fn test_stale_generation_not_presented() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface.clone(), copier.clone());

        copier.offer(1_000);
        bridge.on_display_tick(tick());
        bridge.end_session();
        bridge.begin_session(2);
        copier.finish_next(true);

        assert!(surface.presents.lock().is_empty());
        assert!(!bridge.is_copying());
    }

    #[test]
    fn test_dropped_completion_releases_latch() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface, copier.clone());

        copier.offer(1_000);
        bridge.on_display_tick(tick());
        copier.pending.lock().clear();
        assert!(!bridge.is_copying());
        assert_eq!(bridge.stats().copies_failed, 1);
    }

    #[test]
    fn test_hidden_surface_replays_on_return() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface.clone(), copier.clone());

        bridge.surface_destroyed();
        copier.offer(1_000);
        bridge.on_display_tick(tick());
        copier.finish_next(true);
        assert!(surface.presents.lock().is_empty());
        assert!(bridge.has_pending_redraw());

        bridge.surface_available();
        assert_eq!(surface.presents.lock().len(), 1);
        assert!(!bridge.has_pending_redraw());
    }

    #[test]
    fn test_subtitle_toggle_redraws_when_paused() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = bridge(surface.clone(), copier.clone());

        copier.offer(1_000);
        bridge.on_display_tick(tick());
        copier.finish_next(true);

        bridge.update_cues(vec![SubtitleCue::new("hello")]);
        bridge.set_show_subtitle(true, true);
        assert_eq!(*surface.presents.lock(), vec![false, true]);

        bridge.set_show_subtitle(false, false);
        assert_eq!(surface.presents.lock().len(), 2);
    }

    #[test]
    fn test_inactive_bridge_ignores_ticks() {
        let surface = RecordingSurface::attached();
        let copier = Arc::new(ManualCopier::default());
        let bridge = FrameBridge::new(surface, None, Some(copier.clone()), Box::new(NoopRenderer), 2);
        copier.offer(1_000);
        assert_eq!(bridge.on_display_tick(tick()), TickOutcome::Inactive);
        bridge.begin_session(1);
        assert_eq!(bridge.on_display_tick(tick()), TickOutcome::Inactive);
        assert!(!bridge.wants_ticks());
    }

    #[test]
    fn test_pool_reuses_matching_sizes() {
        let mut pool = FramePool::new(2);
        let buffer = pool.acquire(2, 2);
        buffer.with_pixels(|p| p.fill(9));
        pool.recycle(buffer);
        assert_eq!(pool.available(), 1);

        let reused = pool.acquire(2, 2);
        assert_eq!(pool.available(), 0);
        assert!(reused.snapshot().iter().all(|b| *b == 0));

        let held = pool.acquire(3, 3);
        let clone = held.clone();
        pool.recycle(held);
        assert_eq!(pool.available(), 0);
        drop(clone);
    }
}

//! Per-player owner task
//!
//! Every player runs as one tokio task that exclusively owns its
//! [`PlayerStateMachine`]. Host commands, engine callbacks and watcher ticks
//! all arrive through this task, so transitions never race and events reach
//! the listener in the order their causes were observed.

use crate::clock::Watcher;
use crate::config::RuntimeConfig;
use crate::engine::SessionEvent;
use crate::event::EventStream;
use crate::frame::{DisplayTick, FrameStats};
use crate::player::PlayerStateMachine;
use crate::types::{PlayerConfig, PlayerId, PlayerState};
use crate::{Error, Result};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Host command addressed to one player
#[derive(Debug)]
pub enum Command {
    Open(String),
    Close,
    Play,
    Pause,
    SeekTo(i64),
    SetVolume(f32),
    SetSpeed(f32),
    SetLooping(bool),
    SetMaxResolution { width: u32, height: u32 },
    SetMaxBitrate(u64),
    SetPreferredAudioLanguage(String),
    SetPreferredSubtitleLanguage(String),
    SetShowSubtitle(bool),
    OverrideTrack { group: usize, option: usize, enabled: bool },
    SurfaceDestroyed,
    SurfaceAvailable,
    Listen(oneshot::Sender<EventStream>),
    CancelListen,
    Snapshot(oneshot::Sender<PlayerSnapshot>),
    Dispose(oneshot::Sender<()>),
}

/// Point-in-time view of a player, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub state: PlayerState,
    pub config: PlayerConfig,
    pub source: Option<String>,
    pub generation: u64,
    pub position: Option<i64>,
    pub seeking: bool,
    pub video_size: (u32, u32),
    pub frames: FrameStats,
}

/// Owner task state
pub struct PlayerActor {
    machine: PlayerStateMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    engine_events: mpsc::UnboundedReceiver<SessionEvent>,
    position: Watcher,
    buffer: Watcher,
    display: Watcher,
    started: Instant,
}

impl PlayerActor {
    /// Spawn the owner task; must be called within a Tokio runtime
    pub fn spawn(
        machine: PlayerStateMachine,
        engine_events: mpsc::UnboundedReceiver<SessionEvent>,
        config: &RuntimeConfig,
        subtitle_surface: Option<i64>,
    ) -> PlayerHandle {
        let id = machine.id();
        let position_period = config.position_poll_interval(machine.capabilities().profile);
        let (tx, commands) = mpsc::unbounded_channel();
        let actor = Self {
            machine,
            commands,
            engine_events,
            position: Watcher::new("position", position_period),
            buffer: Watcher::new("buffer", config.buffer_poll_interval()),
            display: Watcher::new("display", config.display_refresh_interval()),
            started: Instant::now(),
        };
        let task = tokio::spawn(actor.run());
        PlayerHandle {
            id,
            subtitle_surface,
            tx,
            task,
        }
    }

    async fn run(mut self) {
        let id = self.machine.id();
        debug!(player = id, "Player task started");
        loop {
            self.sync_watchers();
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.apply(command) {
                            break;
                        }
                    }
                    None => {
                        // Every handle dropped: host teardown
                        self.machine.dispose();
                        break;
                    }
                },
                Some(event) = self.engine_events.recv() => {
                    self.machine.handle_engine_event(event);
                }
                _ = self.position.tick() => self.machine.on_position_tick(),
                _ = self.buffer.tick() => self.machine.on_buffer_tick(),
                at = self.display.tick() => {
                    let target_time = at.duration_since(self.started) + self.display.period();
                    self.machine.frames().on_display_tick(DisplayTick { target_time });
                }
            }
        }
        debug!(player = id, "Player task stopped");
    }

    fn sync_watchers(&mut self) {
        let demand = self.machine.watch_demand();
        self.position.set_active(demand.position);
        self.buffer.set_active(demand.buffer);
        self.display.set_active(demand.frames);
    }

    /// Apply one command; `false` ends the task
    fn apply(&mut self, command: Command) -> bool {
        let m = &mut self.machine;
        match command {
            Command::Open(source) => m.open(&source),
            Command::Close => m.close(),
            Command::Play => m.play(),
            Command::Pause => m.pause(),
            Command::SeekTo(millis) => m.seek_to(millis),
            Command::SetVolume(volume) => m.set_volume(volume),
            Command::SetSpeed(speed) => m.set_speed(speed),
            Command::SetLooping(looping) => m.set_looping(looping),
            Command::SetMaxResolution { width, height } => m.set_max_resolution(width, height),
            Command::SetMaxBitrate(bitrate) => m.set_max_bitrate(bitrate),
            Command::SetPreferredAudioLanguage(language) => m.set_preferred_audio_language(&language),
            Command::SetPreferredSubtitleLanguage(language) => m.set_preferred_subtitle_language(&language),
            Command::SetShowSubtitle(show) => m.set_show_subtitle(show),
            Command::OverrideTrack { group, option, enabled } => m.override_track(group, option, enabled),
            Command::SurfaceDestroyed => m.surface_destroyed(),
            Command::SurfaceAvailable => m.surface_available(),
            Command::Listen(reply) => {
                let _ = reply.send(m.listen());
            }
            Command::CancelListen => m.cancel_listen(),
            Command::Snapshot(reply) => {
                let _ = reply.send(snapshot(m));
            }
            Command::Dispose(reply) => {
                m.dispose();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }
}

fn snapshot(machine: &PlayerStateMachine) -> PlayerSnapshot {
    let session = machine.session();
    PlayerSnapshot {
        id: machine.id(),
        state: machine.state(),
        config: machine.config().clone(),
        source: session.map(|s| s.source.clone()),
        generation: machine.generation(),
        position: session.and_then(|s| s.position),
        seeking: session.map_or(false, |s| s.seeking),
        video_size: session.map_or((0, 0), |s| s.video_size),
        frames: machine.frames().stats(),
    }
}

/// Registry-side handle onto a running player task
#[derive(Debug)]
pub struct PlayerHandle {
    id: PlayerId,
    subtitle_surface: Option<i64>,
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl PlayerHandle {
    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn subtitle_surface(&self) -> Option<i64> {
        self.subtitle_surface
    }

    /// Queue a command without waiting
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::PlayerGone)
    }

    pub async fn listen(&self) -> Result<EventStream> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Listen(reply))?;
        rx.await.map_err(|_| Error::PlayerGone)
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| Error::PlayerGone)
    }

    /// Dispose and wait for the task to finish
    pub async fn dispose(self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Dispose(reply))?;
        rx.await.map_err(|_| Error::PlayerGone)?;
        if let Err(e) = self.task.await {
            return Err(Error::EngineFatal(format!("player task failed: {e}")));
        }
        info!(player = self.id, "Player task joined");
        Ok(())
    }
}

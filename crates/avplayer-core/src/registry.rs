//! Player registry
//!
//! Process-wide map from player id to the player's owner task. The map is
//! only restructured by `create` and `dispose`; every other operation takes a
//! read lock to route a command and never waits on the player.

use crate::actor::{Command, PlayerActor, PlayerHandle, PlayerSnapshot};
use crate::config::RuntimeConfig;
use crate::engine::EngineFactory;
use crate::event::EventStream;
use crate::frame::{FrameBridge, NullSubtitleRenderer, OutputSurface, SubtitleRenderer};
use crate::player::PlayerStateMachine;
use crate::source::{AssetResolver, DirectoryAssetResolver};
use crate::types::PlayerId;
use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Host texture registry
pub trait SurfaceRegistry: Send + Sync {
    /// Register a new output surface; its id becomes the player id
    fn register(&self) -> Result<Arc<dyn OutputSurface>>;

    fn unregister(&self, id: i64);
}

/// Builds the subtitle painter for each new player
pub type RendererFactory = Arc<dyn Fn() -> Box<dyn SubtitleRenderer> + Send + Sync>;

/// Reply to `create`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPlayer {
    pub id: PlayerId,
    #[serde(rename = "subId", default, skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<i64>,
}

/// Id → player map
pub struct PlayerRegistry {
    config: RuntimeConfig,
    engines: Arc<dyn EngineFactory>,
    surfaces: Arc<dyn SurfaceRegistry>,
    assets: Arc<dyn AssetResolver>,
    renderer: RendererFactory,
    players: RwLock<HashMap<PlayerId, PlayerHandle>>,
}

impl PlayerRegistry {
    pub fn new(
        config: RuntimeConfig,
        engines: Arc<dyn EngineFactory>,
        surfaces: Arc<dyn SurfaceRegistry>,
    ) -> Self {
        let assets = Arc::new(DirectoryAssetResolver::new(config.asset_root.clone()));
        Self {
            config,
            engines,
            surfaces,
            assets,
            renderer: Arc::new(|| Box::new(NullSubtitleRenderer) as Box<dyn SubtitleRenderer>),
            players: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_asset_resolver(mut self, assets: Arc<dyn AssetResolver>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_subtitle_renderer(mut self, renderer: RendererFactory) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Allocate a player with its engine and surface(s).
    /// Must be called within a Tokio runtime.
    #[instrument(skip(self))]
    pub fn create(&self) -> Result<CreatedPlayer> {
        let surface = self.surfaces.register()?;
        let id = surface.id();

        let subtitle_surface = if self.engines.capabilities().subtitle_surface {
            match self.surfaces.register() {
                Ok(surface) => Some(surface),
                Err(e) => {
                    self.surfaces.unregister(id);
                    return Err(e);
                }
            }
        } else {
            None
        };
        let sub_id = subtitle_surface.as_ref().map(|s| s.id());

        let engine = match self.engines.create() {
            Ok(engine) => engine,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "Engine creation failed");
                self.release_surfaces(id, sub_id);
                return Err(e);
            }
        };

        let frames = FrameBridge::new(
            surface,
            subtitle_surface,
            engine.frame_copier(),
            (self.renderer)(),
            self.config.frame_pool_capacity,
        );
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let machine = PlayerStateMachine::new(id, engine, frames, self.assets.clone(), engine_tx);
        let handle = PlayerActor::spawn(machine, engine_rx, &self.config, sub_id);

        self.players.write().insert(id, handle);
        info!(player = id, sub_id, "Player created");
        Ok(CreatedPlayer { id, sub_id })
    }

    /// Dispose one player, or every player when `id` is `None`; unknown ids are ignored
    #[instrument(skip(self))]
    pub async fn dispose(&self, id: Option<PlayerId>) -> Result<()> {
        match id {
            Some(id) => {
                let handle = self.players.write().remove(&id);
                match handle {
                    Some(handle) => self.shutdown(handle).await,
                    None => {
                        debug!(player = id, "Ignoring dispose for unknown player");
                        Ok(())
                    }
                }
            }
            None => {
                let handles: Vec<PlayerHandle> = self.players.write().drain().map(|(_, h)| h).collect();
                info!(count = handles.len(), "Disposing all players");
                for handle in handles {
                    match self.shutdown(handle).await {
                        Err(e) if e.is_fatal() => error!(code = e.error_code(), error = %e, "Player shutdown failed"),
                        Err(e) => debug!(code = e.error_code(), error = %e, "Player already stopped"),
                        Ok(()) => {}
                    }
                }
                Ok(())
            }
        }
    }

    async fn shutdown(&self, handle: PlayerHandle) -> Result<()> {
        let id = handle.id();
        let sub_id = handle.subtitle_surface();
        let result = handle.dispose().await;
        self.release_surfaces(id, sub_id);
        result
    }

    fn release_surfaces(&self, id: PlayerId, sub_id: Option<i64>) {
        self.surfaces.unregister(id);
        if let Some(sub_id) = sub_id {
            self.surfaces.unregister(sub_id);
        }
    }

    /// Route a command; unknown ids are ignored
    pub fn command(&self, id: PlayerId, command: Command) {
        let players = self.players.read();
        match players.get(&id) {
            Some(handle) => {
                if let Err(e) = handle.send(command) {
                    warn!(player = id, error = %e, "Command not delivered");
                }
            }
            None => debug!(player = id, "Ignoring command for unknown player"),
        }
    }

    pub fn open(&self, id: PlayerId, source: impl Into<String>) {
        self.command(id, Command::Open(source.into()));
    }

    pub fn close(&self, id: PlayerId) {
        self.command(id, Command::Close);
    }

    pub fn play(&self, id: PlayerId) {
        self.command(id, Command::Play);
    }

    pub fn pause(&self, id: PlayerId) {
        self.command(id, Command::Pause);
    }

    pub fn seek_to(&self, id: PlayerId, millis: i64) {
        self.command(id, Command::SeekTo(millis));
    }

    /// Attach a listener to a player's event stream
    pub async fn listen(&self, id: PlayerId) -> Result<EventStream> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.send_or_unknown(id, Command::Listen(reply))?;
        rx.await.map_err(|_| Error::PlayerGone)
    }

    pub fn cancel_listen(&self, id: PlayerId) {
        self.command(id, Command::CancelListen);
    }

    pub async fn snapshot(&self, id: PlayerId) -> Result<PlayerSnapshot> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.send_or_unknown(id, Command::Snapshot(reply))?;
        rx.await.map_err(|_| Error::PlayerGone)
    }

    fn send_or_unknown(&self, id: PlayerId, command: Command) -> Result<()> {
        let players = self.players.read();
        let handle = players.get(&id).ok_or(Error::UnknownPlayer { id })?;
        handle.send(command)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.read().contains_key(&id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }
}

impl std::fmt::Debug for PlayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerRegistry")
            .field("players", &self.ids())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCapabilities;
    use crate::event::PlayerEvent;
    use crate::sim::{SimEngineFactory, SimMedia, SimSurfaceRegistry};
    use std::time::Duration;

    fn registry(factory: SimEngineFactory) -> (PlayerRegistry, Arc<SimSurfaceRegistry>) {
        let surfaces = Arc::new(SimSurfaceRegistry::new());
        let registry = PlayerRegistry::new(RuntimeConfig::default(), Arc::new(factory), surfaces.clone());
        (registry, surfaces)
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let (registry, surfaces) = registry(SimEngineFactory::manual(SimMedia::finite(Duration::from_secs(1))));
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.sub_id, None);
        assert_eq!(registry.ids(), vec![a.id, b.id]);
        assert_eq!(surfaces.registered(), 2);
    }

    #[tokio::test]
    async fn test_subtitle_surface_pairing() {
        let factory = SimEngineFactory::manual(SimMedia::finite(Duration::from_secs(1)))
            .with_capabilities(EngineCapabilities::rich().with_subtitle_surface());
        let (registry, surfaces) = registry(factory);
        let created = registry.create().unwrap();
        let sub_id = created.sub_id.expect("subtitle surface id");
        assert_eq!(surfaces.registered(), 2);
        assert_eq!(
            serde_json::to_value(created).unwrap(),
            serde_json::json!({"id": created.id, "subId": sub_id})
        );

        registry.dispose(Some(created.id)).await.unwrap();
        assert_eq!(surfaces.registered(), 0);
    }

    #[tokio::test]
    async fn test_create_fails_when_surfaces_run_out() {
        let factory = SimEngineFactory::manual(SimMedia::finite(Duration::from_secs(1)))
            .with_capabilities(EngineCapabilities::rich().with_subtitle_surface());
        let surfaces = Arc::new(SimSurfaceRegistry::with_capacity(1));
        let registry = PlayerRegistry::new(RuntimeConfig::default(), Arc::new(factory), surfaces.clone());

        let err = registry.create().err().expect("subtitle surface refused");
        assert!(matches!(err, Error::SurfaceRegistration(_)));
        assert!(!err.is_fatal());
        assert!(registry.is_empty());
        assert_eq!(surfaces.registered(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let (registry, _surfaces) = registry(SimEngineFactory::manual(SimMedia::finite(Duration::from_secs(1))));
        registry.play(99);
        registry.open(99, "file:///a.mp4");
        assert!(matches!(registry.listen(99).await, Err(Error::UnknownPlayer { id: 99 })));
        assert!(registry.dispose(Some(99)).await.is_ok());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispose_all_ends_streams() {
        let (registry, surfaces) = registry(SimEngineFactory::manual(SimMedia::finite(Duration::from_secs(1))));
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();
        let mut events_a = registry.listen(a.id).await.unwrap();
        let mut events_b = registry.listen(b.id).await.unwrap();

        registry.dispose(None).await.unwrap();
        assert!(registry.is_empty());
        assert_eq!(surfaces.registered(), 0);
        assert_eq!(events_a.next().await, None);
        assert_eq!(events_b.next().await, None);

        registry.play(a.id);
        assert!(!registry.contains(a.id));
    }

    #[tokio::test]
    async fn test_open_error_is_an_event() {
        let (registry, _surfaces) = registry(SimEngineFactory::manual(SimMedia::finite(Duration::from_secs(1))));
        let created = registry.create().unwrap();
        let mut events = registry.listen(created.id).await.unwrap();
        registry.open(created.id, "");
        assert!(matches!(events.next().await, Some(PlayerEvent::Error { .. })));
    }
}

//! AvPlayer Core - Media Player Library
//!
//! This crate orchestrates platform-native playback engines behind one
//! consistent player model:
//! - Per-player playback state machine with session generations
//! - Change-only position and buffer watchers
//! - Frame delivery to host surfaces with skip-if-busy copies
//! - Track catalog and explicit track overrides
//! - Normalized outward event stream
//! - Method-channel dispatch for host plugins
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        AvPlayer Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐        ┌──────────────┐                       │
//! │  │    Method    │───────▶│    Player    │                       │
//! │  │   Channel    │        │   Registry   │                       │
//! │  └──────────────┘        └──────┬───────┘                       │
//! │                                 │ commands                      │
//! │                          ┌──────┴───────┐                       │
//! │  ┌──────────────┐ ticks  │ Player Task  │ callbacks ┌─────────┐ │
//! │  │   Watchers   │───────▶│ State Machine│◀──────────│ Native  │ │
//! │  └──────────────┘        └──┬────────┬──┘           │ Engine  │ │
//! │                             │        │              └────┬────┘ │
//! │                     ┌───────┴──┐  ┌──┴───────────┐       │      │
//! │                     │  Event   │  │ Frame Bridge │◀──────┘      │
//! │                     │   Sink   │  │  (surfaces)  │  frames      │
//! │                     └──────────┘  └──────────────┘              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod source;
pub mod event;
pub mod engine;
pub mod clock;
pub mod tracks;
pub mod frame;
pub mod player;
pub mod actor;
pub mod registry;
pub mod channel;
pub mod sim;

pub use error::{Error, Result};
pub use types::*;
pub use config::{EngineProfile, RuntimeConfig};
pub use source::{resolve_source, AssetResolver, DirectoryAssetResolver, MediaLocator, SourceOrigin};
pub use event::{EventStream, PlayerEvent};
pub use engine::{EngineCapabilities, EngineEvent, EngineEventSender, EngineFactory, NativeEngine};
pub use tracks::{TrackCatalog, TrackDescriptor, TrackKind};
pub use frame::{FrameBridge, FrameCopier, OutputSurface, SubtitleCue, SubtitleRenderer};
pub use player::PlayerStateMachine;
pub use actor::{Command, PlayerSnapshot};
pub use registry::{CreatedPlayer, PlayerRegistry, SurfaceRegistry};
pub use channel::{MethodCall, MethodChannel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library
pub fn init() {
    tracing::info!(version = VERSION, "AvPlayer Core initialized");
}

//! Outward event protocol and per-player event sink
//!
//! Events are tagged records (`{"event": "position", "value": 1200}`) pushed
//! to at most one listener per player. Emission happens on the player's owner
//! task only; anything running elsewhere reaches the sink through the
//! player's mailbox.

use crate::tracks::TrackDescriptor;
use crate::types::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Normalized player event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Session became Ready
    MediaInfo {
        /// Milliseconds; 0 for live streams
        duration: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tracks: Option<BTreeMap<String, TrackDescriptor>>,
        source: String,
    },

    /// Effective display size changed
    VideoSize { width: f64, height: f64 },

    /// Playback position changed (milliseconds)
    Position { value: i64 },

    /// Buffered range ahead of the playhead (milliseconds)
    Buffer { begin: i64, end: i64 },

    /// Engine stalled acquiring data / resumed
    Loading { value: bool },

    /// Seek finished
    SeekEnd,

    /// Natural end of media
    Finished,

    /// Setup or fatal engine error, human readable
    Error { value: String },
}

impl PlayerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::MediaInfo { .. } => "mediaInfo",
            PlayerEvent::VideoSize { .. } => "videoSize",
            PlayerEvent::Position { .. } => "position",
            PlayerEvent::Buffer { .. } => "buffer",
            PlayerEvent::Loading { .. } => "loading",
            PlayerEvent::SeekEnd => "seekEnd",
            PlayerEvent::Finished => "finished",
            PlayerEvent::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Receiving end handed to the host
#[derive(Debug)]
pub struct EventStream {
    player: PlayerId,
    rx: mpsc::UnboundedReceiver<PlayerEvent>,
}

impl EventStream {
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Next event; `None` once the player is disposed or the listener replaced
    pub async fn next(&mut self) -> Option<PlayerEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued
    pub fn try_next(&mut self) -> Option<PlayerEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued right now
    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Per-player subscribe/unsubscribe adapter
#[derive(Debug)]
pub struct EventSink {
    player: PlayerId,
    listener: Option<mpsc::UnboundedSender<PlayerEvent>>,
    ended: bool,
    emitted: u64,
}

impl EventSink {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            listener: None,
            ended: false,
            emitted: 0,
        }
    }

    /// Attach a listener, replacing any previous one
    pub fn listen(&mut self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.ended {
            // Dropping tx leaves the stream already terminated
            drop(tx);
        } else {
            self.listener = Some(tx);
            debug!(player = self.player, "Event listener attached");
        }
        EventStream {
            player: self.player,
            rx,
        }
    }

    /// Detach the listener; later events are discarded
    pub fn cancel(&mut self) {
        if self.listener.take().is_some() {
            debug!(player = self.player, "Event listener detached");
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Deliver an event to the listener, if any
    pub fn emit(&mut self, event: PlayerEvent) {
        if self.ended {
            return;
        }
        self.emitted += 1;
        trace!(player = self.player, event = event.name(), "Emit");
        if let Some(tx) = &self.listener {
            if tx.send(event).is_err() {
                self.listener = None;
            }
        }
    }

    /// Terminate the stream for good
    pub fn end_of_stream(&mut self) {
        self.listener = None;
        self.ended = true;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Events emitted so far, delivered or not
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let event = PlayerEvent::Position { value: 1200 };
        assert_eq!(
            event.to_json(),
            serde_json::json!({"event": "position", "value": 1200})
        );

        assert_eq!(
            PlayerEvent::SeekEnd.to_json(),
            serde_json::json!({"event": "seekEnd"})
        );

        let info = PlayerEvent::MediaInfo {
            duration: 0,
            tracks: None,
            source: "rtmp://live".into(),
        };
        assert_eq!(
            info.to_json(),
            serde_json::json!({"event": "mediaInfo", "duration": 0, "source": "rtmp://live"})
        );
    }

    #[test]
    fn test_names_match_tags() {
        let events = [
            PlayerEvent::VideoSize { width: 1.0, height: 1.0 },
            PlayerEvent::Buffer { begin: 0, end: 1 },
            PlayerEvent::Loading { value: true },
            PlayerEvent::Finished,
            PlayerEvent::Error { value: "x".into() },
        ];
        for event in events {
            assert_eq!(event.to_json()["event"], event.name());
        }
    }

    #[test]
    fn test_events_without_listener_are_dropped() {
        let mut sink = EventSink::new(7);
        sink.emit(PlayerEvent::Finished);
        let mut stream = sink.listen();
        sink.emit(PlayerEvent::SeekEnd);
        assert_eq!(stream.drain(), vec![PlayerEvent::SeekEnd]);
        assert_eq!(sink.emitted(), 2);
    }

    #[test]
    fn test_cancel_and_relisten() {
        let mut sink = EventSink::new(1);
        let mut first = sink.listen();
        sink.cancel();
        sink.emit(PlayerEvent::Finished);
        assert!(first.try_next().is_none());

        let mut second = sink.listen();
        sink.emit(PlayerEvent::Finished);
        assert_eq!(second.try_next(), Some(PlayerEvent::Finished));
    }

    #[tokio::test]
    async fn test_end_of_stream() {
        let mut sink = EventSink::new(3);
        let mut stream = sink.listen();
        sink.emit(PlayerEvent::Finished);
        sink.end_of_stream();
        sink.emit(PlayerEvent::SeekEnd);

        assert_eq!(stream.next().await, Some(PlayerEvent::Finished));
        assert_eq!(stream.next().await, None);

        let mut late = sink.listen();
        assert_eq!(late.next().await, None);
    }
}

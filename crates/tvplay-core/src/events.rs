//! Player notifications
//!
//! Every observable change of the player facade is published as a
//! [`Notification`] through an [`EventSink`]. Sending is fire-and-forget: the
//! facade never waits on, or fails because of, a consumer.

use crate::backend::BufferedRange;
use crate::tracks::{AudioTrackInfo, TextTrackInfo};
use crate::types::{PlayerId, TimedMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Player notification types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Lifecycle state changed; carries the new state's id
    StateChanged(u8),
    /// Whether the loaded content is a live stream
    LiveStatus(bool),
    BufferingStateChanged(bool),
    VideoTimeChanged(VideoTimeUpdate),
    /// Duration in seconds
    VideoDurationChanged(f64),
    AudioTracksChanged(Vec<AudioTrackInfo>),
    ActiveAudioTrackChanged(Option<AudioTrackInfo>),
    TextTracksChanged(Vec<TextTrackInfo>),
    ActiveTextTrackChanged(Option<TextTrackInfo>),
    /// Whether any caption or subtitle track is showing
    TextTrackStatusChanged(bool),
    ExternalTextTrackAdded(TextTrackInfo),
    MetadataAvailable(TimedMetadata),
    PlayerError(PlayerErrorInfo),
}

impl PlayerEvent {
    /// Wire name of the notification
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::StateChanged(_) => "stateChanged",
            PlayerEvent::LiveStatus(_) => "liveStatus",
            PlayerEvent::BufferingStateChanged(_) => "bufferingStateChanged",
            PlayerEvent::VideoTimeChanged(_) => "videoTimeChanged",
            PlayerEvent::VideoDurationChanged(_) => "videoDurationChanged",
            PlayerEvent::AudioTracksChanged(_) => "audioTracksChanged",
            PlayerEvent::ActiveAudioTrackChanged(_) => "activeAudioTrackChanged",
            PlayerEvent::TextTracksChanged(_) => "textTracksChanged",
            PlayerEvent::ActiveTextTrackChanged(_) => "activeTextTrackChanged",
            PlayerEvent::TextTrackStatusChanged(_) => "textTrackStatusChanged",
            PlayerEvent::ExternalTextTrackAdded(_) => "externalTextTrackAdded",
            PlayerEvent::MetadataAvailable(_) => "metadataAvailable",
            PlayerEvent::PlayerError(_) => "playerError",
        }
    }
}

/// Playback position and the buffered range around it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTimeUpdate {
    pub current_time_seconds: f64,
    pub buffer_start_ms: i64,
    pub buffer_end_ms: i64,
    pub buffer_length_ms: i64,
}

impl VideoTimeUpdate {
    /// Locate the buffered range containing `current_time`; all zeros if none does
    pub fn new(current_time: f64, buffered: &[BufferedRange]) -> Self {
        match buffered.iter().find(|range| range.contains(current_time)) {
            Some(range) => Self {
                current_time_seconds: current_time,
                buffer_start_ms: (range.start * 1000.0).floor() as i64,
                buffer_end_ms: (range.end * 1000.0).floor() as i64,
                buffer_length_ms: ((range.end - current_time) * 1000.0).floor() as i64,
            },
            None => Self {
                current_time_seconds: current_time,
                buffer_start_ms: 0,
                buffer_end_ms: 0,
                buffer_length_ms: 0,
            },
        }
    }
}

/// Backend failure reported to the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerErrorInfo {
    pub code: Option<i64>,
    pub message: String,
    pub original_message: String,
}

/// Notification with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Name of the component that sent the notification
    pub context: String,
    pub player_id: PlayerId,
    /// Per-player sequence number, starting at 1
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: PlayerEvent,
}

/// Receives player notifications
pub trait EventSink: Send + Sync {
    /// Deliver a notification; must not block
    fn send(&self, notification: Notification);
}

/// Channel-backed event sink
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Notification>,
}

impl EventBus {
    /// Create a bus and the receiver its notifications arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for EventBus {
    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification dropped, no receiver");
        }
    }
}

/// Stamps events with player metadata and forwards them to a sink
pub(crate) struct EventEmitter {
    context: String,
    player_id: PlayerId,
    sequence: u64,
    sink: Arc<dyn EventSink>,
}

impl EventEmitter {
    pub(crate) fn new(context: &str, player_id: PlayerId, sink: Arc<dyn EventSink>) -> Self {
        Self {
            context: context.to_string(),
            player_id,
            sequence: 0,
            sink,
        }
    }

    pub(crate) fn emit(&mut self, event: PlayerEvent) {
        self.sequence += 1;
        debug!(
            event = event.name(),
            sequence = self.sequence,
            "Player notification"
        );
        self.sink.send(Notification {
            context: self.context.clone(),
            player_id: self.player_id,
            sequence: self.sequence,
            timestamp: Utc::now(),
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_json() {
        let (bus, mut rx) = EventBus::new();
        let mut emitter = EventEmitter::new("VideoPlayer", PlayerId::new(), Arc::new(bus));

        emitter.emit(PlayerEvent::StateChanged(3));
        emitter.emit(PlayerEvent::BufferingStateChanged(true));

        let first = rx.try_recv().unwrap();
        let json = serde_json::to_value(&first).unwrap();
        assert_eq!(json["context"], "VideoPlayer");
        assert_eq!(json["name"], "stateChanged");
        assert_eq!(json["data"], 3);
        assert_eq!(json["sequence"], 1);

        assert_eq!(rx.try_recv().unwrap().sequence, 2);
    }

    #[test]
    fn test_send_without_receiver() {
        let (bus, rx) = EventBus::new();
        drop(rx);
        let mut emitter = EventEmitter::new("VideoPlayer", PlayerId::new(), Arc::new(bus));
        emitter.emit(PlayerEvent::LiveStatus(false));
    }

    #[test]
    fn test_video_time_update() {
        let buffered = [
            BufferedRange {
                start: 0.0,
                end: 10.0,
            },
            BufferedRange {
                start: 20.0,
                end: 35.5,
            },
        ];

        let update = VideoTimeUpdate::new(25.25, &buffered);
        assert_eq!(update.buffer_start_ms, 20_000);
        assert_eq!(update.buffer_end_ms, 35_500);
        assert_eq!(update.buffer_length_ms, 10_250);

        let update = VideoTimeUpdate::new(15.0, &buffered);
        assert_eq!(update.buffer_length_ms, 0);
        assert_eq!(update.current_time_seconds, 15.0);
    }

    #[test]
    fn test_event_names_match_wire_format() {
        let event = PlayerEvent::TextTrackStatusChanged(true);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], event.name());
    }
}

//! Media backend abstraction
//!
//! The player facade drives a third-party media player through
//! [`MediaBackend`]. Native player callbacks are not closures: the backend
//! pushes [`BackendEvent`]s into a channel registered with
//! [`MediaBackend::subscribe`], and the facade drains that channel.

#[cfg(feature = "memory-backend")]
pub mod memory;

use crate::drm::EmeOptions;
use crate::error::Result;
use crate::tracks::{NativeAudioTrack, NativeTextTrack, RemoteTextTrack, TextTrackMode};
use crate::types::VideoRectangle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Receiving end of a backend's native event channel
pub type BackendEvents = mpsc::UnboundedReceiver<BackendEvent>;

/// Native events reported by the media backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    /// Player element is ready
    Ready,
    /// Video surface became available
    SurfaceAttached,
    /// First frame of the source has loaded
    LoadedData,
    /// Unrecoverable playback error
    Error { code: Option<i64>, message: String },
    /// Playback stalled waiting for data
    Waiting,
    /// Enough data is buffered to play
    CanPlay,
    Play,
    Pause,
    Ended,
    TimeUpdate,
    DurationChange,
    AudioTrackAdded,
    AudioTrackRemoved,
    AudioTrackChanged,
    TextTrackAdded,
    TextTrackRemoved,
    TextTrackChanged,
    /// An out-of-band text track finished loading
    RemoteTextTrackLoaded { id: String },
    /// Timed metadata cue became active
    MetadataCue {
        key: String,
        data: String,
        start_time: f64,
        end_time: f64,
    },
}

/// Source handed to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub src: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Buffered time range, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferedRange {
    pub start: f64,
    pub end: f64,
}

impl BufferedRange {
    pub fn contains(&self, seconds: f64) -> bool {
        seconds >= self.start && seconds <= self.end
    }
}

/// A third-party media player
pub trait MediaBackend: Send {
    /// Version string reported by the player library
    fn version(&self) -> &str;

    /// Register the native event listener
    fn subscribe(&mut self) -> BackendEvents;

    /// Tear down the native event listener
    fn unsubscribe(&mut self);

    /// Check if a video surface exists to receive geometry
    fn has_surface(&self) -> bool;

    fn set_geometry(&mut self, rect: VideoRectangle);

    /// Last geometry applied to the surface
    fn geometry(&self) -> Option<VideoRectangle>;

    fn set_visible(&mut self, visible: bool);

    fn set_source(&mut self, source: MediaSource) -> Result<()>;

    /// Initialize media keys for encrypted content
    fn configure_drm(&mut self, options: &EmeOptions) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, seconds: f64);

    /// Content duration in seconds, `None` until known
    fn duration(&self) -> Option<f64>;

    fn buffered(&self) -> Vec<BufferedRange>;

    fn is_live(&self) -> bool;

    fn is_muted(&self) -> bool;

    fn set_muted(&mut self, muted: bool);

    fn audio_tracks(&self) -> Vec<NativeAudioTrack>;

    fn set_audio_track_enabled(&mut self, index: usize, enabled: bool);

    fn text_tracks(&self) -> Vec<NativeTextTrack>;

    fn set_text_track_mode(&mut self, index: usize, mode: TextTrackMode);

    /// Load an out-of-band text track; completion is reported as
    /// [`BackendEvent::RemoteTextTrackLoaded`]
    fn add_remote_text_track(&mut self, track: RemoteTextTrack);

    /// Unload the source and return to an empty player
    fn reset(&mut self);

    /// Release every resource held by the player
    fn dispose(&mut self);
}

/// Creates media backends
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Backend name, e.g. `"VideoJS"`
    fn name(&self) -> &str;

    /// Create a backend; resolves once the player reports ready
    async fn create(&self) -> Result<Box<dyn MediaBackend>>;
}

//! tvplay Core - Video Player Facade for Smart-TV Web Platforms
//!
//! This crate wraps a third-party web video player behind a stable,
//! event-driven API:
//! - Player lifecycle state machine with a fixed transition table
//! - Stream format registry gated by platform DRM support
//! - Widevine / PlayReady license configuration
//! - External text tracks queued until content has loaded
//! - Audio and text track selection
//! - Serializable notifications for every observable change
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          tvplay Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Platform   │  │    Stream    │  │  Text Track  │           │
//! │  │ DRM Support  │─►│   Formats    │  │    Queue     │           │
//! │  └──────────────┘  └──────┬───────┘  └──────┬───────┘           │
//! │                           │                 │                   │
//! │                    ┌──────┴─────────────────┴──┐                │
//! │  PlayerContext ───►│        VideoPlayer        │                │
//! │  (one instance)    │    (state machine)        │                │
//! │                    └──────┬─────────────┬──────┘                │
//! │                           │             │                       │
//! │                  commands │             │ notifications         │
//! │                           ▼             ▼                       │
//! │                    ┌────────────┐  ┌────────────┐               │
//! │    native events ◄─│   Media    │  │   Event    │               │
//! │    (mpsc channel)  │  Backend   │  │    Sink    │               │
//! │                    └────────────┘  └────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod state;
pub mod drm;
pub mod formats;
pub mod tracks;
pub mod events;
pub mod backend;
pub mod context;
pub mod player;

pub use error::{Error, ErrorKind, Result};
pub use types::*;
pub use state::PlayerState;
pub use drm::{DrmCapabilities, DrmConfig, DrmSystem, EmeOptions, KeySystemProber, PlatformDrmSupport};
pub use formats::{StreamFormatInfo, StreamFormatRegistry};
pub use tracks::{
    AudioTrackInfo, ExternalTextTrack, ExternalTextTrackRequest, TextTrackInfo, TextTrackKind,
    TextTrackMode,
};
pub use events::{EventBus, EventSink, Notification, PlayerEvent};
pub use backend::{BackendEvent, BackendFactory, MediaBackend};
pub use context::{DependencyLoader, PlayerContext, PlayerServices};
pub use player::VideoPlayer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "tvplay Core initialized");
}

//! Headless in-memory media backend
//!
//! Behaves like a web media player without decoding anything: it records the
//! calls the facade makes and reports native events the way a real player
//! would. An [`InMemoryHandle`] shares the backend's state so tests and the CLI
//! can drive loading, track changes and failures from outside.

use super::{BackendEvent, BackendEvents, BackendFactory, BufferedRange, MediaBackend, MediaSource};
use crate::context::DependencyLoader;
use crate::drm::{EmeOptions, KeySystemProber};
use crate::error::{Error, Result};
use crate::tracks::{
    NativeAudioTrack, NativeTextTrack, RemoteTextTrack, TextTrackKind, TextTrackMode,
};
use crate::types::VideoRectangle;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Version reported by the in-memory backend unless overridden
pub const IN_MEMORY_VERSION: &str = "8.10.0";

/// Seconds buffered ahead of the current time after loading
const BUFFER_AHEAD_SECONDS: f64 = 30.0;

#[derive(Debug)]
struct Inner {
    version: String,
    sender: Option<mpsc::UnboundedSender<BackendEvent>>,
    surface: bool,
    geometry: Option<VideoRectangle>,
    applied_geometry: Vec<VideoRectangle>,
    visible: bool,
    source: Option<MediaSource>,
    sources: Vec<MediaSource>,
    drm_options: Vec<EmeOptions>,
    drm_failure: Option<String>,
    paused: bool,
    current_time: f64,
    duration: Option<f64>,
    buffered: Vec<BufferedRange>,
    live: bool,
    muted: bool,
    audio_tracks: Vec<NativeAudioTrack>,
    text_tracks: Vec<NativeTextTrack>,
    remote_text_tracks: Vec<RemoteTextTrack>,
    resets: usize,
    disposed: bool,
}

impl Inner {
    fn new(version: String, surface: bool) -> Self {
        Self {
            version,
            sender: None,
            surface,
            geometry: None,
            applied_geometry: Vec::new(),
            visible: false,
            source: None,
            sources: Vec::new(),
            drm_options: Vec::new(),
            drm_failure: None,
            paused: true,
            current_time: 0.0,
            duration: None,
            buffered: Vec::new(),
            live: false,
            muted: false,
            audio_tracks: Vec::new(),
            text_tracks: Vec::new(),
            remote_text_tracks: Vec::new(),
            resets: 0,
            disposed: false,
        }
    }

    fn emit(&self, event: BackendEvent) {
        if let Some(sender) = &self.sender {
            // The receiver is gone once the facade unsubscribes
            let _ = sender.send(event);
        }
    }

    fn refresh_buffer(&mut self) {
        self.buffered = match self.duration {
            Some(duration) => vec![BufferedRange {
                start: 0.0,
                end: (self.current_time + BUFFER_AHEAD_SECONDS).min(duration),
            }],
            None => Vec::new(),
        };
    }
}

type Shared = Arc<Mutex<Inner>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Inner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Headless media backend
#[derive(Debug)]
pub struct InMemoryBackend {
    inner: Shared,
    version: String,
}

impl InMemoryBackend {
    /// Create a backend with a video surface, and a handle to drive it
    pub fn new() -> (Self, InMemoryHandle) {
        let inner = Arc::new(Mutex::new(Inner::new(IN_MEMORY_VERSION.to_string(), true)));
        (
            Self::from_shared(inner.clone()),
            InMemoryHandle { inner },
        )
    }

    fn from_shared(inner: Shared) -> Self {
        let version = lock(&inner).version.clone();
        Self { inner, version }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }
}

impl MediaBackend for InMemoryBackend {
    fn version(&self) -> &str {
        &self.version
    }

    fn subscribe(&mut self) -> BackendEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().sender = Some(tx);
        rx
    }

    fn unsubscribe(&mut self) {
        self.lock().sender = None;
    }

    fn has_surface(&self) -> bool {
        self.lock().surface
    }

    fn set_geometry(&mut self, rect: VideoRectangle) {
        let mut inner = self.lock();
        inner.geometry = Some(rect);
        inner.applied_geometry.push(rect);
    }

    fn geometry(&self) -> Option<VideoRectangle> {
        self.lock().geometry
    }

    fn set_visible(&mut self, visible: bool) {
        self.lock().visible = visible;
    }

    fn set_source(&mut self, source: MediaSource) -> Result<()> {
        if source.src.trim().is_empty() {
            return Err(Error::backend(Some(4), "source not supported"));
        }

        let mut inner = self.lock();
        debug!(src = %source.src, "In-memory backend source set");
        inner.sources.push(source.clone());
        inner.source = Some(source);
        inner.paused = true;
        inner.duration = None;
        inner.buffered.clear();
        Ok(())
    }

    fn configure_drm(&mut self, options: &EmeOptions) -> Result<()> {
        let mut inner = self.lock();
        if let Some(message) = inner.drm_failure.clone() {
            return Err(Error::drm(message));
        }
        inner.drm_options.push(options.clone());
        Ok(())
    }

    fn play(&mut self) {
        let mut inner = self.lock();
        if inner.source.is_none() || !inner.paused {
            return;
        }
        inner.paused = false;
        inner.emit(BackendEvent::Play);
    }

    fn pause(&mut self) {
        let mut inner = self.lock();
        if inner.paused {
            return;
        }
        inner.paused = true;
        inner.emit(BackendEvent::Pause);
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.lock().current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut inner = self.lock();
        inner.current_time = seconds.max(0.0);
        inner.refresh_buffer();
    }

    fn duration(&self) -> Option<f64> {
        self.lock().duration
    }

    fn buffered(&self) -> Vec<BufferedRange> {
        self.lock().buffered.clone()
    }

    fn is_live(&self) -> bool {
        self.lock().live
    }

    fn is_muted(&self) -> bool {
        self.lock().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.lock().muted = muted;
    }

    fn audio_tracks(&self) -> Vec<NativeAudioTrack> {
        self.lock().audio_tracks.clone()
    }

    fn set_audio_track_enabled(&mut self, index: usize, enabled: bool) {
        let mut inner = self.lock();
        if index >= inner.audio_tracks.len() {
            return;
        }
        // Audio tracks are exclusive: enabling one disables the rest
        for (i, track) in inner.audio_tracks.iter_mut().enumerate() {
            if i == index {
                track.enabled = enabled;
            } else if enabled {
                track.enabled = false;
            }
        }
        inner.emit(BackendEvent::AudioTrackChanged);
    }

    fn text_tracks(&self) -> Vec<NativeTextTrack> {
        self.lock().text_tracks.clone()
    }

    fn set_text_track_mode(&mut self, index: usize, mode: TextTrackMode) {
        let mut inner = self.lock();
        let Some(track) = inner.text_tracks.get_mut(index) else {
            return;
        };
        if track.mode == mode {
            return;
        }
        track.mode = mode;
        inner.emit(BackendEvent::TextTrackChanged);
    }

    fn add_remote_text_track(&mut self, track: RemoteTextTrack) {
        let mut inner = self.lock();
        inner.text_tracks.push(NativeTextTrack {
            id: track.id.clone(),
            kind: track.kind,
            mode: track.mode,
            label: track.label.clone(),
            language: track.language.clone(),
            default: false,
            src: Some(track.src.clone()),
        });
        inner.emit(BackendEvent::TextTrackAdded);
        inner.emit(BackendEvent::RemoteTextTrackLoaded {
            id: track.id.clone(),
        });
        inner.remote_text_tracks.push(track);
    }

    fn reset(&mut self) {
        let mut inner = self.lock();
        inner.source = None;
        inner.paused = true;
        inner.current_time = 0.0;
        inner.duration = None;
        inner.buffered.clear();
        inner.live = false;
        inner.audio_tracks.clear();
        inner.text_tracks.clear();
        inner.resets += 1;
    }

    fn dispose(&mut self) {
        let mut inner = self.lock();
        inner.disposed = true;
        inner.sender = None;
        inner.surface = false;
    }
}

/// Drives and inspects an [`InMemoryBackend`]
#[derive(Debug, Clone)]
pub struct InMemoryHandle {
    inner: Shared,
}

impl InMemoryHandle {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Deliver a raw native event
    pub fn emit(&self, event: BackendEvent) {
        self.lock().emit(event);
    }

    /// Make the video surface available
    pub fn attach_surface(&self) {
        let mut inner = self.lock();
        inner.surface = true;
        inner.emit(BackendEvent::SurfaceAttached);
    }

    /// Report the source's duration and first frame
    pub fn finish_loading(&self, duration_seconds: f64) {
        let mut inner = self.lock();
        inner.duration = Some(duration_seconds);
        inner.refresh_buffer();
        inner.emit(BackendEvent::DurationChange);
        inner.emit(BackendEvent::LoadedData);
        inner.emit(BackendEvent::CanPlay);
    }

    /// Mark the loaded source as a live stream
    pub fn set_live(&self, live: bool) {
        self.lock().live = live;
    }

    /// Advance playback and report the new time
    pub fn advance(&self, seconds: f64) {
        let mut inner = self.lock();
        let end = inner.duration.unwrap_or(f64::INFINITY);
        inner.current_time = (inner.current_time + seconds).min(end);
        inner.refresh_buffer();
        inner.emit(BackendEvent::TimeUpdate);
    }

    /// Stall playback waiting for data
    pub fn stall(&self) {
        self.lock().emit(BackendEvent::Waiting);
    }

    /// Resume after a stall
    pub fn recover(&self) {
        self.lock().emit(BackendEvent::CanPlay);
    }

    /// Play to the end of the content
    pub fn end_playback(&self) {
        let mut inner = self.lock();
        if let Some(duration) = inner.duration {
            inner.current_time = duration;
        }
        inner.paused = true;
        inner.emit(BackendEvent::Ended);
    }

    /// Report an unrecoverable error
    pub fn fail(&self, code: i64, message: &str) {
        self.lock().emit(BackendEvent::Error {
            code: Some(code),
            message: message.to_string(),
        });
    }

    /// Make media key initialization fail
    pub fn fail_drm(&self, message: &str) {
        self.lock().drm_failure = Some(message.to_string());
    }

    pub fn add_audio_track(&self, track: NativeAudioTrack) {
        let mut inner = self.lock();
        inner.audio_tracks.push(track);
        inner.emit(BackendEvent::AudioTrackAdded);
    }

    pub fn add_text_track(&self, track: NativeTextTrack) {
        let mut inner = self.lock();
        inner.text_tracks.push(track);
        inner.emit(BackendEvent::TextTrackAdded);
    }

    /// Report a timed metadata cue on a metadata text track
    pub fn metadata_cue(&self, key: &str, data: &str, start_time: f64, end_time: f64) {
        let mut inner = self.lock();
        if !inner
            .text_tracks
            .iter()
            .any(|t| t.kind == TextTrackKind::Metadata)
        {
            inner.text_tracks.push(NativeTextTrack::new(
                "metadata",
                TextTrackKind::Metadata,
                "",
            ));
            inner.emit(BackendEvent::TextTrackAdded);
        }
        inner.emit(BackendEvent::MetadataCue {
            key: key.to_string(),
            data: data.to_string(),
            start_time,
            end_time,
        });
    }

    pub fn sources(&self) -> Vec<MediaSource> {
        self.lock().sources.clone()
    }

    pub fn drm_options(&self) -> Vec<EmeOptions> {
        self.lock().drm_options.clone()
    }

    /// Every geometry applied to the surface, in order
    pub fn applied_geometry(&self) -> Vec<VideoRectangle> {
        self.lock().applied_geometry.clone()
    }

    pub fn remote_text_tracks(&self) -> Vec<RemoteTextTrack> {
        self.lock().remote_text_tracks.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn current_time(&self) -> f64 {
        self.lock().current_time
    }

    pub fn reset_count(&self) -> usize {
        self.lock().resets
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Check if a native event listener is registered
    pub fn has_listener(&self) -> bool {
        self.lock().sender.is_some()
    }
}

/// Factory producing in-memory backends that share one handle
#[derive(Debug, Clone)]
pub struct InMemoryBackendFactory {
    inner: Shared,
    surface: bool,
    failure: Option<String>,
}

impl Default for InMemoryBackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackendFactory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new(IN_MEMORY_VERSION.to_string(), true))),
            surface: true,
            failure: None,
        }
    }

    /// Start without a video surface; attach one later through the handle
    pub fn without_surface(mut self) -> Self {
        self.surface = false;
        lock(&self.inner).surface = false;
        self
    }

    pub fn with_version(self, version: &str) -> Self {
        lock(&self.inner).version = version.to_string();
        self
    }

    /// Make backend creation fail
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn handle(&self) -> InMemoryHandle {
        InMemoryHandle {
            inner: self.inner.clone(),
        }
    }
}

#[async_trait]
impl BackendFactory for InMemoryBackendFactory {
    fn name(&self) -> &str {
        "InMemory"
    }

    async fn create(&self) -> Result<Box<dyn MediaBackend>> {
        if let Some(message) = &self.failure {
            return Err(Error::backend(None, message.clone()));
        }
        {
            // Each backend starts with the factory's surface setting
            let mut inner = lock(&self.inner);
            inner.disposed = false;
            inner.surface = self.surface;
        }
        Ok(Box::new(InMemoryBackend::from_shared(self.inner.clone())))
    }
}

/// Key system prober answering from a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticKeySystems {
    supported: HashSet<String>,
}

impl StaticKeySystems {
    pub fn new<I, S>(key_systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: key_systems.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl KeySystemProber for StaticKeySystems {
    async fn request_access(&self, key_system: &str) -> Result<()> {
        if self.supported.contains(key_system) {
            Ok(())
        } else {
            Err(Error::DrmNotSupported {
                system: key_system.to_string(),
            })
        }
    }
}

/// Dependency loader that records what it was asked to load
#[derive(Debug, Clone, Default)]
pub struct RecordingLoader {
    loaded: Arc<Mutex<Vec<String>>>,
    missing: HashSet<String>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to load this resource
    pub fn missing(mut self, resource: &str) -> Self {
        self.missing.insert(resource.to_string());
        self
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DependencyLoader for RecordingLoader {
    async fn load(&self, resources: &[String]) -> Result<()> {
        if let Some(resource) = resources.iter().find(|r| self.missing.contains(*r)) {
            return Err(Error::DependencyLoad(format!("failed to load {resource}")));
        }
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(resources.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_requires_source() {
        let (mut backend, handle) = InMemoryBackend::new();
        let mut events = backend.subscribe();

        backend.play();
        assert!(handle.is_paused());

        backend
            .set_source(MediaSource {
                src: "https://cdn.example.com/a.mp4".to_string(),
                mime_type: Some("video/mp4".to_string()),
            })
            .unwrap();
        backend.play();
        backend.play();

        assert_eq!(events.try_recv().unwrap(), BackendEvent::Play);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_audio_tracks_are_exclusive() {
        let (mut backend, handle) = InMemoryBackend::new();
        for id in ["en", "fr"] {
            handle.add_audio_track(NativeAudioTrack {
                id: id.to_string(),
                enabled: id == "en",
                ..Default::default()
            });
        }

        backend.set_audio_track_enabled(1, true);
        let enabled: Vec<_> = backend.audio_tracks().iter().map(|t| t.enabled).collect();
        assert_eq!(enabled, [false, true]);
    }

    #[test]
    fn test_reset_clears_source() {
        let (mut backend, handle) = InMemoryBackend::new();
        backend
            .set_source(MediaSource {
                src: "https://cdn.example.com/a.m3u8".to_string(),
                mime_type: None,
            })
            .unwrap();
        handle.finish_loading(120.0);
        assert_eq!(backend.duration(), Some(120.0));

        backend.reset();
        assert_eq!(backend.duration(), None);
        assert!(backend.buffered().is_empty());
        assert_eq!(handle.reset_count(), 1);
    }

    #[tokio::test]
    async fn test_new_backend_gets_surface_after_dispose() {
        let factory = InMemoryBackendFactory::new();
        let mut first = factory.create().await.unwrap();
        first.dispose();
        assert!(!first.has_surface());

        let second = factory.create().await.unwrap();
        assert!(second.has_surface());
        assert!(!factory.handle().is_disposed());

        let factory = InMemoryBackendFactory::new().without_surface();
        let backend = factory.create().await.unwrap();
        assert!(!backend.has_surface());
    }

    #[tokio::test]
    async fn test_failing_factory() {
        let factory = InMemoryBackendFactory::new().failing("no video element");
        assert!(factory.create().await.is_err());
    }
}

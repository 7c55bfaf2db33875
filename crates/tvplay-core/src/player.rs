//! Video player facade
//!
//! Wraps a [`MediaBackend`] behind a stable, state-checked API. Application
//! calls validate against the current [`PlayerState`], delegate to the
//! backend, and publish notifications. Playback state changes after `Loaded`
//! come only from the backend's native play, pause and ended events, which
//! are applied by [`VideoPlayer::dispatch`].

use crate::backend::{BackendEvent, BackendEvents, BackendFactory, MediaBackend, MediaSource};
use crate::context::{InstanceGuard, PlayerServices};
use crate::drm::{DrmConfig, EmeOptions, PlatformDrmSupport};
use crate::error::{Error, Result};
use crate::events::{EventEmitter, PlayerErrorInfo, PlayerEvent, VideoTimeUpdate};
use crate::formats::{mime_type_for, StreamFormatRegistry};
use crate::state::PlayerState;
use crate::tracks::{
    AudioTrackInfo, ExternalTextTrack, ExternalTextTrackRequest, ExternalTrackIds,
    TextTrackInfo, TextTrackMode, TextTrackQueue,
};
use crate::types::{PlayerConfig, PlayerId, PlayerVersion, Position, Size, TimedMetadata, VideoRectangle};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Name of the notification context
pub const CONTEXT_NAME: &str = "VideoPlayer";

/// Metadata cue key carrying private frames, never forwarded
const PRIVATE_METADATA_KEY: &str = "PRIV";

fn display_name(backend_name: &str, nickname: Option<&str>) -> String {
    match nickname {
        Some(nickname) => format!("{backend_name} Video Player ({nickname})"),
        None => format!("{backend_name} Video Player"),
    }
}

/// Video player facade
pub struct VideoPlayer {
    id: PlayerId,
    backend_name: String,
    nickname: Option<String>,
    embedded: bool,
    state: PlayerState,
    factory: Arc<dyn BackendFactory>,
    backend: Option<Box<dyn MediaBackend>>,
    native_events: Option<BackendEvents>,
    emitter: EventEmitter,
    formats: StreamFormatRegistry,
    drm: PlatformDrmSupport,
    version: Option<PlayerVersion>,
    initialized: bool,
    loaded: bool,
    buffering: bool,
    destroyed: bool,
    should_resume: bool,
    stream_format: Option<String>,
    requested_text_track: Option<String>,
    pending_seek: Option<f64>,
    pending_rect: Option<VideoRectangle>,
    text_track_queue: TextTrackQueue,
    external_ids: ExternalTrackIds,
    guard: Option<InstanceGuard>,
}

impl VideoPlayer {
    pub(crate) fn new(config: &PlayerConfig, services: &PlayerServices, guard: InstanceGuard) -> Self {
        let id = PlayerId::new();
        let capabilities = Arc::new(services.drm.clone());
        let formats = if config.register_default_formats {
            StreamFormatRegistry::with_defaults(capabilities)
        } else {
            StreamFormatRegistry::new(capabilities)
        };

        Self {
            id,
            backend_name: services.backend.name().to_string(),
            nickname: config.nickname.clone(),
            embedded: config.embedded,
            state: PlayerState::Uninitialized,
            factory: services.backend.clone(),
            backend: None,
            native_events: None,
            emitter: EventEmitter::new(CONTEXT_NAME, id, services.events.clone()),
            formats,
            drm: services.drm.clone(),
            version: None,
            initialized: false,
            loaded: false,
            buffering: false,
            destroyed: false,
            should_resume: false,
            stream_format: None,
            requested_text_track: None,
            pending_seek: None,
            pending_rect: None,
            text_track_queue: TextTrackQueue::new(),
            external_ids: ExternalTrackIds::default(),
            guard: Some(guard),
        }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Set the nickname; blank names clear it
    pub fn set_nickname(&mut self, nickname: Option<&str>) {
        self.nickname = nickname
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
    }

    /// Name used in log lines and error messages
    pub fn display_name(&self) -> String {
        display_name(&self.backend_name, self.nickname.as_deref())
    }

    /// Version of the backend player library, known once initialized
    pub fn player_version(&self) -> Option<PlayerVersion> {
        self.version
    }

    /// Platform DRM support this player's formats were filtered against
    pub fn drm_support(&self) -> &PlatformDrmSupport {
        &self.drm
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Format of the most recently prepared content
    pub fn stream_format(&self) -> Option<&str> {
        self.stream_format.as_deref()
    }

    /// Transition to a new state and announce it
    ///
    /// Fails without side effects when the transition is not allowed.
    pub fn update_state(&mut self, target: PlayerState) -> Result<()> {
        let from = self.state;
        self.state = from.transition(target)?;
        info!(player = %self.id, from = %from, to = %target, "State transition");
        self.emit(PlayerEvent::StateChanged(target.id()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create the backend and move to `Initialized`
    ///
    /// Does nothing if already initialized.
    #[instrument(skip(self), fields(player = %self.id))]
    pub async fn initialize(&mut self, name: Option<&str>) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed {
                player: self.display_name(),
            });
        }
        if self.initialized {
            debug!("{} already initialized", self.display_name());
            return Ok(());
        }
        if self.embedded {
            return Err(Error::UnsupportedPlatform {
                player: self.display_name(),
            });
        }
        if name.is_some() {
            self.set_nickname(name);
        }

        let mut backend = self.factory.create().await?;

        self.version = match PlayerVersion::parse(backend.version()) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(version = backend.version(), error = %e, "Unrecognized player version");
                None
            }
        };

        self.native_events = Some(backend.subscribe());
        backend.set_visible(false);
        self.backend = Some(backend);
        self.apply_pending_geometry();

        self.initialized = true;
        self.update_state(PlayerState::Initialized)?;
        info!(version = ?self.version, "{} initialized", self.display_name());
        Ok(())
    }

    /// Load content
    ///
    /// Unsupported format and DRM combinations, an empty url and malformed DRM
    /// settings are rejected before the player leaves `Initialized`. A DRM
    /// failure after that rolls the player back to `Initialized`.
    #[instrument(skip(self, drm), fields(player = %self.id))]
    pub fn prepare(
        &mut self,
        url: &str,
        format: &str,
        start_time_seconds: f64,
        drm: Option<&DrmConfig>,
    ) -> Result<()> {
        self.check_initialized()?;

        let drm_type = drm.and_then(DrmConfig::drm_type);
        if !self.formats.is_supported(format, drm_type) {
            return Err(match drm_type {
                Some(drm) => Error::UnsupportedDrm {
                    format: format.trim().to_string(),
                    drm: drm.to_string(),
                },
                None => Error::UnsupportedFormat {
                    format: format.trim().to_string(),
                },
            });
        }

        let url = url.trim();
        if url.is_empty() {
            return Err(Error::invalid_argument(format!(
                "{} requires a non-empty url to prepare",
                self.display_name()
            )));
        }

        let eme = match drm {
            Some(config) => config.to_eme_options()?,
            None => None,
        };

        self.update_state(PlayerState::Loading)?;

        let start = if start_time_seconds.is_finite() && start_time_seconds > 0.0 {
            start_time_seconds
        } else {
            if start_time_seconds < 0.0 {
                warn!(start_time_seconds, "Negative start time, starting from 0");
            }
            0.0
        };

        if let Err(e) = self.apply_drm(eme.as_ref()) {
            error!(error = %e, "DRM configuration failed");
            self.rollback_to_initialized();
            return Err(e);
        }

        let source = MediaSource {
            src: url.to_string(),
            mime_type: mime_type_for(format).map(str::to_string),
        };

        let backend = self.backend_mut()?;
        backend.set_visible(true);
        if start > 0.0 {
            backend.set_current_time(start);
        }
        if let Err(e) = backend.set_source(source) {
            error!(error = %e, "Backend rejected source");
            self.rollback_to_initialized();
            return Err(e);
        }

        self.stream_format = Some(format.trim().to_string());
        self.loaded = true;
        self.update_state(PlayerState::Loaded)?;
        info!(url, format, start, "Content prepared");

        self.process_external_text_track_queue()
    }

    /// Configure DRM for the next source; only allowed while paused
    pub fn configure_drm(&mut self, drm: Option<&DrmConfig>) -> Result<()> {
        self.check_initialized()?;
        let eme = match drm {
            Some(config) => config.to_eme_options()?,
            None => None,
        };
        self.apply_drm(eme.as_ref())
    }

    fn apply_drm(&mut self, options: Option<&EmeOptions>) -> Result<()> {
        let backend = self.backend_mut()?;
        if !backend.is_paused() {
            return Err(Error::drm(
                "cannot configure DRM after playback has been initiated",
            ));
        }

        let Some(options) = options else {
            return Ok(());
        };

        backend.configure_drm(options).map_err(|e| match e {
            Error::DrmConfiguration(_) => e,
            other => Error::drm(other.to_string()),
        })?;
        debug!(key_systems = ?options.key_systems.keys().collect::<Vec<_>>(), "DRM configured");
        Ok(())
    }

    fn rollback_to_initialized(&mut self) {
        if let Some(backend) = self.backend.as_deref_mut() {
            backend.reset();
            backend.set_visible(false);
        }
        self.loaded = false;
        if let Err(e) = self.update_state(PlayerState::Initialized) {
            warn!(error = %e, "Could not roll back to Initialized");
        }
    }

    /// Start playback
    ///
    /// Finished content is not replayed in place: `stop` and `prepare` it again.
    pub fn play(&mut self) -> Result<()> {
        self.check_initialized()?;
        if !self.loaded {
            warn!("{} tried to play before content was loaded", self.display_name());
            return Ok(());
        }
        if self.state == PlayerState::Complete {
            return Err(Error::InvalidStateTransition {
                from: PlayerState::Complete.to_string(),
                to: PlayerState::Playing.to_string(),
            });
        }

        let backend = self.backend_mut()?;
        if !backend.is_paused() {
            warn!("Tried to play, but already playing");
            return Ok(());
        }
        backend.play();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.check_initialized()?;
        if !self.loaded {
            warn!("{} tried to pause before content was loaded", self.display_name());
            return Ok(());
        }

        let backend = self.backend_mut()?;
        if backend.is_paused() {
            warn!("Tried to pause, but already paused");
            return Ok(());
        }
        backend.pause();
        Ok(())
    }

    /// Unload content and return to `Initialized`
    #[instrument(skip(self), fields(player = %self.id))]
    pub fn stop(&mut self) {
        if !self.initialized {
            return;
        }

        if let Some(backend) = self.backend.as_deref_mut() {
            if let Some(rect) = backend.geometry() {
                self.pending_rect = Some(rect);
            }
            backend.set_visible(false);
            backend.reset();
        }

        self.loaded = false;
        self.buffering = false;
        self.should_resume = false;
        self.requested_text_track = None;
        self.pending_seek = None;
        self.text_track_queue.clear();
        self.external_ids.reset();

        if self.state != PlayerState::Initialized {
            if let Err(e) = self.update_state(PlayerState::Initialized) {
                warn!(error = %e, "Could not return to Initialized");
            }
        }
        info!("{} stopped", self.display_name());
    }

    /// Pause for the background, remembering whether to resume
    pub fn suspend(&mut self) {
        if !self.initialized || !self.loaded {
            return;
        }

        let playing = self
            .backend
            .as_deref()
            .is_some_and(|backend| !backend.is_paused());
        if playing {
            self.should_resume = true;
            if let Err(e) = self.pause() {
                warn!(error = %e, "Pause on suspend failed");
            }
        }
        debug!(resume = self.should_resume, "{} suspended", self.display_name());
    }

    /// Resume playback interrupted by [`suspend`](Self::suspend)
    pub fn restore(&mut self) {
        if !self.initialized || !self.loaded {
            return;
        }

        if self.should_resume {
            let paused = self.backend.as_deref().is_some_and(|backend| backend.is_paused());
            if paused {
                if let Err(e) = self.play() {
                    warn!(error = %e, "Play on restore failed");
                }
            }
            self.should_resume = false;
        }
        debug!("{} restored", self.display_name());
    }

    /// React to the application being hidden or shown
    pub fn on_visibility_changed(&mut self, hidden: bool) {
        if hidden {
            self.suspend();
        } else {
            self.restore();
        }
    }

    /// Tear the player down for good
    ///
    /// Releases the backend and the context's instance slot. A destroyed
    /// player cannot be initialized again.
    #[instrument(skip(self), fields(player = %self.id))]
    pub fn destroy(&mut self) {
        if self.backend.is_none() {
            if self.guard.take().is_some() {
                self.destroyed = true;
                debug!("{} released before initialization", self.display_name());
            }
            return;
        }

        self.stop();
        self.state = PlayerState::Uninitialized;

        if let Some(mut backend) = self.backend.take() {
            backend.unsubscribe();
            backend.dispose();
        }
        self.native_events = None;
        self.initialized = false;
        self.destroyed = true;
        self.guard = None;

        info!("{} disposed", self.display_name());
    }

    // ------------------------------------------------------------------
    // Playback position
    // ------------------------------------------------------------------

    /// Seek to a position in seconds
    ///
    /// Before the duration is known the request is held and replayed once
    /// the backend reports loaded data.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.check_initialized()?;
        if !seconds.is_finite() {
            return Ok(());
        }

        let Some(duration) = self.known_duration() else {
            if seconds < 0.0 {
                debug!(seconds, "Discarding negative seek before duration is known");
            } else {
                debug!(seconds, "Delaying seek until content is ready");
                self.pending_seek = Some(seconds);
            }
            return Ok(());
        };

        let target = seconds.clamp(0.0, duration);
        self.backend_mut()?.set_current_time(target);
        debug!(target, "Seeked");
        self.notify_video_time_changed();
        Ok(())
    }

    pub fn current_time(&self) -> Result<f64> {
        Ok(self.backend()?.current_time())
    }

    /// Duration in seconds, `None` while unknown
    pub fn duration(&self) -> Result<Option<f64>> {
        self.check_initialized()?;
        Ok(self.known_duration())
    }

    fn known_duration(&self) -> Option<f64> {
        self.backend
            .as_deref()
            .and_then(|backend| backend.duration())
            .filter(|d| !d.is_nan() && *d >= 0.0)
    }

    pub fn is_playing(&self) -> Result<bool> {
        Ok(!self.backend()?.is_paused())
    }

    pub fn is_paused(&self) -> Result<bool> {
        Ok(self.backend()?.is_paused())
    }

    pub fn is_live(&self) -> Result<bool> {
        Ok(self.backend()?.is_live())
    }

    pub fn is_muted(&self) -> Result<bool> {
        Ok(self.backend()?.is_muted())
    }

    pub fn mute(&mut self) -> Result<()> {
        self.backend_mut()?.set_muted(true);
        Ok(())
    }

    pub fn unmute(&mut self) -> Result<()> {
        self.backend_mut()?.set_muted(false);
        Ok(())
    }

    /// Bitrate caps are not supported by the web player
    pub fn set_max_bitrate(&self, kbps: u64) {
        warn!(kbps, "{} does not support setting a maximum bitrate", self.display_name());
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Place the video surface, or remember the placement until one exists
    pub fn set_video_rectangle(&mut self, rect: VideoRectangle) {
        match self.backend.as_deref_mut() {
            Some(backend) if backend.has_surface() => {
                backend.set_geometry(rect);
                self.pending_rect = None;
                debug!(%rect, "Video rectangle applied");
            }
            _ => {
                debug!(%rect, "No video surface yet, storing video rectangle");
                self.pending_rect = Some(rect);
            }
        }
    }

    /// Placement waiting for a video surface
    pub fn pending_video_rectangle(&self) -> Option<VideoRectangle> {
        self.pending_rect
    }

    pub fn position(&self) -> Result<Option<Position>> {
        Ok(self.backend()?.geometry().map(|rect| rect.position()))
    }

    pub fn size(&self) -> Result<Option<Size>> {
        Ok(self.backend()?.geometry().map(|rect| rect.size()))
    }

    fn apply_pending_geometry(&mut self) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        if !backend.has_surface() {
            return;
        }
        if let Some(rect) = self.pending_rect.take() {
            backend.set_geometry(rect);
            debug!(%rect, "Applied stored video rectangle");
        }
    }

    // ------------------------------------------------------------------
    // Stream formats
    // ------------------------------------------------------------------

    pub fn formats(&self) -> &StreamFormatRegistry {
        &self.formats
    }

    pub fn formats_mut(&mut self) -> &mut StreamFormatRegistry {
        &mut self.formats
    }

    pub fn is_stream_format_supported(&self, format: &str, drm_type: Option<&str>) -> bool {
        self.formats.is_supported(format, drm_type)
    }

    // ------------------------------------------------------------------
    // Audio tracks
    // ------------------------------------------------------------------

    pub fn audio_tracks(&self) -> Result<Vec<AudioTrackInfo>> {
        Ok(self
            .backend()?
            .audio_tracks()
            .iter()
            .enumerate()
            .map(|(i, track)| AudioTrackInfo::from_native(i, track))
            .collect())
    }

    pub fn active_audio_track(&self) -> Result<Option<AudioTrackInfo>> {
        Ok(self
            .backend()?
            .audio_tracks()
            .iter()
            .enumerate()
            .find(|(_, track)| track.enabled)
            .map(|(i, track)| AudioTrackInfo::from_native(i, track)))
    }

    /// Select an audio track by index
    ///
    /// Returns `true` when the track is now active, `false` when there is no
    /// such track.
    pub fn select_audio_track(&mut self, id: usize) -> Result<bool> {
        let backend = self.backend_mut()?;
        let tracks = backend.audio_tracks();

        let Some(track) = tracks.get(id) else {
            warn!(id, count = tracks.len(), "No audio track with this id");
            return Ok(false);
        };
        if track.enabled {
            debug!(id, original_id = %track.id, "Audio track already active");
            return Ok(true);
        }

        backend.set_audio_track_enabled(id, true);
        info!(id, original_id = %track.id, "Selected audio track");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Text tracks
    // ------------------------------------------------------------------

    /// Caption and subtitle tracks; ids index the backend's full track list
    pub fn text_tracks(&self) -> Result<Vec<TextTrackInfo>> {
        Ok(self
            .backend()?
            .text_tracks()
            .iter()
            .enumerate()
            .filter(|(_, track)| track.kind.is_selectable())
            .map(|(i, track)| TextTrackInfo::from_native(i, track))
            .collect())
    }

    pub fn active_text_track(&self) -> Result<Option<TextTrackInfo>> {
        Ok(self
            .text_tracks()?
            .into_iter()
            .find(|track| track.mode == TextTrackMode::Showing))
    }

    pub fn has_text_tracks(&self) -> Result<bool> {
        Ok(self
            .backend()?
            .text_tracks()
            .iter()
            .any(|track| track.kind.is_selectable()))
    }

    /// Check if any caption or subtitle track is showing
    pub fn is_text_track_enabled(&self) -> Result<bool> {
        Ok(self.active_text_track()?.is_some())
    }

    /// Show a text track by index, hiding any other
    pub fn select_text_track(&mut self, id: usize) -> Result<bool> {
        let was_enabled = self.is_text_track_enabled()?;
        let backend = self.backend_mut()?;
        let tracks = backend.text_tracks();

        let Some(track) = tracks.get(id) else {
            warn!(id, "No text track with this id");
            return Ok(false);
        };
        if !track.kind.is_selectable() {
            warn!(id, kind = %track.kind, "Text track kind cannot be selected");
            return Ok(false);
        }
        if track.mode == TextTrackMode::Showing {
            debug!(id, "Text track already active");
            return Ok(true);
        }

        for (i, other) in tracks.iter().enumerate() {
            if other.kind.is_selectable() && other.mode == TextTrackMode::Showing {
                backend.set_text_track_mode(i, TextTrackMode::Disabled);
            }
        }
        backend.set_text_track_mode(id, TextTrackMode::Showing);
        info!(id, original_id = %track.id, language = %track.language, "Selected text track");

        self.requested_text_track = Some(track.id.clone());
        self.notify_text_track_status(was_enabled)?;
        Ok(true)
    }

    /// Show the last selected text track, else the first disabled one
    pub fn enable_text_track(&mut self) -> Result<()> {
        if !self.has_text_tracks()? {
            debug!("No text tracks to enable");
            return Ok(());
        }
        if self.is_text_track_enabled()? {
            debug!("A text track is already enabled");
            return Ok(());
        }

        let requested = self.requested_text_track.clone();
        let backend = self.backend_mut()?;
        let tracks = backend.text_tracks();

        let remembered = requested.and_then(|requested| {
            tracks
                .iter()
                .position(|t| t.kind.is_selectable() && t.id == requested)
        });
        let target = remembered.or_else(|| {
            tracks
                .iter()
                .position(|t| t.kind.is_selectable() && t.mode == TextTrackMode::Disabled)
        });

        if let Some(index) = target {
            backend.set_text_track_mode(index, TextTrackMode::Showing);
            info!(id = index, original_id = %tracks[index].id, "Enabled text track");
            self.requested_text_track = Some(tracks[index].id.clone());
        }

        self.notify_text_track_status(false)
    }

    /// Hide every showing caption and subtitle track
    pub fn disable_text_track(&mut self) -> Result<()> {
        let backend = self.backend_mut()?;
        let mut disabled = false;

        for (i, track) in backend.text_tracks().iter().enumerate() {
            if track.kind.is_selectable() && track.mode == TextTrackMode::Showing {
                backend.set_text_track_mode(i, TextTrackMode::Disabled);
                debug!(id = i, original_id = %track.id, "Disabled text track");
                disabled = true;
            }
        }

        if disabled {
            self.notify_text_track_status(true)?;
        }
        Ok(())
    }

    fn notify_text_track_status(&mut self, was_enabled: bool) -> Result<()> {
        let enabled = self.is_text_track_enabled()?;
        if enabled != was_enabled {
            self.emit(PlayerEvent::TextTrackStatusChanged(enabled));
        }
        Ok(())
    }

    /// Attach an out-of-band text track
    ///
    /// Before content has loaded the track is queued and added once the
    /// player reaches `Loaded`.
    pub fn add_external_text_track(&mut self, request: &ExternalTextTrackRequest) -> Result<()> {
        self.check_initialized()?;
        let track = request.validate()?;

        if !self.loaded {
            warn!(
                url = track.url(),
                "External text track added before content loaded, queueing"
            );
            self.text_track_queue.push(track);
            return Ok(());
        }

        self.attach_external_text_track(track)
    }

    /// Add every queued external text track to the backend
    pub fn process_external_text_track_queue(&mut self) -> Result<()> {
        self.check_initialized()?;
        if !self.loaded || self.text_track_queue.is_empty() {
            return Ok(());
        }

        let queued = self.text_track_queue.drain();
        debug!(count = queued.len(), "Processing external text track queue");
        for track in queued {
            self.attach_external_text_track(track)?;
        }
        Ok(())
    }

    /// External text tracks waiting for content to load
    pub fn queued_text_tracks(&self) -> usize {
        self.text_track_queue.len()
    }

    fn attach_external_text_track(&mut self, track: ExternalTextTrack) -> Result<()> {
        let id = self.external_ids.next_id();
        let remote = track.to_remote(id.clone());
        self.backend_mut()?.add_remote_text_track(remote);
        info!(id = %id, url = track.url(), language = track.language(), "Added external text track");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Native events
    // ------------------------------------------------------------------

    /// Apply every native event waiting in the channel; returns how many
    pub fn process_events(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self
            .native_events
            .as_mut()
            .and_then(|events| events.try_recv().ok())
        {
            self.dispatch(event);
            count += 1;
        }
        count
    }

    /// Wait for the next native event and apply it
    ///
    /// Returns `false` once the player has no event source.
    pub async fn next_event(&mut self) -> bool {
        let Some(events) = self.native_events.as_mut() else {
            return false;
        };
        let event = events.recv().await;
        match event {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Apply one native backend event
    pub fn dispatch(&mut self, event: BackendEvent) {
        if !self.initialized {
            debug!(?event, "Ignoring native event, player not initialized");
            return;
        }

        match event {
            BackendEvent::Ready | BackendEvent::SurfaceAttached => self.apply_pending_geometry(),
            BackendEvent::LoadedData => {
                debug!("Loaded initial data");
                let live = self.backend.as_deref().is_some_and(|b| b.is_live());
                self.emit(PlayerEvent::LiveStatus(live));

                if let Some(seconds) = self.pending_seek.take() {
                    debug!(seconds, "Processing delayed seek");
                    if let Err(e) = self.seek(seconds) {
                        warn!(error = %e, "Delayed seek failed");
                    }
                }
            }
            BackendEvent::Error { code, message } => {
                self.stop();
                let info = PlayerErrorInfo {
                    code,
                    message: format!(
                        "{} encountered an unexpected error: {}",
                        self.display_name(),
                        message
                    ),
                    original_message: message,
                };
                error!(code = ?info.code, "{}", info.message);
                self.emit(PlayerEvent::PlayerError(info));
            }
            BackendEvent::Waiting => {
                if self.loaded && !self.buffering {
                    self.buffering = true;
                    self.emit(PlayerEvent::BufferingStateChanged(true));
                }
            }
            BackendEvent::CanPlay => {
                if self.loaded && self.buffering {
                    self.buffering = false;
                    self.emit(PlayerEvent::BufferingStateChanged(false));
                }
            }
            BackendEvent::Play => self.apply_playback_event(PlayerState::Playing),
            BackendEvent::Pause => self.apply_playback_event(PlayerState::Paused),
            BackendEvent::Ended => self.apply_playback_event(PlayerState::Complete),
            BackendEvent::TimeUpdate => self.notify_video_time_changed(),
            BackendEvent::DurationChange => {
                if let Some(duration) = self.known_duration() {
                    self.emit(PlayerEvent::VideoDurationChanged(duration));
                }
            }
            BackendEvent::AudioTrackAdded | BackendEvent::AudioTrackRemoved => {
                if let Ok(tracks) = self.audio_tracks() {
                    self.emit(PlayerEvent::AudioTracksChanged(tracks));
                }
            }
            BackendEvent::AudioTrackChanged => {
                if let Ok(track) = self.active_audio_track() {
                    self.emit(PlayerEvent::ActiveAudioTrackChanged(track));
                }
            }
            BackendEvent::TextTrackAdded | BackendEvent::TextTrackRemoved => {
                if let Ok(tracks) = self.text_tracks() {
                    self.emit(PlayerEvent::TextTracksChanged(tracks));
                }
            }
            BackendEvent::TextTrackChanged => {
                if let Ok(track) = self.active_text_track() {
                    self.emit(PlayerEvent::ActiveTextTrackChanged(track));
                }
            }
            BackendEvent::RemoteTextTrackLoaded { id } => self.notify_external_text_track(&id),
            BackendEvent::MetadataCue {
                key,
                data,
                start_time,
                end_time,
            } => {
                let key = key.trim();
                if key.is_empty() || key == PRIVATE_METADATA_KEY {
                    return;
                }
                self.emit(PlayerEvent::MetadataAvailable(TimedMetadata {
                    identifier: key.to_string(),
                    value: data,
                    timestamp: Utc::now(),
                    duration_ms: ((end_time - start_time) * 1000.0) as i64,
                }));
            }
        }
    }

    fn apply_playback_event(&mut self, target: PlayerState) {
        if !self.loaded {
            debug!(%target, "Ignoring playback event, no content loaded");
            return;
        }
        if self.state == target {
            return;
        }
        if let Err(e) = self.update_state(target) {
            warn!(error = %e, "Rejected native playback event");
            let info = PlayerErrorInfo {
                code: None,
                message: format!("{} rejected a playback event: {e}", self.display_name()),
                original_message: e.to_string(),
            };
            self.emit(PlayerEvent::PlayerError(info));
        }
    }

    fn notify_video_time_changed(&mut self) {
        let Some(backend) = self.backend.as_deref() else {
            return;
        };
        let update = VideoTimeUpdate::new(backend.current_time(), &backend.buffered());
        self.emit(PlayerEvent::VideoTimeChanged(update));
    }

    fn notify_external_text_track(&mut self, id: &str) {
        let Some(backend) = self.backend.as_deref() else {
            return;
        };
        let tracks = backend.text_tracks();
        let Some((index, track)) = tracks.iter().enumerate().find(|(_, t)| t.id == id) else {
            warn!(id, "Loaded external text track not found");
            return;
        };

        let info = TextTrackInfo::from_native(index, track);
        info!(id, enabled = info.active, "External text track loaded");
        self.emit(PlayerEvent::ExternalTextTrackAdded(info));
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn emit(&mut self, event: PlayerEvent) {
        self.emitter.emit(event);
    }

    fn not_initialized(&self) -> Error {
        Error::NotInitialized {
            player: self.display_name(),
        }
    }

    fn check_initialized(&self) -> Result<()> {
        if self.initialized && self.backend.is_some() {
            Ok(())
        } else {
            Err(self.not_initialized())
        }
    }

    fn backend(&self) -> Result<&dyn MediaBackend> {
        match self.backend.as_deref() {
            Some(backend) if self.initialized => Ok(backend),
            _ => Err(self.not_initialized()),
        }
    }

    fn backend_mut(&mut self) -> Result<&mut (dyn MediaBackend + 'static)> {
        let Self {
            backend,
            initialized,
            backend_name,
            nickname,
            ..
        } = self;
        match backend.as_deref_mut() {
            Some(backend) if *initialized => Ok(backend),
            _ => Err(Error::NotInitialized {
                player: display_name(backend_name, nickname.as_deref()),
            }),
        }
    }
}

impl std::fmt::Debug for VideoPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoPlayer")
            .field("id", &self.id)
            .field("name", &self.display_name())
            .field("state", &self.state)
            .field("loaded", &self.loaded)
            .field("formats", &self.formats)
            .finish_non_exhaustive()
    }
}

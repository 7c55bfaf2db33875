//! Integration tests for tvplay Core

#![cfg(feature = "memory-backend")]

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_test::{assert_err, assert_ok};
use url::Url;

use tvplay_core::backend::memory::{
    InMemoryBackendFactory, InMemoryHandle, RecordingLoader, StaticKeySystems,
};
use tvplay_core::{
    DrmConfig, DrmSystem, Error, ErrorKind, EventBus, ExternalTextTrackRequest, Notification,
    PlatformDrmSupport, PlayerConfig, PlayerContext, PlayerEvent, PlayerServices, PlayerState,
    VideoPlayer, VideoRectangle,
};

// =============================================================================
// Helpers
// =============================================================================

struct Setup {
    context: PlayerContext,
    handle: InMemoryHandle,
    notifications: UnboundedReceiver<Notification>,
}

async fn setup(factory: InMemoryBackendFactory, key_systems: &[&str]) -> Setup {
    let drm = PlatformDrmSupport::new();
    drm.probe(&StaticKeySystems::new(key_systems.iter().copied()))
        .await;

    let handle = factory.handle();
    let (bus, notifications) = EventBus::new();
    let context = PlayerContext::new(
        PlayerConfig::default(),
        PlayerServices::new(
            Arc::new(factory),
            drm,
            Arc::new(bus),
            Arc::new(RecordingLoader::new()),
        ),
    );

    Setup {
        context,
        handle,
        notifications,
    }
}

async fn initialized_player(setup: &mut Setup) -> VideoPlayer {
    let mut player = assert_ok!(setup.context.create_player().await);
    assert_ok!(player.initialize(None).await);
    drain(&mut setup.notifications);
    player
}

fn drain(notifications: &mut UnboundedReceiver<Notification>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        events.push(notification.event);
    }
    events
}

fn state_ids(events: &[PlayerEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::StateChanged(id) => Some(*id),
            _ => None,
        })
        .collect()
}

fn widevine() -> DrmConfig {
    DrmConfig::widevine(Url::parse("https://license.example.com/widevine").unwrap())
        .with_header("X-AxDRM-Message", "token")
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_prepare_dash_scenario() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = assert_ok!(setup.context.create_player().await);

    assert_ok!(player.initialize(Some("living-room")).await);
    assert_ok!(player.prepare("https://cdn.example.com/manifest.mpd", "DASH", 0.0, None));

    let events = drain(&mut setup.notifications);
    assert_eq!(state_ids(&events), [1, 2, 3]);
    assert_eq!(events.len(), 3);
    assert_eq!(player.state(), PlayerState::Loaded);
    assert!(player.is_loaded());

    let sources = setup.handle.sources();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].mime_type.as_deref(), Some("application/dash+xml"));
}

#[tokio::test]
async fn test_full_playback_cycle() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;

    assert_ok!(player.prepare("https://cdn.example.com/movie.mp4", "MP4", 0.0, None));
    setup.handle.finish_loading(30.0);
    assert_ok!(player.play());
    player.process_events();
    setup.handle.advance(10.0);
    setup.handle.end_playback();
    player.process_events();

    assert_eq!(player.state(), PlayerState::Complete);

    // Complete only leads back to Initialized; replay needs a fresh prepare
    assert_err!(player.update_state(PlayerState::Playing));
    player.stop();
    assert_ok!(player.prepare("https://cdn.example.com/movie.mp4", "MP4", 0.0, None));

    let events = drain(&mut setup.notifications);
    assert_eq!(state_ids(&events), [2, 3, 5, 6, 1, 2, 3]);
    assert!(events.contains(&PlayerEvent::VideoDurationChanged(30.0)));
    assert!(events.contains(&PlayerEvent::LiveStatus(false)));
}

#[tokio::test]
async fn test_illegal_transition_leaves_state() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;

    for target in [
        PlayerState::Initialized,
        PlayerState::Loaded,
        PlayerState::Paused,
        PlayerState::Playing,
        PlayerState::Complete,
    ] {
        let err = assert_err!(player.update_state(target));
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(player.state(), PlayerState::Initialized);
    }
    assert!(drain(&mut setup.notifications).is_empty());
}

#[tokio::test]
async fn test_single_player_per_context() {
    let setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut first = assert_ok!(setup.context.create_player().await);

    let err = assert_err!(setup.context.create_player().await);
    assert!(matches!(err, Error::InstanceExists));

    first.destroy();
    assert!(!setup.context.has_live_player());
    let err = assert_err!(first.initialize(None).await);
    assert!(matches!(err, Error::Destroyed { .. }));

    assert_ok!(setup.context.create_player().await);
}

#[tokio::test]
async fn test_destroy_releases_instance() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;

    player.destroy();
    assert!(!setup.context.has_live_player());
    assert!(setup.handle.is_disposed());

    let mut replacement = assert_ok!(setup.context.create_player().await);
    assert_ok!(replacement.initialize(None).await);
    assert_eq!(replacement.state(), PlayerState::Initialized);
}

// =============================================================================
// Format / DRM Gating Tests
// =============================================================================

#[tokio::test]
async fn test_dash_widevine_supported() {
    let mut setup = setup(InMemoryBackendFactory::new(), &["com.widevine.alpha"]).await;
    let mut player = initialized_player(&mut setup).await;

    assert!(player.drm_support().is_supported(DrmSystem::Widevine));
    assert_ok!(player.prepare(
        "https://cdn.example.com/protected.mpd",
        "DASH",
        0.0,
        Some(&widevine())
    ));

    let options = setup.handle.drm_options();
    assert_eq!(options.len(), 1);
    let key_system = &options[0].key_systems["com.widevine.alpha"];
    assert_eq!(key_system.license_headers["X-AxDRM-Message"], "token");
}

#[tokio::test]
async fn test_dash_widevine_unsupported() {
    let mut setup = setup(InMemoryBackendFactory::new(), &["com.microsoft.playready"]).await;
    let mut player = initialized_player(&mut setup).await;

    let err = assert_err!(player.prepare(
        "https://cdn.example.com/protected.mpd",
        "DASH",
        0.0,
        Some(&widevine())
    ));

    assert!(matches!(err, Error::UnsupportedDrm { .. }));
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(player.state(), PlayerState::Initialized);
    assert!(setup.handle.sources().is_empty());
    assert!(drain(&mut setup.notifications).is_empty());
}

#[tokio::test]
async fn test_unknown_format_rejected() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;

    let err = assert_err!(player.prepare("https://cdn.example.com/a.ism", "Smooth", 0.0, None));
    assert!(matches!(err, Error::UnsupportedFormat { .. }));

    assert!(player
        .formats_mut()
        .register("Smooth", ["PlayReady"])
        .is_some());
    assert_ok!(player.prepare("https://cdn.example.com/a.ism", "smooth", 0.0, None));
    assert_eq!(setup.handle.sources()[0].mime_type, None);
}

#[tokio::test]
async fn test_drm_after_playback_started_rejected() {
    let mut setup = setup(InMemoryBackendFactory::new(), &["com.widevine.alpha"]).await;
    let mut player = initialized_player(&mut setup).await;

    assert_ok!(player.prepare("https://cdn.example.com/a.mpd", "DASH", 0.0, None));
    assert_ok!(player.play());
    player.process_events();

    let err = assert_err!(player.configure_drm(Some(&widevine())));
    assert!(matches!(err, Error::DrmConfiguration(_)));
}

// =============================================================================
// External Text Track Tests
// =============================================================================

#[tokio::test]
async fn test_text_tracks_queued_until_loaded() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;

    for language in ["en", "es"] {
        let request = ExternalTextTrackRequest::new(
            &format!("https://cdn.example.com/{language}.vtt"),
            language,
            "vtt",
        );
        assert_ok!(player.add_external_text_track(&request));
    }
    assert_eq!(player.queued_text_tracks(), 2);
    assert!(setup.handle.remote_text_tracks().is_empty());

    assert_ok!(player.prepare("https://cdn.example.com/a.m3u8", "HLS", 0.0, None));

    let remote = setup.handle.remote_text_tracks();
    let ids: Vec<_> = remote.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["external1", "external2"]);
    assert_eq!(remote[1].language, "es");
    assert_eq!(player.queued_text_tracks(), 0);

    // Draining again adds nothing
    assert_ok!(player.process_external_text_track_queue());
    assert_eq!(setup.handle.remote_text_tracks().len(), 2);

    player.process_events();
    let added: Vec<_> = drain(&mut setup.notifications)
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::ExternalTextTrackAdded(info) => Some(info),
            _ => None,
        })
        .collect();
    assert_eq!(added.len(), 2);
    assert_eq!(added[0].original_id, "external1");
    assert!(added[0].active);
}

#[tokio::test]
async fn test_stop_clears_queue_and_ids() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;
    let request = ExternalTextTrackRequest::new("https://cdn.example.com/en.vtt", "en", "vtt");

    assert_ok!(player.add_external_text_track(&request));
    player.stop();
    assert_eq!(player.queued_text_tracks(), 0);

    assert_ok!(player.prepare("https://cdn.example.com/a.mp4", "MP4", 0.0, None));
    assert!(setup.handle.remote_text_tracks().is_empty());

    assert_ok!(player.add_external_text_track(&request));
    player.stop();
    assert_ok!(player.prepare("https://cdn.example.com/a.mp4", "MP4", 0.0, None));
    assert_ok!(player.add_external_text_track(&request.clone().enabled(false)));

    let ids: Vec<_> = setup
        .handle
        .remote_text_tracks()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, ["external1", "external1"]);
}

#[tokio::test]
async fn test_invalid_text_track_request() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;

    let err = assert_err!(player.add_external_text_track(&ExternalTextTrackRequest::new(
        "https://cdn.example.com/en.vtt",
        "",
        "vtt"
    )));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(player.queued_text_tracks(), 0);
}

// =============================================================================
// Geometry Tests
// =============================================================================

#[tokio::test]
async fn test_geometry_replayed_once_when_surface_attaches() {
    let mut setup = setup(InMemoryBackendFactory::new().without_surface(), &[]).await;
    let mut player = initialized_player(&mut setup).await;
    let rect = assert_ok!(VideoRectangle::new(100, 50, 1280, 720));

    player.set_video_rectangle(rect);
    assert_eq!(player.pending_video_rectangle(), Some(rect));
    assert!(setup.handle.applied_geometry().is_empty());

    setup.handle.attach_surface();
    player.process_events();
    assert_eq!(setup.handle.applied_geometry(), [rect]);
    assert_eq!(player.pending_video_rectangle(), None);

    // A second surface notification has nothing left to replay
    setup.handle.attach_surface();
    player.process_events();
    assert_eq!(setup.handle.applied_geometry(), [rect]);

    let position = assert_ok!(player.position()).unwrap();
    assert_eq!((position.x, position.y), (100, 50));
}

#[tokio::test]
async fn test_geometry_stored_before_initialize() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = assert_ok!(setup.context.create_player().await);
    let rect = assert_ok!(VideoRectangle::new(0, 0, 640, 360));

    player.set_video_rectangle(rect);
    assert_ok!(player.initialize(None).await);

    assert_eq!(setup.handle.applied_geometry(), [rect]);
    let size = assert_ok!(player.size()).unwrap();
    assert_eq!((size.width, size.height), (640, 360));
    drain(&mut setup.notifications);
}

// =============================================================================
// Suspend / Restore Tests
// =============================================================================

#[tokio::test]
async fn test_suspend_and_restore() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = initialized_player(&mut setup).await;

    assert_ok!(player.prepare("https://cdn.example.com/a.mp4", "MP4", 0.0, None));
    setup.handle.finish_loading(60.0);
    assert_ok!(player.play());
    player.process_events();
    assert_eq!(player.state(), PlayerState::Playing);

    player.on_visibility_changed(true);
    player.process_events();
    assert_eq!(player.state(), PlayerState::Paused);
    assert!(setup.handle.is_paused());

    player.on_visibility_changed(false);
    player.process_events();
    assert_eq!(player.state(), PlayerState::Playing);

    // The resume flag is cleared, so a pause now sticks across restore
    assert_ok!(player.pause());
    player.process_events();
    player.restore();
    player.process_events();
    assert_eq!(player.state(), PlayerState::Paused);
}

// =============================================================================
// Notification Tests
// =============================================================================

#[tokio::test]
async fn test_notifications_are_sequenced_json() {
    let mut setup = setup(InMemoryBackendFactory::new(), &[]).await;
    let mut player = assert_ok!(setup.context.create_player().await);
    assert_ok!(player.initialize(None).await);
    assert_ok!(player.prepare("https://cdn.example.com/a.mp4", "MP4", 0.0, None));

    let mut sequences = Vec::new();
    while let Ok(notification) = setup.notifications.try_recv() {
        assert_eq!(notification.player_id, player.id());
        let json = assert_ok!(serde_json::to_value(&notification));
        assert_eq!(json["context"], "VideoPlayer");
        assert_eq!(json["name"], "stateChanged");
        sequences.push(notification.sequence);
    }
    assert_eq!(sequences, [1, 2, 3]);
}

#[test]
fn test_config_from_json() {
    let config = assert_ok!(PlayerConfig::from_json(
        r#"{"nickname": "bedroom", "register_default_formats": false}"#
    ));
    assert_eq!(config.nickname.as_deref(), Some("bedroom"));
    assert!(!config.register_default_formats);
    assert_eq!(config.dependencies.len(), 2);
}

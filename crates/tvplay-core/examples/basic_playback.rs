//! Basic playback example
//!
//! Drives the player facade against the headless in-memory backend and
//! prints every notification it publishes.
//!
//! Run with: cargo run -p tvplay-core --example basic_playback

use std::sync::Arc;
use tvplay_core::backend::memory::{InMemoryBackendFactory, RecordingLoader, StaticKeySystems};
use tvplay_core::{
    DrmConfig, EventBus, ExternalTextTrackRequest, PlatformDrmSupport, PlayerConfig,
    PlayerContext, PlayerServices, VideoRectangle,
};
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("tvplay Core - Basic Playback Example");
    println!("====================================\n");

    // Probe the platform for DRM support before any player exists
    let drm = PlatformDrmSupport::new();
    drm.probe(&StaticKeySystems::new(["com.widevine.alpha"])).await;
    println!("Supported DRM: {:?}\n", drm.supported_systems());

    let factory = InMemoryBackendFactory::new();
    let backend = factory.handle();
    let (bus, mut notifications) = EventBus::new();

    let context = PlayerContext::new(
        PlayerConfig::default(),
        PlayerServices::new(
            Arc::new(factory),
            drm,
            Arc::new(bus),
            Arc::new(RecordingLoader::new()),
        ),
    );

    let mut player = context.create_player().await?;
    player.initialize(Some("demo")).await?;
    player.set_video_rectangle(VideoRectangle::new(0, 0, 1920, 1080)?);

    println!("Stream formats:");
    for format in player.formats().iter() {
        println!("  - {format}");
    }
    println!();

    player.add_external_text_track(
        &ExternalTextTrackRequest::new("https://cdn.example.com/subs/en.vtt", "en", "vtt")
            .with_label("English"),
    )?;

    let license = DrmConfig::widevine(Url::parse("https://license.example.com/widevine")?);
    player.prepare(
        "https://cdn.example.com/stream/manifest.mpd",
        "DASH",
        0.0,
        Some(&license),
    )?;

    backend.finish_loading(596.0);
    player.play()?;
    player.process_events();

    backend.advance(12.5);
    player.seek(300.0)?;
    player.process_events();

    player.destroy();

    println!("Notifications:");
    while let Ok(notification) = notifications.try_recv() {
        println!(
            "  #{:<3} {}",
            notification.sequence,
            serde_json::to_string(&notification.event)?
        );
    }

    Ok(())
}

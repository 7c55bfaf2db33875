//! CLI command implementations

use std::sync::Arc;

use anyhow::Context;
use console::style;
use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, info};
use url::Url;

use tvplay_core::backend::memory::{InMemoryBackendFactory, RecordingLoader, StaticKeySystems};
use tvplay_core::{
    DrmConfig, DrmSystem, EventBus, ExternalTextTrackRequest, Notification, PlatformDrmSupport,
    PlayerConfig, PlayerContext, PlayerServices, PlayerState, StreamFormatRegistry,
    VideoRectangle,
};

use crate::output::{compact_json, print_rows, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
struct StateRow {
    #[tabled(rename = "ID")]
    id: u8,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Successors")]
    successors: String,
}

#[derive(Debug, Serialize, Tabled)]
struct FormatRow {
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "DRM")]
    drm: String,
    #[tabled(rename = "MIME type")]
    mime_type: String,
}

#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    #[tabled(rename = "#")]
    sequence: u64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Data")]
    data: String,
}

impl From<&Notification> for NotificationRow {
    fn from(notification: &Notification) -> Self {
        let data = serde_json::to_value(&notification.event)
            .ok()
            .and_then(|value| value.get("data").cloned())
            .unwrap_or(serde_json::Value::Null);
        Self {
            sequence: notification.sequence,
            time: notification.timestamp.format("%H:%M:%S%.3f").to_string(),
            event: notification.event.name().to_string(),
            data: compact_json(&data),
        }
    }
}

/// Options for a simulated playback session
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub url: String,
    pub stream_format: String,
    pub drm: Option<String>,
    pub license_url: Option<Url>,
    pub start: f64,
    pub duration: f64,
    pub step: f64,
    pub subtitles: Vec<String>,
    pub key_systems: Vec<String>,
    pub fail_at: Option<f64>,
}

/// Print the player state transition table
pub async fn states(format: &str) -> anyhow::Result<()> {
    let rows: Vec<StateRow> = PlayerState::ALL
        .iter()
        .map(|state| StateRow {
            id: state.id(),
            state: state.to_string(),
            successors: state
                .successors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    print_rows(&rows, OutputFormat::from(format), |row| {
        format!(
            "{} {:<14} -> {}",
            style(row.id).dim(),
            style(&row.state).bold(),
            row.successors
        )
    })
}

/// List the stream formats available for the given platform key systems
pub async fn formats(
    key_systems: &[String],
    check: Option<&str>,
    check_drm: Option<&str>,
    format: &str,
) -> anyhow::Result<()> {
    let drm = probe_platform(key_systems).await?;
    let registry = StreamFormatRegistry::with_defaults(Arc::new(drm));

    if let Some(stream_format) = check {
        let supported = registry.is_supported(stream_format, check_drm);
        let subject = match check_drm {
            Some(drm_type) => format!("{stream_format} with {drm_type}"),
            None => stream_format.to_string(),
        };
        if supported {
            println!("{} {subject} is supported", style("✓").green());
        } else {
            println!("{} {subject} is not supported", style("✗").red());
        }
        return Ok(());
    }

    let rows: Vec<FormatRow> = registry
        .iter()
        .map(|info| FormatRow {
            format: info.format().to_string(),
            drm: if info.drm_types().is_empty() {
                "-".to_string()
            } else {
                info.drm_types().join(", ")
            },
            mime_type: info.mime_type().unwrap_or("-").to_string(),
        })
        .collect();

    print_rows(&rows, OutputFormat::from(format), |row| {
        format!("{} [{}] {}", style(&row.format).cyan(), row.drm, style(&row.mime_type).dim())
    })
}

/// Run a scripted session against the headless backend and print its notifications
pub async fn simulate(
    options: SimulateOptions,
    config: PlayerConfig,
    format: &str,
) -> anyhow::Result<()> {
    let drm = probe_platform(&options.key_systems).await?;
    let factory = InMemoryBackendFactory::new();
    let backend = factory.handle();
    let (bus, mut notifications) = EventBus::new();

    let context = PlayerContext::new(
        config,
        PlayerServices::new(
            Arc::new(factory),
            drm,
            Arc::new(bus),
            Arc::new(RecordingLoader::new()),
        ),
    );

    let mut player = context.create_player().await?;
    player.initialize(None).await?;
    player.set_video_rectangle(VideoRectangle::new(0, 0, 1920, 1080)?);
    info!(player = %player.display_name(), "Player initialized");

    for subtitle in &options.subtitles {
        let request = subtitle_request(subtitle)?;
        player.add_external_text_track(&request)?;
    }

    let license = drm_config(options.drm.as_deref(), options.license_url.as_ref())?;
    player.prepare(
        &options.url,
        &options.stream_format,
        options.start,
        license.as_ref(),
    )?;

    backend.finish_loading(options.duration);
    player.play()?;
    player.process_events();

    let step = if options.step > 0.0 { options.step } else { 10.0 };
    let mut position = player.current_time()?;
    while position + step < options.duration {
        if options.fail_at.is_some_and(|at| position + step >= at) {
            backend.fail(4, "simulated media error");
            player.process_events();
            break;
        }
        backend.advance(step);
        position += step;
        player.process_events();
        debug!(position, state = %player.state(), "Advanced playback");
    }

    if player.state() == PlayerState::Playing {
        backend.end_playback();
        player.process_events();
    }
    player.destroy();

    let mut collected = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        collected.push(notification);
    }

    let output = OutputFormat::from(format);
    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&collected)?);
        return Ok(());
    }

    let rows: Vec<NotificationRow> = collected.iter().map(NotificationRow::from).collect();
    print_rows(&rows, output, |row| {
        format!(
            "{} {} {}",
            style(format!("#{:<3}", row.sequence)).dim(),
            style(format!("{:<24}", row.event)).green(),
            row.data
        )
    })
}

async fn probe_platform(key_systems: &[String]) -> anyhow::Result<PlatformDrmSupport> {
    let mut resolved = Vec::with_capacity(key_systems.len());
    for name in key_systems {
        let system: DrmSystem = name
            .parse()
            .with_context(|| format!("unknown DRM system '{name}'"))?;
        resolved.push(system.key_system());
    }

    let drm = PlatformDrmSupport::new();
    drm.probe(&StaticKeySystems::new(resolved)).await;
    debug!(supported = ?drm.supported_systems(), "Probed platform DRM");
    Ok(drm)
}

fn drm_config(drm: Option<&str>, license_url: Option<&Url>) -> anyhow::Result<Option<DrmConfig>> {
    let Some(name) = drm else {
        return Ok(None);
    };
    let license_url = license_url
        .cloned()
        .with_context(|| format!("--license-url is required with --drm {name}"))?;
    let system: DrmSystem = name
        .parse()
        .with_context(|| format!("unknown DRM system '{name}'"))?;
    Ok(Some(match system {
        DrmSystem::Widevine => DrmConfig::widevine(license_url),
        DrmSystem::PlayReady => DrmConfig::playready(license_url),
    }))
}

/// Parse `LANG=URL`, with the subtitle format taken from the URL extension
fn subtitle_request(arg: &str) -> anyhow::Result<ExternalTextTrackRequest> {
    let (language, url) = arg
        .split_once('=')
        .with_context(|| format!("subtitle '{arg}' must be LANG=URL"))?;
    let format = url
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.contains('/'))
        .unwrap_or("vtt");
    Ok(ExternalTextTrackRequest::new(url, language, format).enabled(true))
}

//! tvplay CLI - Headless player tester
//!
//! Commands:
//! - states: Print the player state transition table
//! - formats: List stream formats for a set of platform key systems
//! - simulate: Run a scripted playback session and print its notifications

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use url::Url;

use tvplay_core::PlayerConfig;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "tvplay")]
#[command(author, version, about = "Headless tester for the tvplay video player facade")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Player configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the player state transition table
    States,

    /// List stream formats available on a platform
    Formats {
        /// DRM systems the platform grants access to
        #[arg(short, long, value_delimiter = ',', default_value = "widevine,playready")]
        key_systems: Vec<String>,

        /// Only check whether this stream format is supported
        #[arg(long)]
        check: Option<String>,

        /// DRM type to check together with --check
        #[arg(long, requires = "check")]
        drm: Option<String>,
    },

    /// Run a scripted playback session against the in-memory backend
    Simulate {
        /// Stream URL
        #[arg(default_value = "https://cdn.example.com/stream/manifest.mpd")]
        url: String,

        /// Stream format (DASH, HLS, MP4, ...)
        #[arg(short = 't', long, default_value = "DASH")]
        stream_format: String,

        /// DRM system protecting the stream
        #[arg(long)]
        drm: Option<String>,

        /// License server URL
        #[arg(long)]
        license_url: Option<Url>,

        /// Start position in seconds
        #[arg(long, default_value = "0")]
        start: f64,

        /// Content duration in seconds
        #[arg(short, long, default_value = "60")]
        duration: f64,

        /// Playback step between time updates, in seconds
        #[arg(long, default_value = "10")]
        step: f64,

        /// External subtitle as LANG=URL (repeatable)
        #[arg(short, long)]
        subtitle: Vec<String>,

        /// DRM systems the platform grants access to
        #[arg(short, long, value_delimiter = ',', default_value = "widevine,playready")]
        key_systems: Vec<String>,

        /// Inject a media error at this position in seconds
        #[arg(long)]
        fail_at: Option<f64>,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading player configuration");
            PlayerConfig::load(path)?
        }
        None => PlayerConfig::default(),
    };

    match cli.command {
        Commands::States => {
            commands::states(&cli.format).await?;
        }
        Commands::Formats {
            key_systems,
            check,
            drm,
        } => {
            commands::formats(&key_systems, check.as_deref(), drm.as_deref(), &cli.format)
                .await?;
        }
        Commands::Simulate {
            url,
            stream_format,
            drm,
            license_url,
            start,
            duration,
            step,
            subtitle,
            key_systems,
            fail_at,
        } => {
            let options = commands::SimulateOptions {
                url,
                stream_format,
                drm,
                license_url,
                start,
                duration,
                step,
                subtitles: subtitle,
                key_systems,
                fail_at,
            };
            commands::simulate(options, config, &cli.format).await?;
        }
    }

    Ok(())
}

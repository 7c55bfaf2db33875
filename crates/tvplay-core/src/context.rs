//! Player context
//!
//! Owns everything a player instance needs from its environment and enforces
//! that at most one player is alive at a time. Backend script dependencies
//! are loaded on the first successful `create_player` and never again.

use crate::backend::BackendFactory;
use crate::drm::PlatformDrmSupport;
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::player::VideoPlayer;
use crate::types::PlayerConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

/// Loads the script resources a media backend depends on
#[async_trait]
pub trait DependencyLoader: Send + Sync {
    async fn load(&self, resources: &[String]) -> Result<()>;
}

/// Collaborators shared by every player created from a context
#[derive(Clone)]
pub struct PlayerServices {
    pub backend: Arc<dyn BackendFactory>,
    pub drm: PlatformDrmSupport,
    pub events: Arc<dyn EventSink>,
    pub loader: Arc<dyn DependencyLoader>,
}

impl PlayerServices {
    pub fn new(
        backend: Arc<dyn BackendFactory>,
        drm: PlatformDrmSupport,
        events: Arc<dyn EventSink>,
        loader: Arc<dyn DependencyLoader>,
    ) -> Self {
        Self {
            backend,
            drm,
            events,
            loader,
        }
    }
}

/// Marks a context's player slot as taken; released on drop
#[derive(Debug)]
pub struct InstanceGuard {
    live: Arc<AtomicBool>,
}

impl InstanceGuard {
    fn acquire(live: &Arc<AtomicBool>) -> Result<Self> {
        live.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::InstanceExists)?;
        Ok(Self { live: live.clone() })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
        debug!("Player instance released");
    }
}

/// Creates players and enforces the single-instance rule
pub struct PlayerContext {
    config: PlayerConfig,
    services: PlayerServices,
    live: Arc<AtomicBool>,
    dependencies: OnceCell<()>,
}

impl PlayerContext {
    pub fn new(config: PlayerConfig, services: PlayerServices) -> Self {
        Self {
            config,
            services,
            live: Arc::new(AtomicBool::new(false)),
            dependencies: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn services(&self) -> &PlayerServices {
        &self.services
    }

    /// Check if a player created by this context is still alive
    pub fn has_live_player(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Check if backend dependencies have been loaded
    pub fn dependencies_loaded(&self) -> bool {
        self.dependencies.initialized()
    }

    /// Create the player, loading backend dependencies first if needed
    #[instrument(skip(self), fields(backend = self.services.backend.name()))]
    pub async fn create_player(&self) -> Result<VideoPlayer> {
        let guard = InstanceGuard::acquire(&self.live)?;

        self.dependencies
            .get_or_try_init(|| self.load_dependencies())
            .await?;

        let player = VideoPlayer::new(&self.config, &self.services, guard);
        info!(player = %player.id(), "Created {}", player.display_name());
        Ok(player)
    }

    async fn load_dependencies(&self) -> Result<()> {
        let resources: Vec<String> = self
            .config
            .dependencies
            .iter()
            .map(|r| r.trim().to_string())
            .collect();

        if resources.iter().any(String::is_empty) {
            return Err(Error::invalid_argument(
                "dependency resource names must not be empty",
            ));
        }

        debug!(?resources, "Loading player dependencies");
        self.services
            .loader
            .load(&resources)
            .await
            .map_err(|e| match e {
                Error::DependencyLoad(_) => e,
                other => Error::DependencyLoad(other.to_string()),
            })?;
        info!(count = resources.len(), "Player dependencies loaded");
        Ok(())
    }
}

impl std::fmt::Debug for PlayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerContext")
            .field("config", &self.config)
            .field("live", &self.has_live_player())
            .field("dependencies_loaded", &self.dependencies_loaded())
            .finish_non_exhaustive()
    }
}

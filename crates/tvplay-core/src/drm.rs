//! DRM - platform capability detection and per-content key system configuration
//!
//! Supported systems:
//! - Widevine (`com.widevine.alpha`)
//! - PlayReady (`com.microsoft.playready`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Platform DRM Support                 │
//! ├─────────────────────────────────────────────────────┤
//! │                                                     │
//! │   KeySystemProber ──(once, async)──► support flags  │
//! │                                         │           │
//! │                                         ▼           │
//! │                          StreamFormatRegistry       │
//! │                                         │           │
//! │   DrmConfig ──► EmeOptions ──► MediaBackend         │
//! └─────────────────────────────────────────────────────┘
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// DRM system types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrmSystem {
    Widevine,
    PlayReady,
}

impl DrmSystem {
    /// Every DRM system the platform is probed for
    pub const ALL: [DrmSystem; 2] = [DrmSystem::Widevine, DrmSystem::PlayReady];

    /// Lowercase name used in configuration and capability lookups
    pub fn name(&self) -> &'static str {
        match self {
            DrmSystem::Widevine => "widevine",
            DrmSystem::PlayReady => "playready",
        }
    }

    /// Encrypted media key system identifier
    pub fn key_system(&self) -> &'static str {
        match self {
            DrmSystem::Widevine => "com.widevine.alpha",
            DrmSystem::PlayReady => "com.microsoft.playready",
        }
    }

    /// Resolve a DRM type label (trimmed, case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|system| system.name().eq_ignore_ascii_case(name))
    }

    fn index(&self) -> usize {
        match self {
            DrmSystem::Widevine => 0,
            DrmSystem::PlayReady => 1,
        }
    }
}

impl FromStr for DrmSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::DrmNotSupported {
            system: s.trim().to_string(),
        })
    }
}

impl std::fmt::Display for DrmSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrmSystem::Widevine => write!(f, "Widevine"),
            DrmSystem::PlayReady => write!(f, "PlayReady"),
        }
    }
}

/// Answers whether the platform can decrypt a DRM type
pub trait DrmCapabilities: Send + Sync {
    /// Check a DRM type label such as `"Widevine"` or `" playready "`
    fn is_drm_type_supported(&self, drm_type: &str) -> bool;
}

/// Asks the platform for access to an encrypted media key system
#[async_trait]
pub trait KeySystemProber: Send + Sync {
    /// Request access and create media keys; `Ok` means the system is usable
    async fn request_access(&self, key_system: &str) -> Result<()>;
}

/// Process-wide DRM support flags
///
/// Cloning shares the same flags. A flag only ever flips from unsupported to
/// supported, so a lookup racing the probe can return a false negative but
/// never a false positive.
#[derive(Debug, Clone, Default)]
pub struct PlatformDrmSupport {
    flags: Arc<[AtomicBool; 2]>,
}

impl PlatformDrmSupport {
    /// Create support flags with every system unsupported
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a DRM system is usable
    pub fn mark_supported(&self, system: DrmSystem) {
        self.flags[system.index()].store(true, Ordering::Release);
    }

    /// Check a DRM system
    pub fn is_supported(&self, system: DrmSystem) -> bool {
        self.flags[system.index()].load(Ordering::Acquire)
    }

    /// Get supported DRM systems
    pub fn supported_systems(&self) -> Vec<DrmSystem> {
        DrmSystem::ALL
            .into_iter()
            .filter(|system| self.is_supported(*system))
            .collect()
    }

    /// Probe every known key system once
    pub async fn probe(&self, prober: &dyn KeySystemProber) {
        for system in DrmSystem::ALL {
            match prober.request_access(system.key_system()).await {
                Ok(()) => {
                    self.mark_supported(system);
                    info!(drm = %system, key_system = system.key_system(), "DRM supported");
                }
                Err(e) => {
                    debug!(drm = %system, error = %e, "DRM not supported");
                }
            }
        }
    }
}

impl DrmCapabilities for PlatformDrmSupport {
    fn is_drm_type_supported(&self, drm_type: &str) -> bool {
        DrmSystem::from_name(drm_type)
            .map(|system| self.is_supported(system))
            .unwrap_or(false)
    }
}

/// DRM configuration for a content item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrmConfig {
    /// DRM type label, e.g. `"widevine"`
    #[serde(rename = "type", default)]
    pub drm_type: Option<String>,
    /// License server URL
    #[serde(default)]
    pub license_url: Option<Url>,
    /// Custom headers for license requests
    #[serde(default)]
    pub license_headers: HashMap<String, String>,
}

impl DrmConfig {
    /// Create a Widevine configuration
    pub fn widevine(license_url: Url) -> Self {
        Self {
            drm_type: Some(DrmSystem::Widevine.name().to_string()),
            license_url: Some(license_url),
            ..Default::default()
        }
    }

    /// Create a PlayReady configuration
    pub fn playready(license_url: Url) -> Self {
        Self {
            drm_type: Some(DrmSystem::PlayReady.name().to_string()),
            license_url: Some(license_url),
            ..Default::default()
        }
    }

    /// Add a custom header for license requests
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.license_headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Trimmed DRM type, if one is set
    pub fn drm_type(&self) -> Option<&str> {
        self.drm_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Check if a license server is configured
    pub fn is_configured(&self) -> bool {
        self.license_url.is_some()
    }

    /// Build the encrypted media options handed to the backend
    ///
    /// Returns `None` when no license server is configured.
    pub fn to_eme_options(&self) -> Result<Option<EmeOptions>> {
        let Some(url) = self.license_url.clone() else {
            return Ok(None);
        };

        let drm_type = self.drm_type().ok_or_else(|| {
            Error::invalid_argument("DRM license url configured without a DRM type")
        })?;
        let system: DrmSystem = drm_type.parse()?;

        let mut key_systems = BTreeMap::new();
        key_systems.insert(
            system.key_system().to_string(),
            KeySystemConfig {
                url,
                license_headers: self.license_headers.clone(),
            },
        );

        Ok(Some(EmeOptions { key_systems }))
    }
}

/// Encrypted media extension options, keyed by key system identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmeOptions {
    pub key_systems: BTreeMap<String, KeySystemConfig>,
}

/// License acquisition settings for one key system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySystemConfig {
    pub url: Url,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub license_headers: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnlyWidevine;

    #[async_trait]
    impl KeySystemProber for OnlyWidevine {
        async fn request_access(&self, key_system: &str) -> Result<()> {
            if key_system == "com.widevine.alpha" {
                Ok(())
            } else {
                Err(Error::DrmNotSupported {
                    system: key_system.to_string(),
                })
            }
        }
    }

    #[test]
    fn test_drm_system_names() {
        assert_eq!(DrmSystem::from_name(" WideVine "), Some(DrmSystem::Widevine));
        assert_eq!(DrmSystem::from_name("PLAYREADY"), Some(DrmSystem::PlayReady));
        assert_eq!(DrmSystem::from_name("fairplay"), None);
        assert!("clearkey".parse::<DrmSystem>().is_err());
    }

    #[test]
    fn test_support_flags_are_shared_and_monotonic() {
        let support = PlatformDrmSupport::new();
        let shared = support.clone();
        assert!(!support.is_drm_type_supported("widevine"));

        shared.mark_supported(DrmSystem::Widevine);
        shared.mark_supported(DrmSystem::Widevine);

        assert!(support.is_drm_type_supported("Widevine"));
        assert!(!support.is_drm_type_supported("playready"));
        assert!(!support.is_drm_type_supported(""));
        assert_eq!(support.supported_systems(), vec![DrmSystem::Widevine]);
    }

    #[tokio::test]
    async fn test_probe() {
        let support = PlatformDrmSupport::new();
        support.probe(&OnlyWidevine).await;

        assert!(support.is_supported(DrmSystem::Widevine));
        assert!(!support.is_supported(DrmSystem::PlayReady));
    }

    #[test]
    fn test_eme_options() {
        let url = Url::parse("https://license.example.com/wv").unwrap();
        let config = DrmConfig::widevine(url.clone()).with_header("X-Token", "abc");

        let options = config.to_eme_options().unwrap().unwrap();
        let key_system = &options.key_systems["com.widevine.alpha"];
        assert_eq!(key_system.url, url);
        assert_eq!(key_system.license_headers["X-Token"], "abc");
    }

    #[test]
    fn test_eme_options_require_type() {
        let config = DrmConfig {
            license_url: Some(Url::parse("https://license.example.com").unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            config.to_eme_options(),
            Err(Error::InvalidArgument(_))
        ));

        let config = DrmConfig {
            drm_type: Some("fairplay".to_string()),
            ..config
        };
        assert!(matches!(
            config.to_eme_options(),
            Err(Error::DrmNotSupported { .. })
        ));

        assert!(DrmConfig::default().to_eme_options().unwrap().is_none());
    }

    #[test]
    fn test_drm_config_from_json() {
        let config: DrmConfig = serde_json::from_str(
            r#"{"type": "PlayReady", "license_url": "https://pr.example.com/rightsmanager.asmx"}"#,
        )
        .unwrap();
        assert_eq!(config.drm_type(), Some("PlayReady"));
        assert!(config.is_configured());
    }
}

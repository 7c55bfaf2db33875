//! Stream format registry
//!
//! Tracks which stream formats the player accepts and which DRM types each of
//! them may be combined with. DRM types are filtered against the platform's
//! capabilities when they are registered, so a type the platform cannot
//! decrypt never shows up as supported.

use crate::drm::DrmCapabilities;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Source MIME type for a format label
pub fn mime_type_for(format: &str) -> Option<&'static str> {
    match format.trim().to_ascii_lowercase().as_str() {
        "mp4" => Some("video/mp4"),
        "dash" => Some("application/dash+xml"),
        "hls" => Some("application/x-mpegURL"),
        _ => None,
    }
}

/// A registered stream format and the DRM types it supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormatInfo {
    format: String,
    drm_types: Vec<String>,
}

impl StreamFormatInfo {
    /// Format label as registered
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Supported DRM type labels, in registration order
    pub fn drm_types(&self) -> &[String] {
        &self.drm_types
    }

    /// Check a DRM type (trimmed, case-insensitive)
    pub fn has_drm_type(&self, drm_type: &str) -> bool {
        self.index_of_drm_type(drm_type).is_some()
    }

    /// Source MIME type for this format
    pub fn mime_type(&self) -> Option<&'static str> {
        mime_type_for(&self.format)
    }

    fn index_of_drm_type(&self, drm_type: &str) -> Option<usize> {
        let drm_type = drm_type.trim();
        if drm_type.is_empty() {
            return None;
        }
        self.drm_types
            .iter()
            .position(|t| t.eq_ignore_ascii_case(drm_type))
    }

    fn matches(&self, format: &str) -> bool {
        self.format.eq_ignore_ascii_case(format.trim())
    }
}

impl std::fmt::Display for StreamFormatInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format)?;
        if !self.drm_types.is_empty() {
            write!(f, " ({})", self.drm_types.join(", "))?;
        }
        Ok(())
    }
}

/// Registry of stream formats the player accepts
pub struct StreamFormatRegistry {
    formats: Vec<StreamFormatInfo>,
    drm: Arc<dyn DrmCapabilities>,
}

impl StreamFormatRegistry {
    /// Create an empty registry
    pub fn new(drm: Arc<dyn DrmCapabilities>) -> Self {
        Self {
            formats: Vec::new(),
            drm,
        }
    }

    /// Create a registry with DASH, HLS and MP4 registered
    pub fn with_defaults(drm: Arc<dyn DrmCapabilities>) -> Self {
        let mut registry = Self::new(drm);
        registry.register("DASH", ["PlayReady", "Widevine"]);
        registry.register("HLS", ["PlayReady", "Widevine"]);
        registry.register("MP4", [] as [&str; 0]);
        registry
    }

    /// Register a format with the DRM types it may be combined with
    ///
    /// DRM types the platform does not support are dropped. Returns `None`
    /// (and logs) for an empty format or one that is already registered.
    pub fn register<I, S>(&mut self, format: &str, drm_types: I) -> Option<&StreamFormatInfo>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let format = format.trim();
        if format.is_empty() {
            error!("Cannot register stream format with empty format");
            return None;
        }

        let mut accepted: Vec<String> = Vec::new();
        for drm_type in drm_types {
            let drm_type = drm_type.as_ref().trim();
            if drm_type.is_empty() {
                error!(format, "Skipping empty DRM type");
                continue;
            }
            if accepted.iter().any(|t| t.eq_ignore_ascii_case(drm_type)) {
                warn!(format, drm = drm_type, "DRM type already registered for format");
                continue;
            }
            if !self.drm.is_drm_type_supported(drm_type) {
                debug!(format, drm = drm_type, "DRM type not supported by platform");
                continue;
            }
            accepted.push(drm_type.to_string());
        }

        if let Some(existing) = self.get(format) {
            warn!(format = existing.format(), "Stream format already registered");
            return None;
        }

        self.formats.push(StreamFormatInfo {
            format: format.to_string(),
            drm_types: accepted,
        });
        self.formats.last()
    }

    /// Remove a format
    pub fn unregister(&mut self, format: &str) -> Option<StreamFormatInfo> {
        let index = self.index_of(format)?;
        Some(self.formats.remove(index))
    }

    /// Look up a format (trimmed, case-insensitive)
    pub fn get(&self, format: &str) -> Option<&StreamFormatInfo> {
        self.formats.iter().find(|f| f.matches(format))
    }

    /// Check if a format is registered
    pub fn contains(&self, format: &str) -> bool {
        self.get(format).is_some()
    }

    /// Check a format, optionally combined with a DRM type
    pub fn is_supported(&self, format: &str, drm_type: Option<&str>) -> bool {
        let Some(info) = self.get(format) else {
            return false;
        };

        match drm_type.map(str::trim).filter(|t| !t.is_empty()) {
            Some(drm_type) => info.has_drm_type(drm_type),
            None => true,
        }
    }

    /// Add a DRM type to a registered format
    pub fn add_drm_type(&mut self, format: &str, drm_type: &str) -> bool {
        let drm_type = drm_type.trim();
        if drm_type.is_empty() || !self.drm.is_drm_type_supported(drm_type) {
            return false;
        }

        let Some(index) = self.index_of(format) else {
            return false;
        };
        let info = &mut self.formats[index];
        if info.has_drm_type(drm_type) {
            return false;
        }
        info.drm_types.push(drm_type.to_string());
        true
    }

    /// Remove a DRM type from a registered format
    pub fn remove_drm_type(&mut self, format: &str, drm_type: &str) -> bool {
        let Some(index) = self.index_of(format) else {
            return false;
        };
        let info = &mut self.formats[index];
        match info.index_of_drm_type(drm_type) {
            Some(position) => {
                info.drm_types.remove(position);
                true
            }
            None => false,
        }
    }

    /// Remove every DRM type from a registered format
    pub fn clear_drm_types(&mut self, format: &str) -> bool {
        match self.index_of(format) {
            Some(index) => {
                self.formats[index].drm_types.clear();
                true
            }
            None => false,
        }
    }

    /// Remove every format
    pub fn clear(&mut self) {
        self.formats.clear();
    }

    /// Number of registered formats
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Check if no formats are registered
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Iterate registered formats in registration order
    pub fn iter(&self) -> impl Iterator<Item = &StreamFormatInfo> {
        self.formats.iter()
    }

    fn index_of(&self, format: &str) -> Option<usize> {
        let format = format.trim();
        if format.is_empty() {
            return None;
        }
        self.formats.iter().position(|f| f.matches(format))
    }
}

impl std::fmt::Debug for StreamFormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFormatRegistry")
            .field("formats", &self.formats)
            .finish_non_exhaustive()
    }
}

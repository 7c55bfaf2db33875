//! Error types for tvplay core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Misuse of the player: wrong lifecycle state, unsupported content, second instance
    Structural,
    /// Malformed argument, rejected before any side effect
    Validation,
    /// Failure reported by the media backend or one of its collaborators
    Backend,
}

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Lifecycle errors
    #[error("{player} not initialized")]
    NotInitialized { player: String },

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Cannot create more than one video player instance")]
    InstanceExists,

    #[error("{player} has been destroyed, create a new instance instead")]
    Destroyed { player: String },

    #[error("{player} is not supported on embedded platforms")]
    UnsupportedPlatform { player: String },

    #[error("Player dependencies failed to load: {0}")]
    DependencyLoad(String),

    // Format and DRM errors
    #[error("Unsupported stream format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Unsupported stream format: {format} with {drm} DRM")]
    UnsupportedDrm { format: String, drm: String },

    #[error("DRM not supported: {system}")]
    DrmNotSupported { system: String },

    #[error("DRM configuration failed: {0}")]
    DrmConfiguration(String),

    // Validation errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Backend errors
    #[error("Backend error: {message}")]
    Backend { code: Option<i64>, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a DRM configuration error
    pub fn drm(msg: impl Into<String>) -> Self {
        Error::DrmConfiguration(msg.into())
    }

    /// Create a backend error
    pub fn backend(code: Option<i64>, msg: impl Into<String>) -> Self {
        Error::Backend {
            code,
            message: msg.into(),
        }
    }

    /// Failure category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotInitialized { .. }
            | Error::InvalidStateTransition { .. }
            | Error::InstanceExists
            | Error::Destroyed { .. }
            | Error::UnsupportedPlatform { .. }
            | Error::UnsupportedFormat { .. }
            | Error::UnsupportedDrm { .. }
            | Error::DrmNotSupported { .. }
            | Error::DrmConfiguration(_) => ErrorKind::Structural,
            Error::InvalidArgument(_) | Error::InvalidConfig(_) | Error::Json(_) => {
                ErrorKind::Validation
            }
            Error::DependencyLoad(_) | Error::Backend { .. } | Error::Io(_) => ErrorKind::Backend,
        }
    }

    /// Returns the error code reported in notifications
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotInitialized { .. } => "NOT_INITIALIZED",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InstanceExists => "INSTANCE_EXISTS",
            Error::Destroyed { .. } => "DESTROYED",
            Error::UnsupportedPlatform { .. } => "PLATFORM_UNSUPPORTED",
            Error::DependencyLoad(_) => "DEPENDENCY_LOAD",
            Error::UnsupportedFormat { .. } => "FORMAT_UNSUPPORTED",
            Error::UnsupportedDrm { .. } => "FORMAT_DRM_UNSUPPORTED",
            Error::DrmNotSupported { .. } => "DRM_UNSUPPORTED",
            Error::DrmConfiguration(_) => "DRM_CONFIG",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Backend { .. } => "BACKEND",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InstanceExists.kind(), ErrorKind::Structural);
        assert_eq!(
            Error::invalid_argument("empty url").kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::backend(Some(4), "decode").kind(), ErrorKind::Backend);
    }

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedDrm {
            format: "DASH".to_string(),
            drm: "Widevine".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported stream format: DASH with Widevine DRM");
        assert_eq!(err.error_code(), "FORMAT_DRM_UNSUPPORTED");
    }
}

//! Core types for tvplay

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semantic version reported by the media backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PlayerVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first `major.minor.patch` occurrence in a version string
    ///
    /// Components have no leading zeros, except a lone `0`.
    pub fn parse(version: &str) -> Result<Self> {
        let bytes = version.as_bytes();
        let [major, minor, patch] = (0..bytes.len())
            .find_map(|start| version_spans(bytes, start))
            .ok_or_else(|| {
                Error::invalid_argument(format!("no semantic version found in {version:?}"))
            })?;

        let number = |(from, to): (usize, usize)| -> Result<u32> {
            version[from..to].parse().map_err(|_| {
                Error::invalid_argument(format!("version component out of range in {version:?}"))
            })
        };

        Ok(Self::new(number(major)?, number(minor)?, number(patch)?))
    }
}

/// Byte ranges of `major`, `minor` and `patch` if a version starts at `start`
fn version_spans(bytes: &[u8], start: usize) -> Option<[(usize, usize); 3]> {
    let major_end = component_end(bytes, start)?;
    if bytes.get(major_end) != Some(&b'.') {
        return None;
    }
    let minor_end = component_end(bytes, major_end + 1)?;
    if bytes.get(minor_end) != Some(&b'.') {
        return None;
    }
    let patch_end = component_end(bytes, minor_end + 1)?;

    Some([
        (start, major_end),
        (major_end + 1, minor_end),
        (minor_end + 1, patch_end),
    ])
}

/// End of a version component starting at `start`: a lone `0` or `[1-9][0-9]*`
fn component_end(bytes: &[u8], start: usize) -> Option<usize> {
    match bytes.get(start)? {
        b'0' => Some(start + 1),
        b'1'..=b'9' => Some(
            bytes[start..]
                .iter()
                .position(|b| !b.is_ascii_digit())
                .map_or(bytes.len(), |offset| start + offset),
        ),
        _ => None,
    }
}

impl std::str::FromStr for PlayerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for PlayerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Top-left corner of the video surface, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Dimensions of the video surface, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Placement of the video surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRectangle {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl VideoRectangle {
    /// Create a rectangle, rejecting negative dimensions
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self> {
        let width = u32::try_from(width)
            .map_err(|_| Error::invalid_argument(format!("negative video width {width}")))?;
        let height = u32::try_from(height)
            .map_err(|_| Error::invalid_argument(format!("negative video height {height}")))?;
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Build a rectangle from a position and size
    pub fn from_parts(position: Position, size: Size) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    /// `[x, y, width, height]`
    pub fn to_array(&self) -> [i64; 4] {
        [
            self.x.into(),
            self.y.into(),
            self.width.into(),
            self.height.into(),
        ]
    }
}

impl std::fmt::Display for VideoRectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "X: {} Y: {} W: {} H: {}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Timed metadata extracted from the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedMetadata {
    pub identifier: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Nickname reported alongside the player name
    pub nickname: Option<String>,
    /// Running on an embedded platform, where the web player is unavailable
    pub embedded: bool,
    /// Script resources the backend needs before the first player is created
    pub dependencies: Vec<String>,
    /// Register DASH, HLS and MP4 at construction
    pub register_default_formats: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            nickname: None,
            embedded: false,
            dependencies: vec!["video.js".to_string(), "videojs-contrib-eme.js".to_string()],
            register_default_formats: true,
        }
    }
}

impl PlayerConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dependencies.iter().any(|d| d.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "dependency resource names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

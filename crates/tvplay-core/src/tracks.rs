//! Audio and text track types, and the external text-track queue
//!
//! External text tracks requested before content has loaded are queued and
//! handed to the backend in insertion order once the player reaches `Loaded`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// Prefix of generated external text track ids
pub const EXTERNAL_TRACK_PREFIX: &str = "external";

/// Text track types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackKind {
    /// Closed captions (includes speaker identification, sound effects)
    Captions,
    /// Subtitles (dialogue translation)
    Subtitles,
    /// Audio descriptions for visually impaired
    Descriptions,
    /// Chapter titles
    Chapters,
    /// Metadata track
    Metadata,
}

impl TextTrackKind {
    /// Captions and subtitles are the only kinds a viewer can select
    pub fn is_selectable(&self) -> bool {
        matches!(self, TextTrackKind::Captions | TextTrackKind::Subtitles)
    }
}

impl std::str::FromStr for TextTrackKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "captions" => Ok(TextTrackKind::Captions),
            "subtitles" => Ok(TextTrackKind::Subtitles),
            "descriptions" => Ok(TextTrackKind::Descriptions),
            "chapters" => Ok(TextTrackKind::Chapters),
            "metadata" => Ok(TextTrackKind::Metadata),
            other => Err(Error::invalid_argument(format!(
                "unknown text track kind {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for TextTrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextTrackKind::Captions => write!(f, "captions"),
            TextTrackKind::Subtitles => write!(f, "subtitles"),
            TextTrackKind::Descriptions => write!(f, "descriptions"),
            TextTrackKind::Chapters => write!(f, "chapters"),
            TextTrackKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// Text track display mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackMode {
    #[default]
    Disabled,
    Hidden,
    Showing,
}

impl std::fmt::Display for TextTrackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextTrackMode::Disabled => write!(f, "disabled"),
            TextTrackMode::Hidden => write!(f, "hidden"),
            TextTrackMode::Showing => write!(f, "showing"),
        }
    }
}

/// Audio track as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeAudioTrack {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub language: String,
    pub enabled: bool,
}

/// Text track as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeTextTrack {
    pub id: String,
    pub kind: TextTrackKind,
    pub mode: TextTrackMode,
    pub label: String,
    pub language: String,
    pub default: bool,
    pub src: Option<String>,
}

impl NativeTextTrack {
    pub fn new(id: impl Into<String>, kind: TextTrackKind, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            mode: TextTrackMode::Disabled,
            label: String::new(),
            language: language.into(),
            default: false,
            src: None,
        }
    }
}

fn track_title(label: &str, language: &str, index: usize) -> String {
    if !label.is_empty() {
        label.to_string()
    } else if !language.is_empty() {
        language.to_string()
    } else {
        index.to_string()
    }
}

/// Audio track as reported to the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrackInfo {
    /// Index in the backend's audio track list
    pub id: usize,
    pub original_id: String,
    pub kind: String,
    pub label: String,
    pub language: String,
    pub active: bool,
    /// Label, else language, else index
    pub title: String,
}

impl AudioTrackInfo {
    pub fn from_native(index: usize, track: &NativeAudioTrack) -> Self {
        Self {
            id: index,
            original_id: track.id.clone(),
            kind: track.kind.clone(),
            label: track.label.clone(),
            language: track.language.clone(),
            active: track.enabled,
            title: track_title(&track.label, &track.language, index),
        }
    }
}

/// Text track as reported to the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTrackInfo {
    /// Index in the backend's text track list
    pub id: usize,
    pub original_id: String,
    pub kind: TextTrackKind,
    pub mode: TextTrackMode,
    pub label: String,
    pub language: String,
    pub default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    pub active: bool,
    pub title: String,
}

impl TextTrackInfo {
    pub fn from_native(index: usize, track: &NativeTextTrack) -> Self {
        Self {
            id: index,
            original_id: track.id.clone(),
            kind: track.kind,
            mode: track.mode,
            label: track.label.clone(),
            language: track.language.clone(),
            default: track.default,
            src: track.src.clone(),
            active: track.mode == TextTrackMode::Showing,
            title: track_title(&track.label, &track.language, index),
        }
    }
}

/// Request to attach an out-of-band text track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalTextTrackRequest {
    pub url: String,
    pub language: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub format: String,
    #[serde(default)]
    pub enable: Option<bool>,
}

impl ExternalTextTrackRequest {
    pub fn new(url: &str, language: &str, format: &str) -> Self {
        Self {
            url: url.to_string(),
            language: language.to_string(),
            format: format.to_string(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn enabled(mut self, enable: bool) -> Self {
        self.enable = Some(enable);
        self
    }

    /// Validate and normalize the request
    ///
    /// A missing type defaults to captions, a missing label to empty and a
    /// missing enable flag to `true`.
    pub fn validate(&self) -> Result<ExternalTextTrack> {
        let url = required(&self.url, "url")?;
        let language = required(&self.language, "language")?;
        let format = required(&self.format, "format")?;

        let kind = match self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(kind) => kind.parse()?,
            None => {
                warn!("Missing external text track type, defaulting to captions");
                TextTrackKind::Captions
            }
        };

        Ok(ExternalTextTrack {
            url,
            language,
            label: self
                .label
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            kind,
            format,
            enable: self.enable.unwrap_or(true),
        })
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid_argument(format!(
            "missing or invalid external text track {field}"
        )));
    }
    Ok(value.to_string())
}

/// A validated external text track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTextTrack {
    url: String,
    language: String,
    label: String,
    kind: TextTrackKind,
    format: String,
    enable: bool,
}

impl ExternalTextTrack {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> TextTrackKind {
        self.kind
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn is_enabled(&self) -> bool {
        self.enable
    }

    /// Backend descriptor for this track under a generated id
    pub fn to_remote(&self, id: String) -> RemoteTextTrack {
        RemoteTextTrack {
            id,
            kind: self.kind,
            mode: if self.enable {
                TextTrackMode::Showing
            } else {
                TextTrackMode::Disabled
            },
            label: self.label.clone(),
            language: self.language.clone(),
            src: self.url.clone(),
        }
    }
}

/// Text track handed to the backend for out-of-band loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTextTrack {
    pub id: String,
    pub kind: TextTrackKind,
    pub mode: TextTrackMode,
    pub label: String,
    pub language: String,
    pub src: String,
}

/// External text tracks waiting for content to load
#[derive(Debug, Clone, Default)]
pub struct TextTrackQueue {
    entries: VecDeque<ExternalTextTrack>,
}

impl TextTrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: ExternalTextTrack) {
        self.entries.push_back(track);
    }

    /// Take every queued track in insertion order, leaving the queue empty
    pub fn drain(&mut self) -> Vec<ExternalTextTrack> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generator for `external<N>` track ids
#[derive(Debug, Clone)]
pub struct ExternalTrackIds {
    next: u32,
}

impl Default for ExternalTrackIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl ExternalTrackIds {
    pub fn next_id(&mut self) -> String {
        let id = format!("{EXTERNAL_TRACK_PREFIX}{}", self.next);
        self.next += 1;
        id
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}

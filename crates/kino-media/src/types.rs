//! Core types for Kino Media

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source type sentinel: the MIME type is unknown and must be probed.
pub const UNKNOWN_TYPE: &str = "?";

/// Source type sentinel: the MIME type was probed and is still unknown.
pub const UNRESOLVED_TYPE: &str = "??";

/// Unique identifier for a player session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A playable source candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    /// Locator (URL, path or `blob:` reference)
    pub src: String,
    /// MIME type, or one of the [`UNKNOWN_TYPE`] / [`UNRESOLVED_TYPE`] sentinels
    #[serde(rename = "type", default)]
    pub mime: String,
}

impl Source {
    /// Create a source with a known MIME type
    pub fn new(src: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mime: mime.into(),
        }
    }

    /// Create a source whose type must be probed
    pub fn unknown(src: impl Into<String>) -> Self {
        Self::new(src, UNKNOWN_TYPE)
    }

    /// Fill in the type sentinel for sources declared without a type.
    ///
    /// Blob references never need probing: they resolve to `video/object`.
    pub fn normalized(mut self) -> Self {
        if self.is_blob() && (self.mime.is_empty() || self.mime == UNKNOWN_TYPE) {
            self.mime = "video/object".to_string();
        } else if self.mime.is_empty() && !self.src.is_empty() {
            self.mime = UNKNOWN_TYPE.to_string();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    pub fn is_blob(&self) -> bool {
        self.src.starts_with("blob:")
    }

    /// True while the type still needs probing
    pub fn needs_probe(&self) -> bool {
        self.mime == UNKNOWN_TYPE
    }

    /// The MIME type, or `None` for sentinels and empty types
    pub fn known_type(&self) -> Option<&str> {
        match self.mime.as_str() {
            "" | UNKNOWN_TYPE | UNRESOLVED_TYPE => None,
            mime => Some(mime),
        }
    }

    /// Lower-cased locator without query string or fragment
    pub(crate) fn path(&self) -> String {
        let end = self.src.find(['?', '#']).unwrap_or(self.src.len());
        self.src[..end].to_lowercase()
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.mime.is_empty() {
            write!(f, "{}", self.src)
        } else {
            write!(f, "{} ({})", self.src, self.mime)
        }
    }
}

impl From<&str> for Source {
    fn from(src: &str) -> Self {
        Source::new(src, "").normalized()
    }
}

/// Media type derived from the selected loader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    #[default]
    Unknown,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
            MediaType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Stream classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamType {
    #[default]
    Unknown,
    OnDemand,
    Live,
    LiveDvr,
    LowLatencyLive,
    LowLatencyLiveDvr,
}

impl StreamType {
    pub fn is_live(&self) -> bool {
        !matches!(self, StreamType::Unknown | StreamType::OnDemand)
    }

    pub fn is_low_latency(&self) -> bool {
        matches!(
            self,
            StreamType::LowLatencyLive | StreamType::LowLatencyLiveDvr
        )
    }

    pub fn has_dvr(&self) -> bool {
        matches!(self, StreamType::LiveDvr | StreamType::LowLatencyLiveDvr)
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Unknown => write!(f, "unknown"),
            StreamType::OnDemand => write!(f, "on-demand"),
            StreamType::Live => write!(f, "live"),
            StreamType::LiveDvr => write!(f, "live:dvr"),
            StreamType::LowLatencyLive => write!(f, "ll-live"),
            StreamType::LowLatencyLiveDvr => write!(f, "ll-live:dvr"),
        }
    }
}

/// How an engine-level quality change takes effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitySwitch {
    /// Switch immediately, flushing the buffer
    #[default]
    Current,
    /// Switch at the next fragment boundary
    Next,
    /// Switch for the next loaded fragment without flushing
    Load,
}

impl std::fmt::Display for QualitySwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualitySwitch::Current => write!(f, "current"),
            QualitySwitch::Next => write!(f, "next"),
            QualitySwitch::Load => write!(f, "load"),
        }
    }
}

/// Kind of playback provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Video,
    Audio,
    Hls,
    Dash,
    YouTube,
    Vimeo,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Video => write!(f, "video"),
            ProviderKind::Audio => write!(f, "audio"),
            ProviderKind::Hls => write!(f, "hls"),
            ProviderKind::Dash => write!(f, "dash"),
            ProviderKind::YouTube => write!(f, "youtube"),
            ProviderKind::Vimeo => write!(f, "vimeo"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns quality tier name
    pub fn quality_name(&self) -> &'static str {
        match self.height {
            0..=240 => "240p",
            241..=360 => "360p",
            361..=480 => "480p",
            481..=720 => "720p",
            721..=1080 => "1080p",
            1081..=1440 => "1440p",
            _ => "4K",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Text track type (captions, subtitles, descriptions)
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
    /// Captions and subtitles share one "showing" slot
    pub fn is_caption(&self) -> bool {
        matches!(self, TextTrackKind::Captions | TextTrackKind::Subtitles)
    }

    /// Parse a kind name, case-insensitively
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "captions" | "closed-captions" => Some(TextTrackKind::Captions),
            "subtitles" => Some(TextTrackKind::Subtitles),
            "descriptions" => Some(TextTrackKind::Descriptions),
            "chapters" => Some(TextTrackKind::Chapters),
            "metadata" => Some(TextTrackKind::Metadata),
            _ => None,
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

/// Text track rendering mode
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

/// Individual cue within a text track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCue {
    /// Cue identifier
    pub id: String,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// Cue text content (may contain markup)
    pub text: String,
}

impl TextCue {
    /// Create a new text cue
    pub fn new(
        id: impl Into<String>,
        start_time: f64,
        end_time: f64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Duration of this cue in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Check if cue should be displayed at given time
    pub fn is_active_at(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time
    }
}

/// Player-level error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaError {
    /// Stable error code (see [`crate::Error::error_code`])
    pub code: String,
    pub message: String,
    pub fatal: bool,
}

impl MediaError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, fatal: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fatal,
        }
    }
}

impl From<&crate::Error> for MediaError {
    fn from(err: &crate::Error) -> Self {
        MediaError::new(err.error_code(), err.to_string(), !err.is_recoverable())
    }
}

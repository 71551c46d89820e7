//! Source resolver: turns a locator into a uniform [`IngestedAudio`].
//!
//! Each source kind has its own [`AudioSource`]. None of them touch
//! persistent storage; the staging store owns that.

mod audio_platform;
mod direct_url;
mod transcode;
mod video_platform;

pub use audio_platform::{AudioPlatformConfig, AudioPlatformSource, TrackSlug};
pub use direct_url::DirectUrlSource;
pub use transcode::Transcoder;
pub use video_platform::{
    is_video_platform_url, ClientIdentityStrategy, ExtractionStrategy, PlayerClient,
    VideoDownloadEngine, VideoFetch, VideoMetadata, VideoPlatformSource, YtDlpEngine,
};

use crate::staging::FileHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    DirectUrl,
    VideoPlatform,
    AudioPlatform,
    Upload,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectUrl => "direct-url",
            Self::VideoPlatform => "video-platform",
            Self::AudioPlatform => "audio-platform",
            Self::Upload => "upload",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct-url" => Some(Self::DirectUrl),
            "video-platform" => Some(Self::VideoPlatform),
            "audio-platform" => Some(Self::AudioPlatform),
            "upload" => Some(Self::Upload),
            _ => None,
        }
    }

    /// Whether the audio came from outside the user's own machine.
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::Upload)
    }
}

/// Audio fetched from a source, not yet staged.
#[derive(Clone, PartialEq)]
pub struct IngestedAudio {
    pub bytes: Vec<u8>,
    pub source_kind: SourceKind,
    pub extracted_title: Option<String>,
    pub extracted_artist: Option<String>,
    pub extracted_cover_art_ref: Option<String>,
    pub duration_seconds: Option<f64>,
    /// Container format as a file extension (`mp3`, `flac`, ...), when known.
    pub container: Option<String>,
}

impl IngestedAudio {
    pub fn new(bytes: Vec<u8>, source_kind: SourceKind) -> Self {
        Self {
            bytes,
            source_kind,
            extracted_title: None,
            extracted_artist: None,
            extracted_cover_art_ref: None,
            duration_seconds: None,
            container: None,
        }
    }
}

impl std::fmt::Debug for IngestedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestedAudio")
            .field("bytes", &self.bytes.len())
            .field("source_kind", &self.source_kind)
            .field("extracted_title", &self.extracted_title)
            .field("extracted_artist", &self.extracted_artist)
            .field("extracted_cover_art_ref", &self.extracted_cover_art_ref)
            .field("duration_seconds", &self.duration_seconds)
            .field("container", &self.container)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{stage} failed: {message}")]
    Upstream { stage: String, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Source not configured: {0}")]
    NotConfigured(String),
}

impl ResolveError {
    pub fn upstream(stage: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Upstream {
            stage: stage.into(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
pub trait AudioSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, locator: &str) -> Result<IngestedAudio, ResolveError>;
}

/// Dispatches a locator to the source registered for its kind.
pub struct SourceResolver {
    sources: Vec<Arc<dyn AudioSource>>,
}

impl SourceResolver {
    pub fn new(sources: Vec<Arc<dyn AudioSource>>) -> Self {
        Self { sources }
    }

    pub async fn resolve(
        &self,
        kind: SourceKind,
        locator: &str,
    ) -> Result<IngestedAudio, ResolveError> {
        if kind == SourceKind::Upload {
            return Err(ResolveError::InvalidSource(
                "uploads are sent as files, not locators".to_string(),
            ));
        }

        let locator = locator.trim();
        if locator.is_empty() {
            return Err(ResolveError::InvalidSource("empty locator".to_string()));
        }

        let source = self
            .sources
            .iter()
            .find(|s| s.kind() == kind)
            .ok_or_else(|| ResolveError::NotConfigured(format!("no {} source", kind.as_str())))?;

        let mut audio = source.fetch(locator).await?;
        audio.source_kind = kind;
        Ok(audio)
    }
}

fn container_of_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime.to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        "audio/aac" | "audio/x-aac" => Some("aac"),
        "audio/x-ms-wma" => Some("wma"),
        _ => None,
    }
}

/// Container of fetched audio: the file extension when it is a known audio
/// one, then the content type, then the bytes themselves.
pub fn detect_container(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Option<String> {
    if let Some(name) = file_name.filter(|n| FileHandler::is_supported_audio(n)) {
        return crate::staging::extension_of(name);
    }
    if let Some(container) = content_type.and_then(container_of_content_type) {
        return Some(container.to_string());
    }
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Audio)
        .map(|kind| kind.extension().to_string())
}

/// Read a response body, failing as soon as it grows past `max` bytes.
pub(crate) async fn read_capped(
    mut response: reqwest::Response,
    max: u64,
    stage: &str,
) -> Result<Vec<u8>, ResolveError> {
    if let Some(len) = response.content_length() {
        if len > max {
            return Err(ResolveError::PayloadTooLarge { size: len, max });
        }
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ResolveError::upstream(stage, e))?
    {
        let size = (bytes.len() + chunk.len()) as u64;
        if size > max {
            return Err(ResolveError::PayloadTooLarge { size, max });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

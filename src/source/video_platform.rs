//! Video-hosting platform links.
//!
//! Extraction is tried once per client identity, in a fixed order, until
//! one attempt yields both metadata and an audio track. The downloaded
//! container is then transcoded to the pipeline's canonical format.

use super::{AudioSource, IngestedAudio, ResolveError, SourceKind, Transcoder};
use crate::media::{MediaEngine, OutputEncoding};
use crate::staging::FileHandler;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const STAGE: &str = "video-platform extraction";

lazy_static! {
    static ref VIDEO_URL: Regex = Regex::new(
        r"^https?://(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|embed/|live/)|youtu\.be/)[A-Za-z0-9_-]{11}(?:[?&#/].*)?$"
    )
    .expect("video URL pattern is valid");
}

pub fn is_video_platform_url(locator: &str) -> bool {
    VIDEO_URL.is_match(locator)
}

/// Client identity presented to the platform during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerClient {
    Web,
    Mobile,
    EmbeddedTv,
}

impl PlayerClient {
    /// Attempt order.
    pub const FALLBACK_ORDER: [PlayerClient; 3] =
        [PlayerClient::Web, PlayerClient::Mobile, PlayerClient::EmbeddedTv];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mweb",
            Self::EmbeddedTv => "tv_embedded",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub duration_seconds: Option<f64>,
    pub thumbnail: Option<String>,
}

/// Subset of yt-dlp's `--dump-single-json` output.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

impl From<YtDlpInfo> for VideoMetadata {
    fn from(info: YtDlpInfo) -> Self {
        Self {
            title: info.title,
            author: info.uploader.or(info.channel),
            duration_seconds: info.duration,
            thumbnail: info.thumbnail,
        }
    }
}

/// Black-box download engine for the platform.
#[async_trait]
pub trait VideoDownloadEngine: Send + Sync {
    async fn fetch_metadata(
        &self,
        locator: &str,
        client: PlayerClient,
    ) -> anyhow::Result<VideoMetadata>;

    /// Best available audio track, in whatever container the platform serves.
    async fn fetch_audio_bytes(&self, locator: &str, client: PlayerClient)
        -> anyhow::Result<Vec<u8>>;
}

pub struct VideoFetch {
    pub metadata: VideoMetadata,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> String;

    async fn attempt(&self, locator: &str) -> anyhow::Result<VideoFetch>;
}

/// Extraction under one spoofed client identity.
pub struct ClientIdentityStrategy {
    engine: Arc<dyn VideoDownloadEngine>,
    client: PlayerClient,
}

impl ClientIdentityStrategy {
    pub fn new(engine: Arc<dyn VideoDownloadEngine>, client: PlayerClient) -> Self {
        Self { engine, client }
    }

    /// One strategy per client, in fallback order.
    pub fn fallback_chain(engine: Arc<dyn VideoDownloadEngine>) -> Vec<Box<dyn ExtractionStrategy>> {
        PlayerClient::FALLBACK_ORDER
            .iter()
            .map(|client| {
                Box::new(ClientIdentityStrategy::new(engine.clone(), *client))
                    as Box<dyn ExtractionStrategy>
            })
            .collect()
    }
}

#[async_trait]
impl ExtractionStrategy for ClientIdentityStrategy {
    fn name(&self) -> String {
        format!("client:{}", self.client.as_str())
    }

    async fn attempt(&self, locator: &str) -> anyhow::Result<VideoFetch> {
        let metadata = self.engine.fetch_metadata(locator, self.client).await?;
        let bytes = self.engine.fetch_audio_bytes(locator, self.client).await?;
        if bytes.is_empty() {
            anyhow::bail!("empty audio stream");
        }
        Ok(VideoFetch { metadata, bytes })
    }
}

pub struct VideoPlatformSource {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    transcoder: Transcoder,
}

impl VideoPlatformSource {
    pub fn new(
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        media: Arc<dyn MediaEngine>,
        files: Arc<FileHandler>,
        encoding: OutputEncoding,
    ) -> Self {
        Self {
            strategies,
            transcoder: Transcoder::new(media, files, encoding),
        }
    }

    async fn extract(&self, locator: &str) -> Result<VideoFetch, ResolveError> {
        let mut last_error: Option<anyhow::Error> = None;

        for strategy in &self.strategies {
            match strategy.attempt(locator).await {
                Ok(fetch) => {
                    debug!("Extraction via {} succeeded", strategy.name());
                    return Ok(fetch);
                }
                Err(e) => {
                    warn!("Extraction via {} failed: {:#}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => ResolveError::upstream(STAGE, format!("{:#}", e)),
            None => ResolveError::NotConfigured("no extraction strategies".to_string()),
        })
    }

    async fn transcode(&self, bytes: &[u8]) -> Result<Vec<u8>, ResolveError> {
        self.transcoder
            .transcode(bytes, None)
            .await
            .map_err(|e| ResolveError::upstream("video-platform transcode", e))
    }
}

#[async_trait]
impl AudioSource for VideoPlatformSource {
    fn kind(&self) -> SourceKind {
        SourceKind::VideoPlatform
    }

    async fn fetch(&self, locator: &str) -> Result<IngestedAudio, ResolveError> {
        if !is_video_platform_url(locator) {
            return Err(ResolveError::InvalidSource(format!(
                "not a video platform URL: {}",
                locator
            )));
        }

        let fetch = self.extract(locator).await?;
        let bytes = self.transcode(&fetch.bytes).await?;
        info!(
            "Extracted {:?} ({} bytes after transcode)",
            fetch.metadata.title,
            bytes.len()
        );

        let mut audio = IngestedAudio::new(bytes, SourceKind::VideoPlatform);
        audio.extracted_title = fetch.metadata.title;
        audio.extracted_artist = fetch.metadata.author;
        audio.extracted_cover_art_ref = fetch.metadata.thumbnail;
        audio.duration_seconds = fetch.metadata.duration_seconds;
        audio.container = Some(self.transcoder.encoding().extension.clone());
        Ok(audio)
    }
}

/// [`VideoDownloadEngine`] backed by the yt-dlp binary.
pub struct YtDlpEngine {
    binary: PathBuf,
    timeout: Duration,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn base_args(client: PlayerClient) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", client.as_str()),
        ]
    }

    async fn run(&self, args: Vec<String>, locator: &str) -> anyhow::Result<Vec<u8>> {
        let child = Command::new(&self.binary)
            .args(&args)
            .arg(locator)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| anyhow::anyhow!("yt-dlp timed out after {:?}", self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp exited with {}: {}", output.status, stderr.trim());
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl VideoDownloadEngine for YtDlpEngine {
    async fn fetch_metadata(
        &self,
        locator: &str,
        client: PlayerClient,
    ) -> anyhow::Result<VideoMetadata> {
        let mut args = Self::base_args(client);
        args.push("--dump-single-json".to_string());
        args.push("--skip-download".to_string());

        let stdout = self.run(args, locator).await?;
        let info: YtDlpInfo = serde_json::from_slice(&stdout)?;
        Ok(info.into())
    }

    async fn fetch_audio_bytes(
        &self,
        locator: &str,
        client: PlayerClient,
    ) -> anyhow::Result<Vec<u8>> {
        let mut args = Self::base_args(client);
        args.extend(["-f", "bestaudio", "-o", "-"].map(String::from));
        self.run(args, locator).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_url_pattern() {
        assert!(is_video_platform_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_video_platform_url(
            "https://youtube.com/watch?list=PL1&v=dQw4w9WgXcQ&t=10"
        ));
        assert!(is_video_platform_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_video_platform_url("https://m.youtube.com/shorts/dQw4w9WgXcQ"));
        assert!(!is_video_platform_url("https://vimeo.com/123456"));
        assert!(!is_video_platform_url("https://www.youtube.com/watch?v=short"));
        assert!(!is_video_platform_url("ftp://youtu.be/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_fallback_order() {
        let names: Vec<&str> = PlayerClient::FALLBACK_ORDER
            .iter()
            .map(|c| c.as_str())
            .collect();
        assert_eq!(names, vec!["web", "mweb", "tv_embedded"]);
    }

    #[test]
    fn test_metadata_accepts_ytdlp_field_names() {
        let json = r#"{"title": "Song", "uploader": "Band", "channel": "Band TV", "duration": 212.5, "thumbnail": "https://i.example/t.jpg"}"#;
        let info: YtDlpInfo = serde_json::from_str(json).unwrap();
        let metadata = VideoMetadata::from(info);
        assert_eq!(metadata.author.as_deref(), Some("Band"));
        assert_eq!(metadata.duration_seconds, Some(212.5));
    }

    #[test]
    fn test_ytdlp_args_carry_client() {
        let args = YtDlpEngine::base_args(PlayerClient::EmbeddedTv);
        assert!(args.contains(&"youtube:player_client=tv_embedded".to_string()));
    }
}

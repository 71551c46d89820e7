//! Third-party audio platform links (`https://<site>/<artist>/<track>`).
//!
//! The public API is tried without credentials first. A `401` is retried
//! once with the configured API token. Stream URLs handed out by the
//! platform expire within seconds, so the audio request is issued
//! straight after the track lookup.

use super::{detect_container, read_capped, AudioSource, IngestedAudio, ResolveError, SourceKind};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

const STAGE: &str = "audio-platform";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioPlatformConfig {
    pub api_base_url: String,
    /// Host of human-readable track pages, e.g. `soundcloud.com`.
    pub site_host: String,
    pub client_id: Option<String>,
    /// Enables the signed fallback on `401`.
    pub api_token: Option<String>,
}

/// Artist/track pair parsed out of a track page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSlug {
    pub artist: String,
    pub track: String,
}

impl TrackSlug {
    pub fn parse(locator: &str, site_host: &str) -> Result<Self, ResolveError> {
        let invalid = |why: &str| ResolveError::InvalidSource(format!("{}: {}", locator, why));

        let url = Url::parse(locator).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("unsupported URL scheme"));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host = host
            .strip_prefix("www.")
            .or_else(|| host.strip_prefix("m."))
            .unwrap_or(&host);
        if !host.eq_ignore_ascii_case(site_host) {
            return Err(invalid("not a track page of the audio platform"));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let decode = |segment: &str| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .map_err(|_| invalid("path is not valid UTF-8"))
        };
        match segments.as_slice() {
            [artist, track] => Ok(Self {
                artist: decode(artist)?,
                track: decode(track)?,
            }),
            _ => Err(invalid("expected /<artist>/<track>")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlatformUser {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlatformTrack {
    title: Option<String>,
    user: Option<PlatformUser>,
    /// Milliseconds.
    duration: Option<u64>,
    artwork_url: Option<String>,
    stream_url: Option<String>,
}

pub struct AudioPlatformSource {
    client: reqwest::Client,
    config: AudioPlatformConfig,
    max_bytes: u64,
}

impl AudioPlatformSource {
    pub fn new(client: reqwest::Client, config: AudioPlatformConfig, max_bytes: u64) -> Self {
        let mut config = config;
        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        Self {
            client,
            config,
            max_bytes,
        }
    }

    fn track_url(&self, slug: &TrackSlug) -> String {
        let mut url = format!(
            "{}/tracks/{}/{}",
            self.config.api_base_url,
            urlencoding::encode(&slug.artist),
            urlencoding::encode(&slug.track)
        );
        if let Some(client_id) = &self.config.client_id {
            url.push_str(&format!("?client_id={}", urlencoding::encode(client_id)));
        }
        url
    }

    fn signed(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("OAuth {}", token)),
            None => request,
        }
    }

    async fn lookup(
        &self,
        slug: &TrackSlug,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ResolveError> {
        let request = self.signed(self.client.get(self.track_url(slug)), token);
        request
            .send()
            .await
            .map_err(|e| ResolveError::upstream(STAGE, e))
    }
}

#[async_trait]
impl AudioSource for AudioPlatformSource {
    fn kind(&self) -> SourceKind {
        SourceKind::AudioPlatform
    }

    async fn fetch(&self, locator: &str) -> Result<IngestedAudio, ResolveError> {
        if self.config.api_base_url.is_empty() || self.config.site_host.is_empty() {
            return Err(ResolveError::NotConfigured(
                "audio platform API is not configured".to_string(),
            ));
        }
        let slug = TrackSlug::parse(locator, &self.config.site_host)?;

        let mut token: Option<&str> = None;
        let mut response = self.lookup(&slug, None).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            token = self.config.api_token.as_deref();
            if token.is_none() {
                return Err(ResolveError::NotConfigured(
                    "the audio platform requires authentication but no API token is configured"
                        .to_string(),
                ));
            }
            debug!("Unauthenticated lookup rejected, retrying signed");
            response = self.lookup(&slug, token).await?;
        }

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(ResolveError::NotFound(format!(
                    "{}/{}",
                    slug.artist, slug.track
                )))
            }
            s => return Err(ResolveError::upstream(STAGE, format!("track lookup status {}", s))),
        }

        let track: PlatformTrack = response
            .json()
            .await
            .map_err(|e| ResolveError::upstream(STAGE, format!("invalid track response: {}", e)))?;
        let stream_url = track
            .stream_url
            .clone()
            .ok_or_else(|| ResolveError::upstream(STAGE, "track has no stream URL"))?;

        let stream = self
            .signed(self.client.get(&stream_url), token)
            .send()
            .await
            .map_err(|e| ResolveError::upstream(STAGE, e))?;
        if !stream.status().is_success() {
            return Err(ResolveError::upstream(
                STAGE,
                format!("stream status {}", stream.status()),
            ));
        }
        let content_type = stream
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = read_capped(stream, self.max_bytes, STAGE).await?;

        info!(
            "Fetched {}/{} from the audio platform ({} bytes)",
            slug.artist,
            slug.track,
            bytes.len()
        );

        let mut audio = IngestedAudio::new(bytes, SourceKind::AudioPlatform);
        audio.extracted_title = track.title;
        audio.extracted_artist = track.user.and_then(|u| u.username);
        audio.extracted_cover_art_ref = track.artwork_url;
        audio.duration_seconds = track.duration.map(|ms| ms as f64 / 1000.0);
        audio.container = detect_container(None, content_type.as_deref(), &audio.bytes);
        Ok(audio)
    }
}

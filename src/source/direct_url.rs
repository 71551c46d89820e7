//! Plain HTTP(S) links to an audio file.

use super::{detect_container, read_capped, AudioSource, IngestedAudio, ResolveError, SourceKind};
use crate::staging::{extension_of, FileHandler};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::{debug, info};

const STAGE: &str = "direct-url download";

pub struct DirectUrlSource {
    client: reqwest::Client,
    max_bytes: u64,
}

impl DirectUrlSource {
    pub fn new(client: reqwest::Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }

    fn parse_url(locator: &str) -> Result<Url, ResolveError> {
        let url = Url::parse(locator)
            .map_err(|e| ResolveError::InvalidSource(format!("{}: {}", locator, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ResolveError::InvalidSource(format!(
                "unsupported URL scheme '{}'",
                other
            ))),
        }
    }

    fn file_name(url: &Url) -> Option<String> {
        let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
        let decoded = urlencoding::decode(last).ok()?;
        Some(decoded.into_owned())
    }

    fn title_from(file_name: &str) -> Option<String> {
        let stem = std::path::Path::new(file_name).file_stem()?.to_str()?;
        let title = stem.replace(['_', '-'], " ").trim().to_string();
        (!title.is_empty()).then_some(title)
    }

    fn is_audio_content_type(content_type: &str) -> bool {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        mime.starts_with("audio/") || mime == "application/ogg"
    }
}

#[async_trait]
impl AudioSource for DirectUrlSource {
    fn kind(&self) -> SourceKind {
        SourceKind::DirectUrl
    }

    async fn fetch(&self, locator: &str) -> Result<IngestedAudio, ResolveError> {
        let url = Self::parse_url(locator)?;
        let file_name = Self::file_name(&url);
        let audio_extension = file_name
            .as_deref()
            .map(FileHandler::is_supported_audio)
            .unwrap_or(false);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ResolveError::upstream(STAGE, e))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(ResolveError::NotFound(url.to_string())),
            s => return Err(ResolveError::upstream(STAGE, format!("status {}", s))),
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let audio_content_type = content_type
            .as_deref()
            .map(Self::is_audio_content_type)
            .unwrap_or(false);

        let bytes = read_capped(response, self.max_bytes, STAGE).await?;

        if !audio_extension && !audio_content_type {
            // Neither the name nor the server vouch for it; sniff the bytes.
            let sniffed = infer::get(&bytes);
            if !matches!(sniffed.map(|k| k.matcher_type()), Some(infer::MatcherType::Audio)) {
                return Err(ResolveError::UnsupportedFormat(format!(
                    "{} is not audio (content-type: {}, extension: {})",
                    url,
                    content_type.as_deref().unwrap_or("none"),
                    file_name
                        .as_deref()
                        .and_then(extension_of)
                        .unwrap_or_else(|| "none".to_string())
                )));
            }
            debug!("Accepted {} by content sniffing", url);
        }

        info!("Fetched {} bytes from {}", bytes.len(), url);

        let container = detect_container(file_name.as_deref(), content_type.as_deref(), &bytes);
        let mut audio = IngestedAudio::new(bytes, SourceKind::DirectUrl);
        audio.extracted_title = file_name.as_deref().and_then(Self::title_from);
        audio.container = container;
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(matches!(
            DirectUrlSource::parse_url("ftp://example.com/a.mp3"),
            Err(ResolveError::InvalidSource(_))
        ));
        assert!(matches!(
            DirectUrlSource::parse_url("not a url"),
            Err(ResolveError::InvalidSource(_))
        ));
        assert!(DirectUrlSource::parse_url("https://example.com/a.mp3").is_ok());
    }

    #[test]
    fn test_title_from_url_file_name() {
        let url = Url::parse("https://cdn.example.com/media/My%20Song_final.mp3?sig=1").unwrap();
        let name = DirectUrlSource::file_name(&url).unwrap();
        assert_eq!(name, "My Song_final.mp3");
        assert_eq!(
            DirectUrlSource::title_from(&name).as_deref(),
            Some("My Song final")
        );
    }

    #[test]
    fn test_audio_content_types() {
        assert!(DirectUrlSource::is_audio_content_type("audio/mpeg"));
        assert!(DirectUrlSource::is_audio_content_type("audio/ogg; codecs=opus"));
        assert!(DirectUrlSource::is_audio_content_type("application/ogg"));
        assert!(!DirectUrlSource::is_audio_content_type("text/html; charset=utf-8"));
    }
}

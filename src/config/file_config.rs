use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub scratch_dir: Option<String>,
    pub uploads_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub public_base_url: Option<String>,

    // Feature configs
    pub engines: Option<EnginesConfig>,
    pub pipeline: Option<PipelineConfig>,
    pub audio_platform: Option<AudioPlatformFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EnginesConfig {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub ytdlp_path: Option<String>,
    pub download_timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub mp3_bitrate_kbps: Option<u32>,
    pub preview_seconds: Option<f64>,
    pub max_direct_payload_mb: Option<u64>,
    pub staging_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AudioPlatformFileConfig {
    pub api_base_url: Option<String>,
    pub site_host: Option<String>,
    pub client_id: Option<String>,
    /// Enables the signed-request fallback.
    pub api_token: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let config: FileConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/jinglepress"
            port = 4000
            public_base_url = "https://cdn.example.com"

            [engines]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
            download_timeout_sec = 120

            [pipeline]
            mp3_bitrate_kbps = 256
            preview_seconds = 15.0

            [audio_platform]
            api_base_url = "https://api.example.com"
            api_token = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir.as_deref(), Some("/var/lib/jinglepress"));
        assert_eq!(config.port, Some(4000));
        assert!(config.metrics_port.is_none());

        let engines = config.engines.unwrap();
        assert_eq!(engines.ffmpeg_path.as_deref(), Some("/opt/ffmpeg/bin/ffmpeg"));
        assert!(engines.ytdlp_path.is_none());
        assert_eq!(engines.download_timeout_sec, Some(120));

        let pipeline = config.pipeline.unwrap();
        assert_eq!(pipeline.mp3_bitrate_kbps, Some(256));
        assert_eq!(pipeline.preview_seconds, Some(15.0));
        assert!(pipeline.staging_ttl_secs.is_none());

        let platform = config.audio_platform.unwrap();
        assert_eq!(platform.api_token.as_deref(), Some("secret"));
        assert!(platform.client_id.is_none());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.data_dir.is_none());
        assert!(config.engines.is_none());
    }

    #[test]
    fn test_load_reports_path() {
        let err = FileConfig::load(Path::new("/nonexistent/jinglepress.toml")).unwrap_err();
        assert!(err.to_string().contains("jinglepress.toml"));
    }
}

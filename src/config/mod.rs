mod file_config;

pub use file_config::{AudioPlatformFileConfig, EnginesConfig, FileConfig, PipelineConfig};

use crate::server::RequestsLoggingLevel;
use crate::source::AudioPlatformConfig;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "jinglepress.db";

const DEFAULT_AUDIO_PLATFORM_API: &str = "https://api.soundcloud.com";
const DEFAULT_AUDIO_PLATFORM_SITE: &str = "soundcloud.com";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub public_base_url: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    pub download_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub data_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub public_base_url: String,

    // Feature configs (with defaults)
    pub engines: EngineSettings,
    pub pipeline: PipelineSettings,
    pub audio_platform: AudioPlatformConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub ytdlp_path: PathBuf,
    pub download_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ytdlp_path: PathBuf::from("yt-dlp"),
            download_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub mp3_bitrate_kbps: u32,
    pub preview_seconds: f64,
    pub max_direct_payload_mb: u64,
    pub staging_ttl: Duration,
}

impl PipelineSettings {
    pub fn max_payload_bytes(&self) -> u64 {
        self.max_direct_payload_mb * 1024 * 1024
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mp3_bitrate_kbps: 192,
            preview_seconds: 30.0,
            max_direct_payload_mb: 50,
            staging_ttl: Duration::from_secs(600),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        if !data_dir.exists() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let scratch_dir = file
            .scratch_dir
            .map(PathBuf::from)
            .or_else(|| cli.scratch_dir.clone())
            .unwrap_or_else(|| data_dir.join("scratch"));
        let uploads_dir = file
            .uploads_dir
            .map(PathBuf::from)
            .or_else(|| cli.uploads_dir.clone())
            .unwrap_or_else(|| data_dir.join("uploads"));
        if scratch_dir == uploads_dir {
            bail!("scratch_dir and uploads_dir must differ: {:?}", scratch_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let public_base_url = file
            .public_base_url
            .or_else(|| cli.public_base_url.clone())
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        let engines_file = file.engines.unwrap_or_default();
        let engine_defaults = EngineSettings::default();
        let engines = EngineSettings {
            ffmpeg_path: engines_file
                .ffmpeg_path
                .map(PathBuf::from)
                .or_else(|| cli.ffmpeg_path.clone())
                .unwrap_or(engine_defaults.ffmpeg_path),
            ffprobe_path: engines_file
                .ffprobe_path
                .map(PathBuf::from)
                .or_else(|| cli.ffprobe_path.clone())
                .unwrap_or(engine_defaults.ffprobe_path),
            ytdlp_path: engines_file
                .ytdlp_path
                .map(PathBuf::from)
                .or_else(|| cli.ytdlp_path.clone())
                .unwrap_or(engine_defaults.ytdlp_path),
            download_timeout: Duration::from_secs(
                engines_file
                    .download_timeout_sec
                    .unwrap_or(cli.download_timeout_sec),
            ),
        };
        if engines.download_timeout.is_zero() {
            bail!("download_timeout_sec must be positive");
        }

        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline_defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            mp3_bitrate_kbps: pipeline_file
                .mp3_bitrate_kbps
                .unwrap_or(pipeline_defaults.mp3_bitrate_kbps),
            preview_seconds: pipeline_file
                .preview_seconds
                .unwrap_or(pipeline_defaults.preview_seconds),
            max_direct_payload_mb: pipeline_file
                .max_direct_payload_mb
                .unwrap_or(pipeline_defaults.max_direct_payload_mb),
            staging_ttl: pipeline_file
                .staging_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(pipeline_defaults.staging_ttl),
        };
        if pipeline.mp3_bitrate_kbps == 0 {
            bail!("mp3_bitrate_kbps must be positive");
        }
        if !(pipeline.preview_seconds > 0.0) {
            bail!("preview_seconds must be positive");
        }
        if pipeline.max_direct_payload_mb == 0 {
            bail!("max_direct_payload_mb must be positive");
        }

        let platform_file = file.audio_platform.unwrap_or_default();
        let audio_platform = AudioPlatformConfig {
            api_base_url: platform_file
                .api_base_url
                .unwrap_or_else(|| DEFAULT_AUDIO_PLATFORM_API.to_string()),
            site_host: platform_file
                .site_host
                .unwrap_or_else(|| DEFAULT_AUDIO_PLATFORM_SITE.to_string()),
            client_id: platform_file.client_id.filter(|s| !s.is_empty()),
            api_token: platform_file.api_token.filter(|s| !s.is_empty()),
        };

        Ok(Self {
            data_dir,
            scratch_dir,
            uploads_dir,
            port,
            metrics_port,
            logging_level,
            public_base_url,
            engines,
            pipeline,
            audio_platform,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli_for(dir: &TempDir) -> CliConfig {
        CliConfig {
            data_dir: Some(dir.path().to_path_buf()),
            port: 3001,
            metrics_port: 9091,
            download_timeout_sec: 300,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("HEADERS"),
            Some(RequestsLoggingLevel::Headers)
        ));
        assert!(parse_logging_level("body").is_none());
        assert!(parse_logging_level("verbose").is_none());
    }

    #[test]
    fn test_resolve_cli_only_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_for(&temp_dir), None).unwrap();

        assert_eq!(config.data_dir, temp_dir.path());
        assert_eq!(config.scratch_dir, temp_dir.path().join("scratch"));
        assert_eq!(config.uploads_dir, temp_dir.path().join("uploads"));
        assert_eq!(config.db_path(), temp_dir.path().join("jinglepress.db"));
        assert_eq!(config.port, 3001);
        assert_eq!(config.public_base_url, "");
        assert_eq!(config.engines.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.engines.download_timeout, Duration::from_secs(300));
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.pipeline.max_payload_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.audio_platform.site_host, "soundcloud.com");
        assert!(config.audio_platform.api_token.is_none());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            data_dir: Some(PathBuf::from("/should/be/overridden")),
            logging_level: RequestsLoggingLevel::Path,
            public_base_url: Some("https://cli.example.com".to_string()),
            ffmpeg_path: Some(PathBuf::from("/cli/ffmpeg")),
            ffprobe_path: Some(PathBuf::from("/cli/ffprobe")),
            ..cli_for(&temp_dir)
        };

        let file_config = FileConfig {
            data_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("headers".to_string()),
            public_base_url: Some("https://cdn.example.com/".to_string()),
            engines: Some(EnginesConfig {
                ffmpeg_path: Some("/toml/ffmpeg".to_string()),
                ..Default::default()
            }),
            pipeline: Some(PipelineConfig {
                mp3_bitrate_kbps: Some(320),
                staging_ttl_secs: Some(60),
                ..Default::default()
            }),
            audio_platform: Some(AudioPlatformFileConfig {
                api_token: Some("token".to_string()),
                client_id: Some(String::new()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.data_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.public_base_url, "https://cdn.example.com");
        assert_eq!(config.engines.ffmpeg_path, PathBuf::from("/toml/ffmpeg"));
        // CLI value used when TOML doesn't specify
        assert_eq!(config.engines.ffprobe_path, PathBuf::from("/cli/ffprobe"));
        assert_eq!(config.metrics_port, 9091);
        assert_eq!(config.pipeline.mp3_bitrate_kbps, 320);
        assert_eq!(config.pipeline.preview_seconds, 30.0);
        assert_eq!(config.pipeline.staging_ttl, Duration::from_secs(60));
        assert_eq!(config.audio_platform.api_token.as_deref(), Some("token"));
        assert!(config.audio_platform.client_id.is_none());
    }

    #[test]
    fn test_resolve_missing_data_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("data_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_data_dir_error() {
        let cli = CliConfig {
            data_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            download_timeout_sec: 1,
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_data_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            data_dir: Some(temp_file.path().to_path_buf()),
            download_timeout_sec: 1,
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_rejects_bad_pipeline_values() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            pipeline: Some(PipelineConfig {
                preview_seconds: Some(0.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli_for(&temp_dir), Some(file_config));
        assert!(result.unwrap_err().to_string().contains("preview_seconds"));

        let same_dirs = CliConfig {
            scratch_dir: Some(temp_dir.path().join("shared")),
            uploads_dir: Some(temp_dir.path().join("shared")),
            ..cli_for(&temp_dir)
        };
        assert!(AppConfig::resolve(&same_dirs, None).is_err());
    }
}

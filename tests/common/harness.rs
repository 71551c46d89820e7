//! Pipeline builder over a temporary data directory
//!
//! Each test gets its own scratch and uploads directories, in-memory
//! stores and fresh fake engines.

use super::constants::*;
use super::fakes::{fake_audio, FakeMediaEngine, FakeVideoEngine};
use jinglepress_server::config::PipelineSettings;
use jinglepress_server::library::{JingleRef, SqliteLibraryStore};
use jinglepress_server::overlay::JinglePosition;
use jinglepress_server::pipeline::StagedAudio;
use jinglepress_server::quota::UserContext;
use jinglepress_server::source::AudioPlatformConfig;
use jinglepress_server::staging::{FileHandler, SqliteStagingStore};
use jinglepress_server::tagging::{Id3TagContainer, TagContainer};
use jinglepress_server::{Pipeline, PipelineDeps};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Length of every fake video platform track.
pub const VIDEO_TRACK_SECS: f64 = 180.0;

pub struct TestPipeline {
    pub pipeline: Arc<Pipeline>,
    pub media: Arc<FakeMediaEngine>,
    pub video: Arc<FakeVideoEngine>,
    pub files: Arc<FileHandler>,
    pub staging_store: Arc<SqliteStagingStore>,
    pub library: Arc<SqliteLibraryStore>,

    // Keeps the directories alive until drop
    _temp_dir: TempDir,
}

impl TestPipeline {
    pub async fn new() -> Self {
        Self::build(AudioPlatformConfig::default(), Arc::new(Id3TagContainer)).await
    }

    pub async fn with_audio_platform(api_base_url: &str, api_token: Option<&str>) -> Self {
        let config = AudioPlatformConfig {
            api_base_url: api_base_url.to_string(),
            site_host: AUDIO_PLATFORM_SITE.to_string(),
            client_id: Some("test-client".to_string()),
            api_token: api_token.map(str::to_string),
        };
        Self::build(config, Arc::new(Id3TagContainer)).await
    }

    pub async fn with_tag_container(container: Arc<dyn TagContainer>) -> Self {
        Self::build(AudioPlatformConfig::default(), container).await
    }

    async fn build(audio_platform: AudioPlatformConfig, tag_container: Arc<dyn TagContainer>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let settings = PipelineSettings {
            mp3_bitrate_kbps: 128,
            preview_seconds: PREVIEW_SECONDS,
            max_direct_payload_mb: MAX_PAYLOAD_MB,
            staging_ttl: Duration::from_secs(600),
        };

        let files = Arc::new(FileHandler::new(
            temp_dir.path().join("scratch"),
            temp_dir.path().join("uploads"),
            settings.max_payload_bytes(),
        ));
        files.init().await.expect("Failed to create directories");

        let staging_store =
            Arc::new(SqliteStagingStore::in_memory().expect("Failed to open staging store"));
        let library = Arc::new(SqliteLibraryStore::in_memory().expect("Failed to open library"));
        let media = Arc::new(FakeMediaEngine::default());
        let video = Arc::new(FakeVideoEngine::new(VIDEO_TRACK_SECS));

        let pipeline = Pipeline::assemble(
            PipelineDeps {
                files: files.clone(),
                staging_store: staging_store.clone(),
                library: library.clone(),
                media: media.clone(),
                video_engine: video.clone(),
                tag_container,
                http: reqwest::Client::new(),
            },
            &settings,
            audio_platform,
            PUBLIC_BASE_URL,
        );

        Self {
            pipeline: Arc::new(pipeline),
            media,
            video,
            files,
            staging_store,
            library,
            _temp_dir: temp_dir,
        }
    }

    /// Upload `secs` seconds of fake audio, panicking on failure.
    pub async fn upload(&self, user: &UserContext, filename: &str, secs: f64) -> StagedAudio {
        self.pipeline
            .upload(user, filename, fake_audio(secs))
            .await
            .expect("Upload failed")
    }

    /// Save a jingle of `secs` seconds, panicking on failure.
    pub async fn add_jingle(
        &self,
        user: &UserContext,
        secs: f64,
        position: JinglePosition,
    ) -> JingleRef {
        self.pipeline
            .add_jingle(user, "jingle.mp3", fake_audio(secs), None, Some(position), None)
            .await
            .expect("Saving jingle failed")
    }

    /// Names of the files currently in scratch.
    pub fn scratch_files(&self) -> Vec<String> {
        list_files(self.files.scratch_dir().to_path_buf())
    }

    /// Names of the files at the top of the uploads directory.
    pub fn upload_files(&self) -> Vec<String> {
        list_files(self.files.uploads_dir().to_path_buf())
    }

    pub fn jingle_files(&self) -> Vec<String> {
        list_files(self.files.jingles_dir())
    }
}

fn list_files(dir: PathBuf) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("Failed to list {:?}: {}", dir, e))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    names
}

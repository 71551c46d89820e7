//! Deterministic stand-ins for the external engines.
//!
//! Fake audio is a byte buffer carrying a `FAKEAUDIO:<seconds>:` marker.
//! The marker survives tag writes, so the fake engine can still "probe"
//! a tagged file.

use async_trait::async_trait;
use jinglepress_server::media::{EngineJob, MediaEngine, MediaError};
use jinglepress_server::source::{PlayerClient, VideoDownloadEngine, VideoMetadata};
use jinglepress_server::tagging::{Id3TagContainer, ReadTags, TagContainer, TagError, TagSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const MARKER: &[u8] = b"FAKEAUDIO:";

/// Bytes the fake engine reads as `secs` seconds of audio.
pub fn fake_audio(secs: f64) -> Vec<u8> {
    let mut bytes = format!("FAKEAUDIO:{}:", secs).into_bytes();
    bytes.extend(std::iter::repeat(0u8).take(256));
    bytes
}

/// Duration encoded in `bytes`, if any.
pub fn fake_duration(bytes: &[u8]) -> Option<f64> {
    let start = bytes
        .windows(MARKER.len())
        .position(|w| w == MARKER)?
        + MARKER.len();
    let rest = &bytes[start..];
    let end = rest.iter().position(|b| *b == b':')?;
    std::str::from_utf8(&rest[..end]).ok()?.parse().ok()
}

// ============================================================================
// Media engine
// ============================================================================

/// Probes by marker. Every run writes an output as long as its first input,
/// cut to the job's maximum duration when there is one.
#[derive(Default)]
pub struct FakeMediaEngine {
    jobs: Mutex<Vec<EngineJob>>,
    fail_runs: AtomicBool,
    embedded_image: Mutex<Option<Vec<u8>>>,
}

impl FakeMediaEngine {
    pub fn set_fail_runs(&self, fail: bool) {
        self.fail_runs.store(fail, Ordering::SeqCst);
    }

    pub fn set_embedded_image(&self, image: Option<Vec<u8>>) {
        *self.embedded_image.lock().unwrap() = image;
    }

    pub fn jobs(&self) -> Vec<EngineJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Jobs that carried a filter graph, i.e. mixes.
    pub fn mix_jobs(&self) -> Vec<EngineJob> {
        self.jobs()
            .into_iter()
            .filter(|job| job.filter_graph.is_some())
            .collect()
    }
}

#[async_trait]
impl MediaEngine for FakeMediaEngine {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let bytes = tokio::fs::read(path).await?;
        fake_duration(&bytes)
            .ok_or_else(|| MediaError::ProbeFailed(format!("{:?} is not fake audio", path)))
    }

    async fn build_and_run(&self, job: &EngineJob) -> Result<(), MediaError> {
        self.jobs.lock().unwrap().push(job.clone());
        if self.fail_runs.load(Ordering::SeqCst) {
            return Err(MediaError::RunFailed("engine exited with status 1".to_string()));
        }

        let main = job
            .inputs
            .first()
            .ok_or_else(|| MediaError::RunFailed("no inputs".to_string()))?;
        let mut secs = self.probe_duration(main).await?;
        if let Some(max) = job.max_duration_secs {
            secs = secs.min(max);
        }

        let mut output = fake_audio(secs);
        output.extend_from_slice(format!("inputs={}", job.inputs.len()).as_bytes());
        tokio::fs::write(&job.output, output).await?;
        Ok(())
    }

    async fn extract_embedded_image(&self, _path: &Path) -> Result<Option<Vec<u8>>, MediaError> {
        Ok(self.embedded_image.lock().unwrap().clone())
    }
}

// ============================================================================
// Video download engine
// ============================================================================

/// Serves one fake track; client identities listed in `failing` are refused.
pub struct FakeVideoEngine {
    pub duration_secs: f64,
    failing: Mutex<Vec<PlayerClient>>,
    attempts: Mutex<Vec<PlayerClient>>,
}

impl FakeVideoEngine {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            failing: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn refuse(&self, clients: &[PlayerClient]) {
        *self.failing.lock().unwrap() = clients.to_vec();
    }

    /// Clients tried so far, in order.
    pub fn attempts(&self) -> Vec<PlayerClient> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoDownloadEngine for FakeVideoEngine {
    async fn fetch_metadata(
        &self,
        _locator: &str,
        client: PlayerClient,
    ) -> anyhow::Result<VideoMetadata> {
        self.attempts.lock().unwrap().push(client);
        if self.failing.lock().unwrap().contains(&client) {
            anyhow::bail!("sign in to confirm you're not a bot ({})", client.as_str());
        }
        Ok(VideoMetadata {
            title: Some("Video Title".to_string()),
            author: Some("Some Channel".to_string()),
            duration_seconds: Some(self.duration_secs),
            thumbnail: None,
        })
    }

    async fn fetch_audio_bytes(
        &self,
        _locator: &str,
        _client: PlayerClient,
    ) -> anyhow::Result<Vec<u8>> {
        Ok(fake_audio(self.duration_secs))
    }
}

// ============================================================================
// Tag container
// ============================================================================

/// Writes everything except the cover, like a writer that silently loses
/// image frames.
#[derive(Default)]
pub struct ImageDroppingContainer {
    inner: Id3TagContainer,
}

impl TagContainer for ImageDroppingContainer {
    fn write(&self, tags: &TagSet, path: &Path) -> Result<bool, TagError> {
        let mut tags = tags.clone();
        tags.cover = None;
        self.inner.write(&tags, path)
    }

    fn read(&self, path: &Path) -> Result<ReadTags, TagError> {
        self.inner.read(path)
    }
}

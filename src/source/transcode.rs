//! Conversion of fetched audio into the canonical output encoding.

use super::IngestedAudio;
use crate::media::{EngineJob, MediaEngine, MediaError, OutputEncoding};
use crate::staging::{FileHandler, DOWNLOAD_PREFIX, TRANSCODE_PREFIX};
use std::sync::Arc;
use tracing::debug;

pub struct Transcoder {
    media: Arc<dyn MediaEngine>,
    files: Arc<FileHandler>,
    encoding: OutputEncoding,
}

impl Transcoder {
    pub fn new(media: Arc<dyn MediaEngine>, files: Arc<FileHandler>, encoding: OutputEncoding) -> Self {
        Self {
            media,
            files,
            encoding,
        }
    }

    pub fn encoding(&self) -> &OutputEncoding {
        &self.encoding
    }

    /// Whether audio in `container` can be published without re-encoding.
    pub fn is_canonical(&self, container: Option<&str>) -> bool {
        container.is_some_and(|c| c.eq_ignore_ascii_case(&self.encoding.extension))
    }

    /// Re-encode `bytes`. `container` only names the scratch input file.
    pub async fn transcode(&self, bytes: &[u8], container: Option<&str>) -> Result<Vec<u8>, MediaError> {
        let input = self.files.temp_path(DOWNLOAD_PREFIX, container.unwrap_or(""));
        let output = self.files.temp_path(TRANSCODE_PREFIX, &self.encoding.extension);

        let result: Result<Vec<u8>, MediaError> = async {
            tokio::fs::write(&input, bytes).await?;
            let job = EngineJob::transcode(&input, &output, self.encoding.clone());
            self.media.build_and_run(&job).await?;
            Ok(tokio::fs::read(&output).await?)
        }
        .await;

        self.files.remove_quietly(&input).await;
        self.files.remove_quietly(&output).await;
        result
    }

    /// Bring `audio` to the canonical encoding. Returns whether it was re-encoded.
    pub async fn to_canonical(&self, audio: &mut IngestedAudio) -> Result<bool, MediaError> {
        if self.is_canonical(audio.container.as_deref()) {
            return Ok(false);
        }

        let bytes = self.transcode(&audio.bytes, audio.container.as_deref()).await?;
        debug!(
            "Transcoded {} audio to {} ({} -> {} bytes)",
            audio.container.as_deref().unwrap_or("unknown"),
            self.encoding.extension,
            audio.bytes.len(),
            bytes.len()
        );
        audio.bytes = bytes;
        audio.container = Some(self.encoding.extension.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceKind;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes `encoded:<input bytes>` to the job output.
    #[derive(Default)]
    struct Recording {
        jobs: Mutex<Vec<EngineJob>>,
    }

    #[async_trait]
    impl MediaEngine for Recording {
        async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
            Ok(1.0)
        }

        async fn build_and_run(&self, job: &EngineJob) -> Result<(), MediaError> {
            self.jobs.lock().unwrap().push(job.clone());
            let mut out = b"encoded:".to_vec();
            out.extend(tokio::fs::read(&job.inputs[0]).await?);
            tokio::fs::write(&job.output, out).await?;
            Ok(())
        }

        async fn extract_embedded_image(&self, _path: &Path) -> Result<Option<Vec<u8>>, MediaError> {
            Ok(None)
        }
    }

    fn transcoder(dir: &TempDir, media: Arc<Recording>) -> Transcoder {
        let files = Arc::new(FileHandler::new(
            dir.path().join("scratch"),
            dir.path().join("uploads"),
            1 << 20,
        ));
        std::fs::create_dir_all(files.scratch_dir()).unwrap();
        Transcoder::new(media, files, OutputEncoding::mp3(128))
    }

    #[tokio::test]
    async fn test_mp3_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let media = Arc::new(Recording::default());
        let transcoder = transcoder(&dir, media.clone());

        let mut audio = IngestedAudio::new(b"mp3 bytes".to_vec(), SourceKind::Upload);
        audio.container = Some("MP3".to_string());
        assert!(!transcoder.to_canonical(&mut audio).await.unwrap());
        assert_eq!(audio.bytes, b"mp3 bytes");
        assert!(media.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_containers_are_reencoded_and_scratch_is_cleared() {
        let dir = TempDir::new().unwrap();
        let media = Arc::new(Recording::default());
        let transcoder = transcoder(&dir, media.clone());

        let mut audio = IngestedAudio::new(b"fLaC".to_vec(), SourceKind::Upload);
        audio.container = Some("flac".to_string());
        assert!(transcoder.to_canonical(&mut audio).await.unwrap());

        assert_eq!(audio.bytes, b"encoded:fLaC");
        assert_eq!(audio.container.as_deref(), Some("mp3"));
        let jobs = media.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].filter_graph.is_none());
        assert_eq!(jobs[0].encoding, OutputEncoding::mp3(128));
        assert_eq!(std::fs::read_dir(dir.path().join("scratch")).unwrap().count(), 0);
    }
}

//! Narrow contract over the external media-transcoding engine.

mod ffmpeg;

pub use ffmpeg::{parse_probe_duration, FfmpegEngine};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the media engine.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("engine run failed: {0}")]
    RunFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// Output codec settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEncoding {
    pub codec: String,
    pub bitrate_kbps: u32,
    pub extension: String,
}

impl OutputEncoding {
    pub fn mp3(bitrate_kbps: u32) -> Self {
        Self {
            codec: "libmp3lame".to_string(),
            bitrate_kbps,
            extension: "mp3".to_string(),
        }
    }
}

impl Default for OutputEncoding {
    fn default() -> Self {
        Self::mp3(192)
    }
}

/// A single engine invocation: inputs, an optional filter graph and an output.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineJob {
    pub inputs: Vec<PathBuf>,
    pub filter_graph: Option<FilterGraph>,
    pub output: PathBuf,
    pub encoding: OutputEncoding,
    /// Truncate the output to this many seconds.
    pub max_duration_secs: Option<f64>,
}

impl EngineJob {
    /// Plain re-encode of one input into the configured codec.
    pub fn transcode(input: &Path, output: &Path, encoding: OutputEncoding) -> Self {
        Self {
            inputs: vec![input.to_path_buf()],
            filter_graph: None,
            output: output.to_path_buf(),
            encoding,
            max_duration_secs: None,
        }
    }
}

/// A complex filter graph and the label of its final output pad.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub description: String,
    pub output_label: String,
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Duration of the audio at `path` in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    /// Run `job`, producing `job.output`.
    async fn build_and_run(&self, job: &EngineJob) -> Result<(), MediaError>;

    /// Bytes of an image embedded in the container, if any.
    async fn extract_embedded_image(&self, path: &Path) -> Result<Option<Vec<u8>>, MediaError>;
}

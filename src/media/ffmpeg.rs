//! Media engine backed by the ffmpeg/ffprobe binaries.

use super::{EngineJob, MediaEngine, MediaError};
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    #[serde(default)]
    disposition: Option<FfprobeDisposition>,
}

#[derive(Debug, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: i32,
}

/// Parse the container duration (seconds) out of ffprobe's JSON output.
pub fn parse_probe_duration(json: &str) -> Result<f64, MediaError> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| MediaError::InvalidOutput(format!("JSON parse error: {}", e)))?;

    if !probe.streams.is_empty() && !probe.streams.iter().any(|s| s.codec_type == "audio") {
        return Err(MediaError::InvalidOutput("No audio stream found".to_string()));
    }

    probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::InvalidOutput("Missing container duration".to_string()))
}

pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Full ffmpeg argument list for a job.
    pub fn command_args(job: &EngineJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];

        for input in &job.inputs {
            args.push("-i".into());
            args.push(input.as_os_str().to_owned());
        }

        match &job.filter_graph {
            Some(graph) => {
                args.push("-filter_complex".into());
                args.push(graph.description.clone().into());
                args.push("-map".into());
                args.push(format!("[{}]", graph.output_label).into());
            }
            None => {
                args.push("-map".into());
                args.push("0:a:0".into());
            }
        }

        args.push("-vn".into());
        args.push("-c:a".into());
        args.push(job.encoding.codec.clone().into());
        args.push("-b:a".into());
        args.push(format!("{}k", job.encoding.bitrate_kbps).into());

        if let Some(max) = job.max_duration_secs {
            args.push("-t".into());
            args.push(format!("{}", max).into());
        }

        args.push("-y".into());
        args.push(job.output.as_os_str().to_owned());
        args
    }

    async fn probe_json(&self, path: &Path) -> Result<String, MediaError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::ProbeFailed(format!(
                "{}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let json = self.probe_json(path).await?;
        parse_probe_duration(&json)
    }

    async fn build_and_run(&self, job: &EngineJob) -> Result<(), MediaError> {
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = Self::command_args(job);
        debug!("Running ffmpeg with {} inputs -> {:?}", job.inputs.len(), job.output);

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::RunFailed(stderr.trim().to_string()));
        }

        Ok(())
    }

    async fn extract_embedded_image(&self, path: &Path) -> Result<Option<Vec<u8>>, MediaError> {
        let json = self.probe_json(path).await?;
        let probe: FfprobeOutput = serde_json::from_str(&json)
            .map_err(|e| MediaError::InvalidOutput(format!("JSON parse error: {}", e)))?;

        let has_picture = probe.streams.iter().any(|s| {
            s.codec_type == "video" && s.disposition.as_ref().map_or(false, |d| d.attached_pic == 1)
        });
        if !has_picture {
            return Ok(None);
        }

        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-an", "-map", "0:v:0", "-c:v", "copy", "-f", "image2pipe", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::RunFailed(stderr.trim().to_string()));
        }

        if output.stdout.is_empty() {
            Ok(None)
        } else {
            Ok(Some(output.stdout))
        }
    }
}

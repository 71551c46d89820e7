//! Builds and runs a mix job against the media engine.

use super::filter_graph::build_filter_graph;
use super::placement::{
    expand_placements, expected_mix_duration_ms, seconds_to_ms, MixSpec, Placement,
};
use crate::media::{EngineJob, MediaEngine, MediaError, OutputEncoding};
use crate::staging::{FileHandler, MIXED_PREFIX, PREVIEW_PREFIX};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MixError {
    #[error("Nothing to mix: the mix has no jingles")]
    EmptySpec,

    #[error("Jingle volume {0} is outside [0, 1]")]
    InvalidVolume(f32),

    #[error("Failed to probe {path:?}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Mix engine failed: {0}")]
    Engine(#[source] MediaError),
}

/// What the caller does when the engine fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixFailurePolicy {
    /// Keep going with the unmixed source audio.
    FallbackToSource,
    /// Surface the failure.
    Fail,
}

#[derive(Debug, Clone)]
pub struct MixOutcome {
    pub path: PathBuf,
    pub placements: Vec<Placement>,
    pub main_duration_secs: f64,
    pub expected_duration_secs: f64,
}

pub struct OverlayCompositor {
    engine: Arc<dyn MediaEngine>,
    files: Arc<FileHandler>,
    encoding: OutputEncoding,
    preview_secs: f64,
}

impl OverlayCompositor {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        files: Arc<FileHandler>,
        encoding: OutputEncoding,
        preview_secs: f64,
    ) -> Self {
        Self {
            engine,
            files,
            encoding,
            preview_secs,
        }
    }

    pub fn preview_secs(&self) -> f64 {
        self.preview_secs
    }

    async fn probe(&self, path: &Path) -> Result<f64, MixError> {
        self.engine
            .probe_duration(path)
            .await
            .map_err(|source| MixError::Probe {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Mix the jingles in `spec` over `main`, writing a new scratch file.
    ///
    /// With `preview_only` the output is cut to the preview length after
    /// mixing. The returned file is owned by the caller.
    pub async fn mix(
        &self,
        main: &Path,
        spec: &MixSpec,
        preview_only: bool,
    ) -> Result<MixOutcome, MixError> {
        if spec.is_empty() {
            return Err(MixError::EmptySpec);
        }
        if let Some(entry) = spec
            .entries
            .iter()
            .find(|e| !(0.0..=1.0).contains(&e.volume) || e.volume.is_nan())
        {
            return Err(MixError::InvalidVolume(entry.volume));
        }

        let main_secs = self.probe(main).await?;
        let main_ms = seconds_to_ms(main_secs);

        // Jingles shared between entries are probed once.
        let mut probed: HashMap<PathBuf, u64> = HashMap::new();
        let mut jingle_durations_ms = Vec::with_capacity(spec.entries.len());
        for entry in &spec.entries {
            let ms = match probed.get(&entry.jingle_path) {
                Some(ms) => *ms,
                None => {
                    let ms = seconds_to_ms(self.probe(&entry.jingle_path).await?);
                    probed.insert(entry.jingle_path.clone(), ms);
                    ms
                }
            };
            jingle_durations_ms.push(ms);
        }

        let placements = expand_placements(spec, main_ms, &jingle_durations_ms);
        for p in &placements {
            debug!(
                "Placing jingle {} at {}ms (volume {:.2})",
                p.jingle_id, p.offset_ms, p.volume
            );
        }

        let (jingle_inputs, graph) = build_filter_graph(&placements);
        let mut inputs = Vec::with_capacity(jingle_inputs.len() + 1);
        inputs.push(main.to_path_buf());
        inputs.extend(jingle_inputs);

        let prefix = if preview_only { PREVIEW_PREFIX } else { MIXED_PREFIX };
        let output = self.files.temp_path(prefix, &self.encoding.extension);

        let job = EngineJob {
            inputs,
            filter_graph: Some(graph),
            output: output.clone(),
            encoding: self.encoding.clone(),
            max_duration_secs: preview_only.then_some(self.preview_secs),
        };

        if let Err(e) = self.engine.build_and_run(&job).await {
            warn!("Mix of {:?} failed: {}", main, e);
            self.files.remove_quietly(&output).await;
            return Err(MixError::Engine(e));
        }

        let expected_ms = expected_mix_duration_ms(main_ms, &placements);
        info!(
            "Mixed {} placement(s) over {:?} -> {:?} (expected {}ms)",
            placements.len(),
            main,
            output,
            expected_ms
        );

        Ok(MixOutcome {
            path: output,
            placements,
            main_duration_secs: main_secs,
            expected_duration_secs: expected_ms as f64 / 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{JinglePosition, MixEntry};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Durations keyed by file name; records every job it is asked to run.
    struct ScriptedEngine {
        durations: HashMap<String, f64>,
        fail: bool,
        jobs: Mutex<Vec<EngineJob>>,
    }

    #[async_trait]
    impl MediaEngine for ScriptedEngine {
        async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
            let name = path.file_name().unwrap().to_str().unwrap();
            self.durations
                .get(name)
                .copied()
                .ok_or_else(|| MediaError::ProbeFailed(name.to_string()))
        }

        async fn build_and_run(&self, job: &EngineJob) -> Result<(), MediaError> {
            self.jobs.lock().unwrap().push(job.clone());
            if self.fail {
                std::fs::write(&job.output, b"partial")?;
                return Err(MediaError::RunFailed("boom".to_string()));
            }
            std::fs::write(&job.output, b"mixed")?;
            Ok(())
        }

        async fn extract_embedded_image(&self, _: &Path) -> Result<Option<Vec<u8>>, MediaError> {
            Ok(None)
        }
    }

    fn setup(fail: bool) -> (TempDir, Arc<ScriptedEngine>, OverlayCompositor) {
        let dir = TempDir::new().unwrap();
        let files = Arc::new(FileHandler::new(
            dir.path().join("scratch"),
            dir.path().join("uploads"),
            1 << 20,
        ));
        std::fs::create_dir_all(files.scratch_dir()).unwrap();
        let engine = Arc::new(ScriptedEngine {
            durations: HashMap::from([
                ("main.mp3".to_string(), 100.0),
                ("jingle.mp3".to_string(), 8.0),
            ]),
            fail,
            jobs: Mutex::new(Vec::new()),
        });
        let compositor =
            OverlayCompositor::new(engine.clone(), files, OutputEncoding::default(), 30.0);
        (dir, engine, compositor)
    }

    fn spec(position: JinglePosition, volume: f32) -> MixSpec {
        MixSpec::new(vec![MixEntry {
            jingle_id: "j1".to_string(),
            jingle_path: PathBuf::from("/jingles/jingle.mp3"),
            position,
            volume,
        }])
    }

    #[tokio::test]
    async fn test_end_position_offsets_jingle_by_main_minus_jingle() {
        let (_dir, engine, compositor) = setup(false);
        let outcome = compositor
            .mix(Path::new("/audio/main.mp3"), &spec(JinglePosition::End, 1.0), false)
            .await
            .unwrap();

        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].offset_ms, 92_000);
        assert_eq!(outcome.expected_duration_secs, 100.0);
        assert!(outcome.path.exists());

        let jobs = engine.jobs.lock().unwrap();
        let graph = jobs[0].filter_graph.as_ref().unwrap();
        assert!(graph.description.contains("adelay=delays=92000:all=1"));
        assert!(jobs[0].max_duration_secs.is_none());
    }

    #[tokio::test]
    async fn test_preview_truncates_without_changing_graph() {
        let (_dir, engine, compositor) = setup(false);
        let main = Path::new("/audio/main.mp3");
        compositor
            .mix(main, &spec(JinglePosition::StartEnd, 0.5), false)
            .await
            .unwrap();
        let preview = compositor
            .mix(main, &spec(JinglePosition::StartEnd, 0.5), true)
            .await
            .unwrap();

        let jobs = engine.jobs.lock().unwrap();
        assert_eq!(jobs[0].filter_graph, jobs[1].filter_graph);
        assert_eq!(jobs[0].inputs.len(), 3);
        assert_eq!(jobs[1].max_duration_secs, Some(30.0));
        let name = preview.path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(PREVIEW_PREFIX));
    }

    #[tokio::test]
    async fn test_engine_failure_removes_partial_output() {
        let (dir, _engine, compositor) = setup(true);
        let err = compositor
            .mix(Path::new("/audio/main.mp3"), &spec(JinglePosition::Start, 1.0), false)
            .await
            .unwrap_err();

        assert!(matches!(err, MixError::Engine(_)));
        let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_rejects_empty_spec_and_bad_volume() {
        let (_dir, _engine, compositor) = setup(false);
        let main = Path::new("/audio/main.mp3");
        assert!(matches!(
            compositor.mix(main, &MixSpec::default(), false).await,
            Err(MixError::EmptySpec)
        ));
        assert!(matches!(
            compositor.mix(main, &spec(JinglePosition::Start, 1.5), false).await,
            Err(MixError::InvalidVolume(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_failure_is_reported_with_path() {
        let (_dir, _engine, compositor) = setup(false);
        let err = compositor
            .mix(Path::new("/audio/unknown.mp3"), &spec(JinglePosition::Start, 1.0), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MixError::Probe { .. }));
    }
}

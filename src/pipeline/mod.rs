//! Orchestration of the ingest → stage → mix → tag → finalize flow.

mod models;

pub use models::{FinalizeOptions, FinalizeOutcome, MixRequest, PlacementRequest, StagedAudio};

use crate::config::PipelineSettings;
use crate::error::PipelineError;
use crate::finalize::{
    final_file_name, id_from_url, FinalizeRequest, Finalizer, COVER_FILE_PREFIX,
};
use crate::library::{AudioMetadata, FinalAudio, JingleRef, LibraryStore};
use crate::media::{MediaEngine, OutputEncoding};
use crate::overlay::{JinglePosition, MixEntry, MixFailurePolicy, MixSpec, OverlayCompositor};
use crate::quota::{self, QuotaExceeded, QuotaStatus, UsageKind, UserContext};
use crate::server::metrics;
use crate::source::{
    self, AudioPlatformConfig, AudioPlatformSource, AudioSource, ClientIdentityStrategy,
    DirectUrlSource, IngestedAudio, ResolveError, SourceKind, SourceResolver, Transcoder,
    VideoDownloadEngine, VideoPlatformSource,
};
use crate::staging::{
    extension_of, sanitize_filename, FileHandler, StagingLookup, StagingManager, StagingStore,
    COVER_PREFIX,
};
use crate::tagging::{ImageFormat, TagContainer, TagEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_COVER_BYTES: u64 = 10 * 1024 * 1024;
const JINGLE_FILE_PREFIX: &str = "jingle-";

/// Record a failed stage and convert the error.
fn failed(stage: &str, e: impl Into<PipelineError>) -> PipelineError {
    let e = e.into();
    metrics::record_pipeline_failure(stage, e.kind());
    e
}

fn has_http_scheme(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// External collaborators a pipeline is assembled from.
pub struct PipelineDeps {
    pub files: Arc<FileHandler>,
    pub staging_store: Arc<dyn StagingStore>,
    pub library: Arc<dyn LibraryStore>,
    pub media: Arc<dyn MediaEngine>,
    pub video_engine: Arc<dyn VideoDownloadEngine>,
    pub tag_container: Arc<dyn TagContainer>,
    pub http: reqwest::Client,
}

pub struct Pipeline {
    library: Arc<dyn LibraryStore>,
    resolver: SourceResolver,
    transcoder: Transcoder,
    staging: Arc<StagingManager>,
    compositor: OverlayCompositor,
    finalizer: Finalizer,
    media: Arc<dyn MediaEngine>,
    http: reqwest::Client,
}

impl Pipeline {
    pub fn new(
        library: Arc<dyn LibraryStore>,
        resolver: SourceResolver,
        transcoder: Transcoder,
        staging: Arc<StagingManager>,
        compositor: OverlayCompositor,
        finalizer: Finalizer,
        media: Arc<dyn MediaEngine>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            library,
            resolver,
            transcoder,
            staging,
            compositor,
            finalizer,
            media,
            http,
        }
    }

    /// Wire every component together.
    pub fn assemble(
        deps: PipelineDeps,
        settings: &PipelineSettings,
        audio_platform: AudioPlatformConfig,
        public_base_url: &str,
    ) -> Self {
        let encoding = OutputEncoding::mp3(settings.mp3_bitrate_kbps);
        let max_bytes = settings.max_payload_bytes();

        let sources: Vec<Arc<dyn AudioSource>> = vec![
            Arc::new(DirectUrlSource::new(deps.http.clone(), max_bytes)),
            Arc::new(VideoPlatformSource::new(
                ClientIdentityStrategy::fallback_chain(deps.video_engine),
                deps.media.clone(),
                deps.files.clone(),
                encoding.clone(),
            )),
            Arc::new(AudioPlatformSource::new(
                deps.http.clone(),
                audio_platform,
                max_bytes,
            )),
        ];

        let transcoder = Transcoder::new(deps.media.clone(), deps.files.clone(), encoding.clone());
        let staging = Arc::new(StagingManager::new(deps.staging_store, deps.files.clone()));
        let compositor = OverlayCompositor::new(
            deps.media.clone(),
            deps.files,
            encoding,
            settings.preview_seconds,
        );
        let finalizer = Finalizer::new(
            TagEngine::new(deps.tag_container),
            deps.media.clone(),
            deps.library.clone(),
            staging.clone(),
            public_base_url,
            settings.staging_ttl,
        );

        Self::new(
            deps.library,
            SourceResolver::new(sources),
            transcoder,
            staging,
            compositor,
            finalizer,
            deps.media,
            deps.http,
        )
    }

    fn files(&self) -> &Arc<FileHandler> {
        self.staging.files()
    }

    // ==================== Quota ====================

    pub fn quota_status(&self, user: &UserContext) -> Result<QuotaStatus, PipelineError> {
        let since = quota::start_of_day_ms(chrono::Utc::now());
        let history = self.library.usage_since(&user.user_id, since)?;
        Ok(quota::check_limits(user, &history))
    }

    fn denied(status: &QuotaStatus) -> PipelineError {
        QuotaExceeded(
            status
                .reason
                .clone()
                .unwrap_or_else(|| "Daily limit reached".to_string()),
        )
        .into()
    }

    // ==================== Ingest ====================

    /// Fetch audio from an external source and stage it.
    pub async fn ingest(
        &self,
        user: &UserContext,
        kind: SourceKind,
        locator: &str,
    ) -> Result<StagedAudio, PipelineError> {
        let status = self.quota_status(user)?;
        if !status.can_ingest_external {
            return Err(failed("quota", Self::denied(&status)));
        }

        let mut audio = self
            .resolver
            .resolve(kind, locator)
            .await
            .map_err(|e| failed("resolve", e))?;
        let reported = audio.duration_seconds;
        if let Err(e) = self.transcoder.to_canonical(&mut audio).await {
            return Err(failed(
                "transcode",
                ResolveError::upstream(format!("{} transcode", kind.as_str()), e),
            ));
        }

        let entry = self
            .staging
            .create(&user.user_id, &audio)
            .await
            .map_err(|e| failed("stage", e))?;
        let lookup = StagingLookup::Found(entry);

        let duration = match self.measure_staged(&lookup, reported).await {
            Ok(secs) => secs,
            Err(e) => {
                self.discard(Some(&lookup), &[]).await;
                return Err(failed("probe", e));
            }
        };

        if let Err(e) = quota::check_external_ingest_duration_limit(user.plan, duration) {
            info!(
                "Rejected {} ingest for user {}: {}",
                kind.as_str(),
                user.user_id,
                e
            );
            self.discard(Some(&lookup), &[]).await;
            return Err(failed("quota", e));
        }

        Ok(StagedAudio::from_lookup(&lookup, Some(duration)))
    }

    /// Stage a file the user sent directly.
    pub async fn upload(
        &self,
        user: &UserContext,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<StagedAudio, PipelineError> {
        let status = self.quota_status(user)?;
        if !status.can_upload {
            return Err(failed("quota", Self::denied(&status)));
        }

        let filename = sanitize_filename(filename).map_err(|e| failed("upload", e))?;
        Self::check_audio_payload(&filename, &bytes).map_err(|e| failed("upload", e))?;

        let mut audio = IngestedAudio::new(bytes, SourceKind::Upload);
        audio.extracted_title = Path::new(&filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);
        audio.container = source::detect_container(Some(&filename), None, &audio.bytes);
        if let Err(e) = self.transcoder.to_canonical(&mut audio).await {
            warn!("Transcode of upload {} for user {} failed: {}", filename, user.user_id, e);
            return Err(failed(
                "transcode",
                PipelineError::UnsupportedFormat(format!("{} could not be converted to audio", filename)),
            ));
        }

        let entry = self
            .staging
            .create(&user.user_id, &audio)
            .await
            .map_err(|e| failed("stage", e))?;
        let lookup = StagingLookup::Found(entry);

        let duration = match self.measure_staged(&lookup, None).await {
            Ok(secs) => secs,
            Err(e) => {
                self.discard(Some(&lookup), &[]).await;
                return Err(failed("probe", e));
            }
        };

        if let Err(e) = quota::check_audio_duration_limit(user.plan, duration) {
            self.discard(Some(&lookup), &[]).await;
            return Err(failed("quota", e));
        }

        Ok(StagedAudio::from_lookup(&lookup, Some(duration)))
    }

    fn check_audio_payload(filename: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::Validation("Empty file".to_string()));
        }
        if FileHandler::is_supported_audio(filename) || infer::is_audio(bytes) {
            return Ok(());
        }
        Err(PipelineError::UnsupportedFormat(format!(
            "{} is not a supported audio file",
            filename
        )))
    }

    /// Probe the staged file and record its duration. The engine wins over
    /// whatever the source reported.
    async fn measure_staged(
        &self,
        lookup: &StagingLookup,
        reported: Option<f64>,
    ) -> Result<f64, PipelineError> {
        let duration = match self.media.probe_duration(lookup.path()).await {
            Ok(secs) => secs,
            Err(e) => match reported {
                Some(secs) => {
                    warn!(
                        "Probe of staged {} failed ({}), using reported {}s",
                        lookup.id(),
                        e,
                        secs
                    );
                    secs
                }
                None => {
                    warn!("Probe of staged {} failed: {}", lookup.id(), e);
                    return Err(PipelineError::UnsupportedFormat(
                        "Could not read audio duration".to_string(),
                    ));
                }
            },
        };

        self.staging.update_duration(lookup.id(), duration)?;
        Ok(duration)
    }

    /// Best-effort removal of a staging entry and scratch files.
    async fn discard(&self, staging: Option<&StagingLookup>, temp_files: &[PathBuf]) {
        if let Some(lookup) = staging {
            if let Err(e) = self.staging.delete(lookup).await {
                warn!("Failed to discard staging entry {}: {}", lookup.id(), e);
            }
        }
        for path in temp_files {
            self.files().remove_quietly(path).await;
        }
    }

    // ==================== Mix specs ====================

    /// Spec built from the user's saved jingles, fitted into the plan.
    fn auto_mix_spec(&self, user: &UserContext) -> Result<Option<MixSpec>, PipelineError> {
        let jingles = self.library.list_jingles_for_user(&user.user_id)?;
        if jingles.is_empty() {
            return Ok(None);
        }

        let entries = jingles
            .into_iter()
            .map(|j| MixEntry {
                jingle_id: j.id,
                jingle_path: j.file_path,
                position: j.default_position,
                volume: j.default_volume,
            })
            .collect();
        let spec = quota::coerce_mix_spec(user.plan, MixSpec::new(entries));
        Ok((!spec.is_empty()).then_some(spec))
    }

    /// Spec for placements the user asked for. Rejected rather than fitted.
    fn explicit_mix_spec(
        &self,
        user: &UserContext,
        placements: &[PlacementRequest],
    ) -> Result<MixSpec, PipelineError> {
        if placements.is_empty() {
            return Err(PipelineError::Validation(
                "At least one jingle placement is required".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(placements.len());
        for placement in placements {
            let jingle = self.owned_jingle(user, &placement.jingle_id)?;
            let volume = placement.volume.unwrap_or(jingle.default_volume);
            if volume.is_nan() || !(0.0..=1.0).contains(&volume) {
                return Err(PipelineError::Validation(format!(
                    "Volume {} for jingle {} is outside [0, 1]",
                    volume, jingle.id
                )));
            }
            entries.push(MixEntry {
                jingle_id: jingle.id,
                jingle_path: jingle.file_path,
                position: placement.position.unwrap_or(jingle.default_position),
                volume,
            });
        }

        let spec = MixSpec::new(entries);
        quota::check_mix_spec(user.plan, &spec)?;
        Ok(spec)
    }

    fn owned_jingle(&self, user: &UserContext, id: &str) -> Result<JingleRef, PipelineError> {
        match self.library.get_jingle(id)? {
            Some(jingle) if jingle.owner_id == user.user_id => Ok(jingle),
            Some(_) => Err(PipelineError::Forbidden(format!(
                "Jingle {} belongs to another user",
                id
            ))),
            None => Err(PipelineError::NotFound(format!("Jingle {} not found", id))),
        }
    }

    // ==================== Finalize ====================

    /// Mix (optionally), tag and publish a staged file.
    ///
    /// Ownership, validation and quota failures leave the staging entry in
    /// place. From the mix on, the entry is consumed whatever happens.
    pub async fn finalize_staged(
        &self,
        user: &UserContext,
        staging_id: &str,
        options: FinalizeOptions,
    ) -> Result<FinalizeOutcome, PipelineError> {
        let lookup = self
            .staging
            .get_owned(staging_id, &user.user_id)
            .await
            .map_err(|e| failed("staging", e))?;

        let plan = match &options.mix {
            MixRequest::None => None,
            MixRequest::Auto => self
                .auto_mix_spec(user)?
                .map(|spec| (spec, MixFailurePolicy::FallbackToSource)),
            MixRequest::Explicit { placements } => {
                let status = self.quota_status(user)?;
                if !status.can_mix {
                    return Err(failed("quota", Self::denied(&status)));
                }
                let spec = self
                    .explicit_mix_spec(user, placements)
                    .map_err(|e| failed("mix-spec", e))?;
                Some((spec, MixFailurePolicy::Fail))
            }
        };

        let usage_kind = match (&options.mix, lookup.source_kind()) {
            (MixRequest::Explicit { .. }, _) => UsageKind::Mix,
            (_, SourceKind::Upload) => UsageKind::Upload,
            _ => UsageKind::ExternalIngest,
        };

        let mut metadata = options.metadata;
        if let Some(extracted) = lookup.entry().and_then(|e| e.extracted_metadata.as_ref()) {
            if metadata.title.is_none() {
                metadata.title = extracted.title.clone();
            }
            if metadata.artist.is_none() {
                metadata.artist = extracted.artist.clone();
            }
        }
        let extracted_cover = lookup
            .entry()
            .and_then(|e| e.extracted_cover_art_ref.clone());

        self.produce(Production {
            user,
            main: lookup.path().clone(),
            mix: plan,
            metadata,
            cover: options.cover,
            cover_ref: extracted_cover,
            usage_kind,
            parent_id: None,
            staging: Some(&lookup),
        })
        .await
    }

    /// Ingest and publish in one step, mixing in the user's saved jingles
    /// when there are any.
    pub async fn ingest_and_publish(
        &self,
        user: &UserContext,
        kind: SourceKind,
        locator: &str,
        metadata: AudioMetadata,
    ) -> Result<FinalizeOutcome, PipelineError> {
        let staged = self.ingest(user, kind, locator).await?;
        self.finalize_staged(
            user,
            &staged.staging_id,
            FinalizeOptions {
                metadata,
                mix: MixRequest::Auto,
                cover: None,
            },
        )
        .await
    }

    /// Mix jingles over an already published asset, producing a new one.
    pub async fn remix(
        &self,
        user: &UserContext,
        audio_id: &str,
        placements: &[PlacementRequest],
    ) -> Result<FinalizeOutcome, PipelineError> {
        let source = match self.library.get_final_audio(audio_id)? {
            Some(audio) if audio.owner_id == user.user_id => audio,
            Some(_) => {
                return Err(failed(
                    "remix",
                    PipelineError::Forbidden(format!("Audio {} belongs to another user", audio_id)),
                ))
            }
            None => {
                return Err(failed(
                    "remix",
                    PipelineError::NotFound(format!("Audio {} not found", audio_id)),
                ))
            }
        };
        let main = self.published_path(&source).map_err(|e| failed("remix", e))?;

        let status = self.quota_status(user)?;
        if !status.can_mix {
            return Err(failed("quota", Self::denied(&status)));
        }
        let spec = self
            .explicit_mix_spec(user, placements)
            .map_err(|e| failed("mix-spec", e))?;

        let metadata = AudioMetadata {
            title: Some(source.title.clone()),
            artist: source.artist.clone(),
            album: source.album.clone(),
            producer: source.producer.clone(),
            year: source.year,
            tags: source.tags.clone(),
        };

        self.produce(Production {
            user,
            main,
            mix: Some((spec, MixFailurePolicy::Fail)),
            metadata,
            cover: None,
            cover_ref: source.cover_art_ref.clone(),
            usage_kind: UsageKind::Mix,
            parent_id: Some(source.id.clone()),
            staging: None,
        })
        .await
    }

    /// Location of a published asset, derived from its record alone.
    fn published_path(&self, audio: &FinalAudio) -> Result<PathBuf, PipelineError> {
        let id = id_from_url(&audio.url)
            .filter(|id| id.to_string() == audio.id)
            .ok_or_else(|| {
                PipelineError::Internal(anyhow::anyhow!(
                    "url {} of audio {} does not match its id",
                    audio.url,
                    audio.id
                ))
            })?;

        let path = self.files().uploads_path(&final_file_name(&id));
        if !path.exists() {
            return Err(PipelineError::NotFound(format!(
                "File of audio {} is missing",
                audio.id
            )));
        }
        Ok(path)
    }

    async fn produce(&self, job: Production<'_>) -> Result<FinalizeOutcome, PipelineError> {
        let mut temp_files = Vec::new();

        let (audio_path, mixed) = match job.mix {
            None => (job.main.clone(), false),
            Some((spec, policy)) => match self.compositor.mix(&job.main, &spec, false).await {
                Ok(outcome) => {
                    temp_files.push(outcome.path.clone());
                    (outcome.path, true)
                }
                Err(e) => match policy {
                    MixFailurePolicy::FallbackToSource => {
                        warn!(
                            "Automatic mix for user {} failed, publishing unmixed audio: {}",
                            job.user.user_id, e
                        );
                        metrics::record_mix_fallback();
                        (job.main.clone(), false)
                    }
                    MixFailurePolicy::Fail => {
                        self.discard(job.staging, &temp_files).await;
                        return Err(failed("mix", e));
                    }
                },
            },
        };

        let cover_path = self
            .resolve_cover(job.cover, job.cover_ref.as_deref(), &job.main)
            .await;
        temp_files.extend(cover_path.iter().cloned());

        let audio = self
            .finalizer
            .finalize(FinalizeRequest {
                owner_id: &job.user.user_id,
                audio_path: &audio_path,
                metadata: job.metadata,
                cover_path,
                usage_kind: job.usage_kind,
                parent_id: job.parent_id,
                staging: job.staging,
                temp_files,
            })
            .await
            .map_err(|e| failed("finalize", e))?;

        Ok(FinalizeOutcome { audio, mixed })
    }

    // ==================== Preview ====================

    /// Short mixed preview of a staged file. The staging entry is kept.
    pub async fn preview(
        &self,
        user: &UserContext,
        staging_id: &str,
        placements: &[PlacementRequest],
    ) -> Result<Vec<u8>, PipelineError> {
        let lookup = self
            .staging
            .get_owned(staging_id, &user.user_id)
            .await
            .map_err(|e| failed("staging", e))?;
        let spec = self
            .explicit_mix_spec(user, placements)
            .map_err(|e| failed("mix-spec", e))?;

        let outcome = self
            .compositor
            .mix(lookup.path(), &spec, true)
            .await
            .map_err(|e| failed("mix", e))?;

        let bytes = tokio::fs::read(&outcome.path).await;
        self.files().remove_quietly(&outcome.path).await;
        let bytes = bytes.map_err(|e| failed("preview", anyhow::Error::from(e)))?;
        debug!(
            "Preview of {} for user {}: {} bytes ({}s max)",
            staging_id,
            user.user_id,
            bytes.len(),
            self.compositor.preview_secs()
        );
        Ok(bytes)
    }

    // ==================== Cover art ====================

    /// Pick a cover and write it to scratch: user bytes, then the extracted
    /// reference, then an image embedded in the source audio.
    async fn resolve_cover(
        &self,
        supplied: Option<Vec<u8>>,
        reference: Option<&str>,
        source: &Path,
    ) -> Option<PathBuf> {
        let data = match supplied.filter(|b| !b.is_empty()) {
            Some(bytes) => Some(bytes),
            None => match reference {
                Some(reference) => self.fetch_cover_ref(reference).await,
                None => None,
            },
        };
        let data = match data {
            Some(data) => data,
            None => match self.media.extract_embedded_image(source).await {
                Ok(Some(bytes)) if !bytes.is_empty() => bytes,
                Ok(_) => return None,
                Err(e) => {
                    debug!("No embedded image in {:?}: {}", source, e);
                    return None;
                }
            },
        };

        let extension = ImageFormat::detect(&data)
            .map(|f| f.extension())
            .unwrap_or("bin");
        let path = self.files().temp_path(COVER_PREFIX, extension);
        match tokio::fs::write(&path, &data).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Could not write cover to {:?}: {}", path, e);
                None
            }
        }
    }

    async fn fetch_cover_ref(&self, reference: &str) -> Option<Vec<u8>> {
        if let Some(name) = reference
            .rsplit('/')
            .next()
            .filter(|n| n.starts_with(COVER_FILE_PREFIX))
        {
            let local = self.files().uploads_path(name);
            if let Ok(bytes) = tokio::fs::read(&local).await {
                return Some(bytes);
            }
        }

        if !has_http_scheme(reference) {
            return None;
        }

        let response = match self.http.get(reference).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("Cover {} answered {}", reference, response.status());
                return None;
            }
            Err(e) => {
                warn!("Cover download from {} failed: {}", reference, e);
                return None;
            }
        };
        match source::read_capped(response, MAX_COVER_BYTES, "cover download").await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                warn!("Cover download from {} failed: {}", reference, e);
                None
            }
        }
    }

    // ==================== Jingles ====================

    pub async fn add_jingle(
        &self,
        user: &UserContext,
        filename: &str,
        bytes: Vec<u8>,
        name: Option<String>,
        position: Option<JinglePosition>,
        volume: Option<f32>,
    ) -> Result<JingleRef, PipelineError> {
        let filename = sanitize_filename(filename)?;
        Self::check_audio_payload(&filename, &bytes)?;
        let max = self.files().max_file_size();
        if bytes.len() as u64 > max {
            return Err(PipelineError::PayloadTooLarge(format!(
                "Jingle is {} bytes (max: {})",
                bytes.len(),
                max
            )));
        }
        let volume = volume.unwrap_or(1.0);
        if volume.is_nan() || !(0.0..=1.0).contains(&volume) {
            return Err(PipelineError::Validation(format!(
                "Volume {} is outside [0, 1]",
                volume
            )));
        }

        let id = Uuid::new_v4().to_string();
        let extension = extension_of(&filename).unwrap_or_else(|| "mp3".to_string());
        let dir = self.files().jingles_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(anyhow::Error::from)?;
        let path = dir.join(format!("{}{}.{}", JINGLE_FILE_PREFIX, id, extension));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(anyhow::Error::from)?;

        let duration = match self.media.probe_duration(&path).await {
            Ok(secs) => secs,
            Err(e) => {
                warn!("Probe of jingle {} failed: {}", id, e);
                self.files().remove_quietly(&path).await;
                return Err(PipelineError::UnsupportedFormat(
                    "Could not read jingle duration".to_string(),
                ));
            }
        };
        if let Err(e) = quota::check_jingle_duration_limit(user.plan, duration) {
            self.files().remove_quietly(&path).await;
            return Err(e.into());
        }

        let jingle = JingleRef {
            id,
            owner_id: user.user_id.clone(),
            name: name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .or_else(|| {
                    Path::new(&filename)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "Jingle".to_string()),
            file_path: path.clone(),
            duration_seconds: Some(duration),
            default_position: position.unwrap_or_default(),
            default_volume: volume,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.library.create_jingle(&jingle) {
            self.files().remove_quietly(&path).await;
            return Err(e.into());
        }

        info!(
            "Saved jingle {} for user {} ({:.1}s)",
            jingle.id, user.user_id, duration
        );
        Ok(jingle)
    }

    pub fn list_jingles(&self, user: &UserContext) -> Result<Vec<JingleRef>, PipelineError> {
        Ok(self.library.list_jingles_for_user(&user.user_id)?)
    }
}

/// One publish job, shared by every finalize flavor.
struct Production<'a> {
    user: &'a UserContext,
    main: PathBuf,
    mix: Option<(MixSpec, MixFailurePolicy)>,
    metadata: AudioMetadata,
    cover: Option<Vec<u8>>,
    cover_ref: Option<String>,
    usage_kind: UsageKind,
    parent_id: Option<String>,
    staging: Option<&'a StagingLookup>,
}

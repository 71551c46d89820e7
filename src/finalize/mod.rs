//! Finalizer: binds one identifier to the output file and the stored
//! record, persists it, records usage and clears every temporary artifact.

mod naming;

pub use naming::{
    cover_file_name, final_file_name, id_from_file_name, id_from_url, public_url,
    COVER_FILE_PREFIX, FINAL_EXTENSION, FINAL_PREFIX,
};

use crate::library::{AudioMetadata, FinalAudio, LibraryStore};
use crate::media::MediaEngine;
use crate::quota::{UsageKind, UsageRecord};
use crate::server::metrics;
use crate::staging::{StagingLookup, StagingManager};
use crate::tagging::{ImageFormat, TagEngine, TagError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("Failed to persist final audio: {0}")]
    Store(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the finalizer consumes.
pub struct FinalizeRequest<'a> {
    pub owner_id: &'a str,
    /// Mixed or unmixed audio to publish.
    pub audio_path: &'a Path,
    pub metadata: AudioMetadata,
    pub cover_path: Option<PathBuf>,
    pub usage_kind: UsageKind,
    pub parent_id: Option<String>,
    /// Staging entry consumed by this finalize, if any.
    pub staging: Option<&'a StagingLookup>,
    /// Intermediate files to delete once done.
    pub temp_files: Vec<PathBuf>,
}

pub struct Finalizer {
    tagger: TagEngine,
    media: Arc<dyn MediaEngine>,
    library: Arc<dyn LibraryStore>,
    staging: Arc<StagingManager>,
    public_base_url: String,
    sweep_ttl: Duration,
}

impl Finalizer {
    pub fn new(
        tagger: TagEngine,
        media: Arc<dyn MediaEngine>,
        library: Arc<dyn LibraryStore>,
        staging: Arc<StagingManager>,
        public_base_url: impl Into<String>,
        sweep_ttl: Duration,
    ) -> Self {
        Self {
            tagger,
            media,
            library,
            staging,
            public_base_url: public_base_url.into(),
            sweep_ttl,
        }
    }

    pub async fn finalize(&self, request: FinalizeRequest<'_>) -> Result<FinalAudio, FinalizeError> {
        let id = Uuid::new_v4();
        let result = self.publish(id, &request).await;
        self.cleanup(&request).await;

        match &result {
            Ok(audio) => {
                metrics::record_finalized_asset(request.usage_kind.as_str());
                info!(
                    "Finalized {} for user {} ({:?}s, {} bytes)",
                    audio.id, audio.owner_id, audio.duration_seconds, audio.size_bytes
                );
            }
            Err(e) => error!("Finalize of {} failed: {}", id, e),
        }
        result
    }

    async fn publish(&self, id: Uuid, request: &FinalizeRequest<'_>) -> Result<FinalAudio, FinalizeError> {
        let file_name = final_file_name(&id);
        let output = self.staging.files().uploads_path(&file_name);
        let source_size = tokio::fs::metadata(request.audio_path).await?.len();

        self.tagger
            .apply_metadata(
                request.audio_path,
                &output,
                &request.metadata,
                request.cover_path.as_deref(),
            )
            .await?;
        let size_bytes = tokio::fs::metadata(&output).await?.len();
        if !note_tag_size_change(&file_name, source_size, size_bytes) {
            debug!("Tagged {} ({} bytes)", file_name, size_bytes);
        }

        let duration_seconds = match self.media.probe_duration(&output).await {
            Ok(secs) => Some(secs),
            Err(e) => {
                warn!("Could not probe finalized {}: {}", file_name, e);
                None
            }
        };

        let cover_art_ref = match &request.cover_path {
            Some(path) => self.publish_cover(&id, path).await,
            None => None,
        };

        let metadata = &request.metadata;
        let audio = FinalAudio {
            id: id.to_string(),
            owner_id: request.owner_id.to_string(),
            title: metadata
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            producer: metadata.producer.clone(),
            year: metadata.year,
            tags: metadata.tags.clone(),
            cover_art_ref,
            url: public_url(&self.public_base_url, &file_name),
            duration_seconds,
            size_bytes: size_bytes as i64,
            parent_id: request.parent_id.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        if let Err(e) = self.library.create_final_audio(&audio) {
            self.staging.files().remove_quietly(&output).await;
            if let Some(cover) = &audio.cover_art_ref {
                if let Some(name) = cover.rsplit('/').next() {
                    self.staging
                        .files()
                        .remove_quietly(&self.staging.files().uploads_path(name))
                        .await;
                }
            }
            return Err(FinalizeError::Store(e));
        }

        if let Err(e) = self.library.record_usage(&UsageRecord {
            user_id: request.owner_id.to_string(),
            kind: request.usage_kind,
            duration_seconds,
            size_bytes: audio.size_bytes,
            created_at: audio.created_at,
        }) {
            error!("Failed to record usage for {}: {:#}", audio.id, e);
        }

        Ok(audio)
    }

    /// Copy the cover next to the audio. Failure only loses the link.
    async fn publish_cover(&self, id: &Uuid, path: &Path) -> Option<String> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not read cover {:?}: {}", path, e);
                return None;
            }
        };
        let extension = ImageFormat::detect(&data)
            .map(|f| f.extension())
            .or_else(|| infer::get(&data).map(|k| k.extension()))
            .unwrap_or("bin");

        let name = cover_file_name(id, extension);
        let dest = self.staging.files().uploads_path(&name);
        match tokio::fs::write(&dest, &data).await {
            Ok(()) => Some(public_url(&self.public_base_url, &name)),
            Err(e) => {
                warn!("Could not publish cover {:?}: {}", dest, e);
                None
            }
        }
    }

    async fn cleanup(&self, request: &FinalizeRequest<'_>) {
        if let Some(staging) = request.staging {
            if let Err(e) = self.staging.delete(staging).await {
                error!("Failed to delete staging entry {}: {}", staging.id(), e);
            }
        }

        for path in &request.temp_files {
            self.staging.files().remove_quietly(path).await;
        }

        match self.staging.files().sweep_orphans(self.sweep_ttl).await {
            Ok(0) => {}
            Ok(n) => debug!("Swept {} orphaned scratch files", n),
            Err(e) => warn!("Scratch sweep failed: {}", e),
        }
    }
}

/// Warn when the tag write changed the file size. Never fatal.
fn note_tag_size_change(file_name: &str, source_size: u64, tagged_size: u64) -> bool {
    if source_size == tagged_size {
        return false;
    }
    warn!(
        "{} changed size during tagging ({} -> {} bytes)",
        file_name, source_size, tagged_size
    );
    metrics::record_tag_size_mismatch();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_size_change_is_counted() {
        let before = metrics::TAG_SIZE_MISMATCH_TOTAL.get();
        assert!(note_tag_size_change("final-a.mp3", 1000, 1400));
        assert!(metrics::TAG_SIZE_MISMATCH_TOTAL.get() > before);
    }

    #[test]
    fn test_unchanged_size_is_quiet() {
        assert!(!note_tag_size_change("final-a.mp3", 1000, 1000));
    }
}

//! Staging manager: ties staging records to their backing files.

use super::file_handler::{FileHandler, FileHandlerError};
use super::models::{ExtractedMetadata, StagingEntry, StagingLookup};
use super::store::StagingStore;
use crate::server::metrics;
use crate::source::IngestedAudio;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("File handling error: {0}")]
    FileHandler(#[from] FileHandlerError),

    #[error("Staging entry not found: {0}")]
    NotFound(String),

    #[error("Staging entry {0} belongs to another user")]
    Forbidden(String),
}

pub struct StagingManager {
    store: Arc<dyn StagingStore>,
    files: Arc<FileHandler>,
}

impl StagingManager {
    pub fn new(store: Arc<dyn StagingStore>, files: Arc<FileHandler>) -> Self {
        Self { store, files }
    }

    pub fn files(&self) -> &Arc<FileHandler> {
        &self.files
    }

    /// Write `audio` to scratch and record it.
    pub async fn create(
        &self,
        owner_id: &str,
        audio: &IngestedAudio,
    ) -> Result<StagingEntry, StagingError> {
        let id = uuid::Uuid::new_v4().to_string();
        let file_path = self.files.save_staged(&id, &audio.bytes).await?;

        let metadata = ExtractedMetadata {
            title: audio.extracted_title.clone(),
            artist: audio.extracted_artist.clone(),
        };
        let entry = StagingEntry {
            id: id.clone(),
            owner_id: owner_id.to_string(),
            file_path,
            source_kind: audio.source_kind,
            size_bytes: audio.bytes.len() as i64,
            duration_seconds: audio.duration_seconds,
            extracted_cover_art_ref: audio.extracted_cover_art_ref.clone(),
            extracted_metadata: (!metadata.is_empty()).then_some(metadata),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        if let Err(e) = self.store.create(&entry) {
            self.files.remove_quietly(&entry.file_path).await;
            return Err(e.into());
        }

        info!(
            "Staged {} for user {} ({} bytes, {})",
            id,
            owner_id,
            entry.size_bytes,
            entry.source_kind.as_str()
        );
        Ok(entry)
    }

    /// Look a staging id up, falling back to the file-name convention.
    pub async fn lookup(&self, id: &str) -> Result<StagingLookup, StagingError> {
        if let Some(entry) = self.store.get(id)? {
            return Ok(StagingLookup::Found(entry));
        }

        let path = self.files.staged_path(id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!(
                "Staging record {} missing, reconstructed file path {:?} from its id",
                id, path
            );
            metrics::record_staging_reconstructed();
            return Ok(StagingLookup::Reconstructed {
                id: id.to_string(),
                path,
            });
        }

        Err(StagingError::NotFound(id.to_string()))
    }

    /// [`lookup`](Self::lookup) plus the ownership check.
    ///
    /// Reconstructed entries carry no owner and cannot be checked: once the
    /// record is gone, any caller who knows the id can consume the staged
    /// file. Ids are random v4 uuids and are only handed to the uploader.
    pub async fn get_owned(&self, id: &str, owner_id: &str) -> Result<StagingLookup, StagingError> {
        let lookup = self.lookup(id).await?;
        match &lookup {
            StagingLookup::Found(entry) if entry.owner_id != owner_id => {
                Err(StagingError::Forbidden(id.to_string()))
            }
            StagingLookup::Reconstructed { .. } => {
                warn!(
                    "Ownership of staging entry {} cannot be verified for user {}",
                    id, owner_id
                );
                Ok(lookup)
            }
            StagingLookup::Found(_) => Ok(lookup),
        }
    }

    pub fn update_duration(&self, id: &str, duration_seconds: f64) -> Result<(), StagingError> {
        self.store.update_duration(id, duration_seconds)?;
        Ok(())
    }

    /// Remove the record and its backing file. Safe to call twice.
    pub async fn delete(&self, lookup: &StagingLookup) -> Result<(), StagingError> {
        let removed = self.store.delete(lookup.id())?;
        self.files.remove_quietly(lookup.path()).await;
        debug!(
            "Deleted staging entry {} (record removed: {})",
            lookup.id(),
            removed
        );
        Ok(())
    }
}

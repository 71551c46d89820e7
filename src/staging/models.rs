//! Staging models.

use crate::source::SourceKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata pulled out of the source while ingesting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl ExtractedMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none()
    }
}

/// An ingested file waiting for the user to configure it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StagingEntry {
    pub id: String,
    pub owner_id: String,
    pub file_path: PathBuf,
    pub source_kind: SourceKind,
    pub size_bytes: i64,
    pub duration_seconds: Option<f64>,
    pub extracted_cover_art_ref: Option<String>,
    pub extracted_metadata: Option<ExtractedMetadata>,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Result of looking a staging id up.
#[derive(Clone, Debug, PartialEq)]
pub enum StagingLookup {
    Found(StagingEntry),
    /// No stored record, but a file exists under the conventional name.
    Reconstructed { id: String, path: PathBuf },
}

impl StagingLookup {
    pub fn id(&self) -> &str {
        match self {
            Self::Found(entry) => &entry.id,
            Self::Reconstructed { id, .. } => id,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Found(entry) => &entry.file_path,
            Self::Reconstructed { path, .. } => path,
        }
    }

    pub fn entry(&self) -> Option<&StagingEntry> {
        match self {
            Self::Found(entry) => Some(entry),
            Self::Reconstructed { .. } => None,
        }
    }

    pub fn is_reconstructed(&self) -> bool {
        matches!(self, Self::Reconstructed { .. })
    }

    /// Source kind, assuming an upload when nothing was recorded.
    pub fn source_kind(&self) -> SourceKind {
        self.entry()
            .map(|e| e.source_kind)
            .unwrap_or(SourceKind::Upload)
    }
}

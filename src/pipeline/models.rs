//! Inputs and outputs of pipeline operations.

use crate::library::{AudioMetadata, FinalAudio};
use crate::overlay::JinglePosition;
use crate::source::SourceKind;
use crate::staging::StagingLookup;
use serde::{Deserialize, Serialize};

/// A jingle the user wants placed. Unset fields fall back to the
/// jingle's saved defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlacementRequest {
    pub jingle_id: String,
    #[serde(default)]
    pub position: Option<JinglePosition>,
    #[serde(default)]
    pub volume: Option<f32>,
}

/// How jingles are mixed in when finalizing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MixRequest {
    #[default]
    None,
    /// Use the saved jingles. Engine failures fall back to the source.
    Auto,
    /// Use exactly these placements. Engine failures are fatal.
    Explicit { placements: Vec<PlacementRequest> },
}

#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
    pub metadata: AudioMetadata,
    pub mix: MixRequest,
    /// Cover image supplied by the user.
    pub cover: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeOutcome {
    pub audio: FinalAudio,
    pub mixed: bool,
}

/// What the user sees of a staging entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedAudio {
    pub staging_id: String,
    pub source_kind: SourceKind,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<i64>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub cover_art_ref: Option<String>,
}

impl StagedAudio {
    pub fn from_lookup(lookup: &StagingLookup, duration_seconds: Option<f64>) -> Self {
        let entry = lookup.entry();
        let extracted = entry.and_then(|e| e.extracted_metadata.as_ref());
        Self {
            staging_id: lookup.id().to_string(),
            source_kind: lookup.source_kind(),
            duration_seconds: duration_seconds.or_else(|| entry.and_then(|e| e.duration_seconds)),
            size_bytes: entry.map(|e| e.size_bytes),
            title: extracted.and_then(|m| m.title.clone()),
            artist: extracted.and_then(|m| m.artist.clone()),
            cover_art_ref: entry.and_then(|e| e.extracted_cover_art_ref.clone()),
        }
    }
}

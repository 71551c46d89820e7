//! Saved jingles and finalized audio.

use crate::overlay::JinglePosition;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A user's saved jingle.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JingleRef {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(skip)]
    pub file_path: PathBuf,
    pub duration_seconds: Option<f64>,
    pub default_position: JinglePosition,
    pub default_volume: f32,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Descriptive fields a user sets on a finalized asset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub producer: Option<String>,
    pub year: Option<i32>,
    pub tags: Vec<String>,
}

/// A finalized, addressable audio asset.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAudio {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub producer: Option<String>,
    pub year: Option<i32>,
    pub tags: Vec<String>,
    pub cover_art_ref: Option<String>,
    pub url: String,
    pub duration_seconds: Option<f64>,
    pub size_bytes: i64,
    pub parent_id: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
}

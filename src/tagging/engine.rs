//! Tag-and-verify: write descriptive tags and cover art, then prove the
//! cover actually landed in the file.

use super::container::{CoverImage, TagContainer, TagSet};
use super::signature::ImageFormat;
use super::TagError;
use crate::library::AudioMetadata;
use chrono::Datelike;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct TagEngine {
    container: Arc<dyn TagContainer>,
}

impl TagEngine {
    pub fn new(container: Arc<dyn TagContainer>) -> Self {
        Self { container }
    }

    /// Tag set for `fields`. The year defaults to the current one and the
    /// free-form tags become the genre.
    pub fn build_tag_set(fields: &AudioMetadata, cover: Option<CoverImage>) -> TagSet {
        let tags: Vec<&str> = fields
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        TagSet {
            title: fields.title.clone(),
            artist: fields.artist.clone(),
            album: fields.album.clone(),
            year: Some(fields.year.unwrap_or_else(|| chrono::Utc::now().year())),
            genre: (!tags.is_empty()).then(|| tags.join(", ")),
            producer: fields.producer.clone(),
            cover,
        }
    }

    async fn load_cover(path: &Path) -> Result<CoverImage, TagError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| TagError::Write(format!("reading cover {:?}: {}", path, e)))?;

        let mime_type = match ImageFormat::detect(&data) {
            Some(format) => format.mime_type().to_string(),
            None => {
                warn!(
                    "Cover {:?} ({} bytes) has no JPEG/PNG signature, embedding anyway",
                    path,
                    data.len()
                );
                infer::get(&data)
                    .map(|kind| kind.mime_type().to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string())
            }
        };

        Ok(CoverImage { mime_type, data })
    }

    /// Copy `input` to `output`, tag `output` and verify the result.
    ///
    /// `output` is removed again on any failure.
    pub async fn apply_metadata(
        &self,
        input: &Path,
        output: &Path,
        fields: &AudioMetadata,
        cover_path: Option<&Path>,
    ) -> Result<PathBuf, TagError> {
        let result = self.tag_into(input, output, fields, cover_path).await;
        if let Err(e) = &result {
            error!("Tagging {:?} failed: {}", output, e);
            if let Err(rm) = tokio::fs::remove_file(output).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not discard {:?}: {}", output, rm);
                }
            }
        }
        result
    }

    async fn tag_into(
        &self,
        input: &Path,
        output: &Path,
        fields: &AudioMetadata,
        cover_path: Option<&Path>,
    ) -> Result<PathBuf, TagError> {
        // The writer mutates an existing container in place.
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| TagError::Write(format!("copying {:?}: {}", input, e)))?;

        let cover = match cover_path {
            Some(path) => Some(Self::load_cover(path).await?),
            None => None,
        };
        let expects_cover = cover.is_some();
        let tags = Self::build_tag_set(fields, cover);

        let container = self.container.clone();
        let path = output.to_path_buf();
        let written = tokio::task::spawn_blocking(move || container.write(&tags, &path))
            .await
            .map_err(|e| TagError::Write(format!("tag writer task failed: {}", e)))??;
        if !written {
            return Err(TagError::Write(format!(
                "tag writer reported nothing written to {:?}",
                output
            )));
        }

        if !expects_cover {
            debug!("Tagged {:?} (no cover, verification skipped)", output);
            return Ok(output.to_path_buf());
        }

        let container = self.container.clone();
        let path = output.to_path_buf();
        let read = tokio::task::spawn_blocking(move || container.read(&path))
            .await
            .map_err(|e| TagError::Verify(format!("tag reader task failed: {}", e)))??;

        if !read.has_non_empty_image() {
            return Err(TagError::Verify(format!(
                "cover image missing from {:?} after write ({} image frames)",
                output,
                read.images.len()
            )));
        }

        debug!("Tagged {:?} and verified embedded cover", output);
        Ok(output.to_path_buf())
    }
}

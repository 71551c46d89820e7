//! File handling for staged, temporary and finalized audio.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors that can occur during file handling.
#[derive(Debug, Error)]
pub enum FileHandlerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),
}

pub const STAGED_PREFIX: &str = "staged_";
pub const DOWNLOAD_PREFIX: &str = "download_";
pub const TRANSCODE_PREFIX: &str = "transcode_";
pub const MIXED_PREFIX: &str = "mixed_";
pub const PREVIEW_PREFIX: &str = "preview_";
pub const COVER_PREFIX: &str = "cover_";

/// Name prefixes of every file the pipeline writes to the scratch directory.
pub const TEMP_PREFIXES: &[&str] = &[
    STAGED_PREFIX,
    DOWNLOAD_PREFIX,
    TRANSCODE_PREFIX,
    MIXED_PREFIX,
    PREVIEW_PREFIX,
    COVER_PREFIX,
];

/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "wma", "opus"];

/// Owns the scratch and uploads directories.
pub struct FileHandler {
    scratch_dir: PathBuf,
    uploads_dir: PathBuf,
    /// Maximum staged payload in bytes.
    max_file_size: u64,
}

impl FileHandler {
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        uploads_dir: impl Into<PathBuf>,
        max_file_size: u64,
    ) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            uploads_dir: uploads_dir.into(),
            max_file_size,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn jingles_dir(&self) -> PathBuf {
        self.uploads_dir.join("jingles")
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Create the scratch, uploads and jingles directories.
    pub async fn init(&self) -> Result<(), FileHandlerError> {
        fs::create_dir_all(&self.scratch_dir).await?;
        fs::create_dir_all(&self.uploads_dir).await?;
        fs::create_dir_all(self.jingles_dir()).await?;
        Ok(())
    }

    /// Conventional location of a staged file. Depends on `id` alone.
    pub fn staged_path(&self, staging_id: &str) -> PathBuf {
        self.scratch_dir.join(format!("{}{}", STAGED_PREFIX, staging_id))
    }

    /// A fresh, collision-free scratch path.
    pub fn temp_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let name = if extension.is_empty() {
            format!("{}{}", prefix, Uuid::new_v4())
        } else {
            format!("{}{}.{}", prefix, Uuid::new_v4(), extension)
        };
        self.scratch_dir.join(name)
    }

    pub fn uploads_path(&self, file_name: &str) -> PathBuf {
        self.uploads_dir.join(file_name)
    }

    /// Write a staged payload under its conventional name.
    pub async fn save_staged(
        &self,
        staging_id: &str,
        data: &[u8],
    ) -> Result<PathBuf, FileHandlerError> {
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(FileHandlerError::FileTooLarge(size, self.max_file_size));
        }

        fs::create_dir_all(&self.scratch_dir).await?;
        let path = self.staged_path(staging_id);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(path)
    }

    /// Best-effort removal. Missing files are not an error.
    pub async fn remove_quietly(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!("Removed {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {:?}: {}", path, e),
        }
    }

    /// Delete prefixed scratch files older than `max_age`.
    ///
    /// Younger files may belong to a pipeline that is still running.
    pub async fn sweep_orphans(&self, max_age: Duration) -> Result<usize, FileHandlerError> {
        let mut removed = 0;
        let mut entries = match fs::read_dir(&self.scratch_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let now = SystemTime::now();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !TEMP_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Sweep could not remove {:?}: {}", path, e),
            }
        }

        if removed > 0 {
            debug!("Swept {} orphaned scratch files", removed);
        }
        Ok(removed)
    }

    /// Check if a file is a supported audio format.
    pub fn is_supported_audio(filename: &str) -> bool {
        extension_of(filename)
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false)
    }
}

/// Lowercased extension of a file name, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Sanitize a filename to prevent path traversal attacks.
pub fn sanitize_filename(filename: &str) -> Result<String, FileHandlerError> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FileHandlerError::InvalidFilename(filename.to_string()))?;

    if name.contains('\0') || name.starts_with('.') || name == ".." {
        return Err(FileHandlerError::InvalidFilename(filename.to_string()));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    if sanitized.is_empty() {
        return Err(FileHandlerError::InvalidFilename(filename.to_string()));
    }

    Ok(sanitized)
}

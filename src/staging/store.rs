//! SQLite store for staging entries.

use super::models::{ExtractedMetadata, StagingEntry};
use super::schema::STAGING_SCHEMA_SQL;
use crate::source::SourceKind;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for staging storage operations.
pub trait StagingStore: Send + Sync {
    fn create(&self, entry: &StagingEntry) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<StagingEntry>>;

    fn update_duration(&self, id: &str, duration_seconds: f64) -> Result<()>;

    /// Returns whether a record was deleted.
    fn delete(&self, id: &str) -> Result<bool>;
}

/// SQLite implementation of StagingStore.
pub struct SqliteStagingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStagingStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open staging database: {:?}", path))?;
        // The library store writes to the same file.
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(STAGING_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(STAGING_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<StagingEntry> {
        let title: Option<String> = row.get("extracted_title")?;
        let artist: Option<String> = row.get("extracted_artist")?;
        let metadata = ExtractedMetadata { title, artist };

        Ok(StagingEntry {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            file_path: PathBuf::from(row.get::<_, String>("file_path")?),
            source_kind: SourceKind::parse(&row.get::<_, String>("source_kind")?)
                .unwrap_or(SourceKind::Upload),
            size_bytes: row.get("size_bytes")?,
            duration_seconds: row.get("duration_seconds")?,
            extracted_cover_art_ref: row.get("extracted_cover_art_ref")?,
            extracted_metadata: (!metadata.is_empty()).then_some(metadata),
            created_at: row.get("created_at")?,
        })
    }
}

impl StagingStore for SqliteStagingStore {
    fn create(&self, entry: &StagingEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let metadata = entry.extracted_metadata.clone().unwrap_or_default();
        conn.execute(
            r#"
            INSERT INTO staging_entries (
                id, owner_id, file_path, source_kind, size_bytes, duration_seconds,
                extracted_cover_art_ref, extracted_title, extracted_artist, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                entry.id,
                entry.owner_id,
                entry.file_path.to_string_lossy(),
                entry.source_kind.as_str(),
                entry.size_bytes,
                entry.duration_seconds,
                entry.extracted_cover_art_ref,
                metadata.title,
                metadata.artist,
                entry.created_at,
            ],
        )
        .with_context(|| format!("Failed to insert staging entry {}", entry.id))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<StagingEntry>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM staging_entries WHERE id = ?1",
                params![id],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(result)
    }

    fn update_duration(&self, id: &str, duration_seconds: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE staging_entries SET duration_seconds = ?2 WHERE id = ?1",
            params![id, duration_seconds],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM staging_entries WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> StagingEntry {
        StagingEntry {
            id: id.to_string(),
            owner_id: "user1".to_string(),
            file_path: PathBuf::from(format!("/scratch/staged_{}", id)),
            source_kind: SourceKind::VideoPlatform,
            size_bytes: 4096,
            duration_seconds: None,
            extracted_cover_art_ref: Some("https://img.example/c.jpg".to_string()),
            extracted_metadata: Some(ExtractedMetadata {
                title: Some("Song".to_string()),
                artist: None,
            }),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = SqliteStagingStore::in_memory().unwrap();
        store.create(&entry("s1")).unwrap();

        let retrieved = store.get("s1").unwrap().unwrap();
        assert_eq!(retrieved, entry("s1"));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_duration() {
        let store = SqliteStagingStore::in_memory().unwrap();
        store.create(&entry("s1")).unwrap();
        store.update_duration("s1", 200.5).unwrap();

        assert_eq!(store.get("s1").unwrap().unwrap().duration_seconds, Some(200.5));
    }

    #[test]
    fn test_delete_reports_whether_a_row_went_away() {
        let store = SqliteStagingStore::in_memory().unwrap();
        store.create(&entry("s1")).unwrap();

        assert!(store.delete("s1").unwrap());
        assert!(!store.delete("s1").unwrap());
        assert!(store.get("s1").unwrap().is_none());
    }

    #[test]
    fn test_empty_metadata_reads_back_as_none() {
        let store = SqliteStagingStore::in_memory().unwrap();
        let mut e = entry("s2");
        e.extracted_metadata = None;
        store.create(&e).unwrap();
        assert!(store.get("s2").unwrap().unwrap().extracted_metadata.is_none());
    }
}

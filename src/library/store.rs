//! SQLite store for jingles, finalized audio and usage history.

use super::models::{FinalAudio, JingleRef};
use super::schema::LIBRARY_SCHEMA_SQL;
use crate::overlay::JinglePosition;
use crate::quota::{UsageKind, UsageRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for library storage operations.
pub trait LibraryStore: Send + Sync {
    // ==================== Jingles ====================

    fn create_jingle(&self, jingle: &JingleRef) -> Result<()>;

    fn get_jingle(&self, id: &str) -> Result<Option<JingleRef>>;

    /// Oldest first.
    fn list_jingles_for_user(&self, owner_id: &str) -> Result<Vec<JingleRef>>;

    // ==================== Final Audio ====================

    fn create_final_audio(&self, audio: &FinalAudio) -> Result<()>;

    fn get_final_audio(&self, id: &str) -> Result<Option<FinalAudio>>;

    // ==================== Usage ====================

    fn record_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Usage of `user_id` at or after `since_ms`.
    fn usage_since(&self, user_id: &str, since_ms: i64) -> Result<Vec<UsageRecord>>;
}

/// SQLite implementation of LibraryStore.
pub struct SqliteLibraryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLibraryStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open library database: {:?}", path))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(LIBRARY_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(LIBRARY_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_jingle(row: &rusqlite::Row) -> rusqlite::Result<JingleRef> {
        Ok(JingleRef {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            name: row.get("name")?,
            file_path: PathBuf::from(row.get::<_, String>("file_path")?),
            duration_seconds: row.get("duration_seconds")?,
            default_position: JinglePosition::parse(&row.get::<_, String>("default_position")?)
                .unwrap_or_default(),
            default_volume: row.get::<_, f64>("default_volume")? as f32,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_final_audio(row: &rusqlite::Row) -> rusqlite::Result<FinalAudio> {
        let tags: Vec<String> = row
            .get::<_, Option<String>>("tags")?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        Ok(FinalAudio {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            title: row.get("title")?,
            artist: row.get("artist")?,
            album: row.get("album")?,
            producer: row.get("producer")?,
            year: row.get("year")?,
            tags,
            cover_art_ref: row.get("cover_art_ref")?,
            url: row.get("url")?,
            duration_seconds: row.get("duration_seconds")?,
            size_bytes: row.get("size_bytes")?,
            parent_id: row.get("parent_id")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_usage(row: &rusqlite::Row) -> rusqlite::Result<Option<UsageRecord>> {
        let kind: String = row.get("kind")?;
        let Some(kind) = UsageKind::parse(&kind) else {
            return Ok(None);
        };
        Ok(Some(UsageRecord {
            user_id: row.get("user_id")?,
            kind,
            duration_seconds: row.get("duration_seconds")?,
            size_bytes: row.get("size_bytes")?,
            created_at: row.get("created_at")?,
        }))
    }
}

impl LibraryStore for SqliteLibraryStore {
    // ==================== Jingles ====================

    fn create_jingle(&self, jingle: &JingleRef) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO jingles (
                id, owner_id, name, file_path, duration_seconds,
                default_position, default_volume, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                jingle.id,
                jingle.owner_id,
                jingle.name,
                jingle.file_path.to_string_lossy(),
                jingle.duration_seconds,
                jingle.default_position.as_str(),
                jingle.default_volume as f64,
                jingle.created_at,
            ],
        )
        .with_context(|| format!("Failed to insert jingle {}", jingle.id))?;
        Ok(())
    }

    fn get_jingle(&self, id: &str) -> Result<Option<JingleRef>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM jingles WHERE id = ?1",
                params![id],
                Self::row_to_jingle,
            )
            .optional()?;
        Ok(result)
    }

    fn list_jingles_for_user(&self, owner_id: &str) -> Result<Vec<JingleRef>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM jingles WHERE owner_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let jingles = stmt
            .query_map(params![owner_id], Self::row_to_jingle)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jingles)
    }

    // ==================== Final Audio ====================

    fn create_final_audio(&self, audio: &FinalAudio) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let tags = serde_json::to_string(&audio.tags)?;
        conn.execute(
            r#"
            INSERT INTO final_audio (
                id, owner_id, title, artist, album, producer, year, tags,
                cover_art_ref, url, duration_seconds, size_bytes, parent_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                audio.id,
                audio.owner_id,
                audio.title,
                audio.artist,
                audio.album,
                audio.producer,
                audio.year,
                tags,
                audio.cover_art_ref,
                audio.url,
                audio.duration_seconds,
                audio.size_bytes,
                audio.parent_id,
                audio.created_at,
            ],
        )
        .with_context(|| format!("Failed to insert final audio {}", audio.id))?;
        Ok(())
    }

    fn get_final_audio(&self, id: &str) -> Result<Option<FinalAudio>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM final_audio WHERE id = ?1",
                params![id],
                Self::row_to_final_audio,
            )
            .optional()?;
        Ok(result)
    }

    // ==================== Usage ====================

    fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO usage_log (user_id, kind, duration_seconds, size_bytes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.user_id,
                record.kind.as_str(),
                record.duration_seconds,
                record.size_bytes,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn usage_since(&self, user_id: &str, since_ms: i64) -> Result<Vec<UsageRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM usage_log WHERE user_id = ?1 AND created_at >= ?2 ORDER BY created_at ASC, rowid ASC",
        )?;
        let records = stmt
            .query_map(params![user_id, since_ms], Self::row_to_usage)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jingle(id: &str, owner: &str, created_at: i64) -> JingleRef {
        JingleRef {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: format!("Jingle {}", id),
            file_path: PathBuf::from(format!("/uploads/jingles/jingle-{}.mp3", id)),
            duration_seconds: Some(10.0),
            default_position: JinglePosition::End,
            default_volume: 0.75,
            created_at,
        }
    }

    fn final_audio(id: &str) -> FinalAudio {
        FinalAudio {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            title: "Song".to_string(),
            artist: Some("Band".to_string()),
            album: None,
            producer: Some("Prod".to_string()),
            year: Some(2026),
            tags: vec!["rock".to_string(), "live".to_string()],
            cover_art_ref: None,
            url: format!("/uploads/final-{}.mp3", id),
            duration_seconds: Some(200.0),
            size_bytes: 123_456,
            parent_id: Some("parent".to_string()),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_jingles_listed_per_owner_oldest_first() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        store.create_jingle(&jingle("b", "u1", 200)).unwrap();
        store.create_jingle(&jingle("a", "u1", 100)).unwrap();
        store.create_jingle(&jingle("c", "u2", 50)).unwrap();

        let listed = store.list_jingles_for_user("u1").unwrap();
        let ids: Vec<&str> = listed.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(listed[0].default_position, JinglePosition::End);
        assert_eq!(listed[0].default_volume, 0.75);

        assert_eq!(store.get_jingle("c").unwrap().unwrap().owner_id, "u2");
        assert!(store.get_jingle("zzz").unwrap().is_none());
    }

    #[test]
    fn test_final_audio_roundtrip() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        store.create_final_audio(&final_audio("f1")).unwrap();
        assert_eq!(store.get_final_audio("f1").unwrap().unwrap(), final_audio("f1"));
    }

    #[test]
    fn test_final_audio_id_is_unique() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        store.create_final_audio(&final_audio("f1")).unwrap();
        assert!(store.create_final_audio(&final_audio("f1")).is_err());
    }

    #[test]
    fn test_usage_since() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        for (kind, at) in [
            (UsageKind::Mix, 10),
            (UsageKind::Upload, 20),
            (UsageKind::ExternalIngest, 30),
        ] {
            store
                .record_usage(&UsageRecord {
                    user_id: "u1".to_string(),
                    kind,
                    duration_seconds: Some(1.0),
                    size_bytes: 1,
                    created_at: at,
                })
                .unwrap();
        }

        let since = store.usage_since("u1", 20).unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].kind, UsageKind::Upload);
        assert!(store.usage_since("u2", 0).unwrap().is_empty());
    }
}

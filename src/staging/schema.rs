//! Database schema for staged audio.

pub const STAGING_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS staging_entries (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    file_path TEXT NOT NULL,
    source_kind TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    duration_seconds REAL,
    extracted_cover_art_ref TEXT,
    extracted_title TEXT,
    extracted_artist TEXT,

    -- Unix milliseconds
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_staging_entries_owner ON staging_entries(owner_id);
CREATE INDEX IF NOT EXISTS idx_staging_entries_created ON staging_entries(created_at);
"#;

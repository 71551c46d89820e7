//! Database schema for jingles, finalized audio and usage history.

pub const LIBRARY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS jingles (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    duration_seconds REAL,
    default_position TEXT NOT NULL DEFAULT 'start',
    default_volume REAL NOT NULL DEFAULT 1.0,
    created_at INTEGER NOT NULL
);

-- id is also the file name component: final-{id}.mp3
CREATE TABLE IF NOT EXISTS final_audio (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    artist TEXT,
    album TEXT,
    producer TEXT,
    year INTEGER,
    -- JSON array of strings
    tags TEXT NOT NULL DEFAULT '[]',
    cover_art_ref TEXT,
    url TEXT NOT NULL,
    duration_seconds REAL,
    size_bytes INTEGER NOT NULL,
    parent_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS usage_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    duration_seconds REAL,
    size_bytes INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jingles_owner ON jingles(owner_id, created_at);
CREATE INDEX IF NOT EXISTS idx_final_audio_owner ON final_audio(owner_id);
CREATE INDEX IF NOT EXISTS idx_usage_log_user_time ON usage_log(user_id, created_at);
"#;

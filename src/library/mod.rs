//! Persistent library: saved jingles, finalized audio, usage history.

mod models;
mod schema;
mod store;

pub use models::{AudioMetadata, FinalAudio, JingleRef};
pub use schema::LIBRARY_SCHEMA_SQL;
pub use store::{LibraryStore, SqliteLibraryStore};

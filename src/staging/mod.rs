//! Staging store: ingested audio held under an opaque id until finalized.

mod file_handler;
mod manager;
mod models;
mod schema;
mod store;

pub use file_handler::{
    extension_of, sanitize_filename, FileHandler, FileHandlerError, COVER_PREFIX, DOWNLOAD_PREFIX,
    MIXED_PREFIX, PREVIEW_PREFIX, STAGED_PREFIX, TEMP_PREFIXES, TRANSCODE_PREFIX,
};
pub use manager::{StagingError, StagingManager};
pub use models::{ExtractedMetadata, StagingEntry, StagingLookup};
pub use schema::STAGING_SCHEMA_SQL;
pub use store::{SqliteStagingStore, StagingStore};

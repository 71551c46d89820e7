//! File names of finalized assets. The asset id is the only variable part,
//! so the record id and the file name can always be derived from each other.

use uuid::Uuid;

pub const FINAL_PREFIX: &str = "final-";
pub const FINAL_EXTENSION: &str = "mp3";
pub const COVER_FILE_PREFIX: &str = "cover-";

pub fn final_file_name(id: &Uuid) -> String {
    format!("{}{}.{}", FINAL_PREFIX, id.hyphenated(), FINAL_EXTENSION)
}

pub fn cover_file_name(id: &Uuid, extension: &str) -> String {
    format!("{}{}.{}", COVER_FILE_PREFIX, id.hyphenated(), extension)
}

/// Inverse of [`final_file_name`]. Only the exact canonical form parses.
pub fn id_from_file_name(name: &str) -> Option<Uuid> {
    let raw = name
        .strip_prefix(FINAL_PREFIX)?
        .strip_suffix(FINAL_EXTENSION)?
        .strip_suffix('.')?;
    let id = Uuid::parse_str(raw).ok()?;
    (id.hyphenated().to_string() == raw).then_some(id)
}

/// Asset id from a public URL or path ending in a final file name.
pub fn id_from_url(url: &str) -> Option<Uuid> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    id_from_file_name(name)
}

/// Public URL of a file in the uploads directory.
pub fn public_url(base_url: &str, file_name: &str) -> String {
    format!("{}/uploads/{}", base_url.trim_end_matches('/'), file_name)
}

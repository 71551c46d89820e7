//! Tag-and-verify engine.

mod container;
mod engine;
mod signature;

pub use container::{CoverImage, Id3TagContainer, ReadTags, TagContainer, TagSet, PRODUCER_FIELD};
pub use engine::TagEngine;
pub use signature::ImageFormat;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Tag write failed: {0}")]
    Write(String),

    /// The written file does not contain what was asked for.
    #[error("Tag verification failed: {0}")]
    Verify(String),
}

//! Binary tag container reader/writer.

use super::TagError;
use id3::frame::{ExtendedText, Picture, PictureType};
use id3::{Tag, TagLike, Version};
use std::path::Path;

/// Custom text frame holding the producer credit.
pub const PRODUCER_FIELD: &str = "PRODUCER";

#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Everything written into a container in one go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub producer: Option<String>,
    pub cover: Option<CoverImage>,
}

/// Tags as read back from a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub producer: Option<String>,
    /// Byte buffers of every embedded image.
    pub images: Vec<Vec<u8>>,
}

impl ReadTags {
    pub fn has_non_empty_image(&self) -> bool {
        self.images.iter().any(|data| !data.is_empty())
    }
}

/// Black-box tag writer/reader. Blocking; callers run it off the async runtime.
pub trait TagContainer: Send + Sync {
    /// Returns whether the writer reports having written anything.
    fn write(&self, tags: &TagSet, path: &Path) -> Result<bool, TagError>;

    fn read(&self, path: &Path) -> Result<ReadTags, TagError>;
}

/// ID3v2.3 container, as used by MP3.
#[derive(Debug, Default)]
pub struct Id3TagContainer;

impl Id3TagContainer {
    fn load(path: &Path) -> Result<Tag, TagError> {
        match Tag::read_from_path(path) {
            Ok(tag) => Ok(tag),
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => Ok(Tag::new()),
            Err(e) => Err(TagError::Write(format!("reading existing tag: {}", e))),
        }
    }
}

impl TagContainer for Id3TagContainer {
    fn write(&self, tags: &TagSet, path: &Path) -> Result<bool, TagError> {
        let mut tag = Self::load(path)?;

        if let Some(title) = &tags.title {
            tag.set_title(title.as_str());
        }
        if let Some(artist) = &tags.artist {
            tag.set_artist(artist.as_str());
        }
        if let Some(album) = &tags.album {
            tag.set_album(album.as_str());
        }
        if let Some(year) = tags.year {
            tag.set_year(year);
        }
        if let Some(genre) = &tags.genre {
            tag.set_genre(genre.as_str());
        }
        if let Some(producer) = &tags.producer {
            tag.remove_extended_text(Some(PRODUCER_FIELD), None);
            tag.add_frame(ExtendedText {
                description: PRODUCER_FIELD.to_string(),
                value: producer.clone(),
            });
        }
        if let Some(cover) = &tags.cover {
            tag.remove_all_pictures();
            tag.add_frame(Picture {
                mime_type: cover.mime_type.clone(),
                picture_type: PictureType::CoverFront,
                description: "Cover".to_string(),
                data: cover.data.clone(),
            });
        }

        if tag.frames().next().is_none() {
            return Ok(false);
        }

        tag.write_to_path(path, Version::Id3v23)
            .map_err(|e| TagError::Write(e.to_string()))?;
        Ok(true)
    }

    fn read(&self, path: &Path) -> Result<ReadTags, TagError> {
        let tag = match Tag::read_from_path(path) {
            Ok(tag) => tag,
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => return Ok(ReadTags::default()),
            Err(e) => return Err(TagError::Verify(format!("re-reading tag: {}", e))),
        };

        let producer = tag
            .extended_texts()
            .find(|t| t.description == PRODUCER_FIELD)
            .map(|t| t.value.clone());

        Ok(ReadTags {
            title: tag.title().map(str::to_string),
            artist: tag.artist().map(str::to_string),
            album: tag.album().map(str::to_string),
            year: tag.year(),
            genre: tag.genre().map(str::to_string),
            producer,
            images: tag.pictures().map(|p| p.data.clone()).collect(),
        })
    }
}

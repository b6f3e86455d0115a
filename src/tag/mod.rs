//! Embedded metadata for downloaded audio
//!
//! Two container families are handled:
//! - MP3: an ID3v2 tag block written ahead of the audio payload
//! - FLAC: the metadata blocks are rebuilt around the original STREAMINFO

pub mod flac;
pub mod mp3;

use thiserror::Error;

use crate::catalog::Track;
use crate::utils::cover_art::CoverArt;

/// Description written for embedded front covers
pub const COVER_DESCRIPTION: &str = "Front cover";

/// MIME type of embedded cover art
pub const COVER_MIME: &str = "image/jpeg";

/// Metadata to embed in one audio file
#[derive(Debug, Clone)]
pub struct TagMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track_number: u32,
    pub cover: Option<CoverArt>,
}

impl TagMetadata {
    pub fn from_track(track: &Track, cover: Option<CoverArt>) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            track_number: track.track_number,
            cover,
        }
    }
}

/// Failure while building or writing embedded metadata
#[derive(Debug, Error)]
pub enum TagError {
    #[error("stream does not start with the fLaC signature")]
    BadMagic,

    #[error("first metadata block is type {0}, expected STREAMINFO")]
    MissingStreamInfo(u8),

    #[error("STREAMINFO block has length {0}, expected 34")]
    BadStreamInfoLength(usize),

    #[error("metadata block of {0} bytes exceeds the 24-bit length field")]
    BlockTooLarge(usize),

    #[error("failed to encode ID3 tag: {0}")]
    Id3(#[from] ::id3::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

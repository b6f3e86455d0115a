//! Subsonic API response models

use serde::Deserialize;

use crate::catalog::{AlbumRef, Explicitness, Track};
use crate::download::QualityTier;

/// Wrapper for all Subsonic API responses
#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicResponse<T> {
    #[serde(rename = "subsonic-response")]
    pub subsonic_response: SubsonicResponseInner<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicResponseInner<T> {
    pub status: String,
    pub version: String,
    #[serde(flatten)]
    pub data: Option<T>,
    pub error: Option<SubsonicError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicError {
    pub code: i32,
    pub message: String,
}

// Song response (getSong)
#[derive(Debug, Clone, Deserialize)]
pub struct SongData {
    pub song: Song,
}

// Artist with albums response (getArtist)
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistData {
    pub artist: ArtistWithAlbums,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistWithAlbums {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album: Vec<Album>,
}

/// Album from the library
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist: Option<String>,
    #[serde(rename = "coverArt")]
    pub cover_art: Option<String>,
    /// OpenSubsonic: "explicit", "clean" or empty
    #[serde(rename = "explicitStatus")]
    pub explicit_status: Option<String>,
}

impl From<Album> for AlbumRef {
    fn from(album: Album) -> Self {
        let explicitness = match album.explicit_status.as_deref() {
            Some("explicit") => Explicitness::Explicit,
            Some("clean") => Explicitness::Clean,
            _ => Explicitness::Unknown,
        };
        AlbumRef {
            id: album.id,
            title: album.name,
            explicitness,
        }
    }
}

// Album with songs response (getAlbum)
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumData {
    pub album: AlbumWithSongs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumWithSongs {
    pub id: String,
    pub name: String,
    pub artist: Option<String>,
    #[serde(rename = "coverArt")]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub song: Vec<Song>,
}

/// Song/track from the library
#[derive(Debug, Clone, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub track: Option<u32>,
    pub suffix: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    #[serde(rename = "bitRate")]
    pub bit_rate: Option<u32>,
    #[serde(rename = "coverArt")]
    pub cover_art: Option<String>,
}

impl Song {
    /// Whether the stored original file is FLAC
    pub fn is_flac(&self) -> bool {
        self.suffix
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("flac"))
            || self
                .content_type
                .as_deref()
                .is_some_and(|c| c.contains("flac"))
    }

    /// Tiers the server can deliver for this song
    ///
    /// Lossless is only the original FLAC file. MP3 tiers come from
    /// server-side transcoding; 320 kbps is not offered for low bit rate
    /// sources.
    pub fn available_tiers(&self) -> Vec<QualityTier> {
        if self.is_flac() {
            return vec![QualityTier::Mp3Low, QualityTier::Mp3High, QualityTier::Lossless];
        }
        match self.bit_rate {
            Some(rate) if rate < 320 => vec![QualityTier::Mp3Low],
            _ => vec![QualityTier::Mp3Low, QualityTier::Mp3High],
        }
    }

    pub fn into_track(self, album: Option<&AlbumWithSongs>) -> Track {
        let available_tiers = self.available_tiers();
        let artist = self
            .artist
            .or_else(|| album.and_then(|a| a.artist.clone()))
            .unwrap_or_else(|| "Unknown Artist".to_string());
        let album_name = self
            .album
            .or_else(|| album.map(|a| a.name.clone()))
            .unwrap_or_else(|| "Unknown Album".to_string());
        let cover_art = self
            .cover_art
            .or_else(|| album.and_then(|a| a.cover_art.clone()));

        Track {
            id: self.id,
            title: self.title,
            artist,
            album: album_name,
            track_number: self.track.unwrap_or(0),
            cover_art,
            available_tiers,
        }
    }
}

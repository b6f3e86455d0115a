//! Catalog lookups: what to download and where to fetch it from

pub mod dedup;
pub mod link;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::download::QualityTier;

pub use dedup::dedup_albums;
pub use link::{Link, LinkKind, parse_link};

/// A track as described by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track_number: u32,
    /// Opaque cover art reference understood by the catalog
    pub cover_art: Option<String>,
    /// Tiers the service reports for this track
    pub available_tiers: Vec<QualityTier>,
}

/// Explicit-content marking of an album release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Explicitness {
    Explicit,
    Clean,
    #[default]
    Unknown,
}

/// Album entry in an artist listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRef {
    pub id: String,
    pub title: String,
    pub explicitness: Explicitness,
}

impl AlbumRef {
    /// Whether this is the edited (clean) release
    pub fn is_edited(&self) -> bool {
        self.explicitness == Explicitness::Clean
    }
}

/// Remote music catalog
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn lookup_track(&self, id: &str) -> Result<Track>;

    async fn tracks_for_album(&self, id: &str) -> Result<Vec<Track>>;

    async fn albums_for_artist(&self, id: &str) -> Result<Vec<AlbumRef>>;

    /// Tiers the service will currently serve for a track
    fn available_tiers(&self, track: &Track) -> Vec<QualityTier> {
        track.available_tiers.clone()
    }

    fn download_url(&self, track: &Track, tier: QualityTier) -> String;

    fn cover_art_url(&self, reference: &str, size: u32) -> String;

    /// Whether a download response is the audio for `tier`
    fn accepts(&self, _tier: QualityTier, status: StatusCode, _content_type: &str) -> bool {
        status == StatusCode::OK
    }
}

/// Turn shared links into the tracks they cover
///
/// Invalid links and catalog failures are logged and skipped.
pub async fn resolve_links(catalog: &dyn Catalog, links: &[String], prefer_edited: bool) -> Vec<Track> {
    let mut tracks = Vec::new();

    for raw in links {
        let Some(link) = parse_link(raw) else {
            warn!("Invalid link: {}", raw);
            continue;
        };
        debug!("Resolving {} {}", link.kind, link.id);

        match link.kind {
            LinkKind::Song => match catalog.lookup_track(&link.id).await {
                Ok(track) => tracks.push(track),
                Err(e) => warn!("Failed to get song {}: {:#}", link.id, e),
            },
            LinkKind::Album => match catalog.tracks_for_album(&link.id).await {
                Ok(album_tracks) => tracks.extend(album_tracks),
                Err(e) => warn!("Failed to get album {}: {:#}", link.id, e),
            },
            LinkKind::Artist => {
                let albums = match catalog.albums_for_artist(&link.id).await {
                    Ok(albums) => albums,
                    Err(e) => {
                        warn!("Failed to get artist {}: {:#}", link.id, e);
                        continue;
                    }
                };
                let total = albums.len();
                let albums = dedup_albums(albums, prefer_edited);
                debug!("Artist {}: {} albums, {} after de-duplication", link.id, total, albums.len());

                for album in albums {
                    match catalog.tracks_for_album(&album.id).await {
                        Ok(album_tracks) => tracks.extend(album_tracks),
                        Err(e) => warn!("Failed to get album {}: {:#}", album.id, e),
                    }
                }
            }
        }
    }

    tracks
}

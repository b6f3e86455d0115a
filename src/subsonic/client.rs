//! Subsonic API HTTP client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::auth::{CLIENT_NAME, TokenAuth};
use super::models::*;
use crate::catalog::{AlbumRef, Catalog, Track};
use crate::download::QualityTier;

/// HTTP client for Subsonic REST API
#[derive(Clone)]
pub struct SubsonicClient {
    base_url: Url,
    username: String,
    password: String,
    http_client: Client,
}

impl SubsonicClient {
    /// Create a new Subsonic client
    pub fn new(base_url: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid server URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid server URL: {}", base_url);
        }

        let http_client = Client::builder()
            .user_agent(concat!("tunegrab/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        debug!("Subsonic client {} for {} at {}", CLIENT_NAME, username, base_url);

        Ok(Self {
            base_url,
            username: username.to_string(),
            password: password.to_string(),
            http_client,
        })
    }

    /// Build an endpoint URL with fresh authentication and extra parameters
    fn build_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["rest", endpoint]);
        }

        TokenAuth::new(&self.username, &self.password).append_to(&mut url);
        url.query_pairs_mut().extend_pairs(params);
        url.into()
    }

    fn build_id_url(&self, endpoint: &str, id: &str) -> String {
        self.build_url(endpoint, &[("id", id)])
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<Option<T>> {
        let response: SubsonicResponse<T> = self
            .http_client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))?;

        self.check_response(&response)?;
        Ok(response.subsonic_response.data)
    }

    /// Test connection to Subsonic server
    pub async fn ping(&self) -> Result<bool> {
        let url = self.build_url("ping", &[]);
        debug!("Pinging Subsonic server: {}", self.base_url);

        let response: SubsonicResponse<()> = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to Subsonic server")?
            .json()
            .await
            .context("Failed to parse ping response")?;

        self.check_response(&response)?;
        Ok(true)
    }

    /// Get a single song
    pub async fn get_song(&self, id: &str) -> Result<Song> {
        let url = self.build_id_url("getSong", id);
        debug!("Fetching song {}", id);

        self.fetch::<SongData>(&url, "song")
            .await?
            .map(|d| d.song)
            .ok_or_else(|| anyhow::anyhow!("Song not found"))
    }

    /// Get artist details with albums
    pub async fn get_artist(&self, id: &str) -> Result<ArtistWithAlbums> {
        let url = self.build_id_url("getArtist", id);
        debug!("Fetching artist {}", id);

        self.fetch::<ArtistData>(&url, "artist")
            .await?
            .map(|d| d.artist)
            .ok_or_else(|| anyhow::anyhow!("Artist not found"))
    }

    /// Get album details with songs
    pub async fn get_album(&self, id: &str) -> Result<AlbumWithSongs> {
        let url = self.build_id_url("getAlbum", id);
        debug!("Fetching album {}", id);

        self.fetch::<AlbumData>(&url, "album")
            .await?
            .map(|d| d.album)
            .ok_or_else(|| anyhow::anyhow!("Album not found"))
    }

    /// URL serving the original file
    pub fn get_download_url(&self, id: &str) -> String {
        self.build_id_url("download", id)
    }

    /// URL serving an MP3 transcode capped at `max_bit_rate` kbps
    pub fn get_stream_url(&self, id: &str, max_bit_rate: u32) -> String {
        let rate = max_bit_rate.to_string();
        self.build_url(
            "stream",
            &[("id", id), ("format", "mp3"), ("maxBitRate", &rate)],
        )
    }

    /// Get cover art URL
    pub fn get_cover_art_url(&self, id: &str, size: Option<u32>) -> String {
        match size {
            Some(size) => self.build_url("getCoverArt", &[("id", id), ("size", &size.to_string())]),
            None => self.build_id_url("getCoverArt", id),
        }
    }

    /// Check response status and return error if failed
    fn check_response<T>(&self, response: &SubsonicResponse<T>) -> Result<()> {
        if response.subsonic_response.status != "ok" {
            if let Some(error) = &response.subsonic_response.error {
                anyhow::bail!("Subsonic error {}: {}", error.code, error.message);
            }
            anyhow::bail!("Unknown Subsonic error");
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for SubsonicClient {
    async fn lookup_track(&self, id: &str) -> Result<Track> {
        Ok(self.get_song(id).await?.into_track(None))
    }

    async fn tracks_for_album(&self, id: &str) -> Result<Vec<Track>> {
        let mut album = self.get_album(id).await?;
        let songs = std::mem::take(&mut album.song);
        debug!("Album {} has {} songs", album.name, songs.len());

        Ok(songs
            .into_iter()
            .map(|song| song.into_track(Some(&album)))
            .collect())
    }

    async fn albums_for_artist(&self, id: &str) -> Result<Vec<AlbumRef>> {
        let artist = self.get_artist(id).await?;
        debug!("Artist {} has {} albums", artist.name, artist.album.len());
        Ok(artist.album.into_iter().map(AlbumRef::from).collect())
    }

    fn download_url(&self, track: &Track, tier: QualityTier) -> String {
        match tier {
            QualityTier::Lossless => self.get_download_url(&track.id),
            QualityTier::Mp3High => self.get_stream_url(&track.id, 320),
            QualityTier::Mp3Low => self.get_stream_url(&track.id, 128),
        }
    }

    fn cover_art_url(&self, reference: &str, size: u32) -> String {
        self.get_cover_art_url(reference, Some(size))
    }

    /// Subsonic reports failures as a JSON body with status 200
    fn accepts(&self, tier: QualityTier, status: StatusCode, content_type: &str) -> bool {
        if status != StatusCode::OK || content_type.contains("json") {
            return false;
        }
        if tier.is_lossless() {
            return content_type.contains("flac");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> SubsonicClient {
        SubsonicClient::new(base, "user", "pass", Duration::from_secs(5)).unwrap()
    }

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: "T".to_string(),
            artist: "A".to_string(),
            album: "B".to_string(),
            track_number: 1,
            cover_art: None,
            available_tiers: vec![],
        }
    }

    #[test]
    fn test_tier_urls() {
        let c = client("http://music.local/");
        let t = track("s1");

        let flac = c.download_url(&t, QualityTier::Lossless);
        assert!(flac.starts_with("http://music.local/rest/download?"));
        assert!(flac.ends_with("&id=s1"));

        let high = c.download_url(&t, QualityTier::Mp3High);
        assert!(high.starts_with("http://music.local/rest/stream?"));
        assert!(high.ends_with("&id=s1&format=mp3&maxBitRate=320"));

        let low = c.download_url(&t, QualityTier::Mp3Low);
        assert!(low.ends_with("&format=mp3&maxBitRate=128"));
    }

    #[test]
    fn test_server_path_prefix_and_escaping() {
        let c = client("https://host/music");
        let url = c.cover_art_url("al 1&x", 100);
        assert!(url.starts_with("https://host/music/rest/getCoverArt?u=user&"));
        assert!(url.ends_with("&id=al+1%26x&size=100"));
    }

    #[test]
    fn test_invalid_server_url() {
        assert!(SubsonicClient::new("not a url", "u", "p", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_cover_art_url() {
        let url = client("http://music.local").cover_art_url("al-1", 600);
        assert!(url.starts_with("http://music.local/rest/getCoverArt?"));
        assert!(url.ends_with("&id=al-1&size=600"));
    }

    #[test]
    fn test_accepts() {
        let c = client("http://music.local");
        assert!(c.accepts(QualityTier::Mp3High, StatusCode::OK, "audio/mpeg"));
        assert!(c.accepts(QualityTier::Lossless, StatusCode::OK, "audio/flac"));
        assert!(!c.accepts(QualityTier::Lossless, StatusCode::OK, "audio/mpeg"));
        assert!(!c.accepts(QualityTier::Mp3High, StatusCode::OK, "application/json"));
        assert!(!c.accepts(QualityTier::Mp3High, StatusCode::NOT_FOUND, "audio/mpeg"));
    }

    #[tokio::test]
    async fn test_tracks_for_album() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "subsonic-response": {
                "status": "ok",
                "version": "1.16.1",
                "album": {
                    "id": "a1",
                    "name": "Record",
                    "artist": "Band",
                    "coverArt": "al-a1",
                    "song": [
                        {"id": "s1", "title": "One", "track": 1, "suffix": "flac"},
                        {"id": "s2", "title": "Two", "track": 2, "suffix": "mp3", "bitRate": 128}
                    ]
                }
            }
        });
        Mock::given(method("GET"))
            .and(path("/rest/getAlbum"))
            .and(query_param("id", "a1"))
            .and(query_param("u", "user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let tracks = client(&server.uri()).tracks_for_album("a1").await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "Band");
        assert_eq!(tracks[0].album, "Record");
        assert_eq!(tracks[0].cover_art.as_deref(), Some("al-a1"));
        assert!(tracks[0].available_tiers.contains(&QualityTier::Lossless));
        assert_eq!(tracks[1].available_tiers, vec![QualityTier::Mp3Low]);
    }

    #[tokio::test]
    async fn test_error_response() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "subsonic-response": {
                "status": "failed",
                "version": "1.16.1",
                "error": {"code": 70, "message": "Song not found"}
            }
        });
        Mock::given(method("GET"))
            .and(path("/rest/getSong"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = client(&server.uri()).lookup_track("missing").await.unwrap_err();
        assert!(err.to_string().contains("70"));
    }

    #[tokio::test]
    async fn test_albums_for_artist() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "subsonic-response": {
                "status": "ok",
                "version": "1.16.1",
                "artist": {
                    "id": "ar1",
                    "name": "Band",
                    "album": [
                        {"id": "a1", "name": "Record", "explicitStatus": "explicit"},
                        {"id": "a2", "name": "Record", "explicitStatus": "clean"}
                    ]
                }
            }
        });
        Mock::given(method("GET"))
            .and(path("/rest/getArtist"))
            .and(query_param("id", "ar1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let albums = client(&server.uri()).albums_for_artist("ar1").await.unwrap();
        assert_eq!(albums.len(), 2);
        assert!(!albums[0].is_edited());
        assert!(albums[1].is_edited());
    }
}

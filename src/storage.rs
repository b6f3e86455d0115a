//! Output library layout and file creation

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::catalog::Track;
use crate::download::QualityTier;
use crate::utils::sanitize_component;

/// File name of the optional per-album cover image
pub const COVER_FILE_NAME: &str = "cover.jpg";

/// Maps tracks to `<artist>/<album>/<track#> - <title>.<ext>` under a root
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every file of the track's album
    pub fn album_dir(&self, track: &Track) -> PathBuf {
        self.root
            .join(sanitize_component(&track.artist))
            .join(sanitize_component(&track.album))
    }

    /// Destination of a track fetched at `tier`
    pub fn track_path(&self, track: &Track, tier: QualityTier) -> PathBuf {
        let filename = format!(
            "{} - {}.{}",
            track.track_number,
            sanitize_component(&track.title),
            tier.extension()
        );
        self.album_dir(track).join(filename)
    }

    pub fn cover_path(&self, track: &Track) -> PathBuf {
        self.album_dir(track).join(COVER_FILE_NAME)
    }

    /// Recursively create the directory a file will live in
    pub async fn create_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Create a file that must not exist yet
    ///
    /// Returns `None` when something is already at `path`.
    pub async fn create_new(&self, path: &Path) -> io::Result<Option<File>> {
        match OpenOptions::new().write(true).create_new(true).open(path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the album cover file unless one is already there
    ///
    /// Returns whether a file was written.
    pub async fn write_cover_file(&self, track: &Track, data: &[u8]) -> io::Result<bool> {
        let path = self.cover_path(track);
        self.create_parent(&path).await?;

        let Some(mut file) = self.create_new(&path).await? else {
            debug!("Cover file already present: {}", path.display());
            return Ok(false);
        };

        if let Err(e) = file.write_all(data).await {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }
        file.flush().await?;

        debug!("Wrote cover art: {}", path.display());
        Ok(true)
    }
}

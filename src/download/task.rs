//! Acquisition of a single track
//!
//! One task owns one track from the existence check to the final flush:
//! negotiate a tier, open the audio body, fetch cover art, create the file,
//! write the tag block and copy the payload through. Any failure after the
//! file is created removes it again.

use futures::TryStreamExt;
use reqwest::Response;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::debug;

use super::error::TrackError;
use super::quality::{QualityNegotiator, QualityTier};
use super::stream::{AudioReader, StreamDecoder};
use crate::catalog::{Catalog, Track};
use crate::storage::LibraryLayout;
use crate::tag::{TagMetadata, flac, mp3};
use crate::utils::cover_art::{CoverArt, fetch_cover_art};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Everything a task needs, shared read-only across the batch
pub struct TaskContext {
    pub catalog: Arc<dyn Catalog>,
    pub decoder: Arc<dyn StreamDecoder>,
    pub http: reqwest::Client,
    pub layout: LibraryLayout,
    pub art_size: u32,
    pub cover_file: bool,
}

/// Download task for a single track
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub track: Track,
    pub requested: QualityTier,
}

/// How a task ended
#[derive(Debug)]
pub enum Outcome {
    Downloaded { path: PathBuf, tier: QualityTier },
    AlreadyPresent { path: PathBuf },
    Failed(TrackError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

/// Result of one task, reported per track
#[derive(Debug)]
pub struct TaskOutcome {
    pub track_id: String,
    pub title: String,
    pub outcome: Outcome,
}

impl DownloadTask {
    pub fn new(track: Track, requested: QualityTier) -> Self {
        Self { track, requested }
    }

    /// Run the task to completion; errors are folded into the outcome
    pub async fn run(self, ctx: &TaskContext) -> TaskOutcome {
        let outcome = match acquire(ctx, &self.track, self.requested).await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failed(e),
        };
        self.finish(outcome)
    }

    pub fn finish(self, outcome: Outcome) -> TaskOutcome {
        TaskOutcome {
            track_id: self.track.id,
            title: self.track.title,
            outcome,
        }
    }
}

async fn acquire(
    ctx: &TaskContext,
    track: &Track,
    requested: QualityTier,
) -> Result<Outcome, TrackError> {
    if let Some(path) = existing_file(ctx, track, requested).await? {
        debug!("File already exists, skipping download: {}", path.display());
        return Ok(Outcome::AlreadyPresent { path });
    }

    let available = ctx.catalog.available_tiers(track);
    let mut negotiator =
        QualityNegotiator::new(requested, &available).map_err(|_| TrackError::NotAvailable)?;
    let (tier, response) = match open_audio(ctx, track, &mut negotiator).await? {
        Opened::Audio(tier, response) => (tier, response),
        Opened::Present(path) => return Ok(Outcome::AlreadyPresent { path }),
    };

    let path = ctx.layout.track_path(track, tier);
    ctx.layout
        .create_parent(&path)
        .await
        .map_err(|e| TrackError::filesystem(&path, e))?;

    let cover = fetch_cover(ctx, track).await?;
    if ctx.cover_file {
        if let Some(cover) = &cover {
            ctx.layout
                .write_cover_file(track, &cover.data)
                .await
                .map_err(|e| TrackError::filesystem(ctx.layout.cover_path(track), e))?;
        }
    }

    let body: AudioReader = Box::pin(StreamReader::new(
        response.bytes_stream().map_err(io::Error::other),
    ));
    let mut reader = ctx
        .decoder
        .wrap(body, &track.id)
        .map_err(TrackError::Stream)?;

    let Some(file) = ctx
        .layout
        .create_new(&path)
        .await
        .map_err(|e| TrackError::filesystem(&path, e))?
    else {
        debug!("File appeared during negotiation, skipping: {}", path.display());
        return Ok(Outcome::AlreadyPresent { path });
    };

    let meta = TagMetadata::from_track(track, cover);
    match write_audio(&mut reader, file, &path, tier, &meta).await {
        Ok(bytes) => {
            debug!("Wrote {} ({} payload bytes)", path.display(), bytes);
            Ok(Outcome::Downloaded { path, tier })
        }
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&path).await {
                debug!("Failed to remove partial file {}: {}", path.display(), remove_err);
            }
            Err(e)
        }
    }
}

/// Result of walking the negotiated tiers
enum Opened {
    Audio(QualityTier, Response),
    Present(PathBuf),
}

/// Path of an already downloaded file for `tier`, if any
async fn existing_file(
    ctx: &TaskContext,
    track: &Track,
    tier: QualityTier,
) -> Result<Option<PathBuf>, TrackError> {
    let path = ctx.layout.track_path(track, tier);
    let exists = fs::try_exists(&path)
        .await
        .map_err(|e| TrackError::filesystem(&path, e))?;
    Ok(exists.then_some(path))
}

/// Fetch the audio body, falling back per the negotiator
///
/// A fallback tier's destination is checked before it is requested, so a
/// file left by an earlier fallback is never fetched again.
async fn open_audio(
    ctx: &TaskContext,
    track: &Track,
    negotiator: &mut QualityNegotiator,
) -> Result<Opened, TrackError> {
    let requested = negotiator.current().ok_or(TrackError::NotAvailable)?;

    while let Some(tier) = negotiator.current() {
        if tier != requested {
            if let Some(path) = existing_file(ctx, track, tier).await? {
                debug!("Fallback file already exists: {}", path.display());
                return Ok(Opened::Present(path));
            }
        }

        let url = ctx.catalog.download_url(track, tier);
        debug!("Requesting {} at {}: {}", track.title, tier, url);

        let response = ctx.http.get(&url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if ctx.catalog.accepts(tier, status, &content_type) {
            return Ok(Opened::Audio(tier, response));
        }

        debug!(
            "Service refused {} for {} (status {}, {})",
            tier, track.title, status, content_type
        );
        drop(response);
        negotiator.reject();
    }

    Err(TrackError::Rejected { requested })
}

async fn fetch_cover(ctx: &TaskContext, track: &Track) -> Result<Option<CoverArt>, TrackError> {
    let Some(reference) = &track.cover_art else {
        return Ok(None);
    };
    let url = ctx.catalog.cover_art_url(reference, ctx.art_size);
    Ok(fetch_cover_art(&ctx.http, &url, ctx.art_size).await?)
}

/// Write tag block and payload, returning the payload byte count
async fn write_audio(
    reader: &mut AudioReader,
    file: File,
    path: &Path,
    tier: QualityTier,
    meta: &TagMetadata,
) -> Result<u64, TrackError> {
    let mut writer = BufWriter::new(file);

    if tier.is_lossless() {
        flac::write_header(reader, &mut writer, meta).await?;
    } else {
        mp3::write_tag(&mut writer, meta).await?;
    }

    let copied = copy_payload(reader, &mut writer, path).await?;
    writer
        .flush()
        .await
        .map_err(|e| TrackError::filesystem(path, e))?;
    Ok(copied)
}

/// Copy the rest of the stream, keeping read and write failures apart
async fn copy_payload<W>(reader: &mut AudioReader, writer: &mut W, path: &Path) -> Result<u64, TrackError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await.map_err(TrackError::Stream)?;
        if n == 0 {
            return Ok(total);
        }
        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| TrackError::filesystem(path, e))?;
        total += n as u64;
    }
}

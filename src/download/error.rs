//! Per-track failure reasons

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::QualityTier;
use crate::tag::TagError;
use crate::utils::cover_art::CoverArtError;

/// Why a single track could not be downloaded
///
/// None of these affect other tracks in the batch.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("song not available")]
    NotAvailable,

    #[error("service refused {requested} and every fallback tier")]
    Rejected { requested: QualityTier },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode audio stream: {0}")]
    Stream(#[source] io::Error),

    #[error(transparent)]
    Cover(#[from] CoverArtError),

    #[error("failed to tag file: {0}")]
    Tag(#[from] TagError),

    #[error("download task aborted: {0}")]
    Aborted(String),
}

impl TrackError {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TrackError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

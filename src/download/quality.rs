//! Encoding tiers and fallback negotiation

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio encoding tier offered by the service, ordered from worst to best
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    ValueEnum,
)]
pub enum QualityTier {
    #[serde(rename = "mp3-128")]
    #[value(name = "mp3-128")]
    Mp3Low,
    #[default]
    #[serde(rename = "mp3-320")]
    #[value(name = "mp3-320")]
    Mp3High,
    #[serde(rename = "flac")]
    #[value(name = "flac")]
    Lossless,
}

impl QualityTier {
    /// Whether this tier is delivered in the lossless container
    pub fn is_lossless(self) -> bool {
        self == QualityTier::Lossless
    }

    /// File extension for files fetched at this tier
    pub fn extension(self) -> &'static str {
        if self.is_lossless() { "flac" } else { "mp3" }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityTier::Mp3Low => "mp3-128",
            QualityTier::Mp3High => "mp3-320",
            QualityTier::Lossless => "flac",
        };
        f.write_str(name)
    }
}

/// The track offers no tier at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoAvailableTier;

/// Negotiation state for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Attempting(QualityTier),
    Exhausted,
}

/// Picks which tier to fetch and what to fall back to when the service
/// refuses it.
///
/// The requested tier is always tried first, even when the track does not
/// list it. After a rejection, the best listed tier other than the
/// requested one is tried once. A second rejection exhausts the track.
#[derive(Debug, Clone)]
pub struct QualityNegotiator {
    requested: QualityTier,
    available: Vec<QualityTier>,
    state: Attempt,
    fell_back: bool,
}

impl QualityNegotiator {
    /// Start negotiating; fails without any fetch if the track offers nothing
    pub fn new(requested: QualityTier, available: &[QualityTier]) -> Result<Self, NoAvailableTier> {
        if available.is_empty() {
            return Err(NoAvailableTier);
        }

        let mut ranked = available.to_vec();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        ranked.dedup();

        Ok(Self {
            requested,
            available: ranked,
            state: Attempt::Attempting(requested),
            fell_back: false,
        })
    }

    /// Tier to fetch next, if any remain
    pub fn current(&self) -> Option<QualityTier> {
        match self.state {
            Attempt::Attempting(tier) => Some(tier),
            Attempt::Exhausted => None,
        }
    }

    /// Record that the service refused the current tier and advance
    pub fn reject(&mut self) -> Attempt {
        self.state = if self.fell_back {
            Attempt::Exhausted
        } else {
            self.fell_back = true;
            match fallback_tier(self.requested, &self.available) {
                Some(tier) => Attempt::Attempting(tier),
                None => Attempt::Exhausted,
            }
        };
        self.state
    }
}

/// Highest listed tier that is not the requested one
pub fn fallback_tier(requested: QualityTier, available: &[QualityTier]) -> Option<QualityTier> {
    available.iter().copied().filter(|t| *t != requested).max()
}

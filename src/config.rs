//! Settings persistence and download configuration
//!
//! Stores defaults in ~/.config/tunegrab/config.json. Every field is
//! optional; command-line flags override whatever the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::download::QualityTier;
use crate::utils::cover_art::{MAX_ART_SIZE, clamp_art_size};

pub const DEFAULT_PARALLEL: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Persistent settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub quality: Option<QualityTier>,
    pub parallel: Option<usize>,
    pub art_size: Option<u32>,
    pub prefer_edited: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub cover_file: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from the user config directory
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load settings from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;

        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {:?}", path))?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("tunegrab").join("config.json"))
    }
}

/// Values supplied on the command line, taking precedence over settings
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub quality: Option<QualityTier>,
    pub parallel: Option<usize>,
    pub art_size: Option<u32>,
    pub prefer_edited: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub cover_file: Option<bool>,
}

/// Everything the download pipeline is configured with
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadConfig {
    /// Tier requested for every track
    pub quality: QualityTier,
    /// Maximum number of tracks in flight
    pub parallel: usize,
    /// Square cover art size in pixels
    pub art_size: u32,
    /// Prefer edited releases when an artist has duplicate album titles
    pub prefer_edited: bool,
    /// Library root
    pub output_dir: PathBuf,
    /// Also write `cover.jpg` into each album directory
    pub cover_file: bool,
    /// Connect and read timeout for every request
    pub timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: QualityTier::default(),
            parallel: DEFAULT_PARALLEL,
            art_size: MAX_ART_SIZE,
            prefer_edited: false,
            output_dir: PathBuf::from("."),
            cover_file: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl DownloadConfig {
    /// Merge command-line overrides over file settings over defaults
    pub fn resolve(settings: &Settings, overrides: Overrides) -> Result<Self> {
        let defaults = Self::default();

        let parallel = overrides
            .parallel
            .or(settings.parallel)
            .unwrap_or(defaults.parallel);
        if parallel == 0 {
            anyhow::bail!("Parallel download limit must be at least 1");
        }

        let art_size = overrides
            .art_size
            .or(settings.art_size)
            .unwrap_or(defaults.art_size);
        let clamped = clamp_art_size(art_size);
        if clamped != art_size {
            debug!("Art size {} clamped to {}", art_size, clamped);
        }

        Ok(Self {
            quality: overrides
                .quality
                .or(settings.quality)
                .unwrap_or(defaults.quality),
            parallel,
            art_size: clamped,
            prefer_edited: overrides
                .prefer_edited
                .or(settings.prefer_edited)
                .unwrap_or(defaults.prefer_edited),
            output_dir: overrides
                .output_dir
                .or_else(|| settings.output_dir.clone())
                .unwrap_or(defaults.output_dir),
            cover_file: overrides
                .cover_file
                .or(settings.cover_file)
                .unwrap_or(defaults.cover_file),
            timeout: settings
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
    }
}

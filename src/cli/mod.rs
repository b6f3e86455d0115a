//! CLI module for tunegrab

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::download::QualityTier;

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "tunegrab", about = "Download tracks, albums and artists from a Subsonic server")]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the tracks behind one or more links
    Download {
        /// Song, album or artist links (`album:<id>` or a share URL)
        #[arg(value_name = "LINKS", required = true)]
        links: Vec<String>,

        /// Subsonic server URL
        #[arg(long, env = "SUBSONIC_URL")]
        url: Option<String>,

        /// Username
        #[arg(short, long, env = "SUBSONIC_USER")]
        username: Option<String>,

        /// Password
        #[arg(long, env = "SUBSONIC_PASS", hide_env_values = true)]
        password: Option<String>,

        /// Requested quality for every track
        #[arg(short, long, value_enum)]
        quality: Option<QualityTier>,

        /// Number of parallel downloads
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Embedded cover art size in pixels (at most 800)
        #[arg(long)]
        art_size: Option<u32>,

        /// Prefer edited releases over explicit ones for artist links
        #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        prefer_edited: Option<bool>,

        /// Library root directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Also save cover.jpg in each album directory
        #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        cover_file: Option<bool>,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "tunegrab", "download", "album:1", "song:2", "-q", "flac", "-p", "2", "--cover-file",
        ])
        .unwrap();

        match cli.command {
            Commands::Download {
                links,
                quality,
                parallel,
                cover_file,
                prefer_edited,
                ..
            } => {
                assert_eq!(links, vec!["album:1", "song:2"]);
                assert_eq!(quality, Some(QualityTier::Lossless));
                assert_eq!(parallel, Some(2));
                assert_eq!(cover_file, Some(true));
                assert_eq!(prefer_edited, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bool_flags_can_be_disabled() {
        let cli = Cli::try_parse_from([
            "tunegrab", "download", "--cover-file=false", "--prefer-edited", "artist:9",
        ])
        .unwrap();

        match cli.command {
            Commands::Download {
                links,
                cover_file,
                prefer_edited,
                ..
            } => {
                assert_eq!(links, vec!["artist:9"]);
                assert_eq!(cover_file, Some(false));
                assert_eq!(prefer_edited, Some(true));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_download_requires_links() {
        assert!(Cli::try_parse_from(["tunegrab", "download"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_quality() {
        assert!(Cli::try_parse_from(["tunegrab", "download", "song:1", "-q", "aac"]).is_err());
    }
}

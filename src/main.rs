//! tunegrab - Download music from a Subsonic server into a tagged library

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod cli;
mod config;
mod download;
mod storage;
mod subsonic;
mod tag;
mod utils;

use cli::{Cli, Commands};
use cli::commands::Credentials;
use config::Overrides;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tunegrab=debug,reqwest=debug"
    } else {
        "tunegrab=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Download {
            links,
            url,
            username,
            password,
            quality,
            parallel,
            art_size,
            prefer_edited,
            output,
            cover_file,
        } => {
            let credentials = Credentials {
                url,
                username,
                password,
            };
            let overrides = Overrides {
                quality,
                parallel,
                art_size,
                prefer_edited,
                output_dir: output,
                cover_file,
            };
            cli::commands::download(links, credentials, overrides).await?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}

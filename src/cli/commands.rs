//! CLI command handlers

use anyhow::{Context, Result};
use clap_complete::generate;
use colored::Colorize;
use indicatif::ProgressBar;
use std::io;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::{Catalog, resolve_links};
use crate::config::{DownloadConfig, Overrides, Settings};
use crate::download::{PlainStream, Scheduler};
use crate::subsonic::SubsonicClient;

/// Server credentials from flags, environment or settings
pub struct Credentials {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Fill gaps from the settings file; the password is never stored there
    fn resolve(self, settings: &Settings) -> Result<(String, String, String)> {
        let url = self
            .url
            .or_else(|| settings.server_url.clone())
            .context("No server URL given. Use --url or SUBSONIC_URL.")?;
        let username = self
            .username
            .or_else(|| settings.username.clone())
            .context("No username given. Use --username or SUBSONIC_USER.")?;
        let password = self
            .password
            .context("No password given. Use --password or SUBSONIC_PASS.")?;
        Ok((url, username, password))
    }
}

/// Handle the `download` command
pub async fn download(links: Vec<String>, credentials: Credentials, overrides: Overrides) -> Result<()> {
    let settings = Settings::load()?;
    let config = DownloadConfig::resolve(&settings, overrides)?;
    let (url, username, password) = credentials.resolve(&settings)?;

    let client = SubsonicClient::new(&url, &username, &password, config.timeout)?;

    println!("{}", "Connecting to Subsonic server...".cyan());
    client.ping().await?;
    println!("{}", "Connected!".green());

    let catalog: Arc<dyn Catalog> = Arc::new(client);
    let tracks = resolve_links(catalog.as_ref(), &links, config.prefer_edited).await;
    if tracks.is_empty() {
        println!("{}", "Nothing to download.".yellow());
        return Ok(());
    }

    println!(
        "Downloading {} track(s) at {} into {}",
        tracks.len(),
        config.quality.to_string().cyan(),
        config.output_dir.display()
    );

    let scheduler = Scheduler::new(catalog, Arc::new(PlainStream), &config)?;
    let progress = ProgressBar::new(tracks.len() as u64);
    let report = scheduler.run(tracks, &progress).await;
    debug!("At most {} downloads ran at once", report.peak_in_flight);

    println!();
    println!("{}", "Download complete!".green().bold());
    println!("  Downloaded: {}", report.downloaded());
    println!("  Already present: {}", report.skipped());
    if report.failed() > 0 {
        println!("  {}", format!("Failed: {}", report.failed()).red());
    } else {
        println!("  Failed: 0");
    }

    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = <super::Cli as clap::CommandFactory>::command();
    generate(shell, &mut cmd, "tunegrab", &mut io::stdout());
}

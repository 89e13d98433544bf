//! driveup - upload local files and directory trees to Google Drive.
//!
//! Credentials are read from `~/.gdriver/credentials.json` and
//! `~/.gdriver/token.json` unless another directory is given.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use driveup_common::DriveId;
use driveup_upload::{DriveClient, TreeUploader, UploadConfig, UploadReport};

#[derive(Parser)]
#[command(name = "driveup")]
#[command(about = "Upload files and folders to Google Drive")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding credentials.json and token.json (default: ~/.gdriver).
    #[arg(short, long)]
    auth_dir: Option<PathBuf>,

    /// Fixed chunk size in bytes (default: derived per file).
    #[arg(short, long)]
    chunk_size: Option<u64>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drive folder to upload into.
    folder_id: String,

    /// Files or directories to upload, in order.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = build_config(&cli)?;
    let destination = DriveId::new(cli.folder_id.as_str()).context("Invalid folder ID")?;
    let drive = DriveClient::from_config(&config).context("Failed to set up Drive client")?;

    let uploader = TreeUploader::new(&drive)
        .with_chunk_size(config.chunk_size)
        .on_progress(Arc::new(|path: &Path, sent, total| {
            debug!(file = %path.display(), sent, total, "Progress");
        }));

    let mut total = UploadReport::default();
    for path in &cli.paths {
        let report = uploader
            .upload(&destination, path)
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;
        total.merge(&report);
    }

    info!(
        folders = total.folders_created,
        files = total.files_uploaded,
        bytes = total.bytes_uploaded,
        skipped = total.entries_skipped,
        "Upload complete"
    );

    Ok(())
}

/// Configuration from the optional file, with command line flags on top.
fn build_config(cli: &Cli) -> Result<UploadConfig> {
    let mut config = match (&cli.config, &cli.auth_dir) {
        (Some(path), _) => UploadConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        (None, Some(dir)) => UploadConfig::new(dir),
        (None, None) => UploadConfig::from_home().context("Failed to locate credentials")?,
    };

    if let Some(dir) = &cli.auth_dir {
        config.auth_dir = dir.clone();
    }
    if cli.chunk_size.is_some() {
        config = config.with_chunk_size(cli.chunk_size);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_a_path() {
        assert!(Cli::try_parse_from(["driveup", "folder"]).is_err());
    }

    #[test]
    fn test_cli_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "driveup",
            "--auth-dir",
            "/srv/creds",
            "--chunk-size",
            "524288",
            "folder",
            "a.txt",
            "photos",
        ])
        .unwrap();

        assert_eq!(cli.folder_id, "folder");
        assert_eq!(cli.paths, vec![PathBuf::from("a.txt"), PathBuf::from("photos")]);

        let config = build_config(&cli).unwrap();
        assert_eq!(config.auth_dir, PathBuf::from("/srv/creds"));
        assert_eq!(config.chunk_size, Some(524_288));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let cli = Cli::try_parse_from([
            "driveup",
            "--auth-dir",
            "/srv/creds",
            "--chunk-size",
            "0",
            "folder",
            "a.txt",
        ])
        .unwrap();

        assert!(build_config(&cli).is_err());
    }
}

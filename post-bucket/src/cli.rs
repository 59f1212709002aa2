/// # post-bucket CLI
///
/// Command parsing and orchestration. All pipeline logic lives in `post-bucket-core`; this
/// module loads configuration and credentials, builds the network clients and prints a
/// line per processed file plus a summary.
///
/// Subcommands:
/// - `sync <DIR> [--config <FILE>]`: publish front matter articles to the article API
/// - `images <DIR> <BUCKET> <ATTACHMENTS_DIR>`: relocate embedded images to S3
///
/// For programmatic and integration use, call [`run`] with a constructed [`Cli`].
use crate::credentials::load_api_key;
use crate::load_config::{config_from_env, load_config};
use crate::publish::ArticleClient;
use crate::storage::{S3Config, S3Store};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use post_bucket_core::config::ImageConfig;
use post_bucket_core::images::{relocate_images, FileStatus, ReferenceOutcome, RelocationReport};
use post_bucket_core::synchronise::{
    synchronise, ArticleStatus, SkipReason, SyncAction, SynchroniseReport,
};
use std::path::PathBuf;

/// CLI for post-bucket: publish markdown notes.
#[derive(Parser)]
#[clap(
    name = "post-bucket",
    version,
    about = "Relocate note images to S3 and publish front matter articles to DEV"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish every top-level article in DIR whose front matter marks it ready
    Sync {
        /// Directory of markdown articles
        dir: PathBuf,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Upload images embedded in the notes under DIR to BUCKET and rewrite their links
    Images {
        /// Directory walked recursively for markdown notes
        dir: PathBuf,
        /// Target S3 bucket
        bucket: String,
        /// Directory embedded image paths are relative to
        attachments_dir: PathBuf,
    },
}

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { dir, config } => run_sync(dir, config).await,
        Commands::Images {
            dir,
            bucket,
            attachments_dir,
        } => run_images(dir, bucket, attachments_dir).await,
    }
}

async fn run_sync(dir: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let cli_config = match config_path {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    };
    let api_key =
        load_api_key(&cli_config.credentials.keys_file).context("Cannot start article sync")?;

    let publish_config = cli_config.publish_config(dir);
    publish_config.trace_loaded();
    let client = ArticleClient::new(&cli_config.publish.api_url, api_key, cli_config.timeout())
        .context("Failed to build HTTP client")?;

    tracing::info!(command = "sync", "Starting synchronisation process");
    let report = synchronise(&publish_config, &client).await.map_err(|e| {
        tracing::error!(command = "sync", error = %e, "Synchronisation failed");
        anyhow::Error::new(e)
    })?;

    print_sync_report(&report);
    Ok(())
}

async fn run_images(dir: PathBuf, bucket: String, attachments_dir: PathBuf) -> Result<()> {
    let image_config = ImageConfig {
        notes_dir: dir,
        bucket,
        attachments_dir,
    };
    image_config.trace_loaded();

    let s3_config = S3Config::from_env().context("Cannot start image relocation")?;
    let store = S3Store::new(&s3_config);

    tracing::info!(command = "images", "Starting image relocation");
    let report = relocate_images(&image_config, &store).await.map_err(|e| {
        tracing::error!(command = "images", error = %e, "Image relocation failed");
        anyhow::Error::new(e)
    })?;

    print_relocation_report(&report);
    Ok(())
}

fn print_sync_report(report: &SynchroniseReport) {
    for article in &report.articles {
        let name = article.path.display();
        match &article.status {
            ArticleStatus::Skipped(reason) => {
                let reason = match reason {
                    SkipReason::AlreadyPublished => "already published",
                    SkipReason::Draft => "draft",
                    SkipReason::NoFrontMatter => "no front matter",
                };
                println!("skipped  {name} ({reason})");
            }
            ArticleStatus::Synced { article_id, action } => {
                let action = match action {
                    SyncAction::Created => "created",
                    SyncAction::Updated => "updated",
                    SyncAction::Reconciled => "reconciled by title",
                };
                println!("synced   {name} (id {article_id}, {action})");
            }
            ArticleStatus::Failed(e) => println!("failed   {name}: {e}"),
            ArticleStatus::WriteFailed { article_id, error } => {
                println!("failed   {name}: published as id {article_id} but not recorded: {error}");
            }
        }
    }
    println!("{}", report.summary());
}

fn print_relocation_report(report: &RelocationReport) {
    for file in &report.files {
        let name = file.path.display();
        for reference in &file.references {
            match &reference.outcome {
                ReferenceOutcome::Relocated { url } => {
                    println!("uploaded {name}:{} {} -> {url}", reference.line, reference.original);
                }
                ReferenceOutcome::Failed(e) => {
                    println!("failed   {name}:{} {}: {e}", reference.line, reference.original);
                }
            }
        }
        if let FileStatus::Failed(e) = &file.status {
            println!("failed   {name}: {e}");
        }
    }
    println!("{}", report.summary());
}

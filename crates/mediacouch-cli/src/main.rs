//! Mediacouch CLI: media lifecycle operations against the configured
//! document database.
//!
//! Reads DATABASE_URL, DATABASE_NAME, FILE_STORE and the related settings
//! from the environment (or `.env`). `--in-memory` runs against a fresh
//! in-process database instead.

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use mediacouch_cli::{content_type_for, init_tracing, print_json};
use mediacouch_core::{is_ready_to_process, ByteStream, Config};
use mediacouch_db::setup::open_database;
use mediacouch_db::{connect, InMemoryServer, MediaRepository};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const IN_MEMORY_DATABASE: &str = "media";

#[derive(Parser)]
#[command(name = "mediacouch", about = "Media metadata store CLI")]
struct Cli {
    /// Use a throwaway in-process database instead of DATABASE_URL
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and install its views
    Bootstrap,
    /// Aggregate counts over videos and images
    Status,
    /// List all videos
    Videos,
    /// List all images
    Images,
    /// List images that do not belong to a video
    StandaloneImages,
    /// List the images extracted from a video
    VideoImages {
        /// Video document ID
        video_id: String,
    },
    /// Get a single document by ID
    Get {
        /// Document ID
        id: String,
    },
    /// Check whether a document is waiting for analysis
    Ready {
        /// Document ID
        id: String,
    },
    /// Attach a file to a document
    Attach {
        /// Document ID
        id: String,
        /// Attachment name, e.g. video.mp4
        name: String,
        /// Path to the file to attach
        file: PathBuf,
        /// Content type (guessed from the file extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download an attachment to a file
    Fetch {
        /// Document ID
        id: String,
        /// Attachment name
        name: String,
        /// Output path
        out: PathBuf,
    },
    /// Clear an image's analysis
    ResetImage {
        /// Image document ID
        id: String,
    },
    /// Delete a video's images and thumbnail and clear its metadata
    ResetVideo {
        /// Video document ID
        id: String,
    },
    /// Clear the analysis of every image of a video
    ResetVideoImages {
        /// Video document ID
        video_id: String,
    },
    /// Delete a document and its attachments
    Delete {
        /// Document ID
        id: String,
    },
}

async fn open_repository(in_memory: bool, bootstrap: bool) -> anyhow::Result<MediaRepository> {
    if in_memory {
        let config = Config::new("http://localhost:5984", IN_MEMORY_DATABASE)
            .with_initialize_database(true);
        let database = open_database(&config, &InMemoryServer::new()).await?;
        return Ok(MediaRepository::new(database, None));
    }

    let mut config = Config::from_env().context(
        "Failed to load configuration. Set DATABASE_URL (and FILE_STORE settings if needed)",
    )?;
    config.initialize_database |= bootstrap;
    connect(&config).await
}

async fn write_stream(mut body: ByteStream, out: &Path) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("Failed to read attachment")?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", out.display()))?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let bootstrap = matches!(cli.command, Commands::Bootstrap);
    let repo = open_repository(cli.in_memory, bootstrap).await?;

    match cli.command {
        Commands::Bootstrap => {
            print_json(&serde_json::json!({
                "success": true,
                "backend": repo.backend_kind().to_string(),
            }))?;
        }
        Commands::Status => {
            let report = repo.status().await;
            print_json(&report)?;
            if let Some(e) = report.error {
                return Err(anyhow::Error::new(e).context("Status is incomplete"));
            }
        }
        Commands::Videos => print_json(&repo.videos().await?)?,
        Commands::Images => print_json(&repo.images().await?)?,
        Commands::StandaloneImages => print_json(&repo.standalone_images().await?)?,
        Commands::VideoImages { video_id } => print_json(&repo.video_images(&video_id).await?)?,
        Commands::Get { id } => print_json(&repo.get(&id).await?)?,
        Commands::Ready { id } => {
            let doc = repo.get(&id).await?;
            print_json(&serde_json::json!({
                "id": id,
                "ready": is_ready_to_process(&doc),
            }))?;
        }
        Commands::Attach {
            id,
            name,
            file,
            content_type,
        } => {
            let doc = repo.get(&id).await?;
            let content_type =
                content_type.unwrap_or_else(|| content_type_for(&file).to_string());
            let handle = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let body: ByteStream = Box::pin(tokio_util::io::ReaderStream::new(handle));

            let rev = repo.attach(&doc, &name, &content_type, body).await?;
            print_json(&serde_json::json!({ "id": id, "rev": rev }))?;
        }
        Commands::Fetch { id, name, out } => {
            let doc = repo.get(&id).await?;
            let body = repo.read(&doc, &name).await?;
            let size = write_stream(body, &out).await?;
            print_json(&serde_json::json!({
                "id": id,
                "attachment": name,
                "content_type": doc.attachment_content_type(&name),
                "size": size,
                "path": out.display().to_string(),
            }))?;
        }
        Commands::ResetImage { id } => {
            let rev = repo.image_reset(&id).await?;
            print_json(&serde_json::json!({ "id": id, "rev": rev }))?;
        }
        Commands::ResetVideo { id } => {
            let outcome = repo.video_reset(&id).await?;
            print_json(&outcome)?;
        }
        Commands::ResetVideoImages { video_id } => {
            let outcome = repo.video_images_reset(&video_id).await?;
            print_json(&outcome)?;
        }
        Commands::Delete { id } => {
            let outcome = repo.delete(&id).await?;
            print_json(&outcome)?;
        }
    }

    Ok(())
}

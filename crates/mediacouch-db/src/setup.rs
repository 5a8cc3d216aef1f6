//! Connection setup from a `Config`.

use anyhow::{Context, Result};
use mediacouch_core::Config;
use mediacouch_storage::create_file_store;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{Bootstrap, CouchServer, DatabaseServer, MediaDatabase, MediaRepository};

/// Select the configured database, bootstrapping it first when
/// `initialize_database` is set.
pub async fn open_database(
    config: &Config,
    server: &dyn DatabaseServer,
) -> Result<Arc<dyn MediaDatabase>> {
    if !config.initialize_database {
        return Ok(server.use_database(&config.database_name));
    }

    tracing::info!(database = %config.database_name, "Bootstrapping database...");
    Bootstrap::new(config.database_name.clone())
        .run(server)
        .await
        .context("Failed to bootstrap database")
}

/// Build a repository from `config`: CouchDB client, optional blob store
/// and, if requested, the bootstrap procedure.
pub async fn connect(config: &Config) -> Result<MediaRepository> {
    tracing::info!("Connecting to database...");
    let server = CouchServer::from_config(config).context("Failed to create database client")?;
    let database = open_database(config, &server).await?;

    tracing::info!("Initializing file store...");
    let file_store = create_file_store(config)
        .await
        .context("Failed to initialize file store")?;

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.db_timeout_seconds))
        .build()
        .context("Failed to create attachment HTTP client")?;

    let repository = MediaRepository::new(database, file_store).with_http_client(http);
    tracing::info!(
        database = %config.database_name,
        backend = %repository.backend_kind(),
        "Media repository ready"
    );

    Ok(repository)
}
